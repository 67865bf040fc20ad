use crate::frame::head::{Head, Kind, StreamId};

const ACK: u8 = 0x1;

const HEADER_TABLE_SIZE: u16 = 0x1;
const ENABLE_PUSH: u16 = 0x2;
const MAX_CONCURRENT_STREAMS: u16 = 0x3;
const INITIAL_WINDOW_SIZE: u16 = 0x4;
const MAX_FRAME_SIZE: u16 = 0x5;
const MAX_HEADER_LIST_SIZE: u16 = 0x6;

pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16_384;
pub const DEFAULT_SETTINGS_HEADER_TABLE_SIZE: u32 = 4_096;

/// A `SETTINGS` frame: a set of connection-wide parameters. gRPC only ever
/// pushes in one direction it never uses (push is always disabled), but all
/// six parameters are parsed for compliance with peers that send them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    header_table_size: Option<u32>,
    enable_push: Option<bool>,
    max_concurrent_streams: Option<u32>,
    initial_window_size: Option<u32>,
    max_frame_size: Option<u32>,
    max_header_list_size: Option<u32>,
    ack: bool,
}

impl Settings {
    pub fn new() -> Settings {
        Settings {
            enable_push: Some(false),
            ..Default::default()
        }
    }

    pub fn ack() -> Settings {
        Settings {
            ack: true,
            ..Default::default()
        }
    }

    pub fn is_ack(&self) -> bool {
        self.ack
    }

    pub fn header_table_size(&self) -> Option<u32> {
        self.header_table_size
    }

    pub fn set_header_table_size(&mut self, size: Option<u32>) {
        self.header_table_size = size;
    }

    pub fn max_frame_size(&self) -> Option<u32> {
        self.max_frame_size
    }

    pub fn set_max_frame_size(&mut self, size: Option<u32>) {
        self.max_frame_size = size;
    }

    pub fn initial_window_size(&self) -> Option<u32> {
        self.initial_window_size
    }

    pub fn set_initial_window_size(&mut self, size: Option<u32>) {
        self.initial_window_size = size;
    }

    pub fn max_concurrent_streams(&self) -> Option<u32> {
        self.max_concurrent_streams
    }

    pub fn set_max_concurrent_streams(&mut self, max: Option<u32>) {
        self.max_concurrent_streams = max;
    }

    pub fn enable_push(&self) -> bool {
        self.enable_push.unwrap_or(false)
    }

    pub fn set_enable_push(&mut self, enabled: bool) {
        self.enable_push = Some(enabled);
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        let flag = if self.ack { ACK } else { 0 };
        let head = Head::new(Kind::Settings, flag, StreamId::ZERO);

        let mut params = Vec::new();
        if let Some(v) = self.header_table_size {
            params.push((HEADER_TABLE_SIZE, v));
        }
        if let Some(v) = self.enable_push {
            params.push((ENABLE_PUSH, v as u32));
        }
        if let Some(v) = self.max_concurrent_streams {
            params.push((MAX_CONCURRENT_STREAMS, v));
        }
        if let Some(v) = self.initial_window_size {
            params.push((INITIAL_WINDOW_SIZE, v));
        }
        if let Some(v) = self.max_frame_size {
            params.push((MAX_FRAME_SIZE, v));
        }
        if let Some(v) = self.max_header_list_size {
            params.push((MAX_HEADER_LIST_SIZE, v));
        }

        head.encode(params.len() * 6, dst);
        for (id, value) in params {
            dst.extend_from_slice(&id.to_be_bytes());
            dst.extend_from_slice(&value.to_be_bytes());
        }
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<Settings, super::Error> {
        if head.flag() & ACK == ACK {
            return Ok(Settings::ack());
        }

        if payload.len() % 6 != 0 {
            return Err(super::Error::PartialSettingLength);
        }

        let mut settings = Settings::default();
        for chunk in payload.chunks(6) {
            let id = u16::from_be_bytes([chunk[0], chunk[1]]);
            let value = u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]);

            match id {
                HEADER_TABLE_SIZE => settings.header_table_size = Some(value),
                ENABLE_PUSH => settings.enable_push = Some(value != 0),
                MAX_CONCURRENT_STREAMS => settings.max_concurrent_streams = Some(value),
                INITIAL_WINDOW_SIZE => settings.initial_window_size = Some(value),
                MAX_FRAME_SIZE => settings.max_frame_size = Some(value),
                MAX_HEADER_LIST_SIZE => settings.max_header_list_size = Some(value),
                // Unknown settings identifiers must be ignored (RFC 7540 §6.5.2).
                _ => {}
            }
        }

        Ok(settings)
    }
}
