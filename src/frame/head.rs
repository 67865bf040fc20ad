use std::fmt;

/// The 9-byte frame header common to every HTTP/2 frame: a 24-bit length, an
/// 8-bit type, an 8-bit flags field and a 31-bit stream identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Head {
    kind: Kind,
    flag: u8,
    stream_id: StreamId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Data,
    Headers,
    Priority,
    Reset,
    Settings,
    PushPromise,
    Ping,
    GoAway,
    WindowUpdate,
    Continuation,
    Unknown(u8),
}

/// An HTTP/2 stream identifier.
///
/// Zero is reserved for connection-level frames. Clients allocate odd ids,
/// servers even ids, both strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(u32);

pub const HEADER_LEN: usize = 9;

impl Head {
    pub fn new(kind: Kind, flag: u8, stream_id: StreamId) -> Head {
        Head {
            kind,
            flag,
            stream_id,
        }
    }

    /// Parses the 9-byte frame header. `len` is the big-endian 24-bit
    /// payload length that follows; the caller (the transport adapter) is
    /// responsible for reading exactly that many more bytes before calling
    /// this again.
    pub fn parse(header: &[u8; HEADER_LEN]) -> (Head, usize) {
        let len = (u32::from(header[0]) << 16) | (u32::from(header[1]) << 8) | u32::from(header[2]);
        let kind = Kind::from(header[3]);
        let flag = header[4];
        let stream_id = StreamId::parse(&header[5..9]);

        (
            Head {
                kind,
                flag,
                stream_id,
            },
            len as usize,
        )
    }

    pub fn encode(&self, payload_len: usize, dst: &mut Vec<u8>) {
        debug_assert!(payload_len <= 0xFF_FFFF, "frame payload too large");
        dst.push((payload_len >> 16) as u8);
        dst.push((payload_len >> 8) as u8);
        dst.push(payload_len as u8);
        dst.push(self.kind.encode_byte());
        dst.push(self.flag);
        self.stream_id.encode(dst);
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn flag(&self) -> u8 {
        self.flag
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }
}

impl Kind {
    fn encode_byte(self) -> u8 {
        match self {
            Kind::Data => 0,
            Kind::Headers => 1,
            Kind::Priority => 2,
            Kind::Reset => 3,
            Kind::Settings => 4,
            Kind::PushPromise => 5,
            Kind::Ping => 6,
            Kind::GoAway => 7,
            Kind::WindowUpdate => 8,
            Kind::Continuation => 9,
            Kind::Unknown(b) => b,
        }
    }
}

impl From<u8> for Kind {
    fn from(byte: u8) -> Kind {
        match byte {
            0 => Kind::Data,
            1 => Kind::Headers,
            2 => Kind::Priority,
            3 => Kind::Reset,
            4 => Kind::Settings,
            5 => Kind::PushPromise,
            6 => Kind::Ping,
            7 => Kind::GoAway,
            8 => Kind::WindowUpdate,
            9 => Kind::Continuation,
            other => Kind::Unknown(other),
        }
    }
}

impl StreamId {
    pub const ZERO: StreamId = StreamId(0);

    fn parse(buf: &[u8]) -> StreamId {
        // Top bit is reserved and must be ignored on receipt.
        let id = (u32::from(buf[0]) << 24 | u32::from(buf[1]) << 16 | u32::from(buf[2]) << 8 | u32::from(buf[3]))
            & !(1 << 31);
        StreamId(id)
    }

    fn encode(self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(&self.0.to_be_bytes());
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// True for stream ids a client is allowed to initiate (odd, nonzero).
    pub fn is_client_initiated(self) -> bool {
        self.0 != 0 && self.0 % 2 == 1
    }

    /// True for stream ids a server is allowed to initiate (even, nonzero).
    pub fn is_server_initiated(self) -> bool {
        self.0 != 0 && self.0 % 2 == 0
    }

    pub fn next(self) -> StreamId {
        StreamId(self.0 + 2)
    }
}

impl From<u32> for StreamId {
    fn from(v: u32) -> StreamId {
        StreamId(v)
    }
}

impl From<StreamId> for u32 {
    fn from(v: StreamId) -> u32 {
        v.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
