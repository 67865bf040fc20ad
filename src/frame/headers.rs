use bytes::Bytes;
use http::{Method, StatusCode};

use crate::frame::head::{Head, Kind, StreamId};
use crate::hpack::{Decoder, Encoder};

const END_STREAM: u8 = 0x1;
const END_HEADERS: u8 = 0x4;

/// The pseudo-headers carried by a `HEADERS` frame. Requests set
/// `method`/`scheme`/`authority`/`path`; responses set `status`. Emitted (and
/// parsed) in the fixed order the gRPC-over-HTTP/2 mapping requires.
#[derive(Debug, Clone, Default)]
pub struct Pseudo {
    pub method: Option<Method>,
    pub scheme: Option<String>,
    pub authority: Option<String>,
    pub path: Option<String>,
    pub status: Option<StatusCode>,
}

impl Pseudo {
    pub fn request(method: Method, scheme: &str, authority: &str, path: &str) -> Pseudo {
        Pseudo {
            method: Some(method),
            scheme: Some(scheme.to_owned()),
            authority: Some(authority.to_owned()),
            path: Some(path.to_owned()),
            status: None,
        }
    }

    pub fn response(status: StatusCode) -> Pseudo {
        Pseudo {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// A `HEADERS` frame: either initial metadata (request or response) or, with
/// `END_STREAM` set and no prior `HEADERS`, a trailers-only response, or,
/// following a body, the final trailers (`grpc-status` et al.).
#[derive(Debug)]
pub struct Headers {
    stream_id: StreamId,
    pseudo: Pseudo,
    /// Header fields in wire order, duplicates preserved. Converted to a
    /// `MetadataMap` by the gRPC framing layer (C3); kept as raw pairs here
    /// because HPACK itself has no notion of metadata semantics.
    fields: Vec<(String, Bytes)>,
    flags: u8,
}

impl Headers {
    pub fn new(stream_id: StreamId, pseudo: Pseudo, fields: Vec<(String, Bytes)>) -> Headers {
        Headers {
            stream_id,
            pseudo,
            fields,
            flags: END_HEADERS,
        }
    }

    pub fn set_end_stream(&mut self) {
        self.flags |= END_STREAM;
    }

    pub fn is_end_stream(&self) -> bool {
        self.flags & END_STREAM == END_STREAM
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn pseudo(&self) -> &Pseudo {
        &self.pseudo
    }

    pub fn fields(&self) -> &[(String, Bytes)] {
        &self.fields
    }

    pub fn into_parts(self) -> (Pseudo, Vec<(String, Bytes)>) {
        (self.pseudo, self.fields)
    }

    /// Encodes the header block (pseudo-headers first, in fixed order, then
    /// regular fields) and writes the framed `HEADERS` frame. gRPC header
    /// blocks are always small enough to fit in one frame (no
    /// `CONTINUATION`) because metadata is not expected to approach
    /// `max_frame_size`; a block that would not fit is rejected by the
    /// caller before this point.
    pub fn encode(&self, enc: &mut Encoder, dst: &mut Vec<u8>) {
        let mut block = Vec::new();

        if let Some(ref method) = self.pseudo.method {
            enc.encode_field(":method", method.as_str().as_bytes(), &mut block);
        }
        if let Some(ref scheme) = self.pseudo.scheme {
            enc.encode_field(":scheme", scheme.as_bytes(), &mut block);
        }
        if let Some(ref path) = self.pseudo.path {
            enc.encode_field(":path", path.as_bytes(), &mut block);
        }
        if let Some(ref authority) = self.pseudo.authority {
            enc.encode_field(":authority", authority.as_bytes(), &mut block);
        }
        if let Some(status) = self.pseudo.status {
            enc.encode_field(":status", status.as_str().as_bytes(), &mut block);
        }

        for (name, value) in &self.fields {
            enc.encode_field(name, value, &mut block);
        }

        let head = Head::new(Kind::Headers, self.flags, self.stream_id);
        head.encode(block.len(), dst);
        dst.extend_from_slice(&block);
    }

    /// Decodes a complete (already `CONTINUATION`-reassembled) header block.
    pub fn load(head: Head, block: &[u8], dec: &mut Decoder) -> Result<Headers, super::Error> {
        let decoded = dec.decode(block).map_err(|_| super::Error::Hpack)?;

        let mut pseudo = Pseudo::default();
        let mut fields = Vec::with_capacity(decoded.len());

        for (name, value) in decoded {
            let name = String::from_utf8(name).map_err(|_| super::Error::MalformedHeader)?;
            if let Some(pseudo_name) = name.strip_prefix(':') {
                let value = String::from_utf8(value.clone()).unwrap_or_default();
                match pseudo_name {
                    "method" => pseudo.method = value.parse().ok(),
                    "scheme" => pseudo.scheme = Some(value),
                    "authority" => pseudo.authority = Some(value),
                    "path" => pseudo.path = Some(value),
                    "status" => pseudo.status = value.parse().ok(),
                    _ => return Err(super::Error::MalformedHeader),
                }
            } else {
                fields.push((name, Bytes::from(value)));
            }
        }

        Ok(Headers {
            stream_id: head.stream_id(),
            pseudo,
            fields,
            flags: head.flag(),
        })
    }
}
