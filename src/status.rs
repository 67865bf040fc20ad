//! The gRPC status model (C3/C4 support): the canonical code enumeration,
//! the `Status` error value carried in trailers, and the HTTP-status
//! fallback mapping used when a peer fails before emitting any gRPC
//! metadata at all (a proxy returning 502, say).

use std::fmt;

use crate::metadata::MetadataMap;

/// The canonical gRPC status codes (https://grpc.io/docs/guides/status-codes/).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Code {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    pub fn from_i32(v: i32) -> Code {
        match v {
            0 => Code::Ok,
            1 => Code::Cancelled,
            2 => Code::Unknown,
            3 => Code::InvalidArgument,
            4 => Code::DeadlineExceeded,
            5 => Code::NotFound,
            6 => Code::AlreadyExists,
            7 => Code::PermissionDenied,
            8 => Code::ResourceExhausted,
            9 => Code::FailedPrecondition,
            10 => Code::Aborted,
            11 => Code::OutOfRange,
            12 => Code::Unimplemented,
            13 => Code::Internal,
            14 => Code::Unavailable,
            15 => Code::DataLoss,
            16 => Code::Unauthenticated,
            _ => Code::Unknown,
        }
    }

    /// Maps an HTTP response `:status` observed without any `grpc-status`
    /// trailer — e.g. a load balancer or proxy rejecting the request before
    /// it reaches a gRPC server — onto the nearest gRPC code.
    pub fn from_http(status: http::StatusCode) -> Code {
        match status.as_u16() {
            401 => Code::Unauthenticated,
            403 => Code::PermissionDenied,
            404 => Code::Unimplemented,
            429 => Code::Unavailable,
            502 | 503 | 504 => Code::Unavailable,
            200 => Code::Ok,
            _ => Code::Unknown,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A terminal RPC outcome: the `grpc-status` (and, unless OK, `grpc-message`)
/// trailer pair, plus whatever trailing metadata accompanied it. Returned by
/// `Call::recv_trailers` and carried inside [`crate::error::Error::Status`].
#[derive(Debug, Clone)]
pub struct Status {
    code: Code,
    message: String,
    metadata: MetadataMap,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Status {
        Status {
            code,
            message: message.into(),
            metadata: MetadataMap::new(),
        }
    }

    pub fn ok() -> Status {
        Status::new(Code::Ok, "")
    }

    pub fn with_metadata(mut self, metadata: MetadataMap) -> Status {
        self.metadata = metadata;
        self
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetadataMap {
        &mut self.metadata
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.code, Code::Ok)
    }

    /// Builds the trailer fields (`grpc-status`, optional `grpc-message`,
    /// plus custom trailing metadata) for the terminating `HEADERS` frame.
    pub fn to_trailer_fields(&self) -> Vec<(String, bytes::Bytes)> {
        let mut fields = self.metadata.to_wire_fields();
        fields.insert(0, ("grpc-status".to_owned(), bytes::Bytes::from((self.code as i32).to_string())));
        if !self.message.is_empty() {
            fields.insert(
                1,
                ("grpc-message".to_owned(), bytes::Bytes::from(percent_encode_message(&self.message))),
            );
        }
        fields
    }

    /// Parses the trailer fields of a response into a `Status`. Absence of
    /// `grpc-status` (a peer that closed the stream without ever sending
    /// one) is itself `UNKNOWN`, per the gRPC HTTP/2 mapping.
    pub fn from_trailer_fields(fields: &[(String, bytes::Bytes)]) -> Status {
        let mut code = Code::Unknown;
        let mut message = String::new();
        let mut metadata = MetadataMap::new();

        for (name, value) in fields {
            match name.as_str() {
                "grpc-status" => {
                    if let Ok(s) = std::str::from_utf8(value) {
                        if let Ok(v) = s.parse::<i32>() {
                            code = Code::from_i32(v);
                        }
                    }
                }
                "grpc-message" => {
                    message = percent_decode_message(value);
                }
                _ => metadata.append_wire_field(name, value.clone()),
            }
        }

        Status::new(code, message).with_metadata(metadata)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Status {}

fn percent_encode_message(msg: &str) -> String {
    percent_encoding::utf8_percent_encode(msg, percent_encoding::NON_ALPHANUMERIC).to_string()
}

fn percent_decode_message(raw: &bytes::Bytes) -> String {
    percent_encoding::percent_decode(raw)
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailer_round_trip() {
        let status = Status::new(Code::NotFound, "no such widget: a/b");
        let fields = status.to_trailer_fields();
        let parsed = Status::from_trailer_fields(&fields);
        assert_eq!(parsed.code(), Code::NotFound);
        assert_eq!(parsed.message(), "no such widget: a/b");
    }

    #[test]
    fn missing_grpc_status_is_unknown() {
        let parsed = Status::from_trailer_fields(&[]);
        assert_eq!(parsed.code(), Code::Unknown);
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(Code::from_http(http::StatusCode::NOT_FOUND), Code::Unimplemented);
        assert_eq!(Code::from_http(http::StatusCode::SERVICE_UNAVAILABLE), Code::Unavailable);
    }
}
