//! The ordered, duplicate-preserving metadata container (C3/C4 support).
//! gRPC metadata is never a `HashMap`: header names repeat (e.g. multiple
//! `grpc-retry-pushback-ms` style extensions), order can matter to
//! interceptors, and names ending in `-bin` carry arbitrary bytes
//! base64-encoded on the wire rather than UTF-8 text.

use base64::Engine as _;
use bytes::Bytes;

const BIN_SUFFIX: &str = "-bin";
const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD_NO_PAD;

/// One ASCII, lowercase header name. gRPC metadata keys are matched
/// case-insensitively; we normalize to lowercase on construction so lookups
/// never need to re-fold case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataKey(String);

impl MetadataKey {
    pub fn from_str(s: &str) -> Result<MetadataKey, InvalidMetadataKey> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_graphic() && b != b':') {
            return Err(InvalidMetadataKey);
        }
        Ok(MetadataKey(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_binary(&self) -> bool {
        self.0.ends_with(BIN_SUFFIX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidMetadataKey;

impl std::fmt::Display for InvalidMetadataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid metadata key")
    }
}

impl std::error::Error for InvalidMetadataKey {}

/// One metadata value: either ASCII text (the common case) or, for a
/// `-bin` key, raw bytes that are base64-encoded only when they touch the
/// wire.
#[derive(Debug, Clone)]
pub enum MetadataValue {
    Ascii(Bytes),
    Binary(Bytes),
}

impl MetadataValue {
    pub fn from_ascii(s: impl Into<String>) -> MetadataValue {
        MetadataValue::Ascii(Bytes::from(s.into()))
    }

    pub fn from_bytes(b: impl Into<Bytes>) -> MetadataValue {
        MetadataValue::Binary(b.into())
    }

    pub fn as_bytes(&self) -> &Bytes {
        match self {
            MetadataValue::Ascii(b) | MetadataValue::Binary(b) => b,
        }
    }

    pub fn to_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Ascii(b) => std::str::from_utf8(b).ok(),
            MetadataValue::Binary(_) => None,
        }
    }
}

/// An ordered multimap of metadata entries, preserving insertion order and
/// duplicate keys exactly as the gRPC HTTP/2 mapping requires.
#[derive(Debug, Clone, Default)]
pub struct MetadataMap {
    entries: Vec<(MetadataKey, MetadataValue)>,
}

impl MetadataMap {
    pub fn new() -> MetadataMap {
        MetadataMap { entries: Vec::new() }
    }

    pub fn insert(&mut self, key: MetadataKey, value: MetadataValue) {
        self.entries.push((key, value));
    }

    pub fn append(&mut self, name: &str, value: MetadataValue) -> Result<(), InvalidMetadataKey> {
        self.insert(MetadataKey::from_str(name)?, value);
        Ok(())
    }

    /// The first value for `key`, if any. Duplicate entries for repeatable
    /// keys are reached through [`MetadataMap::get_all`].
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        let key = key.to_ascii_lowercase();
        self.entries.iter().find(|(k, _)| k.as_str() == key).map(|(_, v)| v)
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a MetadataValue> + 'a {
        let key = key.to_ascii_lowercase();
        self.entries.iter().filter(move |(k, _)| *k.as_str() == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetadataKey, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reserved header/pseudo-header names that never belong in user
    /// metadata; filtered out when building from the wire header list.
    fn is_reserved(name: &str) -> bool {
        name.starts_with(':')
            || matches!(
                name,
                "content-type" | "te" | "grpc-timeout" | "grpc-status" | "grpc-message" | "grpc-encoding" | "user-agent"
            )
    }

    /// Parses one raw `(name, value)` wire pair into this map, base64
    /// decoding `-bin` values. Malformed base64 is dropped rather than
    /// failing the whole header block — one bad trailer shouldn't corrupt
    /// the rest of the call's metadata.
    pub fn append_wire_field(&mut self, name: &str, value: Bytes) {
        if Self::is_reserved(name) {
            return;
        }
        let key = match MetadataKey::from_str(name) {
            Ok(k) => k,
            Err(_) => return,
        };
        let parsed = if key.is_binary() {
            match B64.decode(&value) {
                Ok(bytes) => MetadataValue::Binary(Bytes::from(bytes)),
                Err(_) => return,
            }
        } else {
            MetadataValue::Ascii(value)
        };
        self.entries.push((key, parsed));
    }

    /// Builds the full set of `(name, value)` field pairs to place on the
    /// wire, base64-encoding `-bin` values (no padding, per the gRPC spec).
    pub fn to_wire_fields(&self) -> Vec<(String, Bytes)> {
        self.entries
            .iter()
            .map(|(k, v)| {
                let wire_value = match v {
                    MetadataValue::Ascii(b) => b.clone(),
                    MetadataValue::Binary(b) => Bytes::from(B64.encode(b)),
                };
                (k.as_str().to_owned(), wire_value)
            })
            .collect()
    }

    /// Builds a map from a decoded `HEADERS` field list, dropping
    /// reserved/pseudo names.
    pub fn from_wire_fields(fields: &[(String, Bytes)]) -> MetadataMap {
        let mut map = MetadataMap::new();
        for (name, value) in fields {
            map.append_wire_field(name, value.clone());
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_duplicates_and_order() {
        let mut md = MetadataMap::new();
        md.append("x-trace", MetadataValue::from_ascii("a")).unwrap();
        md.append("x-trace", MetadataValue::from_ascii("b")).unwrap();
        let all: Vec<_> = md.get_all("x-trace").map(|v| v.to_str().unwrap()).collect();
        assert_eq!(all, vec!["a", "b"]);
    }

    #[test]
    fn binary_values_base64_round_trip() {
        let mut md = MetadataMap::new();
        md.append("trace-bin", MetadataValue::from_bytes(Bytes::from_static(&[0xff, 0x00, 0x10])))
            .unwrap();
        let wire = md.to_wire_fields();
        let parsed = MetadataMap::from_wire_fields(&wire);
        let v = parsed.get("trace-bin").unwrap();
        assert_eq!(v.as_bytes().as_ref(), &[0xff, 0x00, 0x10]);
    }

    #[test]
    fn reserved_headers_are_not_user_metadata() {
        let fields = vec![("content-type".to_owned(), Bytes::from_static(b"application/grpc+proto"))];
        let md = MetadataMap::from_wire_fields(&fields);
        assert!(md.is_empty());
    }
}
