//! HPACK header compression (RFC 7541).
//!
//! Decoding is delegated to the `hpack` crate, which maintains the dynamic
//! table required for correctness against an arbitrary peer encoder. Our own
//! encoder only ever emits static-table references or "literal header field
//! without indexing" representations — it never grows a dynamic table of its
//! own. This keeps encoder state at zero extra memory and sidesteps having to
//! keep two independent dynamic tables (ours and the peer's decoder) in sync,
//! at the cost of worse compression than a full HPACK encoder. The decoder
//! side still has to understand a peer that *does* use indexing, which is why
//! it is not similarly simplified.

use std::fmt;

/// A decoded header field: raw name and value bytes, order preserved exactly
/// as produced by the peer's encoder.
pub type HeaderField = (Vec<u8>, Vec<u8>);

pub struct Decoder {
    inner: hpack::Decoder<'static>,
}

#[derive(Debug)]
pub struct DecoderError(hpack::decoder::DecoderError);

impl fmt::Display for DecoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HPACK decode error: {:?}", self.0)
    }
}

impl std::error::Error for DecoderError {}

impl Decoder {
    pub fn new(max_table_size: usize) -> Decoder {
        let mut inner = hpack::Decoder::new();
        inner.set_max_table_size(max_table_size);
        Decoder { inner }
    }

    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<HeaderField>, DecoderError> {
        self.inner.decode(block).map_err(DecoderError)
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder").finish()
    }
}

/// RFC 7541 Appendix A, the 61-entry static table. Index 0 is unused (HPACK
/// indices are 1-based); `STATIC_TABLE[0]` is a placeholder so the array can
/// be indexed directly by the wire index.
const STATIC_TABLE: [(&str, &str); 62] = [
    ("", ""),
    (":authority", ""),
    (":method", "GET"),
    (":method", "POST"),
    (":path", "/"),
    (":path", "/index.html"),
    (":scheme", "http"),
    (":scheme", "https"),
    (":status", "200"),
    (":status", "204"),
    (":status", "206"),
    (":status", "304"),
    (":status", "400"),
    (":status", "404"),
    (":status", "500"),
    ("accept-charset", ""),
    ("accept-encoding", "gzip, deflate"),
    ("accept-language", ""),
    ("accept-ranges", ""),
    ("accept", ""),
    ("access-control-allow-origin", ""),
    ("age", ""),
    ("allow", ""),
    ("authorization", ""),
    ("cache-control", ""),
    ("content-disposition", ""),
    ("content-encoding", ""),
    ("content-language", ""),
    ("content-length", ""),
    ("content-location", ""),
    ("content-range", ""),
    ("content-type", ""),
    ("cookie", ""),
    ("date", ""),
    ("etag", ""),
    ("expect", ""),
    ("expires", ""),
    ("from", ""),
    ("host", ""),
    ("if-match", ""),
    ("if-modified-since", ""),
    ("if-none-match", ""),
    ("if-range", ""),
    ("if-unmodified-since", ""),
    ("last-modified", ""),
    ("link", ""),
    ("location", ""),
    ("max-forwards", ""),
    ("proxy-authenticate", ""),
    ("proxy-authorization", ""),
    ("range", ""),
    ("referer", ""),
    ("refresh", ""),
    ("retry-after", ""),
    ("server", ""),
    ("set-cookie", ""),
    ("strict-transport-security", ""),
    ("transfer-encoding", ""),
    ("user-agent", ""),
    ("vary", ""),
    ("via", ""),
    ("www-authenticate", ""),
];

fn static_index_for(name: &str, value: &str) -> Option<usize> {
    STATIC_TABLE
        .iter()
        .position(|&(n, v)| n == name && v == value)
}

fn static_index_for_name(name: &str) -> Option<usize> {
    STATIC_TABLE.iter().position(|&(n, _)| n == name)
}

/// Encodes one integer using HPACK's prefix-integer representation (RFC
/// 7541 §5.1), with `prefix_bits` bits of the first byte reserved for the
/// representation-kind flags the caller already wrote into `first_byte`.
fn encode_int(mut value: usize, prefix_bits: u8, first_byte: u8, dst: &mut Vec<u8>) {
    let max_prefix = (1usize << prefix_bits) - 1;
    if value < max_prefix {
        dst.push(first_byte | value as u8);
        return;
    }

    dst.push(first_byte | max_prefix as u8);
    value -= max_prefix;
    while value >= 128 {
        dst.push(((value % 128) | 128) as u8);
        value /= 128;
    }
    dst.push(value as u8);
}

fn encode_string(s: &[u8], dst: &mut Vec<u8>) {
    // Never huffman-encode: simplest correct representation, and avoids
    // carrying a huffman codec solely for the encode path.
    encode_int(s.len(), 7, 0x00, dst);
    dst.extend_from_slice(s);
}

/// A minimal HPACK encoder: static-table indexed names where possible,
/// otherwise literal-without-indexing. Never grows a dynamic table.
#[derive(Debug, Default)]
pub struct Encoder;

impl Encoder {
    pub fn new() -> Encoder {
        Encoder
    }

    /// Appends the HPACK representation of one header field to `dst`.
    pub fn encode_field(&mut self, name: &str, value: &[u8], dst: &mut Vec<u8>) {
        if let Ok(value_str) = std::str::from_utf8(value) {
            if let Some(idx) = static_index_for(name, value_str) {
                // Indexed Header Field (RFC 7541 §6.1): 1xxxxxxx
                encode_int(idx, 7, 0x80, dst);
                return;
            }
        }

        if let Some(idx) = static_index_for_name(name) {
            // Literal Header Field without Indexing, indexed name (§6.2.2):
            // 0000xxxx
            encode_int(idx, 4, 0x00, dst);
        } else {
            // Literal Header Field without Indexing, new name: 00000000
            dst.push(0x00);
            encode_string(name.as_bytes(), dst);
        }
        encode_string(value, dst);
    }

    pub fn encode<'a, I>(&mut self, fields: I) -> Vec<u8>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut dst = Vec::new();
        for (name, value) in fields {
            self.encode_field(name, value, &mut dst);
        }
        dst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_pseudo_headers_via_static_table() {
        let mut enc = Encoder::new();
        let out = enc.encode(vec![(":method", b"POST".as_ref()), (":scheme", b"https".as_ref())]);
        // Both are exact static-table hits: one byte each, top bit set.
        assert_eq!(out.len(), 2);
        assert_eq!(out[0] & 0x80, 0x80);
        assert_eq!(out[1] & 0x80, 0x80);
    }

    #[test]
    fn round_trips_through_real_decoder() {
        let mut enc = Encoder::new();
        let block = enc.encode(vec![
            (":method", b"POST".as_ref()),
            (":path", b"/echo.Echo/Say".as_ref()),
            ("grpc-timeout", b"100m".as_ref()),
            ("x-custom-bin", b"\x01\x02\x03".as_ref()),
        ]);

        let mut dec = Decoder::new(4096);
        let fields = dec.decode(&block).expect("decode");
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].0, b":method");
        assert_eq!(fields[0].1, b"POST");
        assert_eq!(fields[1].1, b"/echo.Echo/Say");
        assert_eq!(fields[2].0, b"grpc-timeout");
        assert_eq!(fields[3].1, b"\x01\x02\x03");
    }
}
