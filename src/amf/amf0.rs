//! AMF0 encoder and decoder
//!
//! AMF0 is the original Action Message Format used in Flash/RTMP.
//! Reference: AMF0 File Format Specification (amf0-file-format-specification.pdf)
//!
//! Type Markers:
//! ```text
//! 0x00 - Number (IEEE 754 double)
//! 0x01 - Boolean
//! 0x02 - String (UTF-8, 16-bit length prefix)
//! 0x03 - Object (key-value pairs until 0x000009)
//! 0x05 - Null
//! 0x06 - Undefined
//! 0x08 - ECMA Array (associative array)
//! 0x09 - Object End (0x000009 sequence)
//! 0x0C - Long String (UTF-8, 32-bit length prefix)
//! ```
//!
//! Everything else in the AMF0 marker space is outside what a publishing
//! session exchanges and is rejected with `AmfError::UnsupportedMarker`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::value::AmfValue;
use crate::error::AmfError;

// AMF0 type markers
const MARKER_NUMBER: u8 = 0x00;
const MARKER_BOOLEAN: u8 = 0x01;
const MARKER_STRING: u8 = 0x02;
const MARKER_OBJECT: u8 = 0x03;
const MARKER_NULL: u8 = 0x05;
const MARKER_UNDEFINED: u8 = 0x06;
const MARKER_ECMA_ARRAY: u8 = 0x08;
const MARKER_OBJECT_END: u8 = 0x09;
const MARKER_LONG_STRING: u8 = 0x0C;

/// Maximum nesting depth for objects/arrays (prevent stack overflow)
const MAX_NESTING_DEPTH: usize = 64;

/// AMF0 decoder
///
/// Strict: unknown markers and truncated input are errors, never panics.
pub struct Amf0Decoder {
    depth: usize,
}

impl Amf0Decoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self { depth: 0 }
    }

    /// Decode a single AMF0 value from the buffer
    pub fn decode(&mut self, buf: &mut Bytes) -> Result<AmfValue, AmfError> {
        if buf.is_empty() {
            return Err(AmfError::Truncated);
        }

        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.depth -= 1;
            return Err(AmfError::NestingTooDeep);
        }

        let marker = buf.get_u8();
        let result = self.decode_value(marker, buf);
        self.depth -= 1;
        result
    }

    /// Decode all values from buffer until exhausted
    pub fn decode_all(&mut self, buf: &mut Bytes) -> Result<Vec<AmfValue>, AmfError> {
        let mut values = Vec::new();
        while buf.has_remaining() {
            values.push(self.decode(buf)?);
        }
        Ok(values)
    }

    fn decode_value(&mut self, marker: u8, buf: &mut Bytes) -> Result<AmfValue, AmfError> {
        match marker {
            MARKER_NUMBER => self.decode_number(buf),
            MARKER_BOOLEAN => self.decode_boolean(buf),
            MARKER_STRING => Ok(AmfValue::String(read_utf8(buf)?)),
            MARKER_OBJECT => self.decode_object(buf).map(AmfValue::Object),
            MARKER_NULL => Ok(AmfValue::Null),
            MARKER_UNDEFINED => Ok(AmfValue::Undefined),
            MARKER_ECMA_ARRAY => self.decode_ecma_array(buf),
            MARKER_LONG_STRING => Ok(AmfValue::String(read_utf8_long(buf)?)),
            _ => Err(AmfError::UnsupportedMarker(marker)),
        }
    }

    fn decode_number(&mut self, buf: &mut Bytes) -> Result<AmfValue, AmfError> {
        if buf.remaining() < 8 {
            return Err(AmfError::Truncated);
        }
        Ok(AmfValue::Number(buf.get_f64()))
    }

    fn decode_boolean(&mut self, buf: &mut Bytes) -> Result<AmfValue, AmfError> {
        if buf.is_empty() {
            return Err(AmfError::Truncated);
        }
        Ok(AmfValue::Boolean(buf.get_u8() != 0))
    }

    fn decode_object(&mut self, buf: &mut Bytes) -> Result<Vec<(String, AmfValue)>, AmfError> {
        let mut properties = Vec::new();

        loop {
            let key = read_utf8(buf)?;

            if key.is_empty() {
                if buf.is_empty() {
                    return Err(AmfError::Truncated);
                }
                let end_marker = buf.get_u8();
                if end_marker == MARKER_OBJECT_END {
                    break;
                }
                return Err(AmfError::UnsupportedMarker(end_marker));
            }

            let value = self.decode(buf)?;
            properties.push((key, value));
        }

        Ok(properties)
    }

    fn decode_ecma_array(&mut self, buf: &mut Bytes) -> Result<AmfValue, AmfError> {
        if buf.remaining() < 4 {
            return Err(AmfError::Truncated);
        }

        // Count is a hint only; the pair list still ends with the end marker.
        let _count = buf.get_u32();
        let properties = self.decode_object(buf)?;
        Ok(AmfValue::EcmaArray(properties))
    }
}

impl Default for Amf0Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Read UTF-8 string with 16-bit length prefix
fn read_utf8(buf: &mut Bytes) -> Result<String, AmfError> {
    if buf.remaining() < 2 {
        return Err(AmfError::Truncated);
    }

    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(AmfError::Truncated);
    }

    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8)
}

/// Read UTF-8 string with 32-bit length prefix
fn read_utf8_long(buf: &mut Bytes) -> Result<String, AmfError> {
    if buf.remaining() < 4 {
        return Err(AmfError::Truncated);
    }

    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(AmfError::Truncated);
    }

    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8)
}

/// AMF0 encoder
///
/// Deterministic: the same value tree always yields the same bytes.
pub struct Amf0Encoder {
    buf: BytesMut,
}

impl Amf0Encoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Get the encoded bytes and reset encoder
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Get current encoded length
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if encoder is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a single AMF0 value
    pub fn encode(&mut self, value: &AmfValue) {
        match value {
            AmfValue::Number(n) => {
                self.buf.put_u8(MARKER_NUMBER);
                self.buf.put_f64(*n);
            }
            AmfValue::Boolean(b) => {
                self.buf.put_u8(MARKER_BOOLEAN);
                self.buf.put_u8(if *b { 1 } else { 0 });
            }
            AmfValue::String(s) => {
                if s.len() > 0xFFFF {
                    self.buf.put_u8(MARKER_LONG_STRING);
                    self.buf.put_u32(s.len() as u32);
                } else {
                    self.buf.put_u8(MARKER_STRING);
                    self.buf.put_u16(s.len() as u16);
                }
                self.buf.put_slice(s.as_bytes());
            }
            AmfValue::Object(pairs) => {
                self.buf.put_u8(MARKER_OBJECT);
                self.encode_pairs(pairs);
            }
            AmfValue::Null => {
                self.buf.put_u8(MARKER_NULL);
            }
            AmfValue::Undefined => {
                self.buf.put_u8(MARKER_UNDEFINED);
            }
            AmfValue::EcmaArray(pairs) => {
                self.buf.put_u8(MARKER_ECMA_ARRAY);
                self.buf.put_u32(pairs.len() as u32);
                self.encode_pairs(pairs);
            }
        }
    }

    /// Encode multiple values
    pub fn encode_all(&mut self, values: &[AmfValue]) {
        for value in values {
            self.encode(value);
        }
    }

    fn encode_pairs(&mut self, pairs: &[(String, AmfValue)]) {
        for (key, val) in pairs {
            self.write_utf8(key);
            self.encode(val);
        }
        // Object end marker: empty key + 0x09
        self.buf.put_u16(0);
        self.buf.put_u8(MARKER_OBJECT_END);
    }

    /// Write UTF-8 string with 16-bit length prefix (no type marker)
    fn write_utf8(&mut self, s: &str) {
        let len = s.len().min(0xFFFF);
        self.buf.put_u16(len as u16);
        self.buf.put_slice(&s.as_bytes()[..len]);
    }
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to encode a single value
pub fn encode(value: &AmfValue) -> Bytes {
    let mut encoder = Amf0Encoder::new();
    encoder.encode(value);
    encoder.finish()
}

/// Convenience function to encode multiple values
pub fn encode_all(values: &[AmfValue]) -> Bytes {
    let mut encoder = Amf0Encoder::new();
    encoder.encode_all(values);
    encoder.finish()
}

/// Convenience function to decode a single value
pub fn decode(data: &[u8]) -> Result<AmfValue, AmfError> {
    let mut decoder = Amf0Decoder::new();
    let mut buf = Bytes::copy_from_slice(data);
    decoder.decode(&mut buf)
}

/// Convenience function to decode all values
pub fn decode_all(data: &[u8]) -> Result<Vec<AmfValue>, AmfError> {
    let mut decoder = Amf0Decoder::new();
    let mut buf = Bytes::copy_from_slice(data);
    decoder.decode_all(&mut buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_roundtrip() {
        let value = AmfValue::Number(42.5);
        let encoded = encode(&value);
        assert_eq!(encoded[0], MARKER_NUMBER);
        assert_eq!(decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_string_roundtrip() {
        let value = AmfValue::String("hello world".into());
        let encoded = encode(&value);
        assert_eq!(decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_boolean_roundtrip() {
        for b in [true, false] {
            let value = AmfValue::Boolean(b);
            let encoded = encode(&value);
            assert_eq!(decode(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn test_null_undefined_roundtrip() {
        assert_eq!(decode(&encode(&AmfValue::Null)).unwrap(), AmfValue::Null);
        assert_eq!(
            decode(&encode(&AmfValue::Undefined)).unwrap(),
            AmfValue::Undefined
        );
    }

    #[test]
    fn test_object_roundtrip_preserves_order() {
        let value = AmfValue::object([
            ("name", AmfValue::String("test".into())),
            ("value", AmfValue::Number(123.0)),
            ("flag", AmfValue::Boolean(true)),
        ]);

        let decoded = decode(&encode(&value)).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_ecma_array_roundtrip() {
        let value = AmfValue::EcmaArray(vec![
            ("width".to_string(), AmfValue::Number(320.0)),
            ("height".to_string(), AmfValue::Number(240.0)),
        ]);
        let decoded = decode(&encode(&value)).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_nested_object_roundtrip() {
        let inner = AmfValue::object([("code", AmfValue::String("NetStream.Publish.Start".into()))]);
        let value = AmfValue::object([("info", inner)]);
        assert_eq!(decode(&encode(&value)).unwrap(), value);
    }

    #[test]
    fn test_multiple_values() {
        let values = vec![
            AmfValue::String("connect".into()),
            AmfValue::Number(1.0),
            AmfValue::Null,
        ];

        let encoded = encode_all(&values);
        let decoded = decode_all(&encoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_long_string_marker_at_boundary() {
        // 65535 bytes stays a short string, 65536 switches to the long marker.
        let short = AmfValue::String("x".repeat(65535));
        let encoded = encode(&short);
        assert_eq!(encoded[0], MARKER_STRING);
        assert_eq!(decode(&encoded).unwrap(), short);

        let long = AmfValue::String("x".repeat(65536));
        let encoded = encode(&long);
        assert_eq!(encoded[0], MARKER_LONG_STRING);
        assert_eq!(decode(&encoded).unwrap(), long);
    }

    #[test]
    fn test_unsupported_marker() {
        assert_eq!(decode(&[0x0A]), Err(AmfError::UnsupportedMarker(0x0A)));
        assert_eq!(decode(&[0xFF]), Err(AmfError::UnsupportedMarker(0xFF)));
    }

    #[test]
    fn test_truncation_at_every_offset() {
        // Decoding any prefix of a valid encoding must fail cleanly.
        let value = AmfValue::object([
            ("app", AmfValue::String("live".into())),
            ("capabilities", AmfValue::Number(15.0)),
            ("fpad", AmfValue::Boolean(false)),
            ("extra", AmfValue::EcmaArray(vec![(
                "k".to_string(),
                AmfValue::String("v".into()),
            )])),
        ]);
        let encoded = encode(&value);

        for cut in 0..encoded.len() {
            let result = decode(&encoded[..cut]);
            assert!(result.is_err(), "prefix of {} bytes decoded", cut);
        }
        assert!(decode(&encoded).is_ok());
    }

    #[test]
    fn test_deterministic_encoding() {
        let value = AmfValue::object([
            ("tcUrl", AmfValue::String("rtmp://host/live".into())),
            ("audioCodecs", AmfValue::Number(4071.0)),
        ]);
        assert_eq!(encode(&value), encode(&value));
    }

    #[test]
    fn test_nesting_depth_limit() {
        // 70 nested single-property objects exceeds the depth cap.
        let mut data = Vec::new();
        for _ in 0..70 {
            data.push(MARKER_OBJECT);
            data.extend_from_slice(&[0x00, 0x01, b'k']);
        }
        assert_eq!(decode(&data), Err(AmfError::NestingTooDeep));
    }

    #[test]
    fn test_missing_object_end_is_truncated() {
        // Object with one property, then EOF instead of the end marker.
        let mut data = vec![MARKER_OBJECT];
        data.extend_from_slice(&[0x00, 0x01, b'a']); // key "a"
        data.push(MARKER_NUMBER);
        data.extend_from_slice(&1.0f64.to_be_bytes());
        assert_eq!(decode(&data), Err(AmfError::Truncated));
    }
}
