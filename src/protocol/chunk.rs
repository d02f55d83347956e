//! RTMP chunk stream codec
//!
//! RTMP messages are split into chunks for multiplexing. Each chunk has a
//! header that identifies the chunk stream and message being sent.
//!
//! ```text
//! Chunk Format:
//! +-------------+-----------------+-------------------+
//! | Basic Header| Message Header  | Chunk Data        |
//! | (1-3 bytes) | (0,3,7,11 bytes)| (variable)        |
//! +-------------+-----------------+-------------------+
//!
//! Basic Header formats:
//! - 1 byte:  fmt(2) + csid(6)        for csid 2-63
//! - 2 bytes: fmt(2) + 0 + csid(8)    for csid 64-319
//! - 3 bytes: fmt(2) + 1 + csid(16)   for csid 64-65599
//!
//! Message Header formats (based on fmt):
//! - Type 0 (11 bytes): timestamp(3) + length(3) + type(1) + stream_id(4, LE)
//! - Type 1 (7 bytes):  timestamp_delta(3) + length(3) + type(1)
//! - Type 2 (3 bytes):  timestamp_delta(3)
//! - Type 3 (0 bytes):  continuation, or repeat of the previous header
//! ```
//!
//! The extended timestamp (4 bytes) follows the message header whenever the
//! 24-bit field is 0xFFFFFF. The encoder re-emits it after every type-3
//! continuation header of that message; servers in the wild expect the
//! conservative subset.
//!
//! Outbound header compression is deliberately limited: the first chunk of a
//! message is type 0 (new chunk stream, or the message stream id changed) or
//! type 1 (same chunk stream and message stream id, timestamp as delta).
//! Types 2 and 3 are never chosen for a first chunk, but all four are parsed
//! inbound.
//!
//! Reference: RTMP Specification Section 5.3

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;

use crate::error::{ProtocolError, Result};
use crate::protocol::constants::*;

/// A complete RTMP message (reassembled from chunks)
#[derive(Debug, Clone)]
pub struct RtmpChunk {
    /// Chunk stream ID (for multiplexing)
    pub csid: u32,
    /// Absolute message timestamp (milliseconds)
    pub timestamp: u32,
    /// Message type ID
    pub message_type: u8,
    /// Message stream ID
    pub stream_id: u32,
    /// Message payload
    pub payload: Bytes,
}

/// Per-chunk-stream header state
#[derive(Debug, Clone, Default)]
struct ChunkStreamState {
    /// Last absolute timestamp
    timestamp: u32,
    /// Last timestamp delta
    timestamp_delta: u32,
    /// Last message length
    message_length: u32,
    /// Last message type
    message_type: u8,
    /// Last message stream ID
    stream_id: u32,
    /// Whether the current message uses the extended timestamp field
    has_extended_timestamp: bool,
    /// Whether any message has been sent/received on this stream yet
    initialized: bool,
    /// Reassembly buffer for the inbound direction
    partial_message: BytesMut,
    /// Expected total length of the message being reassembled
    expected_length: u32,
}

/// Chunk stream decoder
///
/// Handles chunk demultiplexing and message reassembly for the inbound
/// direction. `Set Chunk Size` and `Abort` are applied by the caller via
/// [`ChunkDecoder::set_chunk_size`] and [`ChunkDecoder::abort`].
pub struct ChunkDecoder {
    /// Negotiated incoming chunk size
    chunk_size: u32,
    /// Per-chunk-stream state
    streams: HashMap<u32, ChunkStreamState>,
    /// Maximum message size (sanity limit)
    max_message_size: u32,
}

impl ChunkDecoder {
    /// Create a new decoder with the protocol default chunk size of 128
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            streams: HashMap::new(),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    /// Update the incoming chunk size (on receiving Set Chunk Size)
    pub fn set_chunk_size(&mut self, size: u32) {
        self.chunk_size = size.clamp(1, MAX_CHUNK_SIZE);
    }

    /// Get current chunk size
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Drop a chunk stream's partial message (on receiving Abort)
    pub fn abort(&mut self, csid: u32) {
        if let Some(state) = self.streams.get_mut(&csid) {
            state.partial_message.clear();
            state.expected_length = 0;
        }
    }

    /// Try to decode a complete message from the buffer
    ///
    /// Returns `Ok(Some(message))` when a whole message has been
    /// reassembled, `Ok(None)` if more bytes are needed, or an error on a
    /// protocol violation. Consumes from `buf` only when a full chunk is
    /// available.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RtmpChunk>> {
        if buf.is_empty() {
            return Ok(None);
        }

        let (fmt, csid, basic_len) = match parse_basic_header(buf) {
            Some(v) => v,
            None => return Ok(None),
        };

        let state = self.streams.entry(csid).or_default();
        let continuation = fmt == CHUNK_FMT_3 && !state.partial_message.is_empty();

        let msg_header_len = match fmt {
            0 => 11,
            1 => 7,
            2 => 3,
            3 => 0,
            _ => return Err(ProtocolError::InvalidChunkHeader.into()),
        };

        // Determine whether an extended timestamp field follows the header.
        let needs_extended = if fmt == CHUNK_FMT_3 {
            state.has_extended_timestamp
        } else if buf.len() >= basic_len + 3 {
            let ts_bytes = &buf[basic_len..basic_len + 3];
            let ts =
                ((ts_bytes[0] as u32) << 16) | ((ts_bytes[1] as u32) << 8) | (ts_bytes[2] as u32);
            ts >= EXTENDED_TIMESTAMP_THRESHOLD
        } else {
            return Ok(None);
        };

        let extended_len = if needs_extended { 4 } else { 0 };
        if buf.len() < basic_len + msg_header_len + extended_len {
            return Ok(None);
        }

        // How much payload this chunk carries.
        let expected = if continuation {
            state.expected_length
        } else {
            match fmt {
                0 | 1 => {
                    let len_bytes = &buf[basic_len + 3..basic_len + 6];
                    ((len_bytes[0] as u32) << 16)
                        | ((len_bytes[1] as u32) << 8)
                        | (len_bytes[2] as u32)
                }
                _ => state.message_length,
            }
        };
        if expected > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge {
                size: expected,
                max: self.max_message_size,
            }
            .into());
        }

        let already = state.partial_message.len() as u32;
        let chunk_data_len = (expected - already).min(self.chunk_size) as usize;
        if buf.len() < basic_len + msg_header_len + extended_len + chunk_data_len {
            return Ok(None);
        }

        // The whole chunk is buffered; consume it.
        buf.advance(basic_len);

        if continuation {
            if needs_extended {
                // Repeated extended timestamp, value already known
                buf.advance(4);
            }
        } else {
            let (timestamp_field, message_length, message_type, stream_id) = match fmt {
                0 => {
                    let ts = buf.get_uint(3) as u32;
                    let len = buf.get_uint(3) as u32;
                    let typ = buf.get_u8();
                    let sid = buf.get_u32_le(); // stream ID is little-endian
                    (ts, len, typ, sid)
                }
                1 => {
                    let ts = buf.get_uint(3) as u32;
                    let len = buf.get_uint(3) as u32;
                    let typ = buf.get_u8();
                    (ts, len, typ, state.stream_id)
                }
                2 => {
                    let ts = buf.get_uint(3) as u32;
                    (ts, state.message_length, state.message_type, state.stream_id)
                }
                // fmt 3 starting a new message: repeat previous delta
                _ => (
                    state.timestamp_delta,
                    state.message_length,
                    state.message_type,
                    state.stream_id,
                ),
            };

            let timestamp = if needs_extended {
                state.has_extended_timestamp = true;
                buf.get_u32()
            } else {
                if fmt != CHUNK_FMT_3 {
                    state.has_extended_timestamp = false;
                }
                timestamp_field
            };

            let absolute = if fmt == CHUNK_FMT_0 {
                timestamp
            } else {
                state.timestamp.wrapping_add(timestamp)
            };

            if fmt != CHUNK_FMT_0 {
                state.timestamp_delta = timestamp;
            } else {
                state.timestamp_delta = 0;
            }
            state.timestamp = absolute;
            state.message_length = message_length;
            state.message_type = message_type;
            state.stream_id = stream_id;
            state.initialized = true;
            state.expected_length = message_length;
            state
                .partial_message
                .reserve(message_length.min(self.chunk_size) as usize);
        }

        state.partial_message.put_slice(&buf[..chunk_data_len]);
        buf.advance(chunk_data_len);

        if state.partial_message.len() as u32 >= state.expected_length {
            let payload = state.partial_message.split().freeze();
            state.expected_length = 0;

            Ok(Some(RtmpChunk {
                csid,
                timestamp: state.timestamp,
                message_type: state.message_type,
                stream_id: state.stream_id,
                payload,
            }))
        } else {
            Ok(None)
        }
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a basic header without consuming, returning (fmt, csid, length)
fn parse_basic_header(buf: &[u8]) -> Option<(u8, u32, usize)> {
    if buf.is_empty() {
        return None;
    }

    let first = buf[0];
    let fmt = (first >> 6) & 0x03;
    let csid_low = first & 0x3F;

    match csid_low {
        0 => {
            // 2-byte form: csid = 64 + second byte
            if buf.len() < 2 {
                return None;
            }
            Some((fmt, 64 + buf[1] as u32, 2))
        }
        1 => {
            // 3-byte form: csid = 64 + second + third*256
            if buf.len() < 3 {
                return None;
            }
            Some((fmt, 64 + buf[1] as u32 + (buf[2] as u32) * 256, 3))
        }
        _ => Some((fmt, csid_low as u32, 1)),
    }
}

/// Chunk stream encoder
///
/// Frames complete messages into chunks bounded by the negotiated outgoing
/// chunk size.
pub struct ChunkEncoder {
    /// Negotiated outgoing chunk size
    chunk_size: u32,
    /// Per-chunk-stream state for header compression
    streams: HashMap<u32, ChunkStreamState>,
}

impl ChunkEncoder {
    /// Create a new encoder with the protocol default chunk size of 128
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            streams: HashMap::new(),
        }
    }

    /// Raise the outgoing chunk size (after the Set Chunk Size announcement
    /// has been written to the peer)
    pub fn set_chunk_size(&mut self, size: u32) {
        self.chunk_size = size.clamp(1, MAX_CHUNK_SIZE);
    }

    /// Get current chunk size
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Encode a message into chunks appended to `buf`
    pub fn encode(&mut self, chunk: &RtmpChunk, buf: &mut BytesMut) {
        let csid = chunk.csid;
        let chunk_size = self.chunk_size as usize;
        let state = self.streams.entry(csid).or_default();

        // Type 1 only when this chunk stream already carried a message on the
        // same message stream; otherwise a full type-0 header.
        let fmt = if state.initialized && chunk.stream_id == state.stream_id {
            CHUNK_FMT_1
        } else {
            CHUNK_FMT_0
        };

        let payload_len = chunk.payload.len();
        let delta = chunk.timestamp.wrapping_sub(state.timestamp);
        let header_value = if fmt == CHUNK_FMT_0 { chunk.timestamp } else { delta };
        let needs_extended = header_value >= EXTENDED_TIMESTAMP_THRESHOLD;
        let ts_field = if needs_extended {
            EXTENDED_TIMESTAMP_THRESHOLD
        } else {
            header_value
        };

        state.timestamp = chunk.timestamp;
        state.timestamp_delta = if fmt == CHUNK_FMT_0 { 0 } else { delta };
        state.message_length = payload_len as u32;
        state.message_type = chunk.message_type;
        state.stream_id = chunk.stream_id;
        state.has_extended_timestamp = needs_extended;
        state.initialized = true;

        // First chunk header
        write_basic_header(csid, fmt, buf);
        write_u24(ts_field, buf);
        write_u24(payload_len as u32, buf);
        buf.put_u8(chunk.message_type);
        if fmt == CHUNK_FMT_0 {
            buf.put_u32_le(chunk.stream_id);
        }
        if needs_extended {
            buf.put_u32(header_value);
        }

        let first_piece = payload_len.min(chunk_size);
        buf.put_slice(&chunk.payload[..first_piece]);

        // Type-3 continuations, extended timestamp repeated when in use
        let mut offset = first_piece;
        while offset < payload_len {
            write_basic_header(csid, CHUNK_FMT_3, buf);
            if needs_extended {
                buf.put_u32(header_value);
            }
            let piece = (payload_len - offset).min(chunk_size);
            buf.put_slice(&chunk.payload[offset..offset + piece]);
            offset += piece;
        }
    }
}

impl Default for ChunkEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a basic header in its shortest form
fn write_basic_header(csid: u32, fmt: u8, buf: &mut BytesMut) {
    if csid >= 64 + 256 {
        buf.put_u8((fmt << 6) | 1);
        let offset = csid - 64;
        buf.put_u8((offset & 0xFF) as u8);
        buf.put_u8(((offset >> 8) & 0xFF) as u8);
    } else if csid >= 64 {
        buf.put_u8(fmt << 6);
        buf.put_u8((csid - 64) as u8);
    } else {
        buf.put_u8((fmt << 6) | (csid as u8));
    }
}

/// Write 24-bit big-endian value
fn write_u24(value: u32, buf: &mut BytesMut) {
    buf.put_u8(((value >> 16) & 0xFF) as u8);
    buf.put_u8(((value >> 8) & 0xFF) as u8);
    buf.put_u8((value & 0xFF) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(csid: u32, timestamp: u32, message_type: u8, stream_id: u32, len: usize) -> RtmpChunk {
        RtmpChunk {
            csid,
            timestamp,
            message_type,
            stream_id,
            payload: Bytes::from((0..len).map(|i| (i % 256) as u8).collect::<Vec<u8>>()),
        }
    }

    #[test]
    fn test_basic_header_parsing() {
        // 1-byte form (csid 2-63)
        assert_eq!(parse_basic_header(&[0x03]), Some((0, 3, 1)));
        // 2-byte form (csid 64-319)
        assert_eq!(parse_basic_header(&[0x00, 0x00]), Some((0, 64, 2)));
        // 3-byte form (csid 320-65599)
        assert_eq!(parse_basic_header(&[0x01, 0x00, 0x01]), Some((0, 320, 3)));
        // Incomplete extended forms need more bytes
        assert_eq!(parse_basic_header(&[0x00]), None);
        assert_eq!(parse_basic_header(&[0x01, 0x00]), None);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let original = message(CSID_COMMAND, 1000, MSG_COMMAND_AMF0, 0, 17);

        let mut encoder = ChunkEncoder::new();
        let mut decoder = ChunkDecoder::new();

        let mut encoded = BytesMut::new();
        encoder.encode(&original, &mut encoded);

        let decoded = decoder.decode(&mut encoded).unwrap().unwrap();
        assert_eq!(decoded.csid, original.csid);
        assert_eq!(decoded.timestamp, original.timestamp);
        assert_eq!(decoded.message_type, original.message_type);
        assert_eq!(decoded.stream_id, original.stream_id);
        assert_eq!(decoded.payload, original.payload);
        assert!(encoded.is_empty());
    }

    #[test]
    fn test_chunk_count_is_ceil_len_over_size() {
        // 300-byte payload at chunk size 128: type-0 header + 128, then two
        // type-3 chunks of 128 and 44 bytes.
        let msg = message(CSID_COMMAND, 0, MSG_COMMAND_AMF0, 0, 300);
        let mut encoder = ChunkEncoder::new();
        let mut out = BytesMut::new();
        encoder.encode(&msg, &mut out);

        // fmt 0, csid 3
        assert_eq!(out[0], 0x03);
        // message length field
        assert_eq!(&out[4..7], &[0x00, 0x01, 0x2C]);
        // stream id little-endian
        assert_eq!(&out[8..12], &[0, 0, 0, 0]);

        // continuation headers at computed offsets
        assert_eq!(out[12 + 128], 0xC3);
        assert_eq!(out[12 + 128 + 1 + 128], 0xC3);
        assert_eq!(out.len(), 12 + 128 + 1 + 128 + 1 + 44);

        // decoder reassembles the same message
        let mut decoder = ChunkDecoder::new();
        let decoded = decoder.decode(&mut out).unwrap().unwrap();
        assert_eq!(decoded.payload.len(), 300);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail_chunk() {
        let msg = message(CSID_VIDEO, 0, MSG_VIDEO, 1, 256);
        let mut encoder = ChunkEncoder::new();
        let mut out = BytesMut::new();
        encoder.encode(&msg, &mut out);
        // 12-byte header + 128 + 1-byte type-3 header + 128, nothing after
        assert_eq!(out.len(), 12 + 128 + 1 + 128);
    }

    #[test]
    fn test_second_message_uses_type1_with_delta() {
        let mut encoder = ChunkEncoder::new();
        let mut out = BytesMut::new();

        encoder.encode(&message(CSID_VIDEO, 1000, MSG_VIDEO, 1, 10), &mut out);
        out.clear();
        encoder.encode(&message(CSID_VIDEO, 1040, MSG_VIDEO, 1, 10), &mut out);

        // fmt 1, csid 6
        assert_eq!(out[0], 0x46);
        // 24-bit delta of 40
        assert_eq!(&out[1..4], &[0x00, 0x00, 0x28]);
        // 7-byte header, no stream id field
        assert_eq!(out.len(), 1 + 7 + 10);

        // decoder applies the delta to the previous absolute timestamp
        let mut decoder = ChunkDecoder::new();
        let mut stream = BytesMut::new();
        encoder = ChunkEncoder::new();
        encoder.encode(&message(CSID_VIDEO, 1000, MSG_VIDEO, 1, 10), &mut stream);
        encoder.encode(&message(CSID_VIDEO, 1040, MSG_VIDEO, 1, 10), &mut stream);
        let first = decoder.decode(&mut stream).unwrap().unwrap();
        let second = decoder.decode(&mut stream).unwrap().unwrap();
        assert_eq!(first.timestamp, 1000);
        assert_eq!(second.timestamp, 1040);
    }

    #[test]
    fn test_stream_id_change_forces_type0() {
        let mut encoder = ChunkEncoder::new();
        let mut out = BytesMut::new();

        encoder.encode(&message(CSID_STREAM, 0, MSG_COMMAND_AMF0, 0, 5), &mut out);
        out.clear();
        encoder.encode(&message(CSID_STREAM, 10, MSG_COMMAND_AMF0, 1, 5), &mut out);

        // fmt 0 again because the message stream id changed
        assert_eq!(out[0], 0x04);
        assert_eq!(out.len(), 1 + 11 + 5);
    }

    #[test]
    fn test_extended_timestamp_on_type0() {
        // Timestamp 0x1000000 must write FF FF FF plus a 4-byte extension.
        let msg = message(CSID_VIDEO, 0x0100_0000, MSG_VIDEO, 1, 8);
        let mut encoder = ChunkEncoder::new();
        let mut out = BytesMut::new();
        encoder.encode(&msg, &mut out);

        assert_eq!(&out[1..4], &[0xFF, 0xFF, 0xFF]);
        assert_eq!(&out[12..16], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(out.len(), 12 + 4 + 8);

        let mut decoder = ChunkDecoder::new();
        let decoded = decoder.decode(&mut out).unwrap().unwrap();
        assert_eq!(decoded.timestamp, 0x0100_0000);
    }

    #[test]
    fn test_threshold_timestamp_triggers_extension() {
        // Exactly 0xFFFFFF is the first value that needs the extension.
        let msg = message(CSID_VIDEO, 0x00FF_FFFF, MSG_VIDEO, 1, 4);
        let mut encoder = ChunkEncoder::new();
        let mut out = BytesMut::new();
        encoder.encode(&msg, &mut out);

        assert_eq!(&out[1..4], &[0xFF, 0xFF, 0xFF]);
        assert_eq!(&out[12..16], &[0x00, 0xFF, 0xFF, 0xFF]);

        let mut decoder = ChunkDecoder::new();
        let decoded = decoder.decode(&mut out).unwrap().unwrap();
        assert_eq!(decoded.timestamp, 0x00FF_FFFF);
    }

    #[test]
    fn test_extended_timestamp_repeated_on_continuation() {
        let msg = message(CSID_VIDEO, 0x0100_0000, MSG_VIDEO, 1, 200);
        let mut encoder = ChunkEncoder::new();
        let mut out = BytesMut::new();
        encoder.encode(&msg, &mut out);

        // first chunk: 12-byte header + 4-byte ext + 128 payload
        let cont = 12 + 4 + 128;
        assert_eq!(out[cont], 0xC6);
        assert_eq!(&out[cont + 1..cont + 5], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(out.len(), cont + 1 + 4 + 72);

        let mut decoder = ChunkDecoder::new();
        let decoded = decoder.decode(&mut out).unwrap().unwrap();
        assert_eq!(decoded.timestamp, 0x0100_0000);
        assert_eq!(decoded.payload.len(), 200);
    }

    #[test]
    fn test_two_byte_basic_header_for_csid_64() {
        let msg = message(64, 0, MSG_VIDEO, 1, 4);
        let mut encoder = ChunkEncoder::new();
        let mut out = BytesMut::new();
        encoder.encode(&msg, &mut out);

        assert_eq!(out[0], 0x00);
        assert_eq!(out[1], 0x00);

        let mut decoder = ChunkDecoder::new();
        let decoded = decoder.decode(&mut out).unwrap().unwrap();
        assert_eq!(decoded.csid, 64);
    }

    #[test]
    fn test_interleaved_chunk_streams() {
        // Two messages on different chunk streams, arriving interleaved.
        let audio = message(CSID_AUDIO, 10, MSG_AUDIO, 1, 100);
        let video = message(CSID_VIDEO, 20, MSG_VIDEO, 1, 100);

        let mut encoder = ChunkEncoder::new();
        let mut wire = BytesMut::new();
        encoder.encode(&audio, &mut wire);
        encoder.encode(&video, &mut wire);

        let mut decoder = ChunkDecoder::new();
        let first = decoder.decode(&mut wire).unwrap().unwrap();
        let second = decoder.decode(&mut wire).unwrap().unwrap();
        assert_eq!(first.csid, CSID_AUDIO);
        assert_eq!(second.csid, CSID_VIDEO);
        assert_eq!(first.payload.len(), 100);
        assert_eq!(second.payload.len(), 100);
    }

    #[test]
    fn test_incremental_feed() {
        let msg = message(CSID_COMMAND, 5, MSG_COMMAND_AMF0, 0, 300);
        let mut encoder = ChunkEncoder::new();
        let mut wire = BytesMut::new();
        encoder.encode(&msg, &mut wire);

        // Feed one byte at a time; the decoder must never consume a partial
        // chunk and must produce the message exactly once.
        let mut decoder = ChunkDecoder::new();
        let mut buf = BytesMut::new();
        let mut result = None;
        for byte in wire.iter() {
            buf.put_u8(*byte);
            if let Some(m) = decoder.decode(&mut buf).unwrap() {
                assert!(result.is_none());
                result = Some(m);
            }
        }
        assert_eq!(result.unwrap().payload.len(), 300);
    }

    #[test]
    fn test_message_sequence_roundtrip() {
        // A sequence of messages over several chunk streams parses back with
        // identical fields, in order.
        let sequence = vec![
            message(CSID_COMMAND, 0, MSG_COMMAND_AMF0, 0, 180),
            message(CSID_AUDIO, 23, MSG_AUDIO, 1, 320),
            message(CSID_VIDEO, 33, MSG_VIDEO, 1, 2048),
            message(CSID_AUDIO, 46, MSG_AUDIO, 1, 320),
            message(CSID_VIDEO, 66, MSG_VIDEO, 1, 700),
        ];

        let mut encoder = ChunkEncoder::new();
        let mut wire = BytesMut::new();
        for msg in &sequence {
            encoder.encode(msg, &mut wire);
        }

        let mut decoder = ChunkDecoder::new();
        let mut decoded = Vec::new();
        while let Some(m) = decoder.decode(&mut wire).unwrap() {
            decoded.push(m);
        }

        assert_eq!(decoded.len(), sequence.len());
        for (got, want) in decoded.iter().zip(&sequence) {
            assert_eq!(got.csid, want.csid);
            assert_eq!(got.timestamp, want.timestamp);
            assert_eq!(got.message_type, want.message_type);
            assert_eq!(got.stream_id, want.stream_id);
            assert_eq!(got.payload, want.payload);
        }
    }

    #[test]
    fn test_abort_drops_partial_message() {
        let msg = message(CSID_VIDEO, 0, MSG_VIDEO, 1, 300);
        let mut encoder = ChunkEncoder::new();
        let mut wire = BytesMut::new();
        encoder.encode(&msg, &mut wire);

        let mut decoder = ChunkDecoder::new();
        // Feed only the first chunk (12-byte header + 128 payload)
        let mut partial = wire.split_to(12 + 128);
        assert!(decoder.decode(&mut partial).unwrap().is_none());

        decoder.abort(CSID_VIDEO);

        // A fresh complete message decodes normally afterwards
        let fresh = message(CSID_VIDEO, 50, MSG_VIDEO, 1, 16);
        let mut encoder2 = ChunkEncoder::new();
        let mut wire2 = BytesMut::new();
        encoder2.encode(&fresh, &mut wire2);
        let decoded = decoder.decode(&mut wire2).unwrap().unwrap();
        assert_eq!(decoded.payload.len(), 16);
    }

    #[test]
    fn test_decoder_honors_peer_chunk_size() {
        // Peer announces 256 and then sends a 300-byte message in two chunks.
        let msg = message(CSID_COMMAND, 0, MSG_COMMAND_AMF0, 0, 300);
        let mut encoder = ChunkEncoder::new();
        encoder.set_chunk_size(256);
        let mut wire = BytesMut::new();
        encoder.encode(&msg, &mut wire);
        assert_eq!(wire.len(), 12 + 256 + 1 + 44);

        let mut decoder = ChunkDecoder::new();
        decoder.set_chunk_size(256);
        let decoded = decoder.decode(&mut wire).unwrap().unwrap();
        assert_eq!(decoded.payload.len(), 300);
    }
}
