//! RTMP message types and parsing
//!
//! Messages a publishing session exchanges:
//! - Protocol Control Messages (types 1-6): chunk/flow control
//! - Command Messages (type 20): AMF0-encoded commands and their responses
//! - Data Messages (type 18): @setDataFrame metadata
//! - Audio/Video Messages (types 8, 9): media tags
//!
//! Reference: RTMP Specification Section 5.4

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::amf::{Amf0Decoder, Amf0Encoder, AmfValue};
use crate::error::{AmfError, ProtocolError, Result};
use crate::protocol::chunk::RtmpChunk;
use crate::protocol::constants::*;

/// Parsed RTMP message
#[derive(Debug, Clone)]
pub enum RtmpMessage {
    /// Set Chunk Size (type 1)
    SetChunkSize(u32),

    /// Abort Message (type 2)
    Abort { csid: u32 },

    /// Acknowledgement (type 3)
    Acknowledgement { sequence: u32 },

    /// User Control Message (type 4)
    UserControl(UserControlEvent),

    /// Window Acknowledgement Size (type 5)
    WindowAckSize(u32),

    /// Set Peer Bandwidth (type 6)
    SetPeerBandwidth { size: u32, limit_type: u8 },

    /// Audio tag (type 8)
    Audio { timestamp: u32, data: Bytes },

    /// Video tag (type 9)
    Video { timestamp: u32, data: Bytes },

    /// AMF0 Command (type 20)
    Command(Command),

    /// AMF0 Data message (type 18)
    Data(DataMessage),

    /// Message type the publisher does not interpret
    Unknown { type_id: u8, data: Bytes },
}

/// User Control Event
#[derive(Debug, Clone)]
pub enum UserControlEvent {
    StreamBegin(u32),
    StreamEof(u32),
    PingRequest(u32),
    PingResponse(u32),
    Unknown { event_type: u16, data: Bytes },
}

/// RTMP command (connect, createStream, publish, _result, onStatus)
#[derive(Debug, Clone)]
pub struct Command {
    /// Command name
    pub name: String,
    /// Transaction ID
    pub transaction_id: f64,
    /// Command object (null for most requests and responses)
    pub command_object: AmfValue,
    /// Additional arguments
    pub arguments: Vec<AmfValue>,
    /// Message stream ID this command is sent/received on
    pub stream_id: u32,
}

/// Data message (@setDataFrame / onMetaData)
#[derive(Debug, Clone)]
pub struct DataMessage {
    /// Handler name
    pub name: String,
    /// Data values
    pub values: Vec<AmfValue>,
    /// Message stream ID
    pub stream_id: u32,
}

impl RtmpMessage {
    /// Parse a message from a reassembled chunk
    pub fn from_chunk(chunk: &RtmpChunk) -> Result<Self> {
        let mut payload = chunk.payload.clone();

        match chunk.message_type {
            MSG_SET_CHUNK_SIZE => {
                if payload.len() < 4 {
                    return Err(ProtocolError::InvalidChunkHeader.into());
                }
                // MSB is reserved
                let size = payload.get_u32() & 0x7FFF_FFFF;
                Ok(RtmpMessage::SetChunkSize(size))
            }

            MSG_ABORT => {
                if payload.len() < 4 {
                    return Err(ProtocolError::InvalidChunkHeader.into());
                }
                Ok(RtmpMessage::Abort {
                    csid: payload.get_u32(),
                })
            }

            MSG_ACKNOWLEDGEMENT => {
                if payload.len() < 4 {
                    return Err(ProtocolError::InvalidChunkHeader.into());
                }
                Ok(RtmpMessage::Acknowledgement {
                    sequence: payload.get_u32(),
                })
            }

            MSG_USER_CONTROL => Self::parse_user_control(&mut payload),

            MSG_WINDOW_ACK_SIZE => {
                if payload.len() < 4 {
                    return Err(ProtocolError::InvalidChunkHeader.into());
                }
                Ok(RtmpMessage::WindowAckSize(payload.get_u32()))
            }

            MSG_SET_PEER_BANDWIDTH => {
                if payload.len() < 5 {
                    return Err(ProtocolError::InvalidChunkHeader.into());
                }
                let size = payload.get_u32();
                let limit_type = payload.get_u8();
                Ok(RtmpMessage::SetPeerBandwidth { size, limit_type })
            }

            MSG_AUDIO => Ok(RtmpMessage::Audio {
                timestamp: chunk.timestamp,
                data: payload,
            }),

            MSG_VIDEO => Ok(RtmpMessage::Video {
                timestamp: chunk.timestamp,
                data: payload,
            }),

            MSG_COMMAND_AMF0 => {
                let cmd = Self::parse_command(&mut payload, chunk.stream_id)?;
                Ok(RtmpMessage::Command(cmd))
            }

            MSG_DATA_AMF0 => {
                let data = Self::parse_data(&mut payload, chunk.stream_id)?;
                Ok(RtmpMessage::Data(data))
            }

            _ => Ok(RtmpMessage::Unknown {
                type_id: chunk.message_type,
                data: payload,
            }),
        }
    }

    /// Parse User Control message
    fn parse_user_control(payload: &mut Bytes) -> Result<Self> {
        if payload.len() < 6 {
            return Err(ProtocolError::InvalidChunkHeader.into());
        }

        let event_type = payload.get_u16();
        let event = match event_type {
            UC_STREAM_BEGIN => UserControlEvent::StreamBegin(payload.get_u32()),
            UC_STREAM_EOF => UserControlEvent::StreamEof(payload.get_u32()),
            UC_PING_REQUEST => UserControlEvent::PingRequest(payload.get_u32()),
            UC_PING_RESPONSE => UserControlEvent::PingResponse(payload.get_u32()),
            _ => UserControlEvent::Unknown {
                event_type,
                data: payload.clone(),
            },
        };

        Ok(RtmpMessage::UserControl(event))
    }

    /// Parse an AMF0 command
    fn parse_command(payload: &mut Bytes, stream_id: u32) -> Result<Command> {
        let mut decoder = Amf0Decoder::new();

        let name = match decoder.decode(payload)? {
            AmfValue::String(s) => s,
            other => {
                return Err(ProtocolError::UnexpectedMessage(format!(
                    "command name is {:?}",
                    other
                ))
                .into())
            }
        };

        let transaction_id = match decoder.decode(payload)? {
            AmfValue::Number(n) => n,
            _ => 0.0,
        };

        let command_object = if payload.has_remaining() {
            decoder.decode(payload)?
        } else {
            AmfValue::Null
        };

        let mut arguments = Vec::new();
        while payload.has_remaining() {
            match decoder.decode(payload) {
                Ok(v) => arguments.push(v),
                Err(AmfError::Truncated) => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Command {
            name,
            transaction_id,
            command_object,
            arguments,
            stream_id,
        })
    }

    /// Parse an AMF0 data message
    fn parse_data(payload: &mut Bytes, stream_id: u32) -> Result<DataMessage> {
        let mut decoder = Amf0Decoder::new();

        let name = match decoder.decode(payload)? {
            AmfValue::String(s) => s,
            _ => String::new(),
        };

        let mut values = Vec::new();
        while payload.has_remaining() {
            match decoder.decode(payload) {
                Ok(v) => values.push(v),
                Err(AmfError::Truncated) => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(DataMessage {
            name,
            values,
            stream_id,
        })
    }

    /// Encode this message to (type id, payload)
    pub fn encode(&self) -> (u8, Bytes) {
        match self {
            RtmpMessage::SetChunkSize(size) => {
                let mut buf = BytesMut::with_capacity(4);
                buf.put_u32(*size);
                (MSG_SET_CHUNK_SIZE, buf.freeze())
            }

            RtmpMessage::Abort { csid } => {
                let mut buf = BytesMut::with_capacity(4);
                buf.put_u32(*csid);
                (MSG_ABORT, buf.freeze())
            }

            RtmpMessage::Acknowledgement { sequence } => {
                let mut buf = BytesMut::with_capacity(4);
                buf.put_u32(*sequence);
                (MSG_ACKNOWLEDGEMENT, buf.freeze())
            }

            RtmpMessage::WindowAckSize(size) => {
                let mut buf = BytesMut::with_capacity(4);
                buf.put_u32(*size);
                (MSG_WINDOW_ACK_SIZE, buf.freeze())
            }

            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                let mut buf = BytesMut::with_capacity(5);
                buf.put_u32(*size);
                buf.put_u8(*limit_type);
                (MSG_SET_PEER_BANDWIDTH, buf.freeze())
            }

            RtmpMessage::UserControl(event) => {
                let mut buf = BytesMut::with_capacity(10);
                match event {
                    UserControlEvent::StreamBegin(id) => {
                        buf.put_u16(UC_STREAM_BEGIN);
                        buf.put_u32(*id);
                    }
                    UserControlEvent::StreamEof(id) => {
                        buf.put_u16(UC_STREAM_EOF);
                        buf.put_u32(*id);
                    }
                    UserControlEvent::PingRequest(ts) => {
                        buf.put_u16(UC_PING_REQUEST);
                        buf.put_u32(*ts);
                    }
                    UserControlEvent::PingResponse(ts) => {
                        buf.put_u16(UC_PING_RESPONSE);
                        buf.put_u32(*ts);
                    }
                    UserControlEvent::Unknown { event_type, data } => {
                        buf.put_u16(*event_type);
                        buf.put_slice(data);
                    }
                }
                (MSG_USER_CONTROL, buf.freeze())
            }

            RtmpMessage::Audio { data, .. } => (MSG_AUDIO, data.clone()),

            RtmpMessage::Video { data, .. } => (MSG_VIDEO, data.clone()),

            RtmpMessage::Command(cmd) => (MSG_COMMAND_AMF0, encode_command(cmd)),

            RtmpMessage::Data(data) => (MSG_DATA_AMF0, encode_data(data)),

            RtmpMessage::Unknown { type_id, data } => (*type_id, data.clone()),
        }
    }
}

impl Command {
    /// Create a client command carrying a null command object
    pub fn with_args(
        name: &str,
        transaction_id: f64,
        arguments: Vec<AmfValue>,
        stream_id: u32,
    ) -> Self {
        Command {
            name: name.to_string(),
            transaction_id,
            command_object: AmfValue::Null,
            arguments,
            stream_id,
        }
    }

    /// The info-object `code` string of an `onStatus` / `_error` response
    pub fn status_code(&self) -> Option<&str> {
        self.arguments.iter().find_map(|arg| arg.get_string("code"))
    }

    /// The info-object `description` string, if present
    pub fn description(&self) -> Option<&str> {
        self.arguments
            .iter()
            .find_map(|arg| arg.get_string("description"))
    }

    /// The trailing numeric argument of a `_result` (the stream id from
    /// `createStream`)
    pub fn result_number(&self) -> Option<f64> {
        self.arguments.iter().rev().find_map(|arg| arg.as_number())
    }
}

/// Encode a command to AMF0 bytes
pub fn encode_command(cmd: &Command) -> Bytes {
    let mut encoder = Amf0Encoder::new();
    encoder.encode(&AmfValue::String(cmd.name.clone()));
    encoder.encode(&AmfValue::Number(cmd.transaction_id));
    encoder.encode(&cmd.command_object);
    for arg in &cmd.arguments {
        encoder.encode(arg);
    }
    encoder.finish()
}

/// Encode a data message to AMF0 bytes
pub fn encode_data(data: &DataMessage) -> Bytes {
    let mut encoder = Amf0Encoder::new();
    encoder.encode(&AmfValue::String(data.name.clone()));
    for value in &data.values {
        encoder.encode(value);
    }
    encoder.finish()
}

/// Build a `_result` response (used by the scripted test server)
pub fn result_command(transaction_id: f64, arguments: Vec<AmfValue>) -> Bytes {
    encode_command(&Command {
        name: CMD_RESULT.to_string(),
        transaction_id,
        command_object: AmfValue::Null,
        arguments,
        stream_id: 0,
    })
}

/// Build an `onStatus` notification payload
pub fn on_status(code: &str, description: &str) -> Bytes {
    let info = AmfValue::object([
        ("level", AmfValue::String("status".into())),
        ("code", AmfValue::String(code.into())),
        ("description", AmfValue::String(description.into())),
    ]);
    encode_command(&Command {
        name: CMD_ON_STATUS.to_string(),
        transaction_id: 0.0,
        command_object: AmfValue::Null,
        arguments: vec![info],
        stream_id: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_of(message_type: u8, payload: Bytes) -> RtmpChunk {
        RtmpChunk {
            csid: CSID_COMMAND,
            timestamp: 0,
            message_type,
            stream_id: 0,
            payload,
        }
    }

    #[test]
    fn test_set_chunk_size_roundtrip() {
        let msg = RtmpMessage::SetChunkSize(4096);
        let (type_id, payload) = msg.encode();
        assert_eq!(type_id, MSG_SET_CHUNK_SIZE);

        let parsed = RtmpMessage::from_chunk(&chunk_of(type_id, payload)).unwrap();
        assert!(matches!(parsed, RtmpMessage::SetChunkSize(4096)));
    }

    #[test]
    fn test_set_chunk_size_ignores_reserved_msb() {
        let mut payload = BytesMut::new();
        payload.put_u32(0x8000_1000);
        let parsed = RtmpMessage::from_chunk(&chunk_of(MSG_SET_CHUNK_SIZE, payload.freeze())).unwrap();
        assert!(matches!(parsed, RtmpMessage::SetChunkSize(0x1000)));
    }

    #[test]
    fn test_window_ack_and_bandwidth_roundtrip() {
        let (type_id, payload) = RtmpMessage::WindowAckSize(2_500_000).encode();
        let parsed = RtmpMessage::from_chunk(&chunk_of(type_id, payload)).unwrap();
        assert!(matches!(parsed, RtmpMessage::WindowAckSize(2_500_000)));

        let (type_id, payload) = RtmpMessage::SetPeerBandwidth {
            size: 2_500_000,
            limit_type: 2,
        }
        .encode();
        let parsed = RtmpMessage::from_chunk(&chunk_of(type_id, payload)).unwrap();
        assert!(matches!(
            parsed,
            RtmpMessage::SetPeerBandwidth {
                size: 2_500_000,
                limit_type: 2
            }
        ));
    }

    #[test]
    fn test_ping_request_layout() {
        // type 0x04, event 0x0006, 4-byte timestamp body
        let (type_id, payload) =
            RtmpMessage::UserControl(UserControlEvent::PingRequest(0x01020304)).encode();
        assert_eq!(type_id, MSG_USER_CONTROL);
        assert_eq!(&payload[..], &[0x00, 0x06, 0x01, 0x02, 0x03, 0x04]);

        let parsed = RtmpMessage::from_chunk(&chunk_of(type_id, payload)).unwrap();
        assert!(matches!(
            parsed,
            RtmpMessage::UserControl(UserControlEvent::PingRequest(0x01020304))
        ));
    }

    #[test]
    fn test_command_roundtrip() {
        let cmd = Command::with_args(
            CMD_PUBLISH,
            0.0,
            vec![
                AmfValue::String("abcd-1234".into()),
                AmfValue::String("live".into()),
            ],
            1,
        );

        let payload = encode_command(&cmd);
        let mut chunk = chunk_of(MSG_COMMAND_AMF0, payload);
        chunk.stream_id = 1;

        let parsed = RtmpMessage::from_chunk(&chunk).unwrap();
        let RtmpMessage::Command(parsed) = parsed else {
            panic!("expected command");
        };
        assert_eq!(parsed.name, "publish");
        assert_eq!(parsed.transaction_id, 0.0);
        assert!(parsed.command_object.is_null_or_undefined());
        assert_eq!(parsed.arguments.len(), 2);
        assert_eq!(parsed.stream_id, 1);
    }

    #[test]
    fn test_result_number_extraction() {
        let payload = result_command(4.0, vec![AmfValue::Null, AmfValue::Number(1.0)]);
        let parsed = RtmpMessage::from_chunk(&chunk_of(MSG_COMMAND_AMF0, payload)).unwrap();
        let RtmpMessage::Command(cmd) = parsed else {
            panic!("expected command");
        };
        assert_eq!(cmd.name, CMD_RESULT);
        assert_eq!(cmd.transaction_id, 4.0);
        assert_eq!(cmd.result_number(), Some(1.0));
    }

    #[test]
    fn test_on_status_code() {
        let payload = on_status(NS_PUBLISH_START, "publishing started");
        let parsed = RtmpMessage::from_chunk(&chunk_of(MSG_COMMAND_AMF0, payload)).unwrap();
        let RtmpMessage::Command(cmd) = parsed else {
            panic!("expected command");
        };
        assert_eq!(cmd.name, CMD_ON_STATUS);
        assert_eq!(cmd.status_code(), Some(NS_PUBLISH_START));
        assert_eq!(cmd.description(), Some("publishing started"));
    }

    #[test]
    fn test_data_message_roundtrip() {
        let data = DataMessage {
            name: CMD_SET_DATA_FRAME.to_string(),
            values: vec![
                AmfValue::String(CMD_ON_METADATA.into()),
                AmfValue::EcmaArray(vec![
                    ("width".to_string(), AmfValue::Number(320.0)),
                    ("height".to_string(), AmfValue::Number(240.0)),
                ]),
            ],
            stream_id: 1,
        };

        let (type_id, payload) = RtmpMessage::Data(data).encode();
        assert_eq!(type_id, MSG_DATA_AMF0);

        let parsed = RtmpMessage::from_chunk(&chunk_of(type_id, payload)).unwrap();
        let RtmpMessage::Data(parsed) = parsed else {
            panic!("expected data message");
        };
        assert_eq!(parsed.name, CMD_SET_DATA_FRAME);
        assert_eq!(parsed.values.len(), 2);
        assert_eq!(parsed.values[1].get_number("width"), Some(320.0));
    }

    #[test]
    fn test_truncated_control_message() {
        let err = RtmpMessage::from_chunk(&chunk_of(
            MSG_WINDOW_ACK_SIZE,
            Bytes::from_static(&[0x00, 0x01]),
        ));
        assert!(err.is_err());
    }

    #[test]
    fn test_unknown_type_passthrough() {
        let parsed =
            RtmpMessage::from_chunk(&chunk_of(99, Bytes::from_static(&[1, 2, 3]))).unwrap();
        assert!(matches!(parsed, RtmpMessage::Unknown { type_id: 99, .. }));
    }
}
