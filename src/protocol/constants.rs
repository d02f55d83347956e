//! RTMP protocol constants
//!
//! Reference: Adobe RTMP Specification (December 2012)
//! Reference: RFC 7425 - Adobe's RTMP (Informational)

/// RTMP version number (always 3 for standard RTMP)
pub const RTMP_VERSION: u8 = 3;

/// Default RTMP port
pub const RTMP_PORT: u16 = 1935;

/// Handshake packet size (C1/C2/S1/S2)
pub const HANDSHAKE_SIZE: usize = 1536;

/// Default chunk size (per RTMP spec)
pub const DEFAULT_CHUNK_SIZE: u32 = 128;

/// Chunk size announced after connect (reduces header overhead)
pub const RECOMMENDED_CHUNK_SIZE: u32 = 4096;

/// Maximum chunk size allowed
pub const MAX_CHUNK_SIZE: u32 = 0xFFFFFF;

/// Maximum message size (sanity limit)
pub const MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

/// Timestamps at or above this value require the extended timestamp field
pub const EXTENDED_TIMESTAMP_THRESHOLD: u32 = 0xFFFFFF;

// ============================================================================
// Chunk Stream IDs (CSID)
// RTMP spec section 5.3.1.1; the assignment of 3-6 follows FMLE convention.
// ============================================================================

/// Protocol control messages (Set Chunk Size, Acknowledgement, etc.)
pub const CSID_PROTOCOL_CONTROL: u32 = 2;

/// Connection-level commands (connect, createStream, releaseStream)
pub const CSID_COMMAND: u32 = 3;

/// Stream-level commands (publish, FCUnpublish, deleteStream) and data
pub const CSID_STREAM: u32 = 4;

/// Audio tags
pub const CSID_AUDIO: u32 = 5;

/// Video tags
pub const CSID_VIDEO: u32 = 6;

// ============================================================================
// Message Type IDs
// RTMP spec section 5.4
// ============================================================================

/// Set Chunk Size (1) - protocol control
pub const MSG_SET_CHUNK_SIZE: u8 = 1;

/// Abort Message (2) - protocol control
pub const MSG_ABORT: u8 = 2;

/// Acknowledgement (3) - protocol control
pub const MSG_ACKNOWLEDGEMENT: u8 = 3;

/// User Control Message (4)
pub const MSG_USER_CONTROL: u8 = 4;

/// Window Acknowledgement Size (5) - protocol control
pub const MSG_WINDOW_ACK_SIZE: u8 = 5;

/// Set Peer Bandwidth (6) - protocol control
pub const MSG_SET_PEER_BANDWIDTH: u8 = 6;

/// Audio Message (8)
pub const MSG_AUDIO: u8 = 8;

/// Video Message (9)
pub const MSG_VIDEO: u8 = 9;

/// AMF0 Data Message (18) - @setDataFrame
pub const MSG_DATA_AMF0: u8 = 18;

/// AMF0 Command Message (20) - connect, createStream, publish, _result
pub const MSG_COMMAND_AMF0: u8 = 20;

// ============================================================================
// User Control Event Types
// RTMP spec section 6.2
// ============================================================================

/// Stream Begin - server sends when a stream becomes functional
pub const UC_STREAM_BEGIN: u16 = 0;

/// Stream EOF
pub const UC_STREAM_EOF: u16 = 1;

/// Ping Request (event type 6, 4-byte timestamp body)
pub const UC_PING_REQUEST: u16 = 6;

/// Ping Response
pub const UC_PING_RESPONSE: u16 = 7;

// ============================================================================
// Command Names
// ============================================================================

pub const CMD_CONNECT: &str = "connect";
pub const CMD_CREATE_STREAM: &str = "createStream";
pub const CMD_DELETE_STREAM: &str = "deleteStream";
pub const CMD_PUBLISH: &str = "publish";
pub const CMD_RELEASE_STREAM: &str = "releaseStream";
pub const CMD_FC_PUBLISH: &str = "FCPublish";
pub const CMD_FC_UNPUBLISH: &str = "FCUnpublish";

/// Server response commands
pub const CMD_RESULT: &str = "_result";
pub const CMD_ERROR: &str = "_error";

/// Status notification
pub const CMD_ON_STATUS: &str = "onStatus";

/// Data message handler names
pub const CMD_SET_DATA_FRAME: &str = "@setDataFrame";
pub const CMD_ON_METADATA: &str = "onMetaData";

// ============================================================================
// NetStream Status Codes
// ============================================================================

pub const NS_PUBLISH_START: &str = "NetStream.Publish.Start";
pub const NS_PUBLISH_BAD_NAME: &str = "NetStream.Publish.BadName";
pub const NS_PUBLISH_FAILED: &str = "NetStream.Publish.Failed";

// ============================================================================
// connect() command object defaults (FMLE-compatible publisher)
// ============================================================================

/// Flash version string public ingests accept from an encoder
pub const FLASH_VERSION: &str = "FMLE/3.0 (compatible; Lavf)";

/// `capabilities` property
pub const CAPS_DEFAULT: f64 = 15.0;

/// `audioCodecs` property
pub const AUDIO_CODECS_DEFAULT: f64 = 4071.0;

/// `videoCodecs` property
pub const VIDEO_CODECS_DEFAULT: f64 = 252.0;

/// `videoFunction` property
pub const VIDEO_FUNCTION_DEFAULT: f64 = 1.0;

// ============================================================================
// Flow control defaults
// ============================================================================

/// Window acknowledgement size announced to the server (2.5 MB)
pub const DEFAULT_WINDOW_ACK_SIZE: u32 = 2_500_000;

// ============================================================================
// Chunk Header Format Types (fmt field)
// RTMP spec section 5.3.1.2
// ============================================================================

/// Type 0: Full header (11 bytes) - timestamp, length, type, stream ID
pub const CHUNK_FMT_0: u8 = 0;

/// Type 1: No stream ID (7 bytes) - timestamp delta, length, type
pub const CHUNK_FMT_1: u8 = 1;

/// Type 2: Timestamp delta only (3 bytes)
pub const CHUNK_FMT_2: u8 = 2;

/// Type 3: No header (0 bytes) - continuation
pub const CHUNK_FMT_3: u8 = 3;
