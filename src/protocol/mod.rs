//! RTMP protocol implementation
//!
//! Wire-level building blocks for the publishing session: handshake,
//! chunk framing, message types, and protocol constants.

pub mod chunk;
pub mod constants;
pub mod handshake;
pub mod message;

pub use chunk::{ChunkDecoder, ChunkEncoder, RtmpChunk};
pub use message::{Command, RtmpMessage, UserControlEvent};
