//! Media muxing
//!
//! Producers hand the muxer opaque, timestamped codec payloads; the muxer
//! wraps them in FLV-style tag bodies and the session submits them to the
//! chunk stream layer on the audio/video chunk streams.

pub mod flv;
pub mod muxer;

pub use flv::{AudioCodec, VideoCodec};
pub use muxer::{AudioFrame, MediaHandle, MediaKind, MediaQueues, Muxer, SubmitOutcome, VideoFrame};
