//! rtmp-push: RTMP publishing client core
//!
//! The streaming core of an embedded camera device: it performs the RTMP
//! handshake, drives the control-channel command sequence
//! (`connect` → `createStream` → `publish`), multiplexes audio and video
//! tags over RTMP chunk streams with AMF0-encoded control messages, and
//! enforces connection liveness with periodic user-control pings.
//!
//! Camera and microphone producers stay outside this crate; they hand the
//! publisher opaque, timestamped codec payloads through a cloneable
//! [`MediaHandle`](media::MediaHandle). The surrounding device state machine
//! observes the session through a watch channel and a pull-based event
//! stream and decides when to reconnect — this crate never retries.
//!
//! # Example
//!
//! ```no_run
//! use rtmp_push::{PublisherConfig, RtmpPublisher, SessionEvent};
//! use rtmp_push::media::VideoCodec;
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PublisherConfig::new("rtmp://ingest.example.com/live")
//!         .with_stream_key("abcd-1234");
//!     let (publisher, mut events) = RtmpPublisher::new(config);
//!
//!     let media = publisher.media_handle();
//!     tokio::spawn(async move {
//!         // camera task: push encoded frames
//!         media.submit_video(Bytes::from_static(b"..."), VideoCodec::H264, true, 0);
//!     });
//!
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("session event: {:?}", event);
//!         }
//!     });
//!
//!     publisher.run().await?;
//!     Ok(())
//! }
//! ```

pub mod amf;
pub mod client;
pub mod error;
pub mod media;
pub mod protocol;
pub mod stats;
pub mod transport;

// Re-export main types for convenience
pub use client::{
    CredentialSource, Disconnector, PublisherConfig, RtmpPublisher, SessionEvent, SessionState,
    StaticCredentials, StreamCredentials, StreamMetadata,
};
pub use error::{Error, Result};
pub use media::{AudioCodec, MediaHandle, MediaKind, VideoCodec};
pub use stats::SessionStats;
