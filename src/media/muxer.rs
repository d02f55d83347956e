//! Media queues and FLV muxing state
//!
//! Producers (camera task, microphone task) deposit frames onto bounded
//! queues through a cloneable [`MediaHandle`]; enqueue never blocks. The
//! session task drains the queues, runs each frame through the [`Muxer`]
//! (sequence-header tracking, monotone timestamps, tag framing) and writes
//! the result to the chunk stream layer.
//!
//! Backpressure policy: a full video queue drops the oldest non-keyframe;
//! keyframes are never dropped, and a keyframe that cannot be accepted
//! stalls the session. A full audio queue drops the oldest sample frame.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::Notify;

use crate::media::flv::{self, AacPacketType, AudioCodec, AvcPacketType, VideoCodec};
use crate::stats::SharedStats;

/// Default video queue depth
pub const DEFAULT_VIDEO_QUEUE: usize = 4;

/// Default audio queue depth
pub const DEFAULT_AUDIO_QUEUE: usize = 8;

/// Which media stream an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

/// A timestamped video payload from the camera producer
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub payload: Bytes,
    pub codec: VideoCodec,
    pub is_keyframe: bool,
    pub timestamp_ms: u32,
}

/// A timestamped audio payload from the microphone producer
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub payload: Bytes,
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub bit_depth: u8,
    pub channels: u8,
    pub timestamp_ms: u32,
}

/// Result of a non-blocking submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Frame queued for the session task
    Queued,
    /// Frame queued after discarding this many older frames
    QueuedWithDrops(u32),
    /// Frame discarded (queue full of frames that may not be dropped)
    Dropped,
    /// A keyframe could not be accepted; the session must close
    Stalled,
}

struct Shared {
    video: Mutex<VecDeque<VideoFrame>>,
    audio: Mutex<VecDeque<AudioFrame>>,
    notify: Notify,
    stalled: AtomicBool,
    max_video: usize,
    max_audio: usize,
    stats: Arc<SharedStats>,
}

/// Producer-facing handle; cheap to clone, enqueue never blocks
#[derive(Clone)]
pub struct MediaHandle {
    shared: Arc<Shared>,
}

impl MediaHandle {
    /// Submit a video frame.
    ///
    /// `payload` must already be in the codec's on-wire form (AVC NALUs with
    /// 4-byte length prefixes, or a JPEG frame). The first H.264 submission
    /// is sent as the AVC sequence header and must carry the decoder
    /// configuration record. `timestamp_ms` must be monotone non-decreasing.
    pub fn submit_video(
        &self,
        payload: Bytes,
        codec: VideoCodec,
        is_keyframe: bool,
        timestamp_ms: u32,
    ) -> SubmitOutcome {
        let frame = VideoFrame {
            payload,
            codec,
            is_keyframe,
            timestamp_ms,
        };

        let mut queue = self.shared.video.lock().expect("video queue poisoned");
        let mut dropped = 0u32;

        while queue.len() >= self.shared.max_video {
            // Oldest non-keyframe goes first
            if let Some(pos) = queue.iter().position(|f| !f.is_keyframe) {
                queue.remove(pos);
                dropped += 1;
                continue;
            }
            // Queue is all keyframes
            if frame.is_keyframe {
                drop(queue);
                self.shared.stalled.store(true, Ordering::Release);
                self.shared.notify.notify_one();
                if dropped > 0 {
                    self.shared.stats.add_video_dropped(dropped as u64);
                }
                tracing::warn!("video queue stalled on keyframe");
                return SubmitOutcome::Stalled;
            }
            if dropped > 0 {
                self.shared.stats.add_video_dropped(dropped as u64);
            }
            self.shared.stats.add_video_dropped(1);
            tracing::debug!("dropping non-keyframe, queue full of keyframes");
            return SubmitOutcome::Dropped;
        }

        queue.push_back(frame);
        drop(queue);

        if dropped > 0 {
            self.shared.stats.add_video_dropped(dropped as u64);
            tracing::debug!(count = dropped, "dropped video frames under backpressure");
        }
        self.shared.notify.notify_one();

        if dropped > 0 {
            SubmitOutcome::QueuedWithDrops(dropped)
        } else {
            SubmitOutcome::Queued
        }
    }

    /// Submit an audio frame. A full queue drops the oldest sample frame.
    pub fn submit_audio(
        &self,
        payload: Bytes,
        codec: AudioCodec,
        sample_rate: u32,
        bit_depth: u8,
        channels: u8,
        timestamp_ms: u32,
    ) -> SubmitOutcome {
        let frame = AudioFrame {
            payload,
            codec,
            sample_rate,
            bit_depth,
            channels,
            timestamp_ms,
        };

        let mut queue = self.shared.audio.lock().expect("audio queue poisoned");
        let mut dropped = 0u32;
        while queue.len() >= self.shared.max_audio {
            queue.pop_front();
            dropped += 1;
        }
        queue.push_back(frame);
        drop(queue);

        if dropped > 0 {
            self.shared.stats.add_audio_dropped(dropped as u64);
        }
        self.shared.notify.notify_one();

        if dropped > 0 {
            SubmitOutcome::QueuedWithDrops(dropped)
        } else {
            SubmitOutcome::Queued
        }
    }
}

/// Session-side end of the media queues
pub struct MediaQueues {
    shared: Arc<Shared>,
}

impl MediaQueues {
    /// Create the queue pair
    pub fn new(max_video: usize, max_audio: usize, stats: Arc<SharedStats>) -> (Self, MediaHandle) {
        let shared = Arc::new(Shared {
            video: Mutex::new(VecDeque::with_capacity(max_video)),
            audio: Mutex::new(VecDeque::with_capacity(max_audio)),
            notify: Notify::new(),
            stalled: AtomicBool::new(false),
            max_video,
            max_audio,
            stats,
        });
        (
            Self {
                shared: shared.clone(),
            },
            MediaHandle { shared },
        )
    }

    /// Wait until a producer signals new frames (or a stall)
    pub async fn ready(&self) {
        self.shared.notify.notified().await;
    }

    /// True once a keyframe could not be accepted
    pub fn is_stalled(&self) -> bool {
        self.shared.stalled.load(Ordering::Acquire)
    }

    /// Pop the next video frame
    pub fn pop_video(&self) -> Option<VideoFrame> {
        self.shared
            .video
            .lock()
            .expect("video queue poisoned")
            .pop_front()
    }

    /// Pop the next audio frame
    pub fn pop_audio(&self) -> Option<AudioFrame> {
        self.shared
            .audio
            .lock()
            .expect("audio queue poisoned")
            .pop_front()
    }

    /// Discard everything queued (on teardown)
    pub fn drain(&self) {
        self.shared.video.lock().expect("video queue poisoned").clear();
        self.shared.audio.lock().expect("audio queue poisoned").clear();
    }
}

/// FLV muxing state: sequence-header tracking and monotone timestamps
///
/// Owned by the session task; one per publish.
pub struct Muxer {
    avc_header_sent: bool,
    aac_header_sent: bool,
    last_video_ts: Option<u32>,
    last_audio_ts: Option<u32>,
}

impl Muxer {
    pub fn new() -> Self {
        Self {
            avc_header_sent: false,
            aac_header_sent: false,
            last_video_ts: None,
            last_audio_ts: None,
        }
    }

    /// Wrap a video frame into its tag body, returning the adjusted
    /// monotone timestamp alongside.
    pub fn video_tag(&mut self, frame: &VideoFrame) -> (Bytes, u32) {
        let packet_type = if frame.codec == VideoCodec::H264 && !self.avc_header_sent {
            self.avc_header_sent = true;
            AvcPacketType::SequenceHeader
        } else {
            AvcPacketType::Nalu
        };

        let ts = monotone(&mut self.last_video_ts, frame.timestamp_ms);
        let body = flv::video_tag_body(frame.codec, frame.is_keyframe, packet_type, &frame.payload);
        (body, ts)
    }

    /// Wrap an audio frame into its tag body, returning the adjusted
    /// monotone timestamp alongside.
    pub fn audio_tag(&mut self, frame: &AudioFrame) -> (Bytes, u32) {
        let packet_type = if frame.codec == AudioCodec::Aac && !self.aac_header_sent {
            self.aac_header_sent = true;
            AacPacketType::SequenceHeader
        } else {
            AacPacketType::Raw
        };

        let ts = monotone(&mut self.last_audio_ts, frame.timestamp_ms);
        let body = flv::audio_tag_body(
            frame.codec,
            frame.sample_rate,
            frame.bit_depth,
            frame.channels,
            packet_type,
            &frame.payload,
        );
        (body, ts)
    }
}

impl Default for Muxer {
    fn default() -> Self {
        Self::new()
    }
}

/// Enforce `ts = max(ts, last + 1)` per stream
fn monotone(last: &mut Option<u32>, ts: u32) -> u32 {
    let adjusted = match *last {
        Some(prev) => ts.max(prev.wrapping_add(1)),
        None => ts,
    };
    *last = Some(adjusted);
    adjusted
}
