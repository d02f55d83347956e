//! Statistics for a publishing session
//!
//! Counters are mutated only by the session task (and the producer-side
//! queue for drops) and read by monitors via atomic loads, so no lock is
//! involved on either side.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Shared counters updated by the writer, read by monitors
#[derive(Debug)]
pub struct SharedStats {
    started_at: Instant,
    bytes_sent: AtomicU64,
    video_frames_sent: AtomicU64,
    audio_frames_sent: AtomicU64,
    video_frames_dropped: AtomicU64,
    audio_frames_dropped: AtomicU64,
}

impl SharedStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            bytes_sent: AtomicU64::new(0),
            video_frames_sent: AtomicU64::new(0),
            audio_frames_sent: AtomicU64::new(0),
            video_frames_dropped: AtomicU64::new(0),
            audio_frames_dropped: AtomicU64::new(0),
        }
    }

    pub fn add_bytes_sent(&self, n: u64) {
        self.bytes_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr_video_frames(&self) {
        self.video_frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_audio_frames(&self) {
        self.audio_frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_video_dropped(&self, n: u64) {
        self.video_frames_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_audio_dropped(&self, n: u64) {
        self.audio_frames_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn video_dropped(&self) -> u64 {
        self.video_frames_dropped.load(Ordering::Relaxed)
    }

    pub fn audio_dropped(&self) -> u64 {
        self.audio_frames_dropped.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.video_dropped() + self.audio_dropped()
    }

    /// Consistent-enough snapshot for telemetry
    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            video_frames_sent: self.video_frames_sent.load(Ordering::Relaxed),
            audio_frames_sent: self.audio_frames_sent.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped(),
            duration: self.started_at.elapsed(),
        }
    }
}

impl Default for SharedStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time session statistics
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Total bytes written to the socket
    pub bytes_sent: u64,
    /// Video frames submitted to the wire
    pub video_frames_sent: u64,
    /// Audio frames submitted to the wire
    pub audio_frames_sent: u64,
    /// Frames discarded under backpressure
    pub frames_dropped: u64,
    /// Time since the session started
    pub duration: Duration,
}

impl SessionStats {
    /// Outbound bitrate estimate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes_sent * 8) / secs
        } else {
            0
        }
    }
}
