//! Publish a synthetic A/V stream to an RTMP ingest
//!
//! Run with: cargo run --example publish -- rtmp://localhost/live/test_key
//!
//! Feeds the publisher a JPEG-tagged test pattern and 16 kHz PCM silence.
//! Point it at a local ingest (nginx-rtmp, mediamtx) to watch the session
//! walk through connect / createStream / publish.

use std::time::Duration;

use bytes::Bytes;

use rtmp_push::media::AudioCodec;
use rtmp_push::{PublisherConfig, RtmpPublisher, SessionEvent, StreamMetadata, VideoCodec};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rtmp_push=debug".into()),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "rtmp://localhost/live/test_key".to_string());

    let mut config = PublisherConfig::new(url);
    config.metadata = StreamMetadata {
        width: Some(320.0),
        height: Some(240.0),
        framerate: Some(10.0),
        video_codec: Some(VideoCodec::Jpeg),
        audio_codec: Some(AudioCodec::PcmLe),
        audio_sample_rate: Some(16000.0),
        audio_channels: Some(1.0),
        ..Default::default()
    };

    let (publisher, mut events) = RtmpPublisher::new(config);
    let media = publisher.media_handle();
    let state = publisher.watch_state();
    let disconnector = publisher.disconnector();
    let stats = publisher.stats();

    // Event consumer
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::PublishStarted { stream_id } => {
                    println!("publishing on stream {stream_id}");
                }
                SessionEvent::FramesDropped { kind, count } => {
                    println!("dropped {count} {kind:?} frames");
                }
                SessionEvent::Closed { error } => {
                    println!("session closed: {error:?}");
                }
                _ => {}
            }
        }
    });

    // Synthetic camera: 10 fps JPEG test pattern
    {
        let media = media.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let frame = Bytes::from(vec![0xAB; 4096]);
            let mut ts: u32 = 0;
            loop {
                tokio::time::sleep(Duration::from_millis(100)).await;
                if state.borrow().is_live() {
                    media.submit_video(frame.clone(), VideoCodec::Jpeg, true, ts);
                }
                ts += 100;
            }
        });
    }

    // Synthetic microphone: 16 kHz mono PCM silence, 64 ms frames
    tokio::spawn(async move {
        let samples = Bytes::from(vec![0u8; 2048]);
        let mut ts: u32 = 0;
        loop {
            tokio::time::sleep(Duration::from_millis(64)).await;
            if state.borrow().is_live() {
                media.submit_audio(samples.clone(), AudioCodec::PcmLe, 16_000, 16, 1, ts);
            }
            ts += 64;
        }
    });

    // Stop after 30 seconds
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        disconnector.disconnect();
    });

    let result = publisher.run().await;
    let snapshot = stats.snapshot();
    println!(
        "sent {} bytes, {} video / {} audio frames, {} dropped",
        snapshot.bytes_sent,
        snapshot.video_frames_sent,
        snapshot.audio_frames_sent,
        snapshot.frames_dropped
    );
    result.map_err(Into::into)
}
