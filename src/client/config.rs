//! Publisher configuration and RTMP URL parsing

use std::time::Duration;

use crate::amf::AmfValue;
use crate::error::{Error, Result};
use crate::media::{AudioCodec, VideoCodec};
use crate::protocol::constants::{
    DEFAULT_WINDOW_ACK_SIZE, FLASH_VERSION, RECOMMENDED_CHUNK_SIZE, RTMP_PORT,
};

/// Publisher configuration
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// RTMP ingest URL (rtmp://host[:port]/app[/stream])
    pub url: String,

    /// Stream key; overrides any stream path in the URL
    pub stream_key: Option<String>,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Read deadline for handshake packets and command responses
    pub read_timeout: Duration,

    /// Write deadline for a single socket write
    pub write_timeout: Duration,

    /// Interval between keepalive pings while streaming
    pub keepalive_interval: Duration,

    /// Outgoing chunk size announced after connect
    pub chunk_size: u32,

    /// Window acknowledgement size announced after connect
    pub window_ack_size: u32,

    /// Video queue depth before backpressure dropping starts
    pub max_video_queue: usize,

    /// Audio queue depth before backpressure dropping starts
    pub max_audio_queue: usize,

    /// Flash version string sent in the connect command
    pub flash_ver: String,

    /// Stream properties advertised via @setDataFrame after publish
    pub metadata: StreamMetadata,

    /// Diagnostic verbosity (0 = quiet, higher = chattier)
    pub verbosity: u8,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            stream_key: None,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(30),
            chunk_size: RECOMMENDED_CHUNK_SIZE,
            window_ack_size: DEFAULT_WINDOW_ACK_SIZE,
            max_video_queue: crate::media::muxer::DEFAULT_VIDEO_QUEUE,
            max_audio_queue: crate::media::muxer::DEFAULT_AUDIO_QUEUE,
            flash_ver: FLASH_VERSION.to_string(),
            metadata: StreamMetadata::default(),
            verbosity: 0,
        }
    }
}

impl PublisherConfig {
    /// Create a new config with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the stream key supplied separately from the URL
    pub fn with_stream_key(mut self, key: impl Into<String>) -> Self {
        self.stream_key = Some(key.into());
        self
    }

    /// Parse the configured URL
    pub fn parse_url(&self) -> Result<ParsedUrl> {
        ParsedUrl::parse(&self.url)
    }

    /// Stream key: the explicit one, falling back to the URL's stream path
    pub fn effective_stream_key(&self, url: &ParsedUrl) -> Result<String> {
        if let Some(key) = &self.stream_key {
            return Ok(key.clone());
        }
        url.stream_path
            .clone()
            .ok_or_else(|| Error::Config("no stream key in URL or config".into()))
    }
}

/// Parsed RTMP URL components
#[derive(Debug, Clone)]
pub struct ParsedUrl {
    pub host: String,
    pub port: u16,
    /// Application name (first path component)
    pub app: String,
    /// Stream path (everything after the app), if present
    pub stream_path: Option<String>,
    /// `rtmp://host[:port]/app`, authority exactly as configured
    pub tc_url: String,
}

impl ParsedUrl {
    /// Parse `rtmp://host[:port]/app[/stream]`
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("rtmp://")
            .ok_or_else(|| Error::Config(format!("not an rtmp:// URL: {}", url)))?;

        let (host_port, path) = rest
            .split_once('/')
            .ok_or_else(|| Error::Config(format!("URL has no application path: {}", url)))?;

        let (host, port) = match host_port.split_once(':') {
            Some((h, p)) => {
                let port: u16 = p
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid port in URL: {}", url)))?;
                (h.to_string(), port)
            }
            None => (host_port.to_string(), RTMP_PORT),
        };
        if host.is_empty() {
            return Err(Error::Config(format!("empty host in URL: {}", url)));
        }

        let (app, stream_path) = match path.split_once('/') {
            Some((a, s)) if !s.is_empty() => (a.to_string(), Some(s.to_string())),
            Some((a, _)) => (a.to_string(), None),
            None => (path.to_string(), None),
        };
        if app.is_empty() {
            return Err(Error::Config(format!("empty application name: {}", url)));
        }

        let tc_url = format!("rtmp://{}/{}", host_port, app);

        Ok(Self {
            host,
            port,
            app,
            stream_path,
            tc_url,
        })
    }
}

/// Stream properties sent as `onMetaData` once publishing starts
#[derive(Debug, Clone, Default)]
pub struct StreamMetadata {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub framerate: Option<f64>,
    pub video_codec: Option<VideoCodec>,
    pub audio_codec: Option<AudioCodec>,
    pub audio_sample_rate: Option<f64>,
    pub audio_channels: Option<f64>,
}

impl StreamMetadata {
    /// Encode as the ECMA array FMLE-style encoders send
    pub fn to_ecma(&self) -> AmfValue {
        let mut pairs: Vec<(String, AmfValue)> = vec![("duration".into(), AmfValue::Number(0.0))];
        if let Some(w) = self.width {
            pairs.push(("width".into(), AmfValue::Number(w)));
        }
        if let Some(h) = self.height {
            pairs.push(("height".into(), AmfValue::Number(h)));
        }
        if let Some(f) = self.framerate {
            pairs.push(("framerate".into(), AmfValue::Number(f)));
        }
        if let Some(c) = self.video_codec {
            pairs.push(("videocodecid".into(), AmfValue::Number(c.metadata_id())));
        }
        if let Some(c) = self.audio_codec {
            pairs.push(("audiocodecid".into(), AmfValue::Number(c.metadata_id())));
        }
        if let Some(r) = self.audio_sample_rate {
            pairs.push(("audiosamplerate".into(), AmfValue::Number(r)));
        }
        if let Some(c) = self.audio_channels {
            pairs.push(("audiochannels".into(), AmfValue::Number(c)));
        }
        AmfValue::EcmaArray(pairs)
    }
}
