//! FLV tag body construction
//!
//! RTMP audio/video message payloads are FLV tag bodies. The first byte
//! packs the codec identification:
//!
//! ```text
//! Video Data:
//! +----------+----------+
//! | FrameType| CodecID  | CodecData...
//! | (4 bits) | (4 bits) |
//! +----------+----------+
//!
//! Audio Data:
//! +-----------+---------+----------+----------+
//! |SoundFormat|SoundRate|SoundSize |SoundType | AudioData...
//! | (4 bits)  | (2 bits)| (1 bit)  | (1 bit)  |
//! +-----------+---------+----------+----------+
//! ```
//!
//! The codec payload itself is opaque to this layer; the producer tags it
//! with a codec identifier and the muxer only prepends the FLV framing.

use bytes::{BufMut, Bytes, BytesMut};

/// Video codec identifier supplied by the frame producer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// AVC / H.264 (FLV codec id 7). Payload is AVCC: NALUs with 4-byte
    /// length prefixes, or AVCDecoderConfigurationRecord for the sequence
    /// header.
    H264,
    /// JPEG frames carried in the Sorenson H.263 slot (FLV codec id 2).
    /// Public ingests reject this; it exists for closed-loop testing only.
    Jpeg,
}

impl VideoCodec {
    /// FLV codec id (lower 4 bits of the tag byte)
    pub fn flv_id(self) -> u8 {
        match self {
            VideoCodec::H264 => 7,
            VideoCodec::Jpeg => 2,
        }
    }

    /// AMF metadata value for `videocodecid`
    pub fn metadata_id(self) -> f64 {
        self.flv_id() as f64
    }
}

/// AVC packet type byte (second byte of an H.264 video tag)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvcPacketType {
    /// AVCDecoderConfigurationRecord
    SequenceHeader = 0,
    /// One or more NALUs
    Nalu = 1,
}

/// Audio codec identifier supplied by the sample producer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    /// AAC (FLV sound format 10); first frame must be AudioSpecificConfig
    Aac,
    /// Linear PCM, little endian (FLV sound format 3)
    PcmLe,
}

impl AudioCodec {
    /// FLV sound format (upper 4 bits of the tag byte)
    pub fn flv_format(self) -> u8 {
        match self {
            AudioCodec::Aac => 10,
            AudioCodec::PcmLe => 3,
        }
    }

    /// AMF metadata value for `audiocodecid`
    pub fn metadata_id(self) -> f64 {
        self.flv_format() as f64
    }
}

/// AAC packet type byte (second byte of an AAC audio tag)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacPacketType {
    /// AudioSpecificConfig
    SequenceHeader = 0,
    /// Raw AAC frame
    Raw = 1,
}

/// Map a sample rate in Hz onto the 2-bit FLV SoundRate field.
///
/// The field can only express 5.5/11/22/44 kHz. Inexpressible rates (the
/// camera microphone runs at 16 kHz) map to 0 and the ingest must accept or
/// resample.
fn sound_rate_code(sample_rate: u32) -> u8 {
    match sample_rate {
        44_100 => 3,
        22_050 => 2,
        11_025 => 1,
        _ => 0,
    }
}

/// Build a video tag body around an opaque codec payload.
///
/// For H.264 the body is `tag byte | packet type | 24-bit composition time
/// (always 0 here) | payload`; for JPEG just `tag byte | payload`.
pub fn video_tag_body(
    codec: VideoCodec,
    is_keyframe: bool,
    packet_type: AvcPacketType,
    payload: &[u8],
) -> Bytes {
    let frame_type: u8 = if is_keyframe { 1 } else { 2 };
    let mut body = BytesMut::with_capacity(payload.len() + 5);
    body.put_u8((frame_type << 4) | codec.flv_id());

    if codec == VideoCodec::H264 {
        body.put_u8(packet_type as u8);
        // Composition time offset: no B-frames from the camera encoder
        body.put_slice(&[0, 0, 0]);
    }

    body.put_slice(payload);
    body.freeze()
}

/// Build an audio tag body around an opaque codec payload.
pub fn audio_tag_body(
    codec: AudioCodec,
    sample_rate: u32,
    bit_depth: u8,
    channels: u8,
    packet_type: AacPacketType,
    payload: &[u8],
) -> Bytes {
    let size_bit: u8 = if bit_depth > 8 { 1 } else { 0 };
    let channel_bit: u8 = if channels > 1 { 1 } else { 0 };
    // AAC tags always advertise 44 kHz; the real rate lives in the
    // AudioSpecificConfig.
    let rate_code = match codec {
        AudioCodec::Aac => 3,
        AudioCodec::PcmLe => sound_rate_code(sample_rate),
    };
    let flags = (codec.flv_format() << 4) | (rate_code << 2) | (size_bit << 1) | channel_bit;

    let mut body = BytesMut::with_capacity(payload.len() + 2);
    body.put_u8(flags);
    if codec == AudioCodec::Aac {
        body.put_u8(packet_type as u8);
    }
    body.put_slice(payload);
    body.freeze()
}
