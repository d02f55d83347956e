//! AMF (Action Message Format) encoding and decoding
//!
//! RTMP control-channel commands are AMF0-encoded. This module provides
//! the value tree plus a strict AMF0 encoder/decoder pair.

pub mod amf0;
pub mod value;

pub use amf0::{Amf0Decoder, Amf0Encoder};
pub use value::AmfValue;
