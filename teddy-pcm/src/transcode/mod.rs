//! Low-level FFmpeg audio stages: packet decoding and sample-rate conversion.

pub mod decoder;
pub mod resampler;
