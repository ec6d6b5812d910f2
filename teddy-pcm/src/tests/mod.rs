//! Integration testing module
//!
//! FFmpeg-backed tests of the whole preparation pipeline:
//! - Rate conversion to 48 kHz from common source rates
//! - Stereo reduction and quantization of decoded input
//! - Part naming, failure isolation and determinism across a batch

pub mod e2e;
