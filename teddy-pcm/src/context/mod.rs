//! Audio context factory
//!
//! The pipeline never talks to a decoding library directly. It asks an
//! [`AudioContextFactory`] for a fresh [`DecodingContext`] per file and a
//! one-shot [`RenderingContext`] per render pass, and drops both as soon as
//! they have been used. The factory is resolved once at startup; FFmpeg is
//! the only implementation shipped with the crate.

pub mod ffmpeg;

pub use self::ffmpeg::FfmpegContextFactory;

use bytes::Bytes;

use crate::error::Result;
use crate::types::{DecodedAudioBuffer, ResampledAudioBuffer};

/// Decodes an encoded byte buffer into native-rate float PCM.
///
/// Platform resources held by an implementation are released when the
/// context is dropped.
pub trait DecodingContext {
    fn decode(&mut self, bytes: Bytes) -> Result<DecodedAudioBuffer>;
}

/// Performs one deterministic, non-realtime render pass.
///
/// `render` consumes the context, so one context can never serve two renders.
pub trait RenderingContext {
    fn channel_count(&self) -> usize;
    fn frame_count(&self) -> usize;
    fn sample_rate(&self) -> u32;

    fn render(self, source: &DecodedAudioBuffer) -> Result<ResampledAudioBuffer>;
}

/// Produces decoding and rendering contexts.
pub trait AudioContextFactory: Send + Sync {
    type Decoding: DecodingContext;
    type Rendering: RenderingContext;

    /// Fails with `UnsupportedPlatform` when no decoding capability exists.
    fn create_decoding_context(&self) -> Result<Self::Decoding>;

    /// Fails with `UnsupportedPlatform` when the context cannot be built for
    /// the requested shape.
    fn create_rendering_context(
        &self,
        channels: usize,
        frame_count: usize,
        sample_rate: u32,
    ) -> Result<Self::Rendering>;
}
