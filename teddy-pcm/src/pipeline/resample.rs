//! Decode and resample stage
//!
//! Turns encoded bytes into float planes at exactly [`TARGET_SAMPLE_RATE`],
//! keeping the source channel count.

use std::sync::Arc;

use bytes::Bytes;

use crate::context::{AudioContextFactory, DecodingContext, RenderingContext};
use crate::error::{PcmError, Result};
use crate::types::{DecodedAudioBuffer, ResampledAudioBuffer, TARGET_SAMPLE_RATE};

/// Length of a source of `source_frames` frames at `source_rate` once
/// rendered at `target_rate`, rounded half up.
pub fn target_frame_count(source_frames: usize, source_rate: u32, target_rate: u32) -> Result<usize> {
    if source_rate == 0 {
        return Err(PcmError::Decode("source sample rate is 0".to_string()));
    }
    let rate = source_rate as u128;
    let frames = (source_frames as u128 * target_rate as u128 + rate / 2) / rate;
    usize::try_from(frames)
        .map_err(|_| PcmError::Render(format!("{} target frames do not fit in memory", frames)))
}

pub struct Resampler<F: AudioContextFactory> {
    factory: Arc<F>,
}

impl<F: AudioContextFactory> Clone for Resampler<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<F: AudioContextFactory> Resampler<F> {
    pub fn new(factory: Arc<F>) -> Self {
        Self { factory }
    }

    /// Decode `bytes` and render them at 48 kHz.
    pub fn resample(&self, bytes: Bytes) -> Result<ResampledAudioBuffer> {
        if bytes.is_empty() {
            return Err(PcmError::Decode("input is empty".to_string()));
        }

        // The decoding context is gone before the rendering context exists.
        let decoded = {
            let mut decoding = self.factory.create_decoding_context()?;
            decoding.decode(bytes)?
        };

        self.render(&decoded)
    }

    /// Render an already decoded buffer at 48 kHz.
    pub fn render(&self, decoded: &DecodedAudioBuffer) -> Result<ResampledAudioBuffer> {
        let target_frames =
            target_frame_count(decoded.frame_count(), decoded.sample_rate(), TARGET_SAMPLE_RATE)?;

        let rendering = self.factory.create_rendering_context(
            decoded.channel_count(),
            target_frames,
            TARGET_SAMPLE_RATE,
        )?;
        let rendered = rendering.render(decoded)?;

        if rendered.sample_rate() != TARGET_SAMPLE_RATE || rendered.frame_count() != target_frames {
            return Err(PcmError::Render(format!(
                "renderer produced {} frames at {} Hz, expected {} at {} Hz",
                rendered.frame_count(),
                rendered.sample_rate(),
                target_frames,
                TARGET_SAMPLE_RATE
            )));
        }
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_frames_common_rates() {
        assert_eq!(target_frame_count(44_100, 44_100, 48_000).unwrap(), 48_000);
        assert_eq!(target_frame_count(8_000, 8_000, 48_000).unwrap(), 48_000);
        assert_eq!(target_frame_count(96_000, 192_000, 48_000).unwrap(), 24_000);
        assert_eq!(target_frame_count(0, 22_050, 48_000).unwrap(), 0);
    }

    #[test]
    fn test_target_frames_rounds_half_up() {
        // 1 * 48000 / 96000 = 0.5 -> 1
        assert_eq!(target_frame_count(1, 96_000, 48_000).unwrap(), 1);
        // 1 * 48000 / 44100 = 1.088 -> 1
        assert_eq!(target_frame_count(1, 44_100, 48_000).unwrap(), 1);
        // 3 * 48000 / 192000 = 0.75 -> 1
        assert_eq!(target_frame_count(3, 192_000, 48_000).unwrap(), 1);
        // 1 * 48000 / 192000 = 0.25 -> 0
        assert_eq!(target_frame_count(1, 192_000, 48_000).unwrap(), 0);
    }

    #[test]
    fn test_target_frames_zero_rate() {
        assert!(matches!(
            target_frame_count(10, 0, 48_000),
            Err(PcmError::Decode(_))
        ));
    }
}
