//! Stereo reduction and 16-bit quantization

use crate::error::{PcmError, Result};
use crate::types::{InterleavedPcm16, ResampledAudioBuffer, OUTPUT_CHANNELS};

/// Quantize one float sample to signed 16 bit.
///
/// Positive values scale by 32767 and negative ones by 32768 after clamping
/// to [-1, 1]; the product is taken in f64 and truncated toward zero.
/// Non-finite input maps to silence.
#[inline]
pub fn quantize_sample(sample: f32) -> i16 {
    if !sample.is_finite() {
        return 0;
    }
    // An f32 product can round up to the next integer before truncation.
    let s = f64::from(sample).clamp(-1.0, 1.0);
    if s >= 0.0 {
        (s * 32767.0) as i16
    } else {
        (s * 32768.0) as i16
    }
}

/// Interleave the first two channels as PCM16. Mono is duplicated to both
/// sides; channels past the second are ignored.
pub fn mix_to_stereo_pcm16(buffer: &ResampledAudioBuffer) -> Result<InterleavedPcm16> {
    let left = buffer
        .channel(0)
        .ok_or_else(|| PcmError::Render("resampled buffer has no channels".to_string()))?;
    let right = buffer.channel(1).unwrap_or(left);

    let mut samples = Vec::with_capacity(left.len() * OUTPUT_CHANNELS);
    for (&l, &r) in left.iter().zip(right) {
        samples.push(quantize_sample(l));
        samples.push(quantize_sample(r));
    }

    InterleavedPcm16::from_interleaved(samples)
}
