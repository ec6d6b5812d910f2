//! Sample-rate converter wrapping FFmpeg's `SwrContext`
//!
//! Input and output are planar `f32` with the same channel count; only the
//! rate changes. Channel reduction to stereo happens later in the mixer.

use crate::error::FfmpegError;
use crate::ffmpeg_utils::helpers::{audio_plane_data, audio_plane_data_mut, fltp_plane_as_f32, fltp_plane_as_f32_mut};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::{Sample, Type};

/// Working sample format on both sides of the converter
pub const WORK_SAMPLE_FORMAT: Sample = Sample::F32(Type::Planar);

/// Number of source frames pushed through the converter per call
const CHUNK_FRAMES: usize = 16 * 1024;

/// Upper bound on flush iterations; each one drains at most one output frame
const MAX_FLUSH_ROUNDS: usize = 64;

/// Channel layout used for a multi-channel converter with `channels` planes.
///
/// Returns `None` when FFmpeg has no default layout for that count.
pub fn layout_for_channels(channels: usize) -> Option<ChannelLayout> {
    let layout = match channels {
        1 => ChannelLayout::MONO,
        2 => ChannelLayout::STEREO,
        n => ChannelLayout::default(n as i32),
    };
    if layout.bits() == 0 || layout.channels() as usize != channels {
        return None;
    }
    Some(layout)
}

/// One `SwrContext` converting `layout` planes from `src_rate` to `dst_rate`.
pub struct AudioResampler {
    context: resampling::Context,
    layout: ChannelLayout,
    channels: usize,
    src_rate: u32,
    dst_rate: u32,
}

impl AudioResampler {
    pub fn new(layout: ChannelLayout, src_rate: u32, dst_rate: u32) -> Result<Self, FfmpegError> {
        let context = resampling::Context::get(
            WORK_SAMPLE_FORMAT,
            layout,
            src_rate,
            WORK_SAMPLE_FORMAT,
            layout,
            dst_rate,
        )
        .map_err(|e| {
            FfmpegError::ResamplerCreate(format!(
                "{} channel(s) {} Hz -> {} Hz: {}",
                layout.channels(),
                src_rate,
                dst_rate,
                e
            ))
        })?;

        Ok(Self {
            context,
            layout,
            channels: layout.channels() as usize,
            src_rate,
            dst_rate,
        })
    }

    /// Convert whole planes in one pass and return the complete output,
    /// including the samples held back in the converter's delay line.
    ///
    /// `planes.len()` must equal the converter's channel count.
    pub fn process(&mut self, planes: &[&[f32]]) -> Result<Vec<Vec<f32>>, FfmpegError> {
        if planes.len() != self.channels {
            return Err(FfmpegError::Resample(format!(
                "expected {} planes, got {}",
                self.channels,
                planes.len()
            )));
        }

        let total = planes.first().map(|p| p.len()).unwrap_or(0);
        let expected = (total as u64 * self.dst_rate as u64 / self.src_rate.max(1) as u64) as usize;
        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + 64); self.channels];

        let mut offset = 0;
        while offset < total {
            let n = CHUNK_FRAMES.min(total - offset);
            let mut input = ffmpeg::util::frame::Audio::new(WORK_SAMPLE_FORMAT, n, self.layout);
            input.set_rate(self.src_rate);
            for (ch, plane) in planes.iter().enumerate() {
                let dst = fltp_plane_as_f32_mut(audio_plane_data_mut(&mut input, ch), n)
                    .ok_or_else(|| FfmpegError::Resample("input plane misaligned".into()))?;
                dst.copy_from_slice(&plane[offset..offset + n]);
            }

            let mut out = self.output_frame(n);
            self.context
                .run(&input, &mut out)
                .map_err(|e| FfmpegError::Resample(format!("swr run: {}", e)))?;
            self.append(&out, &mut output)?;
            offset += n;
        }

        for _ in 0..MAX_FLUSH_ROUNDS {
            let mut out = self.output_frame(0);
            match self.context.flush(&mut out) {
                Ok(_) => {}
                Err(e) => {
                    // Passthrough contexts have nothing buffered and report
                    // an error on flush.
                    tracing::trace!("resampler flush returned non-fatal error: {}", e);
                    break;
                }
            }
            if out.samples() == 0 {
                break;
            }
            self.append(&out, &mut output)?;
        }

        Ok(output)
    }

    /// Pre-allocated output frame large enough for `input_frames` converted
    /// frames plus the converter's delay line.
    fn output_frame(&self, input_frames: usize) -> ffmpeg::util::frame::Audio {
        let converted = (input_frames as u64 * self.dst_rate as u64)
            .div_ceil(self.src_rate.max(1) as u64) as usize;
        let capacity = converted + 256;
        let mut out = ffmpeg::util::frame::Audio::new(WORK_SAMPLE_FORMAT, capacity, self.layout);
        out.set_rate(self.dst_rate);
        out
    }

    fn append(
        &self,
        frame: &ffmpeg::util::frame::Audio,
        output: &mut [Vec<f32>],
    ) -> Result<(), FfmpegError> {
        let n = frame.samples();
        if n == 0 {
            return Ok(());
        }
        for (ch, plane) in output.iter_mut().enumerate() {
            let floats = fltp_plane_as_f32(audio_plane_data(frame, ch), n)
                .ok_or_else(|| FfmpegError::Resample("output plane misaligned".into()))?;
            plane.extend_from_slice(floats);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_for_common_counts() {
        assert_eq!(layout_for_channels(1), Some(ChannelLayout::MONO));
        assert_eq!(layout_for_channels(2), Some(ChannelLayout::STEREO));
        assert_eq!(layout_for_channels(6).map(|l| l.channels()), Some(6));
    }

    #[test]
    fn test_layout_for_zero_channels() {
        assert!(layout_for_channels(0).is_none());
    }

    #[test]
    fn test_upsample_produces_expected_length() {
        crate::ffmpeg_utils::init().unwrap();
        let mut rs = AudioResampler::new(ChannelLayout::MONO, 8_000, 48_000).unwrap();
        let plane = vec![0.25f32; 8_000];
        let out = rs.process(&[&plane]).unwrap();
        assert_eq!(out.len(), 1);
        let produced = out[0].len() as i64;
        assert!((produced - 48_000).abs() <= 64, "produced {} frames", produced);
    }

    #[test]
    fn test_same_rate_is_passthrough() {
        crate::ffmpeg_utils::init().unwrap();
        let mut rs = AudioResampler::new(ChannelLayout::STEREO, 48_000, 48_000).unwrap();
        let left: Vec<f32> = (0..1_000).map(|i| i as f32 / 1_000.0).collect();
        let right = vec![-0.5f32; 1_000];
        let out = rs.process(&[&left, &right]).unwrap();
        assert_eq!(out[0], left);
        assert_eq!(out[1], right);
    }
}
