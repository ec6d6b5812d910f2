//! Safe wrappers around FFmpeg frame access.
//!
//! All `unsafe` plane access is contained here with explicit safety
//! arguments; callers convert frames to owned `Vec<f32>` planes and never
//! touch raw frame memory themselves.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::format::sample::{Sample, Type};

use crate::error::FfmpegError;

// ── FLTP audio plane reinterpretation ───────────────────────────────────────

/// Reinterpret a raw byte slice from an FLTP audio plane as `&[f32]`.
///
/// Returns `None` if the pointer is not 4-byte aligned or the slice holds
/// fewer than `sample_count` floats.
pub fn fltp_plane_as_f32(byte_slice: &[u8], sample_count: usize) -> Option<&[f32]> {
    let expected_bytes = sample_count.checked_mul(4)?;
    if byte_slice.len() < expected_bytes {
        return None;
    }
    let ptr = byte_slice.as_ptr();
    if (ptr as usize) % std::mem::align_of::<f32>() != 0 {
        return None;
    }
    // SAFETY: alignment and length are verified above. FLTP planes are
    // native-endian f32 values laid out contiguously.
    Some(unsafe { std::slice::from_raw_parts(ptr as *const f32, sample_count) })
}

/// Mutable version of [`fltp_plane_as_f32`].
pub fn fltp_plane_as_f32_mut(byte_slice: &mut [u8], sample_count: usize) -> Option<&mut [f32]> {
    let expected_bytes = sample_count.checked_mul(4)?;
    if byte_slice.len() < expected_bytes {
        return None;
    }
    let ptr = byte_slice.as_mut_ptr();
    if (ptr as usize) % std::mem::align_of::<f32>() != 0 {
        return None;
    }
    // SAFETY: as above; the mutable borrow of `byte_slice` is held for the
    // lifetime of the returned slice.
    Some(unsafe { std::slice::from_raw_parts_mut(ptr as *mut f32, sample_count) })
}

/// Extract an audio plane slice from an `AVFrame`.
///
/// Works around `ffmpeg-next`'s `Audio::data(index)` which stops counting
/// planes when `linesize[1] == 0`; planar audio frames usually only populate
/// `linesize[0]` for every plane.
pub fn audio_plane_data(frame: &ffmpeg::util::frame::Audio, index: usize) -> &[u8] {
    // SAFETY: the frame pointer is valid for the lifetime of `frame`; the
    // plane index is bounds-checked against the channel count (planar) or
    // restricted to 0 (packed) before `extended_data` is dereferenced.
    unsafe {
        let f = frame.as_ptr();
        let channels = (*f).ch_layout.nb_channels as usize;

        if frame.format().is_planar() {
            if index >= channels {
                return &[];
            }
        } else if index > 0 {
            return &[];
        }

        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &[];
        }

        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &[];
        }

        let size = (*f).linesize[0] as usize;
        std::slice::from_raw_parts(plane_ptr, size)
    }
}

/// Mutable version of [`audio_plane_data`].
pub fn audio_plane_data_mut(frame: &mut ffmpeg::util::frame::Audio, index: usize) -> &mut [u8] {
    // SAFETY: see `audio_plane_data`.
    unsafe {
        let f = frame.as_mut_ptr();
        let channels = (*f).ch_layout.nb_channels as usize;

        if frame.format().is_planar() {
            if index >= channels {
                return &mut [];
            }
        } else if index > 0 {
            return &mut [];
        }

        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &mut [];
        }

        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &mut [];
        }

        let size = (*f).linesize[0] as usize;
        std::slice::from_raw_parts_mut(plane_ptr, size)
    }
}

// ── Sample format conversion ────────────────────────────────────────────────

fn u8_to_f32(b: &[u8]) -> f32 {
    (b[0] as f32 - 128.0) / 128.0
}

fn i16_to_f32(b: &[u8]) -> f32 {
    i16::from_ne_bytes([b[0], b[1]]) as f32 / 32_768.0
}

fn i32_to_f32(b: &[u8]) -> f32 {
    (i32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f64 / 2_147_483_648.0) as f32
}

fn i64_to_f32(b: &[u8]) -> f32 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(b);
    (i64::from_ne_bytes(raw) as f64 / 9_223_372_036_854_775_808.0) as f32
}

fn f32_to_f32(b: &[u8]) -> f32 {
    f32::from_ne_bytes([b[0], b[1], b[2], b[3]])
}

fn f64_to_f32(b: &[u8]) -> f32 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(b);
    f64::from_ne_bytes(raw) as f32
}

/// Per-sample converter and byte width for a decoder output format.
fn sample_reader(format: Sample) -> Result<(fn(&[u8]) -> f32, usize), FfmpegError> {
    match format {
        Sample::U8(_) => Ok((u8_to_f32, 1)),
        Sample::I16(_) => Ok((i16_to_f32, 2)),
        Sample::I32(_) => Ok((i32_to_f32, 4)),
        Sample::I64(_) => Ok((i64_to_f32, 8)),
        Sample::F32(_) => Ok((f32_to_f32, 4)),
        Sample::F64(_) => Ok((f64_to_f32, 8)),
        Sample::None => Err(FfmpegError::SampleFormat("none".to_string())),
    }
}

/// Convert one decoded frame of any PCM sample format into planar `f32`,
/// appending to `planes` (one `Vec` per channel).
///
/// `planes.len()` must equal the frame's channel count.
pub fn append_frame_as_f32(
    frame: &ffmpeg::util::frame::Audio,
    planes: &mut [Vec<f32>],
) -> Result<(), FfmpegError> {
    let format = frame.format();
    let channels = planes.len();
    let samples = frame.samples();
    let (read, width) = sample_reader(format)?;

    if matches!(format, Sample::F32(Type::Planar)) {
        for (ch, plane) in planes.iter_mut().enumerate() {
            let floats = fltp_plane_as_f32(audio_plane_data(frame, ch), samples).ok_or_else(
                || FfmpegError::SampleFormat(format!("short FLTP plane {} ({} samples)", ch, samples)),
            )?;
            plane.extend_from_slice(floats);
        }
        return Ok(());
    }

    if format.is_planar() {
        let needed = samples * width;
        for (ch, plane) in planes.iter_mut().enumerate() {
            let data = audio_plane_data(frame, ch);
            if data.len() < needed {
                return Err(FfmpegError::SampleFormat(format!(
                    "plane {} holds {} bytes, expected {}",
                    ch,
                    data.len(),
                    needed
                )));
            }
            plane.extend(data[..needed].chunks_exact(width).map(read));
        }
    } else {
        let needed = samples * channels * width;
        let data = audio_plane_data(frame, 0);
        if data.len() < needed {
            return Err(FfmpegError::SampleFormat(format!(
                "packed plane holds {} bytes, expected {}",
                data.len(),
                needed
            )));
        }
        for (i, chunk) in data[..needed].chunks_exact(width).enumerate() {
            planes[i % channels].push(read(chunk));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_conversions_are_normalized() {
        assert_eq!(u8_to_f32(&[128]), 0.0);
        assert_eq!(u8_to_f32(&[0]), -1.0);
        assert_eq!(i16_to_f32(&i16::MIN.to_ne_bytes()), -1.0);
        assert_eq!(i16_to_f32(&16_384i16.to_ne_bytes()), 0.5);
        assert_eq!(i32_to_f32(&i32::MIN.to_ne_bytes()), -1.0);
        assert_eq!(f64_to_f32(&0.25f64.to_ne_bytes()), 0.25);
    }

    #[test]
    fn test_sample_reader_rejects_none() {
        assert!(sample_reader(Sample::None).is_err());
        assert_eq!(sample_reader(Sample::I16(Type::Packed)).unwrap().1, 2);
    }

    #[test]
    fn test_fltp_plane_length_check() {
        let bytes = vec![0u8; 16];
        // Vec<u8> allocations are not guaranteed 4-byte aligned, so only the
        // length rejection is asserted unconditionally.
        assert!(fltp_plane_as_f32(&bytes, 5).is_none());
    }
}
