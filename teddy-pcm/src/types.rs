//! Data model of the preparation pipeline
//!
//! Buffers are explicitly owned per stage: the decoder produces a
//! [`DecodedAudioBuffer`], the renderer a [`ResampledAudioBuffer`], the mixer
//! an [`InterleavedPcm16`]. Each stage consumes or borrows the previous one
//! and nothing is kept across files.

use bytes::Bytes;

use crate::error::{PcmError, Result};

/// Every prepared buffer is rendered at this rate.
pub const TARGET_SAMPLE_RATE: u32 = 48_000;

/// Every prepared buffer has exactly this many channels.
pub const OUTPUT_CHANNELS: usize = 2;

/// One user-selected audio file.
#[derive(Debug, Clone)]
pub struct InputAudioFile {
    name: String,
    data: Bytes,
    index: usize,
}

impl InputAudioFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>, index: usize) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            index,
        }
    }

    /// Build an ordered file list; each file's index is its list position.
    pub fn ordered<I, N, D>(files: I) -> Vec<Self>
    where
        I: IntoIterator<Item = (N, D)>,
        N: Into<String>,
        D: Into<Bytes>,
    {
        files
            .into_iter()
            .enumerate()
            .map(|(index, (name, data))| Self::new(name, data, index))
            .collect()
    }

    /// Declared file name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw encoded bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Position in the user-ordered list
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Planar float samples shared by the decoded and resampled buffers.
fn validate_planes(planes: &[Vec<f32>], sample_rate: u32) -> Result<()> {
    if planes.is_empty() {
        return Err(PcmError::Decode("audio buffer has no channels".into()));
    }
    if sample_rate == 0 {
        return Err(PcmError::Decode("audio buffer has a zero sample rate".into()));
    }
    let frames = planes[0].len();
    if planes.iter().any(|p| p.len() != frames) {
        return Err(PcmError::Decode(
            "audio buffer channels have different lengths".into(),
        ));
    }
    Ok(())
}

/// Decoded audio at the source's native rate and channel count.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl DecodedAudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        validate_planes(&channels, sample_rate)?;
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }
}

/// Audio rendered at [`TARGET_SAMPLE_RATE`], source channel count preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledAudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl ResampledAudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        validate_planes(&channels, sample_rate).map_err(|e| PcmError::Render(e.to_string()))?;
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }
}

/// Interleaved stereo signed 16-bit PCM: `[L0, R0, L1, R1, ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterleavedPcm16 {
    samples: Vec<i16>,
}

impl InterleavedPcm16 {
    /// Wrap interleaved stereo samples. Odd lengths are rejected.
    pub fn from_interleaved(samples: Vec<i16>) -> Result<Self> {
        if samples.len() % OUTPUT_CHANNELS != 0 {
            return Err(PcmError::Render(format!(
                "interleaved stereo buffer has odd length {}",
                samples.len()
            )));
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / OUTPUT_CHANNELS
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Size of the little-endian payload in bytes
    pub fn byte_len(&self) -> usize {
        self.samples.len() * std::mem::size_of::<i16>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_assigns_positions() {
        let files = InputAudioFile::ordered(vec![
            ("a.mp3", Bytes::from_static(b"a")),
            ("b.mp3", Bytes::from_static(b"b")),
            ("a.mp3", Bytes::from_static(b"c")),
        ]);
        let indices: Vec<usize> = files.iter().map(|f| f.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(files[2].name(), "a.mp3");
    }

    #[test]
    fn test_decoded_buffer_rejects_ragged_channels() {
        let err = DecodedAudioBuffer::new(44_100, vec![vec![0.0; 4], vec![0.0; 3]]);
        assert!(matches!(err, Err(PcmError::Decode(_))));
    }

    #[test]
    fn test_decoded_buffer_rejects_no_channels() {
        assert!(DecodedAudioBuffer::new(44_100, vec![]).is_err());
    }

    #[test]
    fn test_interleaved_rejects_odd_length() {
        assert!(InterleavedPcm16::from_interleaved(vec![1, 2, 3]).is_err());
        let pcm = InterleavedPcm16::from_interleaved(vec![1, 2, 3, 4]).unwrap();
        assert_eq!(pcm.frame_count(), 2);
        assert_eq!(pcm.byte_len(), 8);
    }
}
