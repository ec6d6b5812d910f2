//! FFmpeg-backed decoding and rendering contexts

use bytes::Bytes;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;

use super::{AudioContextFactory, DecodingContext, RenderingContext};
use crate::error::{FfmpegError, PcmError, Result};
use crate::ffmpeg_utils::helpers::append_frame_as_f32;
use crate::ffmpeg_utils::io::MemoryInput;
use crate::transcode::decoder::AudioDecoder;
use crate::transcode::resampler::{layout_for_channels, AudioResampler};
use crate::types::{DecodedAudioBuffer, ResampledAudioBuffer};

/// Highest channel count a rendering context accepts
pub const MAX_CHANNELS: usize = 64;

/// Factory for FFmpeg contexts. Construction initializes FFmpeg and checks
/// that a resampler can be built; if it cannot, no file could ever succeed.
#[derive(Debug, Clone)]
pub struct FfmpegContextFactory {
    _private: (),
}

impl FfmpegContextFactory {
    pub fn new() -> Result<Self> {
        crate::ffmpeg_utils::init()?;
        AudioResampler::new(ChannelLayout::MONO, 44_100, crate::types::TARGET_SAMPLE_RATE)
            .map_err(|e| PcmError::UnsupportedPlatform(format!("resampler probe failed: {}", e)))?;
        tracing::debug!(
            version = %crate::ffmpeg_utils::version_info(),
            "FFmpeg audio contexts available"
        );
        Ok(Self { _private: () })
    }
}

impl AudioContextFactory for FfmpegContextFactory {
    type Decoding = FfmpegDecodingContext;
    type Rendering = FfmpegRenderingContext;

    fn create_decoding_context(&self) -> Result<FfmpegDecodingContext> {
        Ok(FfmpegDecodingContext { _private: () })
    }

    fn create_rendering_context(
        &self,
        channels: usize,
        frame_count: usize,
        sample_rate: u32,
    ) -> Result<FfmpegRenderingContext> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(PcmError::UnsupportedPlatform(format!(
                "cannot render {} channels (supported: 1..={})",
                channels, MAX_CHANNELS
            )));
        }
        if sample_rate == 0 {
            return Err(PcmError::UnsupportedPlatform(
                "cannot render at 0 Hz".to_string(),
            ));
        }
        Ok(FfmpegRenderingContext {
            channels,
            frame_count,
            sample_rate,
        })
    }
}

/// Decodes one file. The demuxer, AVIO buffer and codec context live only
/// for the duration of a `decode` call.
#[derive(Debug)]
pub struct FfmpegDecodingContext {
    _private: (),
}

impl DecodingContext for FfmpegDecodingContext {
    fn decode(&mut self, bytes: Bytes) -> Result<DecodedAudioBuffer> {
        if bytes.is_empty() {
            return Err(PcmError::Decode("input is empty".to_string()));
        }

        let mut source = MemoryInput::open(bytes)?;

        let (stream_index, mut decoder) = {
            let stream = source
                .input()
                .streams()
                .best(ffmpeg::media::Type::Audio)
                .ok_or_else(|| PcmError::Decode("no audio stream found".to_string()))?;
            (stream.index(), AudioDecoder::open(&stream)?)
        };

        let mut collector = PlaneCollector::default();
        for (stream, packet) in source.input_mut().packets() {
            if stream.index() != stream_index {
                continue;
            }
            decoder.decode_packet(&packet, |frame| collector.push(frame))?;
        }
        decoder.finish(|frame| collector.push(frame))?;

        let decoded = collector.finish()?;
        tracing::debug!(
            stream_index,
            sample_rate = decoded.sample_rate(),
            channels = decoded.channel_count(),
            frames = decoded.frame_count(),
            "decoded input"
        );
        Ok(decoded)
    }
}

/// Accumulates decoded frames into owned planar float buffers.
#[derive(Default)]
struct PlaneCollector {
    sample_rate: u32,
    planes: Vec<Vec<f32>>,
}

impl PlaneCollector {
    fn push(&mut self, frame: &ffmpeg::util::frame::Audio) -> Result<()> {
        if frame.samples() == 0 {
            return Ok(());
        }
        let channels = frame.channels() as usize;
        let rate = frame.rate();

        if self.planes.is_empty() {
            if channels == 0 || rate == 0 {
                return Err(PcmError::Decode(format!(
                    "decoder produced {} channel(s) at {} Hz",
                    channels, rate
                )));
            }
            self.sample_rate = rate;
            self.planes = vec![Vec::new(); channels];
        } else if channels != self.planes.len() || rate != self.sample_rate {
            return Err(PcmError::Decode(format!(
                "stream changed from {} ch @ {} Hz to {} ch @ {} Hz",
                self.planes.len(),
                self.sample_rate,
                channels,
                rate
            )));
        }

        append_frame_as_f32(frame, &mut self.planes)?;
        Ok(())
    }

    fn finish(self) -> Result<DecodedAudioBuffer> {
        if self.planes.first().map_or(true, |p| p.is_empty()) {
            return Err(PcmError::Decode("no audio samples decoded".to_string()));
        }
        DecodedAudioBuffer::new(self.sample_rate, self.planes)
    }
}

/// One-shot offline render into a fixed `(channels, frame_count, rate)` shape.
#[derive(Debug)]
pub struct FfmpegRenderingContext {
    channels: usize,
    frame_count: usize,
    sample_rate: u32,
}

impl FfmpegRenderingContext {
    /// Legacy construction: one mono converter per channel.
    fn render_per_channel(&self, source: &DecodedAudioBuffer) -> Result<Vec<Vec<f32>>> {
        source
            .channels()
            .iter()
            .map(|plane| {
                let mut resampler =
                    AudioResampler::new(ChannelLayout::MONO, source.sample_rate(), self.sample_rate)?;
                let mut out = resampler.process(&[plane.as_slice()])?;
                Ok(out.pop().unwrap_or_default())
            })
            .collect()
    }
}

impl RenderingContext for FfmpegRenderingContext {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn render(self, source: &DecodedAudioBuffer) -> Result<ResampledAudioBuffer> {
        if source.channel_count() != self.channels {
            return Err(PcmError::Render(format!(
                "context sized for {} channel(s), source has {}",
                self.channels,
                source.channel_count()
            )));
        }

        // Structured construction first: one converter for all channels.
        let structured = layout_for_channels(self.channels)
            .ok_or_else(|| {
                FfmpegError::ResamplerCreate(format!(
                    "no default layout for {} channels",
                    self.channels
                ))
            })
            .and_then(|layout| {
                AudioResampler::new(layout, source.sample_rate(), self.sample_rate)
            });

        let mut planes = match structured {
            Ok(mut resampler) => {
                let inputs: Vec<&[f32]> = source.channels().iter().map(Vec::as_slice).collect();
                resampler.process(&inputs)?
            }
            Err(e) => {
                tracing::debug!(error = %e, "multi-channel resampler unavailable, rendering per channel");
                self.render_per_channel(source)?
            }
        };

        for plane in planes.iter_mut() {
            plane.resize(self.frame_count, 0.0);
        }

        tracing::debug!(
            from_rate = source.sample_rate(),
            to_rate = self.sample_rate,
            channels = self.channels,
            frames = self.frame_count,
            "rendered"
        );
        ResampledAudioBuffer::new(self.sample_rate, planes)
    }
}
