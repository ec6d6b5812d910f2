use std::sync::Arc;

use bytes::Bytes;

use crate::context::FfmpegContextFactory;
use crate::error::Result;
use crate::pipeline::{EncodeOrchestrator, EncodeOutcome, PipelineOptions};
use crate::types::InputAudioFile;

/// Build an orchestrator backed by FFmpeg.
///
/// Fails with `UnsupportedPlatform` when FFmpeg cannot be initialized or
/// cannot build a resampler; in that case no file would ever succeed.
pub fn ffmpeg_orchestrator(options: PipelineOptions) -> Result<EncodeOrchestrator<FfmpegContextFactory>> {
    let factory = FfmpegContextFactory::new()?;
    Ok(EncodeOrchestrator::new(Arc::new(factory), options))
}

/// Prepare an ordered list of `(declared name, bytes)` pairs on the calling
/// thread.
pub fn prepare_files<I, N>(files: I) -> Result<EncodeOutcome>
where
    I: IntoIterator<Item = (N, Bytes)>,
    N: Into<String>,
{
    let orchestrator = ffmpeg_orchestrator(PipelineOptions::default())?;
    Ok(orchestrator.run_blocking(InputAudioFile::ordered(files)))
}
