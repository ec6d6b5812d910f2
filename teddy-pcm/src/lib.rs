pub(crate) mod api;
pub mod context;
pub(crate) mod error;
pub(crate) mod ffmpeg_utils;
pub mod pipeline;
pub(crate) mod transcode;
pub(crate) mod types;

#[cfg(test)]
pub(crate) mod tests;

pub use api::*;
pub use context::{AudioContextFactory, DecodingContext, FfmpegContextFactory, RenderingContext};
pub use error::{ErrorKind, FfmpegError, PcmError, Result};
pub use ffmpeg_utils::version_info as ffmpeg_version_info;
pub use ffmpeg_utils::{init, install_log_filter};
pub use pipeline::{
    EncodeOrchestrator, EncodeOutcome, FileFailure, PartManifest, PipelineOptions, UploadBatch,
    UploadPart,
};
pub use types::{
    DecodedAudioBuffer, InputAudioFile, InterleavedPcm16, ResampledAudioBuffer, OUTPUT_CHANNELS,
    TARGET_SAMPLE_RATE,
};
