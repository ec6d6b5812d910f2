use serde::Serialize;
use thiserror::Error;

/// Main error type for the PCM preparation pipeline
#[derive(Error, Debug)]
pub enum PcmError {
    /// The host lacks a required decoding/rendering capability, or a context
    /// could not be constructed
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The input bytes are not valid or playable audio
    #[error("Decode error: {0}")]
    Decode(String),

    /// The offline render (sample-rate conversion) failed while running
    #[error("Render error: {0}")]
    Render(String),

    /// A part with the same generated name already exists in the batch
    #[error("Duplicate part name in batch: {0}")]
    DuplicatePart(String),

    /// A blocking conversion task did not complete
    #[error("Conversion task failed: {0}")]
    Task(String),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// FFmpeg-specific errors, mapped onto [`PcmError`] at the context boundary
#[derive(Error, Debug)]
pub enum FfmpegError {
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    #[error("Failed to open input: {0}")]
    OpenInput(String),

    #[error("Failed to find stream info: {0}")]
    FindStreamInfo(String),

    #[error("Failed to find decoder: {0}")]
    DecoderNotFound(String),

    #[error("Failed to decode packet: {0}")]
    DecodePacket(String),

    #[error("Failed to create resampler: {0}")]
    ResamplerCreate(String),

    #[error("Resampling error: {0}")]
    Resample(String),

    #[error("Unsupported sample format: {0}")]
    SampleFormat(String),
}

impl From<FfmpegError> for PcmError {
    fn from(err: FfmpegError) -> Self {
        match err {
            FfmpegError::InitFailed(_) | FfmpegError::ResamplerCreate(_) => {
                PcmError::UnsupportedPlatform(err.to_string())
            }
            FfmpegError::Resample(_) => PcmError::Render(err.to_string()),
            FfmpegError::OpenInput(_)
            | FfmpegError::FindStreamInfo(_)
            | FfmpegError::DecoderNotFound(_)
            | FfmpegError::DecodePacket(_)
            | FfmpegError::SampleFormat(_) => PcmError::Decode(err.to_string()),
        }
    }
}

/// Stable, serializable classification of a [`PcmError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedPlatform,
    DecodeError,
    RenderError,
    DuplicatePart,
    TaskFailed,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedPlatform => "unsupported_platform",
            ErrorKind::DecodeError => "decode_error",
            ErrorKind::RenderError => "render_error",
            ErrorKind::DuplicatePart => "duplicate_part",
            ErrorKind::TaskFailed => "task_failed",
            ErrorKind::Io => "io",
        }
    }
}

impl PcmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PcmError::UnsupportedPlatform(_) => ErrorKind::UnsupportedPlatform,
            PcmError::Decode(_) => ErrorKind::DecodeError,
            PcmError::Render(_) => ErrorKind::RenderError,
            PcmError::DuplicatePart(_) => ErrorKind::DuplicatePart,
            PcmError::Task(_) => ErrorKind::TaskFailed,
            PcmError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PcmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_open_failure_is_decode_error() {
        let err: PcmError = FfmpegError::OpenInput("Invalid data found".into()).into();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
    }

    #[test]
    fn test_resampler_construction_is_platform_error() {
        let err: PcmError = FfmpegError::ResamplerCreate("swr_init".into()).into();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::DecodeError).unwrap();
        assert_eq!(json, "\"decode_error\"");
        assert_eq!(ErrorKind::UnsupportedPlatform.as_str(), "unsupported_platform");
    }
}
