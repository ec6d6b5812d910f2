//! FFmpeg module - provides wrappers and utilities for FFmpeg library access
//!
//! This module handles:
//! - One-time FFmpeg initialization
//! - Routing FFmpeg's log output through `tracing`
//! - Reading encoded input from memory (custom AVIOContext)
//! - Audio plane access and sample format conversion

pub mod helpers;
pub mod io;

pub use ffmpeg_next as ffmpeg;

use std::sync::OnceLock;

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialize the FFmpeg library.
///
/// Safe to call more than once; only the first call reaches FFmpeg and every
/// later call returns the cached outcome.
pub fn init() -> Result<(), crate::error::FfmpegError> {
    INIT.get_or_init(|| {
        ffmpeg::init().map_err(|e| format!("ffmpeg::init() failed: {}", e))?;
        tracing::info!("FFmpeg initialized");
        Ok(())
    })
    .clone()
    .map_err(crate::error::FfmpegError::InitFailed)
}

/// Install a custom FFmpeg log callback that forwards messages to `tracing`
/// and drops known-noisy ones.
///
/// Must be called after `init()` and before conversions start, because
/// altering the global log callback is not thread-safe.
pub fn install_log_filter() {
    // SAFETY: both functions modify global FFmpeg state and are safe to call
    // after `ffmpeg::init()`. They are called once at startup.
    unsafe {
        ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_WARNING as i32);
        ffmpeg_next::ffi::av_log_set_callback(Some(ffmpeg_log_callback));
    }
}

/// Probe noise produced for every in-memory input that has no file name.
const SUPPRESSED_MESSAGES: &[&str] = &[
    "detected only with low score",
    "Estimating duration from bitrate",
    "Could not update timestamps for skipped samples",
    "Could not update timestamps for discarded samples",
];

unsafe extern "C" fn ffmpeg_log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: ffmpeg_next::ffi::va_list,
) {
    use std::ffi::CStr;

    if level > unsafe { ffmpeg_next::ffi::av_log_get_level() } {
        return;
    }

    let mut buf = [0 as std::ffi::c_char; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg_next::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );

    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();
    let msg = msg.trim_end();
    if msg.is_empty() || SUPPRESSED_MESSAGES.iter().any(|s| msg.contains(s)) {
        return;
    }

    if level <= ffmpeg_next::ffi::AV_LOG_ERROR as std::ffi::c_int {
        tracing::error!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg_next::ffi::AV_LOG_WARNING as std::ffi::c_int {
        tracing::warn!(target: "ffmpeg", "{}", msg);
    } else {
        tracing::debug!(target: "ffmpeg", "{}", msg);
    }
}

/// Version string of the linked libavutil.
pub fn version_info() -> String {
    // SAFETY: av_version_info returns a pointer to a static NUL-terminated
    // string owned by libavutil.
    unsafe {
        let ptr = ffmpeg::ffi::av_version_info();
        if ptr.is_null() {
            return "unknown".to_string();
        }
        std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init().is_ok());
        assert!(init().is_ok());
    }

    #[test]
    fn test_version_info_not_empty() {
        assert!(!version_info().is_empty());
    }
}
