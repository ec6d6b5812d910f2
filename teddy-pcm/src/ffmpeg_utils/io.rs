//! Custom AVIOContext for in-memory reading
//!
//! Lets FFmpeg probe and demux an encoded file that only exists as a byte
//! buffer, without touching the filesystem.
//!
//! # Ownership
//! [`MemoryInput`] owns the demuxer context, the AVIO context with its
//! internal buffer, and the boxed [`MemoryReader`] the callbacks point to.
//! All three are released in `Drop`, in that order, whether decoding
//! finished, failed, or unwound.

use bytes::Bytes;
use ffmpeg_next as ffmpeg;
use std::ffi::{c_int, c_void};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::mem::ManuallyDrop;
use std::ptr;

use crate::error::FfmpegError;

/// Size of the AVIO read buffer handed to FFmpeg
const AVIO_BUFFER_SIZE: usize = 32 * 1024;

/// `AVSEEK_SIZE` whence flag: report the stream size instead of seeking
const AVSEEK_SIZE: c_int = 0x10000;

/// Read cursor over an encoded input buffer.
/// Single-threaded use only; one instance per demuxer.
pub struct MemoryReader {
    cursor: Cursor<Bytes>,
}

impl MemoryReader {
    pub fn new(data: Bytes) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Total size of the underlying buffer
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

// C-compatible callbacks for FFmpeg

unsafe extern "C" fn read_packet(opaque: *mut c_void, buf: *mut u8, buf_size: c_int) -> c_int {
    let reader = &mut *(opaque as *mut MemoryReader);
    if buf_size <= 0 {
        return 0;
    }
    let slice = std::slice::from_raw_parts_mut(buf, buf_size as usize);
    match reader.read(slice) {
        Ok(0) => ffmpeg::ffi::AVERROR_EOF,
        Ok(n) => n as c_int,
        Err(_) => ffmpeg::ffi::AVERROR_EOF,
    }
}

unsafe extern "C" fn seek_packet(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
    let reader = &mut *(opaque as *mut MemoryReader);

    if whence & AVSEEK_SIZE != 0 {
        return reader.len() as i64;
    }

    // AVSEEK_FORCE may be or'ed into whence; only the low bits select the origin
    let seek_from = match whence & 0x3 {
        0 => {
            if offset < 0 {
                return -1;
            }
            SeekFrom::Start(offset as u64)
        }
        1 => SeekFrom::Current(offset),
        2 => SeekFrom::End(offset),
        _ => return -1,
    };
    match reader.seek(seek_from) {
        Ok(pos) => pos as i64,
        Err(_) => -1,
    }
}

/// Free an AVIO context allocated by `avio_alloc_context` together with its
/// current internal buffer (FFmpeg may have replaced the one we passed in).
unsafe fn free_avio(avio: &mut *mut ffmpeg::ffi::AVIOContext) {
    if avio.is_null() {
        return;
    }
    ffmpeg::ffi::av_freep(&mut (**avio).buffer as *mut *mut u8 as *mut c_void);
    ffmpeg::ffi::avio_context_free(avio);
}

/// A demuxer reading from an in-memory buffer.
pub struct MemoryInput {
    input: ManuallyDrop<ffmpeg::format::context::Input>,
    avio: *mut ffmpeg::ffi::AVIOContext,
    reader: *mut MemoryReader,
}

impl MemoryInput {
    /// Probe `data` and open a demuxer over it.
    ///
    /// Fails with [`FfmpegError::OpenInput`] when FFmpeg does not recognise
    /// the container and [`FfmpegError::FindStreamInfo`] when the streams
    /// cannot be analysed.
    pub fn open(data: Bytes) -> Result<Self, FfmpegError> {
        if data.is_empty() {
            return Err(FfmpegError::OpenInput("input buffer is empty".to_string()));
        }

        // SAFETY: every pointer allocated here is either handed to the
        // returned MemoryInput (which frees it in Drop) or freed on the error
        // path before returning. The reader is boxed so its address stays
        // stable for the callbacks.
        unsafe {
            let reader_ptr = Box::into_raw(Box::new(MemoryReader::new(data)));

            let buffer = ffmpeg::ffi::av_malloc(AVIO_BUFFER_SIZE) as *mut u8;
            if buffer.is_null() {
                drop(Box::from_raw(reader_ptr));
                return Err(FfmpegError::InitFailed(
                    "Failed to allocate AVIO buffer".to_string(),
                ));
            }

            let mut avio = ffmpeg::ffi::avio_alloc_context(
                buffer,
                AVIO_BUFFER_SIZE as c_int,
                0,
                reader_ptr as *mut c_void,
                Some(read_packet),
                None,
                Some(seek_packet),
            );
            if avio.is_null() {
                ffmpeg::ffi::av_free(buffer as *mut c_void);
                drop(Box::from_raw(reader_ptr));
                return Err(FfmpegError::InitFailed(
                    "Failed to allocate AVIO context".to_string(),
                ));
            }

            let mut ctx = ffmpeg::ffi::avformat_alloc_context();
            if ctx.is_null() {
                free_avio(&mut avio);
                drop(Box::from_raw(reader_ptr));
                return Err(FfmpegError::InitFailed(
                    "Failed to allocate format context".to_string(),
                ));
            }
            (*ctx).pb = avio;
            (*ctx).flags |= ffmpeg::ffi::AVFMT_FLAG_CUSTOM_IO as c_int;

            // On failure avformat_open_input frees `ctx` but leaves custom IO alone.
            let ret = ffmpeg::ffi::avformat_open_input(
                &mut ctx,
                ptr::null(),
                ptr::null(),
                ptr::null_mut(),
            );
            if ret < 0 {
                free_avio(&mut avio);
                drop(Box::from_raw(reader_ptr));
                return Err(FfmpegError::OpenInput(ffmpeg::Error::from(ret).to_string()));
            }

            let ret = ffmpeg::ffi::avformat_find_stream_info(ctx, ptr::null_mut());
            if ret < 0 {
                ffmpeg::ffi::avformat_close_input(&mut ctx);
                free_avio(&mut avio);
                drop(Box::from_raw(reader_ptr));
                return Err(FfmpegError::FindStreamInfo(
                    ffmpeg::Error::from(ret).to_string(),
                ));
            }

            tracing::trace!("opened in-memory input");

            Ok(Self {
                input: ManuallyDrop::new(ffmpeg::format::context::Input::wrap(ctx)),
                avio,
                reader: reader_ptr,
            })
        }
    }

    pub fn input(&self) -> &ffmpeg::format::context::Input {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut ffmpeg::format::context::Input {
        &mut self.input
    }
}

impl Drop for MemoryInput {
    fn drop(&mut self) {
        // SAFETY: the demuxer is closed first (it still references the AVIO
        // context), then the AVIO context and its buffer, then the reader the
        // callbacks pointed to. Each pointer is owned exclusively by `self`.
        unsafe {
            ManuallyDrop::drop(&mut self.input);
            free_avio(&mut self.avio);
            drop(Box::from_raw(self.reader));
        }
        tracing::trace!("released in-memory input");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reader_reads_and_seeks() {
        let mut reader = MemoryReader::new(Bytes::from_static(b"RIFFdata"));
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"RIFF");
        reader.seek(SeekFrom::Start(0)).unwrap();
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"RIFF");
        assert_eq!(reader.len(), 8);
    }

    #[test]
    fn test_open_rejects_empty_buffer() {
        let err = MemoryInput::open(Bytes::new()).err().unwrap();
        assert!(matches!(err, FfmpegError::OpenInput(_)));
    }
}
