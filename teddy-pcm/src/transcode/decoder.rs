//! Audio decoder
//!
//! Wraps an FFmpeg `AVCodecContext` and pushes every decoded PCM frame into a
//! caller-supplied sink. Supports whatever FFmpeg was built with (MP3, AAC,
//! Vorbis, Opus, FLAC, PCM WAV, ...).

use crate::error::FfmpegError;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::frame::Audio;

/// EAGAIN and EOF both mean "nothing more to hand out right now".
fn is_drained(err: &ffmpeg::Error) -> bool {
    match err {
        ffmpeg::Error::Eof => true,
        ffmpeg::Error::Other { errno } => *errno == ffmpeg::error::EAGAIN,
        _ => false,
    }
}

/// Decoder for the single audio stream of one input file
pub struct AudioDecoder {
    decoder: ffmpeg::decoder::Audio,
    stream_index: usize,
    skipped_packets: usize,
}

impl AudioDecoder {
    /// Open a decoder configured from the stream's codec parameters.
    pub fn open(stream: &ffmpeg::format::stream::Stream) -> Result<Self, FfmpegError> {
        let stream_index = stream.index();
        let decoder = ffmpeg::codec::Context::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().audio())
            .map_err(|e| {
                FfmpegError::DecoderNotFound(format!("audio stream {}: {}", stream_index, e))
            })?;

        Ok(Self {
            decoder,
            stream_index,
            skipped_packets: 0,
        })
    }

    /// Decode one packet and hand every frame it completes to `sink`.
    ///
    /// A packet rejected as invalid data is skipped; the rest of the file
    /// may still be playable.
    pub fn decode_packet<E, F>(
        &mut self,
        packet: &ffmpeg::codec::packet::Packet,
        sink: F,
    ) -> Result<(), E>
    where
        E: From<FfmpegError>,
        F: FnMut(&Audio) -> Result<(), E>,
    {
        match self.decoder.send_packet(packet) {
            Ok(()) => {}
            Err(ffmpeg::Error::InvalidData) => {
                self.skipped_packets += 1;
                tracing::debug!(stream_index = self.stream_index, "skipping invalid packet");
            }
            Err(e) if is_drained(&e) => {}
            Err(e) => return Err(self.error("send_packet", e).into()),
        }
        self.drain(sink)
    }

    /// Signal end of input and hand the remaining buffered frames to `sink`.
    pub fn finish<E, F>(&mut self, sink: F) -> Result<(), E>
    where
        E: From<FfmpegError>,
        F: FnMut(&Audio) -> Result<(), E>,
    {
        match self.decoder.send_eof() {
            Ok(()) => {}
            Err(e) if is_drained(&e) => {}
            Err(e) => return Err(self.error("send_eof", e).into()),
        }
        self.drain(sink)?;
        if self.skipped_packets > 0 {
            tracing::debug!(
                stream_index = self.stream_index,
                skipped = self.skipped_packets,
                "decoder skipped invalid packets"
            );
        }
        Ok(())
    }

    fn drain<E, F>(&mut self, mut sink: F) -> Result<(), E>
    where
        E: From<FfmpegError>,
        F: FnMut(&Audio) -> Result<(), E>,
    {
        let mut frame = Audio::empty();
        loop {
            match self.decoder.receive_frame(&mut frame) {
                Ok(()) => sink(&frame)?,
                Err(e) if is_drained(&e) => return Ok(()),
                Err(e) => return Err(self.error("receive_frame", e).into()),
            }
        }
    }

    fn error(&self, call: &str, err: ffmpeg::Error) -> FfmpegError {
        FfmpegError::DecodePacket(format!("{} on stream {}: {}", call, self.stream_index, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drained_errors() {
        assert!(is_drained(&ffmpeg::Error::Eof));
        assert!(is_drained(&ffmpeg::Error::Other {
            errno: ffmpeg::error::EAGAIN
        }));
        assert!(!is_drained(&ffmpeg::Error::InvalidData));
    }

    #[test]
    fn test_decoders_for_common_uploads() {
        crate::ffmpeg_utils::init().unwrap();
        for id in [
            ffmpeg::codec::Id::PCM_S16LE,
            ffmpeg::codec::Id::PCM_F32LE,
            ffmpeg::codec::Id::MP3,
            ffmpeg::codec::Id::FLAC,
        ] {
            assert!(
                ffmpeg::codec::decoder::find(id).is_some(),
                "no decoder for {:?}",
                id
            );
        }
    }
}
