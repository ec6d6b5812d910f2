//! Upload part naming and batch assembly
//!
//! Every prepared PCM buffer becomes one [`UploadPart`] whose part name
//! encodes its position in the user's file list. Parts are collected by an
//! [`UploadBatchBuilder`] and frozen into an [`UploadBatch`] once all files
//! have been attempted.

use std::collections::HashSet;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::{PcmError, Result};
use crate::types::{InterleavedPcm16, OUTPUT_CHANNELS, TARGET_SAMPLE_RATE};

/// Part name for the file at `index`
pub fn part_name(index: usize) -> String {
    format!("pcmData.{}.pcm", index)
}

/// One named binary entry of an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPart {
    index: usize,
    field_name: String,
    part_name: String,
    payload: Bytes,
}

impl UploadPart {
    pub fn index(&self) -> usize {
        self.index
    }

    /// The declared name of the source file
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    /// Headerless little-endian interleaved stereo PCM16
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn frame_count(&self) -> usize {
        self.payload.len() / (OUTPUT_CHANNELS * std::mem::size_of::<i16>())
    }
}

/// Serializes PCM into part payloads through one reused scratch buffer.
#[derive(Debug, Default)]
pub struct UploadPacker {
    scratch: BytesMut,
}

impl UploadPacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pack(&mut self, pcm: &InterleavedPcm16, declared_name: &str, index: usize) -> UploadPart {
        self.scratch.clear();
        self.scratch.reserve(pcm.byte_len());
        for &sample in pcm.samples() {
            self.scratch.put_i16_le(sample);
        }

        UploadPart {
            index,
            field_name: declared_name.to_string(),
            part_name: part_name(index),
            payload: self.scratch.split().freeze(),
        }
    }
}

/// Collects parts for one batch. Part names must be unique.
#[derive(Debug, Default)]
pub struct UploadBatchBuilder {
    parts: Vec<UploadPart>,
    names: HashSet<String>,
}

impl UploadBatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, part: UploadPart) -> Result<()> {
        if !self.names.insert(part.part_name.clone()) {
            return Err(PcmError::DuplicatePart(part.part_name));
        }
        self.parts.push(part);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn finish(self) -> UploadBatch {
        UploadBatch { parts: self.parts }
    }
}

/// Manifest entry describing one part of a finalized batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartManifest {
    pub index: usize,
    pub field_name: String,
    pub part_name: String,
    pub bytes: usize,
    pub frames: usize,
    pub sample_rate: u32,
    pub channels: usize,
}

/// Finalized, immutable batch in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    parts: Vec<UploadPart>,
}

impl UploadBatch {
    pub fn parts(&self) -> &[UploadPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn part(&self, part_name: &str) -> Option<&UploadPart> {
        self.parts.iter().find(|p| p.part_name == part_name)
    }

    /// Sum of all payload sizes
    pub fn total_bytes(&self) -> usize {
        self.parts.iter().map(|p| p.payload.len()).sum()
    }

    pub fn manifest(&self) -> Vec<PartManifest> {
        self.parts
            .iter()
            .map(|p| PartManifest {
                index: p.index,
                field_name: p.field_name.clone(),
                part_name: p.part_name.clone(),
                bytes: p.payload.len(),
                frames: p.frame_count(),
                sample_rate: TARGET_SAMPLE_RATE,
                channels: OUTPUT_CHANNELS,
            })
            .collect()
    }

    /// Render the batch as a `multipart/form-data` body delimited by
    /// `boundary`.
    pub fn to_multipart(&self, boundary: &str) -> Bytes {
        let mut body = BytesMut::with_capacity(self.total_bytes() + self.parts.len() * 160 + 64);
        for part in &self.parts {
            body.put_slice(b"--");
            body.put_slice(boundary.as_bytes());
            body.put_slice(b"\r\n");
            body.put_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    escape_quoted(&part.field_name),
                    escape_quoted(&part.part_name)
                )
                .as_bytes(),
            );
            body.put_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.put_slice(&part.payload);
            body.put_slice(b"\r\n");
        }
        body.put_slice(b"--");
        body.put_slice(boundary.as_bytes());
        body.put_slice(b"--\r\n");
        body.freeze()
    }
}

/// Percent-encode the characters that would break a quoted header parameter.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
