//! Batch orchestration
//!
//! Files are converted one after another in list order. A file that fails
//! at any stage is recorded in the outcome's failure list and the batch
//! moves on; only a successfully packed file gets a part.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::mixer::mix_to_stereo_pcm16;
use super::packer::{UploadBatch, UploadBatchBuilder, UploadPacker, UploadPart};
use super::resample::Resampler;
use crate::context::AudioContextFactory;
use crate::error::{ErrorKind, PcmError, Result};
use crate::types::{InputAudioFile, InterleavedPcm16};

/// Knobs that do not change the produced PCM.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// When set, every packed payload is also written to `<dir>/<part_name>`
    pub debug_dump_dir: Option<PathBuf>,
}

/// A file that produced no part
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub index: usize,
    pub name: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl FileFailure {
    fn new(file: &InputAudioFile, error: &PcmError) -> Self {
        Self {
            index: file.index(),
            name: file.name().to_string(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Result of one orchestrated batch
#[derive(Debug, Clone, Default)]
pub struct EncodeOutcome {
    pub batch: UploadBatch,
    pub failures: Vec<FileFailure>,
}

impl EncodeOutcome {
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct EncodeOrchestrator<F: AudioContextFactory> {
    resampler: Resampler<F>,
    options: PipelineOptions,
}

impl<F: AudioContextFactory + 'static> EncodeOrchestrator<F> {
    pub fn new(factory: Arc<F>, options: PipelineOptions) -> Self {
        Self {
            resampler: Resampler::new(factory),
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Decode, resample and quantize one file.
    pub fn convert_file(&self, file: &InputAudioFile) -> Result<InterleavedPcm16> {
        let resampled = self.resampler.resample(file.data().clone())?;
        mix_to_stereo_pcm16(&resampled)
    }

    /// Convert every file on the current thread.
    pub fn run_blocking(&self, files: Vec<InputAudioFile>) -> EncodeOutcome {
        let mut packer = UploadPacker::new();
        let mut collector = OutcomeCollector::new(files.len());

        for file in files {
            let result = prepare_part(
                &self.resampler,
                &mut packer,
                &file,
                self.options.debug_dump_dir.as_deref(),
            );
            collector.record(&file, result);
        }

        collector.finish()
    }

    /// Convert every file, running each conversion on the blocking pool.
    ///
    /// Files are processed strictly in order with a single await per file.
    pub async fn run(&self, files: Vec<InputAudioFile>) -> EncodeOutcome {
        let mut packer = UploadPacker::new();
        let mut collector = OutcomeCollector::new(files.len());

        for file in files {
            let resampler = self.resampler.clone();
            let dump_dir = self.options.debug_dump_dir.clone();
            let task_file = file.clone();

            let joined = tokio::task::spawn_blocking(move || {
                let result = prepare_part(&resampler, &mut packer, &task_file, dump_dir.as_deref());
                (packer, result)
            })
            .await;

            let result = match joined {
                Ok((returned, result)) => {
                    packer = returned;
                    result
                }
                Err(e) => {
                    packer = UploadPacker::new();
                    Err(PcmError::Task(e.to_string()))
                }
            };
            collector.record(&file, result);
        }

        collector.finish()
    }
}

fn prepare_part<F: AudioContextFactory>(
    resampler: &Resampler<F>,
    packer: &mut UploadPacker,
    file: &InputAudioFile,
    dump_dir: Option<&Path>,
) -> Result<UploadPart> {
    let resampled = resampler.resample(file.data().clone())?;
    let pcm = mix_to_stereo_pcm16(&resampled)?;
    let part = packer.pack(&pcm, file.name(), file.index());
    debug!(
        index = file.index(),
        name = file.name(),
        part = part.part_name(),
        frames = pcm.frame_count(),
        "packed file"
    );

    if let Some(dir) = dump_dir {
        if let Err(e) = dump_part(dir, &part) {
            warn!(dir = %dir.display(), part = part.part_name(), error = %e, "debug dump failed");
        }
    }
    Ok(part)
}

fn dump_part(dir: &Path, part: &UploadPart) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(part.part_name()), part.payload())?;
    Ok(())
}

struct OutcomeCollector {
    builder: UploadBatchBuilder,
    failures: Vec<FileFailure>,
    attempted: usize,
}

impl OutcomeCollector {
    fn new(expected: usize) -> Self {
        debug!(files = expected, "starting batch");
        Self {
            builder: UploadBatchBuilder::new(),
            failures: Vec::new(),
            attempted: 0,
        }
    }

    fn record(&mut self, file: &InputAudioFile, result: Result<UploadPart>) {
        self.attempted += 1;
        let result = result.and_then(|part| self.builder.insert(part));
        if let Err(e) = result {
            warn!(
                index = file.index(),
                name = file.name(),
                kind = e.kind().as_str(),
                error = %e,
                "file skipped"
            );
            self.failures.push(FileFailure::new(file, &e));
        }
    }

    fn finish(self) -> EncodeOutcome {
        let batch = self.builder.finish();
        info!(
            attempted = self.attempted,
            packed = batch.len(),
            failed = self.failures.len(),
            bytes = batch.total_bytes(),
            "batch finished"
        );
        EncodeOutcome {
            batch,
            failures: self.failures,
        }
    }
}
