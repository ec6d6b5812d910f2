//! Preparation pipeline: resample, mix, pack, orchestrate.

pub mod mixer;
pub mod orchestrator;
pub mod packer;
pub mod resample;

pub use mixer::{mix_to_stereo_pcm16, quantize_sample};
pub use orchestrator::{EncodeOrchestrator, EncodeOutcome, FileFailure, PipelineOptions};
pub use packer::{part_name, PartManifest, UploadBatch, UploadBatchBuilder, UploadPacker, UploadPart};
pub use resample::{target_frame_count, Resampler};
