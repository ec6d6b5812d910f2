//! Application state management
//!
//! This module defines the AppState structure that holds:
//! - The FFmpeg-backed orchestrator, resolved once at startup
//! - Prepared batch cache
//! - Conversion slots bounding concurrent batches
//! - Metrics and server configuration

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use teddy_pcm::{
    EncodeOrchestrator, EncodeOutcome, FfmpegContextFactory, FileFailure, PartManifest, PcmError,
    PipelineOptions, UploadPart, OUTPUT_CHANNELS, TARGET_SAMPLE_RATE,
};

use crate::config::ServerConfig;
use crate::http::cache::{BatchCache, CacheStats};
use crate::metrics::Metrics;

pub type Orchestrator = EncodeOrchestrator<FfmpegContextFactory>;

/// A finalized batch kept for retrieval
#[derive(Debug)]
pub struct PreparedBatch {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub outcome: EncodeOutcome,
}

impl PreparedBatch {
    pub fn new(outcome: EncodeOutcome) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            outcome,
        }
    }

    /// PCM bytes held by this batch
    pub fn size_bytes(&self) -> usize {
        self.outcome.batch.total_bytes()
    }

    pub fn part(&self, part_name: &str) -> Option<&UploadPart> {
        self.outcome.batch.part(part_name)
    }

    /// Multipart boundary used when serving this batch as a form body
    pub fn boundary(&self) -> String {
        format!("----teddypcm{}", self.id.replace('-', ""))
    }

    pub fn manifest(&self) -> BatchManifest {
        BatchManifest {
            batch_id: self.id.clone(),
            created_at: self.created_at.to_rfc3339(),
            sample_rate: TARGET_SAMPLE_RATE,
            channels: OUTPUT_CHANNELS,
            total_bytes: self.size_bytes(),
            parts: self.outcome.batch.manifest(),
            failures: self.outcome.failures.clone(),
        }
    }
}

/// JSON description of a prepared batch
#[derive(Debug, Serialize)]
pub struct BatchManifest {
    pub batch_id: String,
    pub created_at: String,
    pub sample_rate: u32,
    pub channels: usize,
    pub total_bytes: usize,
    pub parts: Vec<PartManifest>,
    pub failures: Vec<FileFailure>,
}

/// Application state shared across all handlers
pub struct AppState {
    /// Orchestrator, or the reason the platform cannot convert audio
    orchestrator: std::result::Result<Arc<Orchestrator>, String>,

    /// Prepared batches (batch_id -> PreparedBatch)
    pub batches: BatchCache,

    /// One permit per batch allowed to convert at the same time
    pub conversion_slots: Arc<Semaphore>,

    /// Metrics collector
    pub metrics: Metrics,

    /// Server shutdown flag
    pub shutdown: AtomicBool,

    /// Server configuration
    pub config: ServerConfig,
}

impl AppState {
    /// Create a new AppState with the given configuration.
    ///
    /// Resolves the FFmpeg factory once; if that fails the server still
    /// starts but every conversion request is answered with 503.
    pub fn new(config: ServerConfig) -> Self {
        let options = PipelineOptions {
            debug_dump_dir: config.audio.debug_dump_dir.clone(),
        };
        let orchestrator = match teddy_pcm::ffmpeg_orchestrator(options) {
            Ok(orchestrator) => Ok(Arc::new(orchestrator)),
            Err(e) => {
                tracing::error!("Audio conversion unavailable: {}", e);
                Err(e.to_string())
            }
        };
        Self::with_orchestrator(config, orchestrator)
    }

    fn with_orchestrator(
        config: ServerConfig,
        orchestrator: std::result::Result<Arc<Orchestrator>, String>,
    ) -> Self {
        Self {
            orchestrator,
            batches: BatchCache::new(config.cache.clone()),
            conversion_slots: Arc::new(Semaphore::new(config.max_concurrent_batches.max(1))),
            metrics: Metrics::new(),
            shutdown: AtomicBool::new(false),
            config,
        }
    }

    /// Create AppState with default configuration
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    /// The orchestrator, or `UnsupportedPlatform` when FFmpeg is unusable
    pub fn orchestrator(&self) -> std::result::Result<Arc<Orchestrator>, PcmError> {
        self.orchestrator
            .as_ref()
            .map(Arc::clone)
            .map_err(|reason| PcmError::UnsupportedPlatform(reason.clone()))
    }

    /// Store a finished batch and return it
    pub fn register_batch(&self, outcome: EncodeOutcome) -> Arc<PreparedBatch> {
        self.metrics.record_outcome(&outcome);
        let batch = Arc::new(PreparedBatch::new(outcome));
        let evicted = self.batches.insert(Arc::clone(&batch));
        if evicted > 0 {
            tracing::info!("Evicted {} batch(es) to store {}", evicted, batch.id);
        }
        batch
    }

    /// Get a batch by ID
    pub fn get_batch(&self, batch_id: &str) -> Option<Arc<PreparedBatch>> {
        self.batches.get(batch_id)
    }

    /// Remove a batch
    pub fn remove_batch(&self, batch_id: &str) -> Option<Arc<PreparedBatch>> {
        self.batches.remove(batch_id)
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.batches.stats()
    }

    /// Remove expired batches. Returns number of removed batches.
    pub fn cleanup_expired_batches(&self) -> usize {
        self.batches.clear_expired()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Check if shutdown is requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use teddy_pcm::pipeline::{UploadBatchBuilder, UploadPacker};
    use teddy_pcm::{ErrorKind, InterleavedPcm16};

    /// A prepared batch holding one part with the given samples
    pub(crate) fn batch_with_samples(samples: &[i16]) -> Arc<PreparedBatch> {
        let pcm = InterleavedPcm16::from_interleaved(samples.to_vec()).unwrap();
        let mut builder = UploadBatchBuilder::new();
        builder
            .insert(UploadPacker::new().pack(&pcm, "test.wav", 0))
            .unwrap();
        Arc::new(PreparedBatch::new(EncodeOutcome {
            batch: builder.finish(),
            failures: Vec::new(),
        }))
    }

    /// State whose platform check failed
    pub(crate) fn unsupported_state() -> AppState {
        AppState::with_orchestrator(ServerConfig::default(), Err("probe failed".to_string()))
    }

    #[test]
    fn test_app_state_creation() {
        let state = AppState::with_defaults();
        assert!(state.batches.is_empty());
        assert!(state.orchestrator().is_ok());
        assert!(!state.is_shutdown());
    }

    #[test]
    fn test_unsupported_platform_is_reported() {
        let state = unsupported_state();
        assert!(matches!(
            state.orchestrator(),
            Err(PcmError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn test_register_and_remove_batch() {
        let state = AppState::with_defaults();
        let outcome = EncodeOutcome {
            batch: UploadBatchBuilder::new().finish(),
            failures: vec![FileFailure {
                index: 0,
                name: "a.mp3".into(),
                kind: ErrorKind::DecodeError,
                message: "Decode error: bad".into(),
            }],
        };
        let batch = state.register_batch(outcome);

        assert!(state.get_batch(&batch.id).is_some());
        assert!(state.remove_batch(&batch.id).is_some());
        assert!(state.get_batch(&batch.id).is_none());
    }

    #[test]
    fn test_manifest_json() {
        let batch = batch_with_samples(&[0, 0, 1, 1]);
        let json = serde_json::to_value(batch.manifest()).unwrap();
        assert_eq!(json["batch_id"], batch.id.as_str());
        assert_eq!(json["sample_rate"], 48_000);
        assert_eq!(json["channels"], 2);
        assert_eq!(json["parts"][0]["part_name"], "pcmData.0.pcm");
        assert_eq!(json["parts"][0]["field_name"], "test.wav");
        assert_eq!(json["parts"][0]["frames"], 2);
        assert!(json["failures"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_boundary_has_no_dashes_from_id() {
        let batch = batch_with_samples(&[0, 0]);
        let boundary = batch.boundary();
        assert!(boundary.starts_with("----teddypcm"));
        assert!(!boundary["----teddypcm".len()..].contains('-'));
    }
}
