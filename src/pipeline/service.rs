//! Background generation service
//!
//! Wraps a [`Pipeline`] for async callers. The header parse runs on a
//! blocking worker under a timeout and is cached for the lifetime of the
//! service. Generations run one at a time; each request takes a ticket and
//! is discarded with [`AtlasError::Superseded`] if a newer request arrived
//! before it started or while it was running.

use super::{Generation, GenerationRequest, ParsedModel, Pipeline};
use crate::error::{AtlasError, AtlasResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

pub struct GenerationService {
    pipeline: Arc<Pipeline>,
    model: OnceCell<Arc<ParsedModel>>,
    latest: AtomicU64,
    running: Mutex<()>,
}

impl GenerationService {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            model: OnceCell::new(),
            latest: AtomicU64::new(0),
            running: Mutex::new(()),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Parsed model, parsing on first use
    pub async fn model(&self) -> AtlasResult<Arc<ParsedModel>> {
        let model = self
            .model
            .get_or_try_init(|| async { self.parse_in_background().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(model))
    }

    /// Parse on a blocking worker; past the timeout, parse on this thread
    async fn parse_in_background(&self) -> AtlasResult<ParsedModel> {
        let timeout = self.pipeline.config().parse_timeout();
        let pipeline = Arc::clone(&self.pipeline);
        let task = tokio::task::spawn_blocking(move || pipeline.parse());

        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => {
                joined.map_err(|e| crate::internal_error!("parse task failed: {}", e))?
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Background parse timed out, parsing synchronously"
                );
                self.pipeline.parse()
            }
        }
    }

    /// Take a ticket; every earlier ticket becomes stale
    pub fn next_ticket(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest_ticket(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    fn ensure_current(&self, ticket: u64) -> AtlasResult<()> {
        let latest = self.latest_ticket();
        if ticket != latest {
            debug!(ticket, latest, "Discarding superseded generation");
            return Err(AtlasError::Superseded { ticket, latest });
        }
        Ok(())
    }

    /// Generate with a fresh ticket
    pub async fn generate(&self, request: GenerationRequest) -> AtlasResult<Generation> {
        let ticket = self.next_ticket();
        self.generate_with_ticket(request, ticket).await
    }

    /// Generate for a ticket taken earlier with [`next_ticket`](Self::next_ticket)
    ///
    /// The ticket becomes the generation id.
    pub async fn generate_with_ticket(
        &self,
        request: GenerationRequest,
        ticket: u64,
    ) -> AtlasResult<Generation> {
        let model = self.model().await?;

        let _running = self.running.lock().await;
        self.ensure_current(ticket)?;

        let pipeline = Arc::clone(&self.pipeline);
        let generation =
            tokio::task::spawn_blocking(move || pipeline.generate(&model, &request, ticket))
                .await
                .map_err(|e| crate::internal_error!("generation task failed: {}", e))??;

        self.ensure_current(ticket)?;
        info!(generation = ticket, points = generation.cloud.len(), "Generation ready");
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::mmap::MemorySource;
    use crate::pipeline::PipelineConfig;

    fn empty_model_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GGUF");
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes
    }

    #[tokio::test]
    async fn test_tickets_increase() {
        let pipeline = Pipeline::new(
            Arc::new(MemorySource::new(empty_model_bytes())),
            PipelineConfig::default(),
        )
        .unwrap();
        let service = GenerationService::new(pipeline);
        assert_eq!(service.latest_ticket(), 0);
        assert_eq!(service.next_ticket(), 1);
        assert_eq!(service.next_ticket(), 2);
        assert!(matches!(
            service.ensure_current(1),
            Err(AtlasError::Superseded { ticket: 1, latest: 2 })
        ));
        assert!(service.ensure_current(2).is_ok());
    }

    #[tokio::test]
    async fn test_model_is_parsed_once() {
        let pipeline = Pipeline::new(
            Arc::new(MemorySource::new(empty_model_bytes())),
            PipelineConfig::default(),
        )
        .unwrap();
        let service = GenerationService::new(pipeline);
        let a = service.model().await.unwrap();
        let b = service.model().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.file.version, 3);
    }
}
