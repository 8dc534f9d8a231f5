mod config;
mod observer;
mod services;
mod state;

pub use config::LoaderConfig;
pub use observer::{BatchCompleted, BatchStarted, LoaderObserver, RunStarted, TracingObserver};
pub use services::{DefaultLoaderServices, LoaderServices};

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{
    error::AppError,
    storage::{
        checkpoint::{Checkpoint, CheckpointStore},
        types::knowledge_document::{KnowledgeDocument, KnowledgeSource},
        vector::{EmbeddingRecord, PointPayload},
    },
};
use state_machines::core::GuardError;
use tokio::time::sleep;
use tracing::{error, info, warn};

use self::state::ready;

/// Final totals for one loader run.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub total_documents: usize,
    pub valid_documents: usize,
    pub invalid_documents: usize,
    /// Valid-sequence position the run started from; 0 for a fresh start.
    pub resumed_from: usize,
    /// Per-document failures that were skipped, not retried.
    pub errors: usize,
    pub document_count: u64,
    pub point_count: u64,
    pub elapsed: Duration,
}

/// Orchestrates sanitize → embed → persist → upsert over the canonical
/// corpus in fixed-size batches, checkpointing after every batch so an
/// interrupted run resumes instead of restarting.
///
/// Exactly one loader instance may run against a given pair of stores;
/// concurrent loaders would corrupt the id/checkpoint invariant.
pub struct ResumableLoader {
    services: Arc<dyn LoaderServices>,
    observer: Arc<dyn LoaderObserver>,
    config: LoaderConfig,
    checkpoints: CheckpointStore,
}

impl ResumableLoader {
    pub fn new(
        services: Arc<dyn LoaderServices>,
        observer: Arc<dyn LoaderObserver>,
        config: LoaderConfig,
    ) -> Self {
        let checkpoints = CheckpointStore::new(config.checkpoint_path.clone());
        Self {
            services,
            observer,
            config,
            checkpoints,
        }
    }

    /// Runs the load to completion. `fingerprint` identifies the corpus
    /// file the documents came from; a checkpoint written against a
    /// different fingerprint is refused and the run starts fresh.
    ///
    /// On fatal error the checkpoint file is left intact and the
    /// documented recovery is to rerun the loader.
    pub async fn run(
        &self,
        corpus: Vec<KnowledgeDocument>,
        fingerprint: &str,
    ) -> Result<LoadReport, AppError> {
        match self.execute(corpus, fingerprint).await {
            Ok(report) => Ok(report),
            Err(err) => {
                error!(error = %err, "corpus load aborted; checkpoint left intact, rerun to resume");
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        corpus: Vec<KnowledgeDocument>,
        fingerprint: &str,
    ) -> Result<LoadReport, AppError> {
        let started = Instant::now();
        let machine = ready();

        let total_documents = corpus.len();
        // All index arithmetic from here on is over the valid-only
        // sequence; the raw corpus never participates in id math.
        let valid: Vec<KnowledgeDocument> =
            corpus.into_iter().filter(KnowledgeDocument::has_valid_text).collect();
        let invalid_documents = total_documents - valid.len();

        let resume_from = self.resolve_start_index(fingerprint, valid.len())?;
        let fresh_start = resume_from == 0;

        self.observer.on_run_started(&RunStarted {
            total_documents,
            valid_documents: valid.len(),
            invalid_documents,
            resume_from,
            fresh_start,
        });

        if fresh_start {
            // Known-empty starting state for both id space and documents.
            self.services
                .reset_vector_index(self.services.embedding_dimension())
                .await?;
            self.services.reset_document_store().await?;
        } else {
            info!(
                resume_from,
                "resuming; positions below the checkpoint are trusted as committed"
            );
        }

        let machine = machine
            .prepare()
            .map_err(|(_, guard)| map_guard_error("prepare", guard))?;

        let remaining = valid.get(resume_from..).unwrap_or_default();
        let total_batches = remaining.len().div_ceil(self.config.batch_size.max(1));
        let relief_interval = self.config.relief_batch_interval.max(1);

        let mut attempted = resume_from;
        let mut errors = 0usize;

        for (batch_index, batch) in remaining.chunks(self.config.batch_size.max(1)).enumerate() {
            let batch_number = batch_index + 1;
            let done_this_run = attempted - resume_from;
            self.observer.on_batch_started(&BatchStarted {
                batch: batch_number,
                total_batches,
                progress_percent: percent(done_this_run, remaining.len()),
                eta: estimate_remaining(started.elapsed(), done_this_run, remaining.len()),
            });

            let base = attempted;
            let mut points: Vec<EmbeddingRecord> = Vec::with_capacity(batch.len());
            let mut skipped_in_batch = 0usize;

            for (offset, doc) in batch.iter().enumerate() {
                let position = (base + offset + 1) as u64;
                match self.process_document(doc.clone(), position).await {
                    Ok(record) => points.push(record),
                    Err(err) => {
                        // Per-document failures never abort the batch.
                        skipped_in_batch += 1;
                        errors += 1;
                        self.observer.on_document_skipped(position, &err);
                    }
                }
            }

            self.services.upsert_points(&points).await?;
            attempted += batch.len();

            // Persist-then-advance: the checkpoint hits disk before the
            // next batch may start, so a kill between batches neither
            // loses committed work nor double-counts a batch.
            self.checkpoints.save(&Checkpoint {
                last_index: attempted,
                corpus_fingerprint: fingerprint.to_string(),
            })?;

            self.observer.on_batch_completed(&BatchCompleted {
                batch: batch_number,
                skipped_in_batch,
                loaded: attempted,
                total_valid: valid.len(),
            });

            if batch_number % relief_interval == 0 && !self.config.relief_pause.is_zero() {
                sleep(self.config.relief_pause).await;
            }
        }

        let machine = machine
            .load()
            .map_err(|(_, guard)| map_guard_error("load", guard))?;

        // Read-back for operator sanity only; divergence is reported,
        // never reconciled automatically.
        let document_count = self.services.document_count().await?;
        let collection = self.services.vector_collection_info().await?;
        info!(
            document_count,
            point_count = collection.points_count,
            collection_status = %collection.status,
            "post-load verification"
        );

        let machine = machine
            .verify()
            .map_err(|(_, guard)| map_guard_error("verify", guard))?;

        self.checkpoints.clear()?;

        let _machine = machine
            .finish()
            .map_err(|(_, guard)| map_guard_error("finish", guard))?;

        let report = LoadReport {
            total_documents,
            valid_documents: valid.len(),
            invalid_documents,
            resumed_from: resume_from,
            errors,
            document_count,
            point_count: collection.points_count,
            elapsed: started.elapsed(),
        };
        self.observer.on_run_completed(&report);
        Ok(report)
    }

    /// One document, independently: sanitize, embed, persist. The
    /// embedding is generated before the store write so a failure at
    /// either step leaves no partial state for this position.
    async fn process_document(
        &self,
        doc: KnowledgeDocument,
        position: u64,
    ) -> Result<EmbeddingRecord, AppError> {
        let doc = doc.sanitize();
        let vector = self.services.embed(doc.embedding_text()).await?;
        let payload = PointPayload {
            text: doc.english_text.clone(),
            source_type: doc.source_type,
            reference: doc.reference.clone(),
        };
        self.services
            .upsert_document(KnowledgeSource::from_document(position, doc))
            .await?;
        Ok(EmbeddingRecord {
            id: position,
            vector,
            payload,
        })
    }

    fn resolve_start_index(
        &self,
        fingerprint: &str,
        valid_len: usize,
    ) -> Result<usize, AppError> {
        match self.checkpoints.load()? {
            None => Ok(0),
            Some(checkpoint) if checkpoint.last_index == 0 => Ok(0),
            Some(checkpoint) if checkpoint.corpus_fingerprint != fingerprint => {
                warn!(
                    checkpointed = checkpoint.last_index,
                    "corpus changed since checkpoint was written; refusing resume, starting fresh"
                );
                Ok(0)
            }
            Some(checkpoint) if checkpoint.last_index > valid_len => {
                warn!(
                    checkpointed = checkpoint.last_index,
                    valid = valid_len,
                    "checkpoint beyond the valid sequence; starting fresh"
                );
                Ok(0)
            }
            Some(checkpoint) => Ok(checkpoint.last_index),
        }
    }
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        (done as f64 / total as f64) * 100.0
    }
}

fn estimate_remaining(elapsed: Duration, done: usize, total: usize) -> Option<Duration> {
    if done == 0 {
        return None;
    }
    let rate = done as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    let left = total.saturating_sub(done) as f64;
    Some(Duration::from_secs_f64(left / rate))
}

fn map_guard_error(stage: &'static str, err: GuardError) -> AppError {
    AppError::InternalError(format!(
        "state machine guard '{stage}' failed: guard={}, event={}, kind={:?}",
        err.guard, err.event, err.kind
    ))
}

#[cfg(test)]
mod tests;
