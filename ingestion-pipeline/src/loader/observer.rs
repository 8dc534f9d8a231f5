use std::time::Duration;

use common::error::AppError;
use tracing::{info, warn};

use super::LoadReport;

#[derive(Debug, Clone)]
pub struct RunStarted {
    pub total_documents: usize,
    pub valid_documents: usize,
    pub invalid_documents: usize,
    pub resume_from: usize,
    pub fresh_start: bool,
}

#[derive(Debug, Clone)]
pub struct BatchStarted {
    /// 1-based batch number within this run.
    pub batch: usize,
    pub total_batches: usize,
    pub progress_percent: f64,
    pub eta: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct BatchCompleted {
    pub batch: usize,
    pub skipped_in_batch: usize,
    /// Attempted documents so far, counted over the whole valid sequence.
    pub loaded: usize,
    pub total_valid: usize,
}

/// Presentation seam: the loader emits progress through this trait instead
/// of writing to any output itself. Methods default to no-ops so consumers
/// only implement what they care about.
pub trait LoaderObserver: Send + Sync {
    fn on_run_started(&self, _info: &RunStarted) {}
    fn on_batch_started(&self, _info: &BatchStarted) {}
    fn on_batch_completed(&self, _info: &BatchCompleted) {}
    fn on_document_skipped(&self, _position: u64, _error: &AppError) {}
    fn on_run_completed(&self, _report: &LoadReport) {}
}

/// Default observer: structured log lines, one per event.
pub struct TracingObserver;

impl LoaderObserver for TracingObserver {
    fn on_run_started(&self, info: &RunStarted) {
        info!(
            total = info.total_documents,
            valid = info.valid_documents,
            invalid_skipped = info.invalid_documents,
            resume_from = info.resume_from,
            fresh_start = info.fresh_start,
            "corpus load starting"
        );
    }

    fn on_batch_started(&self, info: &BatchStarted) {
        info!(
            batch = info.batch,
            total_batches = info.total_batches,
            progress_percent = format!("{:.1}", info.progress_percent),
            eta_secs = info.eta.map(|eta| eta.as_secs()),
            "batch starting"
        );
    }

    fn on_batch_completed(&self, info: &BatchCompleted) {
        info!(
            batch = info.batch,
            loaded = info.loaded,
            total_valid = info.total_valid,
            skipped_in_batch = info.skipped_in_batch,
            "batch committed"
        );
    }

    fn on_document_skipped(&self, position: u64, error: &AppError) {
        warn!(position, error = %error, "document skipped");
    }

    fn on_run_completed(&self, report: &LoadReport) {
        info!(
            valid = report.valid_documents,
            invalid_skipped = report.invalid_documents,
            errors = report.errors,
            document_count = report.document_count,
            point_count = report.point_count,
            elapsed_secs = report.elapsed.as_secs(),
            "corpus load finished"
        );
    }
}
