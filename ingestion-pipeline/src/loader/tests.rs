use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        checkpoint::{Checkpoint, CheckpointStore},
        types::knowledge_document::{KnowledgeDocument, KnowledgeSource},
        vector::{CollectionInfo, EmbeddingRecord},
    },
};
use tempfile::TempDir;

use super::{LoaderConfig, LoaderObserver, LoaderServices, ResumableLoader};

const DIMENSION: usize = 4;
const EMBED_FAILURE_MARKER: &str = "!!embed-unavailable!!";
const STORE_FAILURE_MARKER: &str = "!!store-rejects!!";

#[derive(Default)]
struct MockServices {
    docs: Mutex<BTreeMap<u64, KnowledgeSource>>,
    points: Mutex<BTreeMap<u64, EmbeddingRecord>>,
    point_batches: Mutex<Vec<Vec<u64>>>,
    calls: Mutex<Vec<String>>,
    point_upsert_attempts: AtomicUsize,
    fail_point_upsert_on_call: Option<usize>,
}

impl MockServices {
    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn doc_ids(&self) -> Vec<u64> {
        self.docs.lock().unwrap().keys().copied().collect()
    }

    fn point_ids(&self) -> Vec<u64> {
        self.points.lock().unwrap().keys().copied().collect()
    }
}

#[async_trait]
impl LoaderServices for MockServices {
    async fn reset_document_store(&self) -> Result<(), AppError> {
        self.record("reset_documents");
        self.docs.lock().unwrap().clear();
        Ok(())
    }

    async fn upsert_document(&self, record: KnowledgeSource) -> Result<(), AppError> {
        if record.reference.contains(STORE_FAILURE_MARKER) {
            return Err(AppError::Validation("document store rejected write".into()));
        }
        self.record("upsert_document");
        self.docs.lock().unwrap().insert(record.position, record);
        Ok(())
    }

    async fn document_count(&self) -> Result<u64, AppError> {
        Ok(self.docs.lock().unwrap().len() as u64)
    }

    fn embedding_dimension(&self) -> usize {
        DIMENSION
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        if text.contains(EMBED_FAILURE_MARKER) {
            return Err(AppError::InternalError("embedding backend unavailable".into()));
        }
        Ok(vec![text.len() as f32; DIMENSION])
    }

    async fn reset_vector_index(&self, dimension: usize) -> Result<(), AppError> {
        assert_eq!(dimension, DIMENSION);
        self.record("reset_vector_index");
        self.points.lock().unwrap().clear();
        Ok(())
    }

    async fn upsert_points(&self, records: &[EmbeddingRecord]) -> Result<(), AppError> {
        let call_number = self.point_upsert_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_point_upsert_on_call == Some(call_number) {
            return Err(AppError::VectorIndex("upsert refused".into()));
        }
        self.record("upsert_points");
        self.point_batches
            .lock()
            .unwrap()
            .push(records.iter().map(|r| r.id).collect());
        let mut points = self.points.lock().unwrap();
        for record in records {
            points.insert(record.id, record.clone());
        }
        Ok(())
    }

    async fn vector_collection_info(&self) -> Result<CollectionInfo, AppError> {
        Ok(CollectionInfo {
            points_count: self.points.lock().unwrap().len() as u64,
            status: "green".to_string(),
        })
    }
}

#[derive(Default)]
struct CollectingObserver {
    skipped: Mutex<Vec<u64>>,
    batch_loaded: Mutex<Vec<usize>>,
}

impl LoaderObserver for CollectingObserver {
    fn on_batch_completed(&self, info: &super::BatchCompleted) {
        self.batch_loaded.lock().unwrap().push(info.loaded);
    }

    fn on_document_skipped(&self, position: u64, _error: &AppError) {
        self.skipped.lock().unwrap().push(position);
    }
}

fn doc(n: usize) -> KnowledgeDocument {
    KnowledgeDocument {
        reference: format!("Sahih Bukhari {n}"),
        english_text: format!("Narration number {n} about patience and prayer"),
        ..Default::default()
    }
}

fn invalid_doc() -> KnowledgeDocument {
    KnowledgeDocument {
        reference: "Sahih Muslim 1".to_string(),
        english_text: "    ".to_string(),
        ..Default::default()
    }
}

struct Harness {
    loader: ResumableLoader,
    services: Arc<MockServices>,
    observer: Arc<CollectingObserver>,
    checkpoints: CheckpointStore,
    _dir: TempDir,
}

fn harness(batch_size: usize, services: MockServices) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("load_progress.json");
    let config = LoaderConfig {
        batch_size,
        relief_batch_interval: 20,
        relief_pause: Duration::ZERO,
        checkpoint_path: path.clone(),
    };
    let services = Arc::new(services);
    let observer = Arc::new(CollectingObserver::default());
    Harness {
        loader: ResumableLoader::new(services.clone(), observer.clone(), config),
        services,
        observer,
        checkpoints: CheckpointStore::new(path),
        _dir: dir,
    }
}

#[tokio::test]
async fn fresh_run_assigns_position_ids_and_clears_checkpoint() {
    let h = harness(25, MockServices::default());
    let corpus: Vec<_> = (1..=30).map(doc).collect();

    let report = h.loader.run(corpus, "fp-1").await.unwrap();

    assert_eq!(report.total_documents, 30);
    assert_eq!(report.valid_documents, 30);
    assert_eq!(report.errors, 0);
    assert_eq!(report.document_count, 30);
    assert_eq!(report.point_count, 30);

    assert_eq!(h.services.doc_ids(), (1..=30).collect::<Vec<u64>>());
    assert_eq!(h.services.point_ids(), (1..=30).collect::<Vec<u64>>());
    let batches = h.services.point_batches.lock().unwrap().clone();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 25);
    assert_eq!(batches[1].len(), 5);
    assert_eq!(*h.observer.batch_loaded.lock().unwrap(), vec![25, 30]);

    assert!(h.checkpoints.load().unwrap().is_none());
}

#[tokio::test]
async fn fresh_start_resets_both_stores_before_any_write() {
    let h = harness(25, MockServices::default());
    h.loader.run(vec![doc(1), doc(2)], "fp-1").await.unwrap();

    let calls = h.services.calls.lock().unwrap().clone();
    let first_write = calls
        .iter()
        .position(|c| c == "upsert_document" || c == "upsert_points")
        .unwrap();
    let vector_reset = calls.iter().position(|c| c == "reset_vector_index").unwrap();
    let doc_reset = calls.iter().position(|c| c == "reset_documents").unwrap();
    assert!(vector_reset < first_write);
    assert!(doc_reset < first_write);
}

#[tokio::test]
async fn point_ids_do_not_depend_on_batch_size() {
    let corpus: Vec<_> = (1..=17).map(doc).collect();

    let small = harness(3, MockServices::default());
    small.loader.run(corpus.clone(), "fp-1").await.unwrap();

    let large = harness(25, MockServices::default());
    large.loader.run(corpus, "fp-1").await.unwrap();

    assert_eq!(small.services.point_ids(), large.services.point_ids());
    assert_eq!(small.services.doc_ids(), (1..=17).collect::<Vec<u64>>());
}

#[tokio::test]
async fn invalid_documents_never_enter_the_id_space() {
    let h = harness(25, MockServices::default());
    let corpus = vec![doc(1), invalid_doc(), doc(2), invalid_doc(), doc(3)];

    let report = h.loader.run(corpus, "fp-1").await.unwrap();

    assert_eq!(report.valid_documents, 3);
    assert_eq!(report.invalid_documents, 2);
    // Ids stay contiguous over the valid-only sequence.
    assert_eq!(h.services.doc_ids(), vec![1, 2, 3]);
    assert_eq!(h.services.point_ids(), vec![1, 2, 3]);
}

#[tokio::test]
async fn embedding_failure_leaves_neither_store_with_the_document() {
    let h = harness(25, MockServices::default());
    let mut corpus: Vec<_> = (1..=5).map(doc).collect();
    corpus[2].english_text = format!("text {EMBED_FAILURE_MARKER}");

    let report = h.loader.run(corpus, "fp-1").await.unwrap();

    assert_eq!(report.errors, 1);
    assert_eq!(h.services.doc_ids(), vec![1, 2, 4, 5]);
    assert_eq!(h.services.point_ids(), vec![1, 2, 4, 5]);
    assert_eq!(*h.observer.skipped.lock().unwrap(), vec![3]);
    // A per-document failure does not block completion.
    assert!(h.checkpoints.load().unwrap().is_none());
}

#[tokio::test]
async fn store_failure_also_withholds_the_vector_point() {
    let h = harness(25, MockServices::default());
    let mut corpus: Vec<_> = (1..=4).map(doc).collect();
    corpus[1].reference = format!("Sahih Bukhari 2 {STORE_FAILURE_MARKER}");

    let report = h.loader.run(corpus, "fp-1").await.unwrap();

    assert_eq!(report.errors, 1);
    assert_eq!(h.services.doc_ids(), vec![1, 3, 4]);
    assert_eq!(h.services.point_ids(), vec![1, 3, 4]);
}

#[tokio::test]
async fn resumes_from_checkpoint_without_resetting() {
    let h = harness(25, MockServices::default());
    h.checkpoints
        .save(&Checkpoint {
            last_index: 25,
            corpus_fingerprint: "fp-1".to_string(),
        })
        .unwrap();

    let corpus: Vec<_> = (1..=30).map(doc).collect();
    let report = h.loader.run(corpus, "fp-1").await.unwrap();

    assert_eq!(report.resumed_from, 25);
    let calls = h.services.calls.lock().unwrap().clone();
    assert!(!calls.iter().any(|c| c.starts_with("reset")));
    // Only the tail past the checkpoint is processed.
    assert_eq!(h.services.doc_ids(), (26..=30).collect::<Vec<u64>>());
    assert_eq!(h.services.point_ids(), (26..=30).collect::<Vec<u64>>());
    assert!(h.checkpoints.load().unwrap().is_none());
}

#[tokio::test]
async fn fingerprint_mismatch_forces_a_fresh_start() {
    let h = harness(25, MockServices::default());
    h.checkpoints
        .save(&Checkpoint {
            last_index: 25,
            corpus_fingerprint: "fp-old".to_string(),
        })
        .unwrap();

    let corpus: Vec<_> = (1..=30).map(doc).collect();
    let report = h.loader.run(corpus, "fp-new").await.unwrap();

    assert_eq!(report.resumed_from, 0);
    let calls = h.services.calls.lock().unwrap().clone();
    assert!(calls.iter().any(|c| c == "reset_vector_index"));
    assert_eq!(h.services.doc_ids().len(), 30);
}

#[tokio::test]
async fn checkpoint_beyond_valid_sequence_forces_a_fresh_start() {
    let h = harness(25, MockServices::default());
    h.checkpoints
        .save(&Checkpoint {
            last_index: 99,
            corpus_fingerprint: "fp-1".to_string(),
        })
        .unwrap();

    let report = h.loader.run(vec![doc(1), doc(2)], "fp-1").await.unwrap();

    assert_eq!(report.resumed_from, 0);
    assert_eq!(h.services.doc_ids(), vec![1, 2]);
}

#[tokio::test]
async fn fatal_vector_error_keeps_the_checkpoint_for_a_rerun() {
    let services = MockServices {
        fail_point_upsert_on_call: Some(2),
        ..Default::default()
    };
    let h = harness(25, services);
    let corpus: Vec<_> = (1..=30).map(doc).collect();

    let err = h.loader.run(corpus.clone(), "fp-1").await.unwrap_err();
    assert!(matches!(err, AppError::VectorIndex(_)));

    // The first committed batch survives in the checkpoint.
    let checkpoint = h.checkpoints.load().unwrap().unwrap();
    assert_eq!(checkpoint.last_index, 25);
    assert_eq!(checkpoint.corpus_fingerprint, "fp-1");

    // Rerunning resumes past the committed batch and completes.
    let report = h.loader.run(corpus, "fp-1").await.unwrap();
    assert_eq!(report.resumed_from, 25);
    assert_eq!(h.services.doc_ids().len(), 30);
    assert!(h.checkpoints.load().unwrap().is_none());
}

#[tokio::test]
async fn running_twice_over_the_same_corpus_is_idempotent() {
    let h = harness(25, MockServices::default());
    let corpus: Vec<_> = (1..=30).map(doc).collect();

    h.loader.run(corpus.clone(), "fp-1").await.unwrap();
    let first_docs = h.services.doc_ids();

    // No checkpoint is left, so the second run starts fresh and
    // reassigns the exact same ids.
    let report = h.loader.run(corpus, "fp-1").await.unwrap();
    assert_eq!(report.resumed_from, 0);
    assert_eq!(h.services.doc_ids(), first_docs);
    assert_eq!(report.document_count, 30);
    assert_eq!(report.point_count, 30);
}

#[tokio::test]
async fn empty_corpus_completes_with_empty_report() {
    let h = harness(25, MockServices::default());
    let report = h.loader.run(Vec::new(), "fp-1").await.unwrap();

    assert_eq!(report.valid_documents, 0);
    assert_eq!(report.document_count, 0);
    assert!(h.services.point_batches.lock().unwrap().is_empty());
    assert!(h.checkpoints.load().unwrap().is_none());
}

#[tokio::test]
async fn documents_are_sanitized_before_persisting() {
    let h = harness(25, MockServices::default());
    let corpus = vec![KnowledgeDocument {
        reference: "   ".to_string(),
        english_text: "A narration long enough to keep".to_string(),
        ..Default::default()
    }];

    h.loader.run(corpus, "fp-1").await.unwrap();

    let docs = h.services.docs.lock().unwrap();
    assert_eq!(docs[&1].reference, "Unknown Reference");
}
