use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::knowledge_document::KnowledgeSource,
        vector::{CollectionInfo, EmbeddingRecord, VectorIndexClient},
    },
    utils::embedding::EmbeddingProvider,
};

/// Everything the loader needs from the outside world, behind one seam so
/// tests can drive the state machine without live services.
#[async_trait]
pub trait LoaderServices: Send + Sync {
    async fn reset_document_store(&self) -> Result<(), AppError>;
    async fn upsert_document(&self, record: KnowledgeSource) -> Result<(), AppError>;
    async fn document_count(&self) -> Result<u64, AppError>;

    fn embedding_dimension(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;

    /// Delete-then-recreate with the given dimension and cosine distance.
    async fn reset_vector_index(&self, dimension: usize) -> Result<(), AppError>;
    async fn upsert_points(&self, records: &[EmbeddingRecord]) -> Result<(), AppError>;
    async fn vector_collection_info(&self) -> Result<CollectionInfo, AppError>;
}

pub struct DefaultLoaderServices {
    db: Arc<SurrealDbClient>,
    vector: VectorIndexClient,
    embedder: Arc<EmbeddingProvider>,
}

impl DefaultLoaderServices {
    pub fn new(
        db: Arc<SurrealDbClient>,
        vector: VectorIndexClient,
        embedder: Arc<EmbeddingProvider>,
    ) -> Self {
        Self {
            db,
            vector,
            embedder,
        }
    }
}

#[async_trait]
impl LoaderServices for DefaultLoaderServices {
    async fn reset_document_store(&self) -> Result<(), AppError> {
        self.db.clear_table::<KnowledgeSource>().await?;
        Ok(())
    }

    async fn upsert_document(&self, record: KnowledgeSource) -> Result<(), AppError> {
        self.db.upsert_item(record).await?;
        Ok(())
    }

    async fn document_count(&self) -> Result<u64, AppError> {
        Ok(self.db.count_table::<KnowledgeSource>().await?)
    }

    fn embedding_dimension(&self) -> usize {
        self.embedder.dimension()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        self.embedder.embed(text).await
    }

    async fn reset_vector_index(&self, dimension: usize) -> Result<(), AppError> {
        self.vector.delete_collection().await?;
        self.vector.create_collection(dimension).await
    }

    async fn upsert_points(&self, records: &[EmbeddingRecord]) -> Result<(), AppError> {
        self.vector.upsert_points(records).await
    }

    async fn vector_collection_info(&self) -> Result<CollectionInfo, AppError> {
        self.vector.collection_info().await
    }
}
