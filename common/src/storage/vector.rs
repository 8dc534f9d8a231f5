use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AppError;
use crate::storage::types::knowledge_document::SourceType;

/// Payload carried on every vector point; this is the contract the
/// retrieval handler reads back from search hits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointPayload {
    pub text: String,
    pub source_type: SourceType,
    pub reference: String,
}

/// One upsert unit: the point id is the document's 1-based position in the
/// valid-only sequence and doubles as the document-store key.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbeddingRecord {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: u64,
    pub score: f32,
    pub payload: Option<PointPayload>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CollectionInfo {
    #[serde(default)]
    pub points_count: u64,
    #[serde(default)]
    pub status: String,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    result: Option<T>,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct CreateCollectionBody {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct UpsertBody<'a> {
    points: &'a [EmbeddingRecord],
}

#[derive(Serialize)]
struct SearchBody<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

fn create_collection_body(dimension: usize) -> CreateCollectionBody {
    CreateCollectionBody {
        vectors: VectorParams {
            size: dimension,
            distance: "Cosine",
        },
    }
}

fn search_body(vector: &[f32], limit: usize) -> SearchBody<'_> {
    SearchBody {
        vector,
        limit,
        with_payload: true,
    }
}

/// Qdrant HTTP client scoped to one collection.
#[derive(Clone)]
pub struct VectorIndexClient {
    http: reqwest::Client,
    base_url: String,
    collection: String,
}

impl VectorIndexClient {
    pub fn new(base_url: &str, api_key: &str, collection: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(AppError::Validation(
                "vector index url must be an http(s) URL".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !api_key.trim().is_empty() {
            let value = HeaderValue::from_str(api_key.trim())
                .map_err(|_| AppError::Validation("invalid vector index api key".to_string()))?;
            headers.insert("api-key", value);
        }

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            collection: collection.to_string(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    pub async fn collection_exists(&self) -> bool {
        match self.http.get(self.collection_url()).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub async fn create_collection(&self, dimension: usize) -> Result<(), AppError> {
        if self.collection_exists().await {
            info!(collection = %self.collection, "vector collection already exists, skipping creation");
            return Ok(());
        }

        let response = self
            .http
            .put(self.collection_url())
            .json(&create_collection_body(dimension))
            .send()
            .await?;
        Self::ensure_success("create collection", response).await?;
        info!(collection = %self.collection, dimension, "vector collection created");
        Ok(())
    }

    /// Idempotent: a missing collection is not an error.
    pub async fn delete_collection(&self) -> Result<(), AppError> {
        let response = self.http.delete(self.collection_url()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::ensure_success("delete collection", response).await?;
        debug!(collection = %self.collection, "vector collection deleted");
        Ok(())
    }

    /// Upserts the batch in one call; points with the same id overwrite.
    pub async fn upsert_points(&self, records: &[EmbeddingRecord]) -> Result<(), AppError> {
        if records.is_empty() {
            return Ok(());
        }

        let response = self
            .http
            .put(format!("{}/points", self.collection_url()))
            .json(&UpsertBody { points: records })
            .send()
            .await?;
        Self::ensure_success("upsert points", response).await?;
        Ok(())
    }

    pub async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>, AppError> {
        let response = self
            .http
            .post(format!("{}/points/search", self.collection_url()))
            .json(&search_body(vector, limit))
            .send()
            .await?;
        let response = Self::ensure_success("search", response).await?;
        let body: ApiResponse<Vec<ScoredPoint>> = response.json().await?;
        Ok(body.result.unwrap_or_default())
    }

    pub async fn collection_info(&self) -> Result<CollectionInfo, AppError> {
        let response = self.http.get(self.collection_url()).send().await?;
        let response = Self::ensure_success("collection info", response).await?;
        let body: ApiResponse<CollectionInfo> = response.json().await?;
        Ok(body.result.unwrap_or_default())
    }

    async fn ensure_success(
        label: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        Err(AppError::VectorIndex(format!(
            "{label} failed: HTTP {status} | {body}"
        )))
    }
}
