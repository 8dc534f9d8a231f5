use std::path::Path;
use std::sync::Arc;

use common::{
    storage::{
        checkpoint::corpus_fingerprint, db::SurrealDbClient, types::knowledge_document::KnowledgeDocument,
        vector::VectorIndexClient,
    },
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use ingestion_pipeline::{
    normalizer::PROCESSED_CORPUS_FILE, DefaultLoaderServices, LoaderConfig, ResumableLoader,
    TracingObserver,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;

    let corpus_path = Path::new(&config.data_dir).join(PROCESSED_CORPUS_FILE);
    let bytes = tokio::fs::read(&corpus_path).await.map_err(|err| {
        format!(
            "cannot read corpus at {}: {err}; run the fetch and normalize binaries first",
            corpus_path.display()
        )
    })?;
    let fingerprint = corpus_fingerprint(&bytes);
    let corpus: Vec<KnowledgeDocument> = serde_json::from_slice(&bytes)?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );
    db.ensure_initialized().await?;

    let vector = VectorIndexClient::new(
        &config.qdrant_url,
        &config.qdrant_api_key,
        &config.qdrant_collection,
    )?;

    let openai_client = config.openai_api_key.as_ref().map(|key| {
        Arc::new(async_openai::Client::with_config(
            async_openai::config::OpenAIConfig::new()
                .with_api_key(key)
                .with_api_base(&config.openai_base_url),
        ))
    });
    let embedder = Arc::new(EmbeddingProvider::from_config(&config, openai_client).await?);
    info!(
        backend = embedder.backend_label(),
        dimension = embedder.dimension(),
        "embedding provider ready"
    );

    let services = Arc::new(DefaultLoaderServices::new(db, vector, embedder));
    let loader_config = LoaderConfig::new(Path::new(&config.data_dir).join("load_progress.json"));
    let loader = ResumableLoader::new(services, Arc::new(TracingObserver), loader_config);

    let report = loader.run(corpus, &fingerprint).await?;
    info!(
        valid = report.valid_documents,
        invalid_skipped = report.invalid_documents,
        errors = report.errors,
        documents = report.document_count,
        points = report.point_count,
        elapsed_secs = report.elapsed.as_secs(),
        "load finished"
    );

    Ok(())
}
