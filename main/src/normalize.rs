use std::path::Path;

use common::storage::types::knowledge_document::KnowledgeDocument;
use ingestion_pipeline::fetcher::{
    hadith::{HadithRecord, HADITH_COLLECTIONS},
    hadith_raw_file,
    quran::QuranVerse,
    raw_dir, QURAN_RAW_FILE,
};
use ingestion_pipeline::normalizer::{normalize_hadiths, normalize_quran, PROCESSED_CORPUS_FILE};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = common::utils::config::get_config()?;
    let raw = raw_dir(&config.data_dir);

    // Quran first, then the six collections in catalog order. This order
    // defines the corpus and therefore the id space downstream.
    let mut corpus: Vec<KnowledgeDocument> = Vec::new();

    let quran_path = raw.join(QURAN_RAW_FILE);
    match read_json::<Vec<QuranVerse>>(&quran_path).await {
        Some(verses) => corpus.extend(normalize_quran(&verses)),
        None => warn!(path = %quran_path.display(), "no Quran raw file, skipping"),
    }

    for collection in HADITH_COLLECTIONS {
        let path = raw.join(hadith_raw_file(collection.name));
        match read_json::<Vec<HadithRecord>>(&path).await {
            Some(records) => corpus.extend(normalize_hadiths(&records, collection.display_name)),
            None => warn!(
                collection = collection.name,
                path = %path.display(),
                "no raw file, skipping collection"
            ),
        }
    }

    if corpus.is_empty() {
        return Err("no raw source files found; run the fetch binary first".into());
    }

    let out_path = Path::new(&config.data_dir).join(PROCESSED_CORPUS_FILE);
    tokio::fs::write(&out_path, serde_json::to_vec_pretty(&corpus)?).await?;
    info!(
        documents = corpus.len(),
        path = %out_path.display(),
        "canonical corpus written"
    );

    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unreadable raw file");
            None
        }
    }
}
