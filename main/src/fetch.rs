use common::utils::{config::get_config, retry::RetryPolicy};
use ingestion_pipeline::fetcher::{
    hadith, hadith_raw_file, quran::QuranSource, raw_dir, Fetcher, HADITH_SUMMARY_FILE,
    QURAN_RAW_FILE,
};
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

    let config = get_config()?;
    let raw = raw_dir(&config.data_dir);
    tokio::fs::create_dir_all(&raw).await?;

    let fetcher = Fetcher::new(RetryPolicy::default())?;

    let verses = QuranSource::new(&fetcher).fetch().await?;
    tokio::fs::write(raw.join(QURAN_RAW_FILE), serde_json::to_vec_pretty(&verses)?).await?;
    info!(count = verses.len(), "saved Quran verses");

    let results = hadith::fetch_all(&fetcher).await?;
    for result in &results {
        match &result.error {
            None => {
                tokio::fs::write(
                    raw.join(hadith_raw_file(result.collection.name)),
                    serde_json::to_vec_pretty(&result.records)?,
                )
                .await?;
                info!(
                    collection = result.collection.name,
                    count = result.records.len(),
                    "saved hadith collection"
                );
            }
            Some(error) => {
                warn!(collection = result.collection.name, error, "collection not saved");
            }
        }
    }

    let summary = hadith::summarize(&results);
    tokio::fs::write(
        raw.join(HADITH_SUMMARY_FILE),
        serde_json::to_vec_pretty(&summary)?,
    )
    .await?;
    info!(
        total_hadiths = summary.total_hadiths,
        "fetch complete, raw payloads written"
    );

    Ok(())
}
