use std::time::Duration;

use chrono::{DateTime, Utc};
use common::error::AppError;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use super::Fetcher;

const HADITH_CDN: &str = "https://cdn.jsdelivr.net/gh/fawazahmed0/hadith-api@1";

const COLLECTION_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
pub struct HadithCollection {
    pub name: &'static str,
    pub display_name: &'static str,
    pub filename: &'static str,
}

/// The six canonical collections, fetched in this order. The order feeds
/// into the canonical corpus and therefore into the vector id space.
pub const HADITH_COLLECTIONS: [HadithCollection; 6] = [
    HadithCollection { name: "bukhari", display_name: "Sahih Bukhari", filename: "eng-bukhari" },
    HadithCollection { name: "muslim", display_name: "Sahih Muslim", filename: "eng-muslim" },
    HadithCollection { name: "abudawud", display_name: "Abu Dawud", filename: "eng-abudawud" },
    HadithCollection { name: "tirmidhi", display_name: "Tirmidhi", filename: "eng-tirmidhi" },
    HadithCollection { name: "nasai", display_name: "Nasa'i", filename: "eng-nasai" },
    HadithCollection { name: "ibnmajah", display_name: "Ibn Majah", filename: "eng-ibnmajah" },
];

/// One hadith as published by the CDN. Hadith numbers can be fractional
/// (sub-numbered narrations), so the raw JSON number is kept as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HadithRecord {
    pub hadithnumber: serde_json::Number,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub arabictext: String,
}

#[derive(Debug, Deserialize)]
struct CdnHadithEdition {
    #[serde(default)]
    hadiths: Vec<HadithRecord>,
}

/// Per-collection fetch result; a failed collection is recorded rather
/// than failing the whole run.
#[derive(Debug)]
pub struct CollectionFetch {
    pub collection: HadithCollection,
    pub records: Vec<HadithRecord>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FetchSummary {
    pub fetched_at: DateTime<Utc>,
    pub collections: Vec<SummaryEntry>,
    pub total_hadiths: usize,
}

#[derive(Debug, Serialize)]
pub struct SummaryEntry {
    pub name: String,
    pub count: usize,
    pub error: Option<String>,
}

pub async fn fetch_collection(
    fetcher: &Fetcher,
    collection: HadithCollection,
) -> CollectionFetch {
    let url = format!("{HADITH_CDN}/editions/{}.json", collection.filename);
    match fetcher.fetch_json::<CdnHadithEdition>(&url).await {
        Ok(edition) => {
            info!(
                collection = collection.display_name,
                count = edition.hadiths.len(),
                "fetched hadith collection"
            );
            CollectionFetch {
                collection,
                records: edition.hadiths,
                error: None,
            }
        }
        Err(err) => {
            warn!(collection = collection.display_name, error = %err, "hadith collection failed");
            CollectionFetch {
                collection,
                records: Vec::new(),
                error: Some(err.to_string()),
            }
        }
    }
}

pub async fn fetch_all(fetcher: &Fetcher) -> Result<Vec<CollectionFetch>, AppError> {
    let mut results = Vec::with_capacity(HADITH_COLLECTIONS.len());
    for collection in HADITH_COLLECTIONS {
        results.push(fetch_collection(fetcher, collection).await);
        sleep(COLLECTION_DELAY).await;
    }

    let ok = results.iter().filter(|r| r.error.is_none()).count();
    let total: usize = results.iter().map(|r| r.records.len()).sum();
    info!(
        collections_ok = ok,
        collections_total = HADITH_COLLECTIONS.len(),
        total_hadiths = total,
        "hadith fetch finished"
    );
    Ok(results)
}

pub fn summarize(results: &[CollectionFetch]) -> FetchSummary {
    FetchSummary {
        fetched_at: Utc::now(),
        collections: results
            .iter()
            .map(|result| SummaryEntry {
                name: result.collection.display_name.to_string(),
                count: result.records.len(),
                error: result.error.clone(),
            })
            .collect(),
        total_hadiths: results.iter().map(|r| r.records.len()).sum(),
    }
}
