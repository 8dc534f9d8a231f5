pub mod hadith;
pub mod quran;

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{error::AppError, utils::retry::RetryPolicy};
use serde::de::DeserializeOwned;
use tokio_retry::Retry;
use tracing::warn;

/// Raw source payloads land under `<data_dir>/raw/`.
pub fn raw_dir(data_dir: &str) -> PathBuf {
    Path::new(data_dir).join("raw")
}

pub const QURAN_RAW_FILE: &str = "quran_verses_complete.json";
pub const HADITH_SUMMARY_FILE: &str = "hadith_summary.json";

pub fn hadith_raw_file(collection_name: &str) -> String {
    format!("hadith_{collection_name}.json")
}

/// HTTP fetcher with a bounded retry budget. Purely functional given a URL;
/// fallback sources are the caller's decision, the fetcher only raises.
pub struct Fetcher {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(policy: RetryPolicy) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("islamic-knowledge-ingest/0.1")
            .build()?;
        Ok(Self { http, policy })
    }

    /// Fetches and decodes a JSON body, retrying with the policy's linear
    /// backoff. Any non-2xx status is retried identically; a 404 is not
    /// distinguished from a 500.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, AppError> {
        let attempts = self.policy.max_attempts;
        Retry::spawn(self.policy.delays(), || self.try_fetch::<T>(url))
            .await
            .map_err(|err| {
                warn!(url, attempts, error = %err, "fetch retry budget exhausted");
                AppError::Fetch(format!("GET {url} failed after {attempts} attempts: {err}"))
            })
    }

    async fn try_fetch<T: DeserializeOwned>(&self, url: &str) -> Result<T, anyhow::Error> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {status}");
        }
        Ok(response.json::<T>().await?)
    }
}
