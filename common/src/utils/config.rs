use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::embedding::EmbeddingBackend;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    pub qdrant_url: String,
    #[serde(default)]
    pub qdrant_api_key: String,
    #[serde(default = "default_collection_name")]
    pub qdrant_collection: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackend,
    /// Optional fastembed model code; the backend default is used when unset.
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
}

fn default_collection_name() -> String {
    "islamic_knowledge".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_embedding_dimensions() -> u32 {
    384
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let cfg: AppConfig = serde_json::from_value(serde_json::json!({
            "surrealdb_address": "ws://localhost:8000",
            "surrealdb_username": "root",
            "surrealdb_password": "root",
            "surrealdb_namespace": "deen",
            "surrealdb_database": "knowledge",
            "qdrant_url": "http://localhost:6333",
        }))
        .expect("config should deserialize");

        assert_eq!(cfg.qdrant_collection, "islamic_knowledge");
        assert_eq!(cfg.data_dir, "./data");
        assert_eq!(cfg.embedding_dimensions, 384);
        assert_eq!(cfg.embedding_backend, EmbeddingBackend::FastEmbed);
        assert!(cfg.openai_api_key.is_none());
    }
}
