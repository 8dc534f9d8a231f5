use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{deserialize_datetime, deserialize_flexible_id, serialize_datetime, StoredObject};

/// Minimum trimmed length of the embeddable text for a document to enter
/// the load at all. Everything shorter is counted and dropped before any
/// persistence happens.
pub const MIN_EMBEDDABLE_CHARS: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceType {
    Quran,
    Hadith,
    Tafsir,
    Fiqh,
    Seerah,
    Dua,
}

impl Default for SourceType {
    fn default() -> Self {
        Self::Hadith
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Quran => "Quran",
            Self::Hadith => "Hadith",
            Self::Tafsir => "Tafsir",
            Self::Fiqh => "Fiqh",
            Self::Seerah => "Seerah",
            Self::Dua => "Dua",
        };
        f.write_str(label)
    }
}

/// Canonical document shape, one entry of the processed corpus file.
/// Every field is defaulted so partially-formed records from older corpus
/// files still deserialize; `sanitize` fills the gaps afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KnowledgeDocument {
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub arabic_text: String,
    #[serde(default)]
    pub english_text: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl KnowledgeDocument {
    /// Fills missing optional fields with their documented defaults.
    pub fn sanitize(mut self) -> Self {
        if self.reference.trim().is_empty() {
            self.reference = "Unknown Reference".to_string();
        }
        if self.english_text.is_empty() {
            self.english_text = if self.arabic_text.is_empty() {
                self.reference.clone()
            } else {
                self.arabic_text.clone()
            };
        }
        self
    }

    /// Text handed to the embedding provider: English first, then Arabic,
    /// then the citation itself.
    pub fn embedding_text(&self) -> &str {
        if !self.english_text.is_empty() {
            &self.english_text
        } else if !self.arabic_text.is_empty() {
            &self.arabic_text
        } else {
            &self.reference
        }
    }

    /// Validity predicate for the load. Deliberately looks at the raw
    /// english/arabic text only, not the reference fallback, so a record
    /// with nothing but a citation never reaches the embedding provider.
    pub fn has_valid_text(&self) -> bool {
        let text = if self.english_text.is_empty() {
            &self.arabic_text
        } else {
            &self.english_text
        };
        text.trim().chars().count() > MIN_EMBEDDABLE_CHARS
    }
}

/// Document-store record. Keyed by the document's 1-based position in the
/// valid-only sequence, the same number used as its vector point id, so
/// replays upsert instead of duplicating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeSource {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub created_at: DateTime<Utc>,
    pub position: u64,
    pub source_type: SourceType,
    pub reference: String,
    pub arabic_text: String,
    pub english_text: String,
    pub context: String,
    pub tags: Vec<String>,
    // SurrealDB stores a JSON null as an absent field; default it back to
    // Null on read so written records round-trip.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl KnowledgeSource {
    pub fn from_document(position: u64, doc: KnowledgeDocument) -> Self {
        Self {
            id: position.to_string(),
            created_at: Utc::now(),
            position,
            source_type: doc.source_type,
            reference: doc.reference,
            arabic_text: doc.arabic_text,
            english_text: doc.english_text,
            context: doc.context,
            tags: doc.tags,
            metadata: doc.metadata,
        }
    }
}

impl StoredObject for KnowledgeSource {
    fn table_name() -> &'static str {
        "knowledge_source"
    }

    fn get_id(&self) -> &str {
        &self.id
    }
}
