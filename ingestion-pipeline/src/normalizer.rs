use common::storage::types::knowledge_document::{KnowledgeDocument, SourceType};
use serde_json::json;
use tracing::info;

use crate::fetcher::hadith::HadithRecord;
use crate::fetcher::quran::QuranVerse;

/// The canonical corpus file, written under the data directory.
pub const PROCESSED_CORPUS_FILE: &str = "processed_islamic_data.json";

/// Topic taxonomy: a document gets every topic whose any trigger keyword
/// appears as a case-insensitive substring of its English text. Matching
/// is substring, not token based, so "steadfast" does tag "fasting".
const TAXONOMY: &[(&str, &[&str])] = &[
    ("prayer", &["pray", "prayer", "salah", "salat", "namaz", "prostration", "rakat"]),
    ("fasting", &["fast", "fasting", "ramadan", "sawm", "siyam", "iftar", "suhoor"]),
    ("zakat", &["zakat", "charity", "alms", "sadaqah", "zakah"]),
    ("hajj", &["hajj", "pilgrimage", "kaaba", "mecca", "umrah", "tawaf", "safa", "marwah"]),
    ("faith", &["faith", "believe", "belief", "iman", "conviction"]),
    ("prophet", &["prophet", "messenger", "muhammad", "rasul", "nabiy"]),
    ("allah", &["allah", "god", "lord", "creator", "rabb"]),
    ("quran", &["quran", "koran", "revelation", "book", "scripture"]),
    ("death", &["death", "grave", "afterlife", "judgment", "paradise", "hell"]),
    ("family", &["marriage", "divorce", "wife", "husband", "children", "family"]),
    ("halal", &["halal", "haram", "permissible", "forbidden", "lawful"]),
    ("ethics", &["honesty", "truthful", "kindness", "mercy", "justice", "character"]),
    ("knowledge", &["knowledge", "learn", "study", "education", "wisdom"]),
    ("purification", &["wudu", "ghusl", "ablution", "purification", "clean"]),
];

/// Topical tags for a piece of English text; `["general"]` when nothing
/// in the taxonomy matches.
pub fn keyword_tags(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let tags: Vec<String> = TAXONOMY
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|keyword| lower.contains(keyword)))
        .map(|(topic, _)| (*topic).to_string())
        .collect();

    if tags.is_empty() {
        vec!["general".to_string()]
    } else {
        tags
    }
}

/// Maps fetched Quran verses onto canonical documents, preserving input
/// order. That order becomes the numeric id assignment order at load time,
/// so it must not be perturbed here.
pub fn normalize_quran(verses: &[QuranVerse]) -> Vec<KnowledgeDocument> {
    let documents: Vec<KnowledgeDocument> = verses
        .iter()
        .map(|verse| {
            let mut tags = vec![
                "Quran".to_string(),
                verse.chapter_name.clone(),
                format!("Chapter{}", verse.chapter_id),
            ];
            tags.extend(keyword_tags(&verse.english_text));

            KnowledgeDocument {
                source_type: SourceType::Quran,
                reference: format!(
                    "Surah {} {}:{}",
                    verse.chapter_name, verse.chapter_id, verse.verse_number
                ),
                arabic_text: verse.arabic_text.clone(),
                english_text: verse.english_text.clone(),
                context: format!(
                    "Verse {} from Surah {} (Chapter {})",
                    verse.verse_number, verse.chapter_name, verse.chapter_id
                ),
                tags,
                metadata: json!({
                    "chapter_id": verse.chapter_id,
                    "verse_number": verse.verse_number,
                }),
            }
        })
        .collect();

    info!(count = documents.len(), "normalized Quran verses");
    documents
}

/// Maps one fetched hadith collection onto canonical documents, again
/// preserving input order.
pub fn normalize_hadiths(
    records: &[HadithRecord],
    collection_name: &str,
) -> Vec<KnowledgeDocument> {
    let documents: Vec<KnowledgeDocument> = records
        .iter()
        .map(|hadith| {
            let mut tags = vec!["Hadith".to_string(), collection_name.to_string()];
            tags.extend(keyword_tags(&hadith.text));

            KnowledgeDocument {
                source_type: SourceType::Hadith,
                reference: format!("{collection_name} {}", hadith.hadithnumber),
                arabic_text: hadith.arabictext.clone(),
                english_text: hadith.text.clone(),
                context: format!("Hadith from {collection_name}"),
                tags,
                metadata: json!({
                    "hadith_number": hadith.hadithnumber,
                    "collection": collection_name,
                }),
            }
        })
        .collect();

    info!(
        collection = collection_name,
        count = documents.len(),
        "normalized hadith collection"
    );
    documents
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verse(chapter: u32, number: u32, english: &str) -> QuranVerse {
        QuranVerse {
            chapter_id: chapter,
            chapter_name: "Al-Baqarah".to_string(),
            verse_number: number,
            verse_key: format!("{chapter}:{number}"),
            arabic_text: "نص".to_string(),
            english_text: english.to_string(),
        }
    }

    fn hadith(number: u64, text: &str) -> HadithRecord {
        HadithRecord {
            hadithnumber: number.into(),
            text: text.to_string(),
            arabictext: String::new(),
        }
    }

    #[test]
    fn tags_match_case_insensitively() {
        let tags = keyword_tags("Establish PRAYER and give Zakat");
        assert!(tags.contains(&"prayer".to_string()));
        assert!(tags.contains(&"zakat".to_string()));
    }

    #[test]
    fn substring_matching_accepts_collisions() {
        // "steadfast" contains "fast"; that is the documented tradeoff.
        assert!(keyword_tags("remain steadfast").contains(&"fasting".to_string()));
    }

    #[test]
    fn unmatched_text_falls_back_to_general() {
        assert_eq!(keyword_tags("and then they went away"), vec!["general"]);
    }

    #[test]
    fn quran_documents_carry_structural_tags_and_reference() {
        let docs = normalize_quran(&[verse(2, 45, "And seek help through patience and prayer")]);
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.source_type, SourceType::Quran);
        assert_eq!(doc.reference, "Surah Al-Baqarah 2:45");
        assert!(doc.tags.starts_with(&[
            "Quran".to_string(),
            "Al-Baqarah".to_string(),
            "Chapter2".to_string()
        ]));
        assert!(doc.tags.contains(&"prayer".to_string()));
        assert_eq!(doc.metadata["chapter_id"], 2);
        assert_eq!(doc.metadata["verse_number"], 45);
    }

    #[test]
    fn hadith_documents_reference_collection_and_number() {
        let docs = normalize_hadiths(&[hadith(1, "Actions are judged by intentions")], "Sahih Bukhari");
        let doc = &docs[0];
        assert_eq!(doc.source_type, SourceType::Hadith);
        assert_eq!(doc.reference, "Sahih Bukhari 1");
        assert_eq!(doc.context, "Hadith from Sahih Bukhari");
        assert_eq!(doc.metadata["collection"], "Sahih Bukhari");
        assert!(doc.tags.contains(&"Hadith".to_string()));
    }

    #[test]
    fn input_order_is_preserved() {
        let docs = normalize_quran(&[
            verse(1, 1, "first verse text"),
            verse(1, 2, "second verse text"),
            verse(2, 1, "third verse text"),
        ]);
        let refs: Vec<_> = docs.iter().map(|d| d.reference.as_str()).collect();
        assert_eq!(
            refs,
            vec![
                "Surah Al-Baqarah 1:1",
                "Surah Al-Baqarah 1:2",
                "Surah Al-Baqarah 2:1"
            ]
        );
    }

    #[test]
    fn tags_are_never_empty() {
        let docs = normalize_hadiths(&[hadith(2, "xyz")], "Tirmidhi");
        assert!(!docs[0].tags.is_empty());
        assert!(docs[0].tags.contains(&"general".to_string()));
    }
}
