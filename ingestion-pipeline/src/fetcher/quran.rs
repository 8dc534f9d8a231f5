use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use common::error::AppError;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::Fetcher;

const CDN_BASE: &str = "https://cdn.jsdelivr.net/gh/fawazahmed0/quran-api@1/editions";
const QURAN_API: &str = "https://api.quran.com/api/v4";

/// Interval between paginated quran.com requests; that API is rate limited,
/// unlike the CDN.
const PAGE_DELAY: Duration = Duration::from_millis(200);
const CHAPTER_DELAY: Duration = Duration::from_millis(300);

/// English surah names, indexed by chapter id - 1. The CDN editions key
/// verses by bare chapter number, so the names ride along here.
const SURAH_NAMES: [&str; 114] = [
    "Al-Fatihah", "Al-Baqarah", "Ali 'Imran", "An-Nisa", "Al-Ma'idah",
    "Al-An'am", "Al-A'raf", "Al-Anfal", "At-Tawbah", "Yunus",
    "Hud", "Yusuf", "Ar-Ra'd", "Ibrahim", "Al-Hijr",
    "An-Nahl", "Al-Isra", "Al-Kahf", "Maryam", "Ta-Ha",
    "Al-Anbya", "Al-Hajj", "Al-Mu'minun", "An-Nur", "Al-Furqan",
    "Ash-Shu'ara", "An-Naml", "Al-Qasas", "Al-'Ankabut", "Ar-Rum",
    "Luqman", "As-Sajdah", "Al-Ahzab", "Saba", "Fatir",
    "Ya-Sin", "As-Saffat", "Sad", "Az-Zumar", "Ghafir",
    "Fussilat", "Ash-Shura", "Az-Zukhruf", "Ad-Dukhan", "Al-Jathiyah",
    "Al-Ahqaf", "Muhammad", "Al-Fath", "Al-Hujurat", "Qaf",
    "Adh-Dhariyat", "At-Tur", "An-Najm", "Al-Qamar", "Ar-Rahman",
    "Al-Waqi'ah", "Al-Hadid", "Al-Mujadila", "Al-Hashr", "Al-Mumtahanah",
    "As-Saf", "Al-Jumu'ah", "Al-Munafiqun", "At-Taghabun", "At-Talaq",
    "At-Tahrim", "Al-Mulk", "Al-Qalam", "Al-Haqqah", "Al-Ma'arij",
    "Nuh", "Al-Jinn", "Al-Muzzammil", "Al-Muddaththir", "Al-Qiyamah",
    "Al-Insan", "Al-Mursalat", "An-Naba", "An-Nazi'at", "Abasa",
    "At-Takwir", "Al-Infitar", "Al-Mutaffifin", "Al-Inshiqaq", "Al-Buruj",
    "At-Tariq", "Al-A'la", "Al-Ghashiyah", "Al-Fajr", "Al-Balad",
    "Ash-Shams", "Al-Layl", "Ad-Duha", "Ash-Sharh", "At-Tin",
    "Al-'Alaq", "Al-Qadr", "Al-Bayyinah", "Az-Zalzalah", "Al-'Adiyat",
    "Al-Qari'ah", "At-Takathur", "Al-'Asr", "Al-Humazah", "Al-Fil",
    "Quraysh", "Al-Ma'un", "Al-Kawthar", "Al-Kafirun", "An-Nasr",
    "Al-Masad", "Al-Ikhlas", "Al-Falaq", "An-Nas",
];

pub fn surah_name(chapter_id: u32) -> String {
    SURAH_NAMES
        .get(chapter_id.saturating_sub(1) as usize)
        .map_or_else(|| format!("Chapter {chapter_id}"), |name| (*name).to_string())
}

/// One verse as fetched; consumed by the normalizer and discarded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuranVerse {
    pub chapter_id: u32,
    pub chapter_name: String,
    pub verse_number: u32,
    pub verse_key: String,
    pub arabic_text: String,
    pub english_text: String,
}

/// CDN edition shape: verses keyed by stringified chapter then verse number.
#[derive(Debug, Deserialize)]
struct CdnEdition {
    #[serde(default)]
    chapter: HashMap<String, HashMap<String, String>>,
}

/// Flattens a pair of CDN editions into verse order. JSON object keys carry
/// no order, so both levels are re-sorted numerically; this ordering later
/// becomes the vector id space and must stay stable between runs.
fn merge_editions(english: &CdnEdition, arabic: &CdnEdition) -> Vec<QuranVerse> {
    let mut chapters: BTreeMap<u32, BTreeMap<u32, &str>> = BTreeMap::new();
    for (chapter_key, verses) in &english.chapter {
        let Ok(chapter_id) = chapter_key.parse::<u32>() else {
            continue;
        };
        let ordered = chapters.entry(chapter_id).or_default();
        for (verse_key, text) in verses {
            if let Ok(verse_number) = verse_key.parse::<u32>() {
                ordered.insert(verse_number, text.as_str());
            }
        }
    }

    let mut all_verses = Vec::new();
    for (chapter_id, verses) in chapters {
        let chapter_name = surah_name(chapter_id);
        let arabic_chapter = arabic.chapter.get(&chapter_id.to_string());
        for (verse_number, english_text) in verses {
            let arabic_text = arabic_chapter
                .and_then(|chapter| chapter.get(&verse_number.to_string()))
                .cloned()
                .unwrap_or_default();
            all_verses.push(QuranVerse {
                chapter_id,
                chapter_name: chapter_name.clone(),
                verse_number,
                verse_key: format!("{chapter_id}:{verse_number}"),
                arabic_text,
                english_text: english_text.to_string(),
            });
        }
    }
    all_verses
}

/// Drops `<...>` markup from quran.com translation text.
fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}

// quran.com API v4 shapes, limited to the fields we read.

#[derive(Debug, Deserialize)]
struct ChaptersResponse {
    chapters: Vec<ChapterMeta>,
}

#[derive(Debug, Deserialize)]
struct ChapterMeta {
    id: u32,
    name_simple: String,
}

#[derive(Debug, Deserialize)]
struct VersesResponse {
    #[serde(default)]
    verses: Vec<ApiVerse>,
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct ApiVerse {
    verse_number: u32,
    verse_key: String,
    #[serde(default)]
    text_uthmani: Option<String>,
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(default)]
    current_page: u32,
    #[serde(default)]
    total_pages: u32,
}

/// Quran source driver: the no-rate-limit CDN is primary, quran.com the
/// designated fallback once the fetcher's retry budget is spent.
pub struct QuranSource<'a> {
    fetcher: &'a Fetcher,
}

impl<'a> QuranSource<'a> {
    pub fn new(fetcher: &'a Fetcher) -> Self {
        Self { fetcher }
    }

    pub async fn fetch(&self) -> Result<Vec<QuranVerse>, AppError> {
        match self.fetch_from_cdn().await {
            Ok(verses) => Ok(verses),
            Err(err) => {
                warn!(error = %err, "CDN source failed, falling back to quran.com");
                self.fetch_from_quran_com().await
            }
        }
    }

    async fn fetch_from_cdn(&self) -> Result<Vec<QuranVerse>, AppError> {
        info!("fetching Quran editions from CDN");
        let english: CdnEdition = self
            .fetcher
            .fetch_json(&format!("{CDN_BASE}/eng-kquran.json"))
            .await?;
        let arabic: CdnEdition = self
            .fetcher
            .fetch_json(&format!("{CDN_BASE}/ara-quran.json"))
            .await?;

        if english.chapter.is_empty() {
            return Err(AppError::Fetch("invalid response from CDN".to_string()));
        }

        let verses = merge_editions(&english, &arabic);
        info!(verse_count = verses.len(), "fetched Quran verses from CDN");
        Ok(verses)
    }

    async fn fetch_from_quran_com(&self) -> Result<Vec<QuranVerse>, AppError> {
        info!("fetching chapter list from quran.com");
        let chapters: ChaptersResponse = self
            .fetcher
            .fetch_json(&format!("{QURAN_API}/chapters?language=en"))
            .await?;

        let mut all_verses = Vec::new();
        for chapter in &chapters.chapters {
            let mut page = 1u32;
            loop {
                let url = format!(
                    "{QURAN_API}/verses/by_chapter/{}?language=en&translations=131&fields=text_uthmani&page={page}&per_page=50",
                    chapter.id
                );
                let data: VersesResponse = match self.fetcher.fetch_json(&url).await {
                    Ok(data) => data,
                    Err(err) => {
                        // A bad page ends this chapter, not the whole fetch.
                        error!(chapter = chapter.id, page, error = %err, "error fetching verse page");
                        break;
                    }
                };
                if data.verses.is_empty() {
                    break;
                }

                for verse in &data.verses {
                    let translation = verse
                        .translations
                        .first()
                        .map(|t| strip_html(&t.text))
                        .unwrap_or_default();
                    all_verses.push(QuranVerse {
                        chapter_id: chapter.id,
                        chapter_name: chapter.name_simple.clone(),
                        verse_number: verse.verse_number,
                        verse_key: verse.verse_key.clone(),
                        arabic_text: verse.text_uthmani.clone().unwrap_or_default(),
                        english_text: translation,
                    });
                }

                let has_more = data
                    .meta
                    .is_some_and(|meta| meta.current_page < meta.total_pages);
                if !has_more {
                    break;
                }
                page = page.saturating_add(1);
                sleep(PAGE_DELAY).await;
            }
            sleep(CHAPTER_DELAY).await;
        }

        info!(verse_count = all_verses.len(), "fetched Quran verses from quran.com");
        Ok(all_verses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edition(entries: &[(&str, &[(&str, &str)])]) -> CdnEdition {
        CdnEdition {
            chapter: entries
                .iter()
                .map(|(chapter, verses)| {
                    (
                        (*chapter).to_string(),
                        verses
                            .iter()
                            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                            .collect(),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn merge_orders_chapters_and_verses_numerically() {
        let english = edition(&[
            ("10", &[("2", "ten two"), ("1", "ten one")]),
            ("2", &[("1", "two one")]),
        ]);
        let arabic = edition(&[("2", &[("1", "arabic two one")])]);

        let verses = merge_editions(&english, &arabic);
        let keys: Vec<_> = verses.iter().map(|v| v.verse_key.as_str()).collect();
        assert_eq!(keys, vec!["2:1", "10:1", "10:2"]);
        assert_eq!(verses[0].arabic_text, "arabic two one");
        assert_eq!(verses[1].arabic_text, "");
    }

    #[test]
    fn merge_fills_chapter_names() {
        let english = edition(&[("1", &[("1", "In the name of Allah")])]);
        let verses = merge_editions(&english, &edition(&[]));
        assert_eq!(verses[0].chapter_name, "Al-Fatihah");
    }

    #[test]
    fn surah_name_falls_back_past_the_table() {
        assert_eq!(surah_name(114), "An-Nas");
        assert_eq!(surah_name(115), "Chapter 115");
        assert_eq!(surah_name(0), "Chapter 0");
    }

    #[test]
    fn strip_html_removes_markup_and_trims() {
        assert_eq!(
            strip_html("<sup foot_note=123>1</sup> All praise is due to Allah "),
            "1 All praise is due to Allah"
        );
        assert_eq!(strip_html("plain"), "plain");
    }
}
