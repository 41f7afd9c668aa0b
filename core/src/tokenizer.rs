use crate::error::LexiconError;
use lazy_static::lazy_static;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref NON_LETTER: Regex = Regex::new(r"[^\p{L}\s]").expect("valid regex");
    // negation words (tidak, bukan, tanpa, ...) are kept on purpose: reviews hinge on them
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "ada","adalah","agar","akan","aku","anda","apa","atau","bagi","bahwa","banyak","beberapa","begitu",
            "belum","bisa","boleh","buat","cukup","dalam","dan","dapat","dari","demikian","dengan","di","dia",
            "hal","hanya","harus","ia","ini","itu","jadi","jika","juga","kalau","kami","kamu","karena","ke",
            "kita","lagi","lah","lain","mau","maka","masih","mereka","nya","oleh","pada","para","pun","saat",
            "saja","sangat","saya","secara","sedang","sehingga","sekali","selalu","semua","seperti","serta",
            "sudah","supaya","tapi","telah","tentang","tersebut","untuk","yaitu","yang",
        ];
        words.iter().copied().collect()
    };
}

/// Special retrieval intent detected in a query by its trigger phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    /// List every place instead of ranking
    All,
    RatingTop,
    RatingBottom,
}

/// Text normalization consumed by the retrieval core. Indexing and scoring
/// never stem or drop stopwords themselves; they only see these outputs.
pub trait Normalizer: Send + Sync {
    /// Raw text to an ordered, possibly empty, sequence of terms.
    fn normalize(&self, text: &str) -> Vec<String>;
    /// Strip an intent trigger from the query, returning what remains.
    fn detect_intent(&self, query: &str) -> (String, Option<Intent>);
    /// Strip a region alias from the query, returning what remains.
    fn detect_region(&self, query: &str) -> (String, Option<String>);
}

/// What to do with a query left with no useful terms after intent/region
/// detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackPolicy {
    /// Words that carry no meaning once a region has been named ("cari", "lihat", ...)
    pub filler_words: Vec<String>,
    /// Term searched when only an intent or region was given
    pub fallback_term: String,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            filler_words: ["cari", "tampil", "lihat", "berikan", "saran", "rekomendasikan"]
                .iter()
                .map(|w| w.to_string())
                .collect(),
            fallback_term: "kemah".into(),
        }
    }
}

/// Dictionaries driving [`LexiconNormalizer`], usually loaded from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    /// Phrase or slang -> replacement token ("kamar mandi" -> "kamarmandi")
    pub phrases: BTreeMap<String, String>,
    /// Region alias -> region name matched against place locations
    pub regions: BTreeMap<String, String>,
    /// Trigger phrase -> intent
    pub intents: BTreeMap<String, Intent>,
    /// Replaces the built-in stopword list when present
    pub stopwords: Option<Vec<String>>,
    pub fallback: FallbackPolicy,
}

impl Lexicon {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LexiconError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Dictionary-substitution normalizer over a [`Lexicon`].
#[derive(Debug)]
pub struct LexiconNormalizer {
    phrases: Vec<(Regex, String)>,
    regions: Vec<(String, String)>,
    intents: Vec<(String, Intent)>,
    stopwords: Option<HashSet<String>>,
    fallback: FallbackPolicy,
}

impl LexiconNormalizer {
    pub fn new(lexicon: Lexicon) -> Result<Self, LexiconError> {
        let mut phrases = Vec::with_capacity(lexicon.phrases.len());
        for (phrase, token) in longest_first(lexicon.phrases) {
            let pattern = format!(r"\b{}\b", regex::escape(&phrase.to_lowercase()));
            let re = Regex::new(&pattern)
                .map_err(|e| LexiconError::InvalidPhrase { phrase: phrase.clone(), reason: e.to_string() })?;
            phrases.push((re, token.to_lowercase()));
        }
        let lower = |pairs: Vec<(String, String)>| {
            pairs.into_iter().map(|(k, v)| (k.to_lowercase(), v.to_lowercase())).collect::<Vec<_>>()
        };
        Ok(Self {
            phrases,
            regions: lower(longest_first(lexicon.regions)),
            intents: longest_first(lexicon.intents)
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
            stopwords: lexicon
                .stopwords
                .map(|words| words.into_iter().map(|w| w.to_lowercase()).collect()),
            fallback: lexicon.fallback,
        })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LexiconError> {
        Self::new(Lexicon::from_path(path)?)
    }

    pub fn fallback(&self) -> &FallbackPolicy {
        &self.fallback
    }

    fn is_stopword(&self, token: &str) -> bool {
        match &self.stopwords {
            Some(words) => words.contains(token),
            None => STOPWORDS.contains(token),
        }
    }
}

impl Default for LexiconNormalizer {
    fn default() -> Self {
        Self {
            phrases: Vec::new(),
            regions: Vec::new(),
            intents: Vec::new(),
            stopwords: None,
            fallback: FallbackPolicy::default(),
        }
    }
}

impl Normalizer for LexiconNormalizer {
    /// NFKC, lowercase, strip digits and punctuation, substitute phrases,
    /// split on whitespace, then drop stopwords and one-letter leftovers.
    fn normalize(&self, text: &str) -> Vec<String> {
        let lowered = text.nfkc().collect::<String>().to_lowercase();
        let mut cleaned = NON_LETTER.replace_all(&lowered, "").into_owned();
        for (re, token) in &self.phrases {
            cleaned = re.replace_all(&cleaned, NoExpand(token.as_str())).into_owned();
        }
        cleaned
            .split_whitespace()
            .filter(|w| !self.is_stopword(w))
            .filter(|w| w.chars().count() > 1)
            .map(str::to_string)
            .collect()
    }

    fn detect_intent(&self, query: &str) -> (String, Option<Intent>) {
        let (rest, intent) = strip_first_trigger(query, &self.intents);
        (rest, intent.copied())
    }

    fn detect_region(&self, query: &str) -> (String, Option<String>) {
        let (rest, region) = strip_first_trigger(query, &self.regions);
        (rest, region.cloned())
    }
}

/// Dictionary entries ordered so longer keys are tried first ("jawa tengah"
/// before "jawa"); equal lengths fall back to key order.
fn longest_first<V>(map: BTreeMap<String, V>) -> Vec<(String, V)> {
    let mut entries: Vec<(String, V)> = map.into_iter().collect();
    entries.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()).then_with(|| a.0.cmp(&b.0)));
    entries
}

fn strip_first_trigger<'a, V>(query: &str, triggers: &'a [(String, V)]) -> (String, Option<&'a V>) {
    let mut lowered = query.to_lowercase();
    let mut found = None;
    for (trigger, value) in triggers {
        if !trigger.is_empty() && lowered.contains(trigger.as_str()) {
            lowered = lowered.replace(trigger.as_str(), "");
            found = Some(value);
            break;
        }
    }
    (lowered.split_whitespace().collect::<Vec<_>>().join(" "), found)
}
