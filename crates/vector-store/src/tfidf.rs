use crate::error::{Result, VectorStoreError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub const DEFAULT_MIN_WORD_LENGTH: usize = 2;
pub const DEFAULT_MAX_WORD_LENGTH: usize = 50;

static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}]+").unwrap_or_else(|e| unreachable!("invalid word regex: {e}"))
});

const DEFAULT_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his",
    "how", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most", "my",
    "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
    "out", "over", "own", "same", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "then", "there", "these", "they", "this", "those", "through", "to",
    "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
];

/// Term-frequency / inverse-document-frequency text vectorizer.
///
/// `fit` learns a vocabulary of at most `dimensions` words ranked by document
/// frequency; `vectorize` then maps any text to a `dimensions`-long vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    dimensions: usize,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    fitted: bool,
    min_word_length: usize,
    max_word_length: usize,
    stop_words: HashSet<String>,
}

impl TfidfVectorizer {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vocabulary: HashMap::new(),
            idf: Vec::new(),
            fitted: false,
            min_word_length: DEFAULT_MIN_WORD_LENGTH,
            max_word_length: DEFAULT_MAX_WORD_LENGTH,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|w| (*w).to_string()).collect(),
        }
    }

    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[must_use]
    pub const fn is_fitted(&self) -> bool {
        self.fitted
    }

    #[must_use]
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    #[must_use]
    pub const fn vocabulary(&self) -> &HashMap<String, usize> {
        &self.vocabulary
    }

    #[must_use]
    pub fn idf_weight(&self, word: &str) -> Option<f32> {
        self.vocabulary
            .get(word)
            .and_then(|&idx| self.idf.get(idx).copied())
    }

    pub fn add_stop_words<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stop_words
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
    }

    pub fn set_min_word_length(&mut self, len: usize) {
        self.min_word_length = len;
    }

    pub fn set_max_word_length(&mut self, len: usize) {
        self.max_word_length = len;
    }

    /// Lowercased alphanumeric runs of `text`, before any filtering.
    #[must_use]
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        WORD_RE
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn is_valid_word(&self, word: &str) -> bool {
        let len = word.chars().count();
        len >= self.min_word_length
            && len <= self.max_word_length
            && !self.stop_words.contains(word)
            && !word.chars().all(char::is_numeric)
    }

    fn valid_tokens(&self, text: &str) -> Vec<String> {
        self.tokenize(text)
            .into_iter()
            .filter(|w| self.is_valid_word(w))
            .collect()
    }

    /// Learns vocabulary and IDF weights, discarding any previous fit.
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<()> {
        if documents.is_empty() {
            return Err(VectorStoreError::EmptyCorpus);
        }

        self.vocabulary.clear();
        self.idf.clear();
        self.fitted = false;

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let unique: HashSet<String> = self.valid_tokens(doc.as_ref()).into_iter().collect();
            for word in unique {
                *doc_freq.entry(word).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = doc_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.dimensions);

        #[allow(clippy::cast_precision_loss)]
        let doc_count = documents.len() as f64;
        for (idx, (word, df)) in ranked.into_iter().enumerate() {
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
            let weight = (doc_count / df as f64).ln() as f32;
            self.idf.push(weight);
            self.vocabulary.insert(word, idx);
        }
        self.fitted = true;

        log::debug!(
            "Fitted TF-IDF vectorizer: {} documents, {} vocabulary words (cap {})",
            documents.len(),
            self.vocabulary.len(),
            self.dimensions
        );
        Ok(())
    }

    /// Maps `text` to a `dimensions`-long TF-IDF vector.
    ///
    /// Text without any valid token yields an all-zero vector.
    pub fn vectorize(&self, text: &str) -> Result<Vec<f32>> {
        if !self.fitted {
            return Err(VectorStoreError::NotFitted);
        }

        let mut vector = vec![0.0f32; self.dimensions];
        let tokens = self.valid_tokens(text);
        if tokens.is_empty() {
            return Ok(vector);
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }

        #[allow(clippy::cast_precision_loss)]
        let total = tokens.len() as f32;
        for (word, count) in counts {
            let Some(&idx) = self.vocabulary.get(word) else {
                continue;
            };
            #[allow(clippy::cast_precision_loss)]
            let tf = count as f32 / total;
            if let (Some(slot), Some(idf)) = (vector.get_mut(idx), self.idf.get(idx)) {
                *slot = tf * idf;
            }
        }
        Ok(vector)
    }

    pub fn fit_transform<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<Vec<Vec<f32>>> {
        self.fit(documents)?;
        documents
            .iter()
            .map(|doc| self.vectorize(doc.as_ref()))
            .collect()
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
