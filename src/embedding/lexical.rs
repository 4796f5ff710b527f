//! Local TF-IDF vectorizer.
//!
//! Terms are lowercase alphanumeric tokens of two or more characters, minus
//! English stop words, plus bigrams of consecutive kept tokens. The vocabulary
//! keeps the `max_features` most frequent terms across the fitted corpus.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::chunking::SentenceEncoder;
use crate::error::{RagError, Result};

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "almost", "also", "am",
        "among", "an", "and", "any", "are", "as", "at", "be", "because", "been", "before",
        "being", "below", "between", "both", "but", "by", "can", "cannot", "could", "do",
        "does", "doing", "done", "down", "during", "each", "either", "else", "etc", "even",
        "ever", "every", "few", "for", "from", "further", "had", "has", "have", "having",
        "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "however",
        "i", "if", "in", "into", "is", "it", "its", "itself", "just", "may", "me", "might",
        "more", "most", "much", "must", "my", "myself", "neither", "no", "nor", "not", "now",
        "of", "off", "often", "on", "once", "only", "or", "other", "our", "ours",
        "ourselves", "out", "over", "own", "per", "rather", "same", "she", "should", "so",
        "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves",
        "then", "there", "these", "they", "this", "those", "though", "through", "thus",
        "to", "too", "under", "until", "up", "upon", "us", "very", "via", "was", "we",
        "well", "were", "what", "whatever", "when", "where", "whether", "which", "while",
        "who", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet",
        "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

pub(crate) fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

/// Lowercase alphanumeric tokens of two or more characters.
fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2 && !is_stop_word(t))
        .map(str::to_string)
        .collect()
}

/// Unigrams followed by bigrams.
fn terms(text: &str) -> Vec<String> {
    let unigrams = tokens(text);
    let bigrams: Vec<String> = unigrams
        .windows(2)
        .map(|pair| format!("{} {}", pair[0], pair[1]))
        .collect();
    let mut all = unigrams;
    all.extend(bigrams);
    all
}

/// A fitted TF-IDF model. Vectors from different fits are not comparable.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    terms: Vec<String>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    pub fn fit(docs: &[&str], max_features: usize) -> Result<Self> {
        if docs.is_empty() {
            return Err(RagError::invalid("cannot fit a vectorizer on an empty corpus"));
        }

        let doc_terms: Vec<Vec<String>> = docs.iter().map(|d| terms(d)).collect();
        let mut frequency: HashMap<&str, usize> = HashMap::new();
        let mut doc_frequency: HashMap<&str, usize> = HashMap::new();
        for terms in &doc_terms {
            let mut seen = HashSet::new();
            for term in terms {
                *frequency.entry(term.as_str()).or_default() += 1;
                if seen.insert(term.as_str()) {
                    *doc_frequency.entry(term.as_str()).or_default() += 1;
                }
            }
        }

        if frequency.is_empty() {
            return Err(RagError::invalid(
                "empty vocabulary; documents contain only stop words",
            ));
        }

        let mut ranked: Vec<(&str, usize)> = frequency.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_features.max(1));

        let mut kept: Vec<String> = ranked.into_iter().map(|(t, _)| t.to_string()).collect();
        kept.sort();

        let n = docs.len() as f32;
        let idf = kept
            .iter()
            .map(|t| {
                let df = doc_frequency.get(t.as_str()).copied().unwrap_or(0) as f32;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        let vocabulary = kept.iter().enumerate().map(|(i, t)| (t.clone(), i)).collect();

        tracing::debug!(features = kept.len(), documents = docs.len(), "vectorizer fitted");
        Ok(Self {
            vocabulary,
            terms: kept,
            idf,
        })
    }

    pub fn fit_transform(docs: &[&str], max_features: usize) -> Result<(Self, Vec<Vec<f32>>)> {
        let vectorizer = Self::fit(docs, max_features)?;
        let vectors = docs.iter().map(|d| vectorizer.transform(d)).collect();
        Ok((vectorizer, vectors))
    }

    /// L2-normalised TF-IDF vector. Terms outside the vocabulary are ignored, so
    /// text with no known terms maps to the zero vector.
    pub fn transform(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.terms.len()];
        for term in terms(text) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                vector[idx] += 1.0;
            }
        }
        for (value, idf) in vector.iter_mut().zip(&self.idf) {
            *value *= idf;
        }
        l2_normalize(&mut vector);
        vector
    }

    pub fn dimensions(&self) -> usize {
        self.terms.len()
    }

    /// Vocabulary terms in feature order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Sentence encoder that fits a fresh vectorizer over the sentences it is given.
#[derive(Debug, Clone, Copy)]
pub struct LexicalSentenceEncoder {
    pub max_features: usize,
}

impl SentenceEncoder for LexicalSentenceEncoder {
    fn encode(&self, sentences: &[&str]) -> Result<Vec<Vec<f32>>> {
        TfidfVectorizer::fit_transform(sentences, self.max_features).map(|(_, vectors)| vectors)
    }
}
