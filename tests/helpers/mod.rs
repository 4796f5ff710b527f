#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ragpipe::config::RagConfig;
use ragpipe::embedding::RemoteEmbedder;
use ragpipe::prompt::TextGenerator;
use ragpipe::{EmbeddingMethod, GenerationParams, Pipeline, RagError, Result};

pub const CAT_TEXT: &str = "A cat sat. A dog ran. The sky is blue.";

/// Model id unknown to the catalog, so dimensionality comes from the first vector.
pub const TEST_MODEL: &str = "topic-test";

/// Keywords that each own one dimension of a topic vector.
pub const TOPICS: &[&str] = &[
    "cat", "dog", "sky", "sat", "ran", "blue", "sit", "rust", "memory", "vector", "search",
    "chunk", "embed", "prompt",
];

/// Deterministic embedding: one dimension per topic keyword (counting words
/// that start with it) plus a small constant bias dimension.
pub fn topic_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; TOPICS.len() + 1];
    for word in text.split_whitespace() {
        let word: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        for (i, topic) in TOPICS.iter().enumerate() {
            if word.starts_with(topic) {
                v[i] += 1.0;
            }
        }
    }
    v[TOPICS.len()] = 0.1;
    v
}

/// Remote embedder backed by [`topic_vector`]. Counts calls.
#[derive(Default)]
pub struct TopicEmbedder {
    pub calls: AtomicUsize,
}

impl TopicEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteEmbedder for TopicEmbedder {
    async fn embed_one(&self, text: &str, _model_id: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(topic_vector(text))
    }
}

/// Fails any text containing `poison`; embeds everything else by topic.
pub struct FlakyEmbedder {
    pub poison: &'static str,
}

#[async_trait]
impl RemoteEmbedder for FlakyEmbedder {
    async fn embed_one(&self, text: &str, _model_id: &str) -> Result<Vec<f32>> {
        if text.contains(self.poison) {
            return Err(RagError::Backend("simulated embedding failure".into()));
        }
        Ok(topic_vector(text))
    }
}

/// Replies with a fixed answer and records every prompt it saw.
pub struct CannedGenerator {
    pub reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl CannedGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// Always times out.
pub struct TimeoutGenerator;

#[async_trait]
impl TextGenerator for TimeoutGenerator {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        Err(RagError::Timeout("generation took longer than 60s".into()))
    }
}

/// Config selecting the remote method with [`TEST_MODEL`].
pub fn remote_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.embedding.method = EmbeddingMethod::Remote;
    config.embedding.model = TEST_MODEL.to_string();
    config
}

pub fn remote_pipeline(
    embedder: Arc<dyn RemoteEmbedder>,
    generator: Option<Arc<dyn TextGenerator>>,
) -> Pipeline {
    Pipeline::new(remote_config(), Some(embedder), generator)
}

/// Pipeline with no remote backends at all.
pub fn offline_pipeline() -> Pipeline {
    Pipeline::new(RagConfig::default(), None, None)
}

/// A few paragraphs on distinct topics.
pub fn topic_document() -> String {
    [
        "Rust ownership rules keep memory safe without a garbage collector. \
         The borrow checker enforces them at compile time.",
        "Vector search ranks stored embeddings by similarity to a query embedding. \
         Cosine similarity is the usual measure.",
        "A prompt combines retrieved chunks with the question. \
         Guardrails check the prompt before it is sent.",
        "The cat sat on the mat. The dog ran in the park. The sky was blue all day.",
    ]
    .join("\n\n")
}
