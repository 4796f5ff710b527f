//! Advisory checks on retrieved context and prompt size.
//!
//! Findings never block generation; they are returned next to the response.

use std::collections::HashSet;

use serde::Serialize;

use crate::chunking::Chunk;
use crate::config::GuardrailConfig;

/// Rough tokens-per-word ratio used for every token estimate.
pub const TOKENS_PER_WORD: f64 = 1.3;

/// Approximate token count of `text`.
pub fn estimate_tokens(text: &str) -> f64 {
    text.split_whitespace().count() as f64 * TOKENS_PER_WORD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    Pass,
    Warning,
    Fail,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warning => "warning",
            Self::Fail => "fail",
        }
    }
}

impl std::fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailFinding {
    pub id: &'static str,
    pub name: &'static str,
    pub status: FindingStatus,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct GuardrailEvaluator {
    relevance_pass: f64,
    relevance_warn: f64,
    token_pass: f64,
    token_warn: f64,
}

impl Default for GuardrailEvaluator {
    fn default() -> Self {
        Self::new(&GuardrailConfig::default())
    }
}

impl GuardrailEvaluator {
    pub fn new(config: &GuardrailConfig) -> Self {
        Self {
            relevance_pass: config.relevance_pass,
            relevance_warn: config.relevance_warn,
            token_pass: config.token_pass as f64,
            token_warn: config.token_warn as f64,
        }
    }

    /// Run every check. The relevance finding comes first.
    pub fn evaluate(&self, query: &str, context: &[Chunk], prompt: &str) -> Vec<GuardrailFinding> {
        let findings = vec![self.context_relevance(query, context), self.token_length(prompt)];
        for finding in findings.iter().filter(|f| f.status != FindingStatus::Pass) {
            tracing::warn!(check = finding.id, status = %finding.status, message = %finding.message, "guardrail flagged");
        }
        findings
    }

    /// Fraction of chunks sharing at least one lowercase word with the query.
    pub fn relevance_ratio(query: &str, context: &[Chunk]) -> f64 {
        if context.is_empty() {
            return 0.0;
        }
        let query_words: HashSet<String> = lowercase_words(query);
        let relevant = context
            .iter()
            .filter(|c| !lowercase_words(&c.content).is_disjoint(&query_words))
            .count();
        relevant as f64 / context.len() as f64
    }

    fn context_relevance(&self, query: &str, context: &[Chunk]) -> GuardrailFinding {
        let ratio = Self::relevance_ratio(query, context);
        let percent = (ratio * 100.0) as u32;
        let (status, message) = if ratio >= self.relevance_pass {
            (FindingStatus::Pass, format!("{percent}% of context is relevant"))
        } else if ratio >= self.relevance_warn {
            (FindingStatus::Warning, format!("Only {percent}% of context is relevant"))
        } else {
            (FindingStatus::Fail, format!("Low relevance: {percent}%"))
        };
        GuardrailFinding {
            id: "context-relevance",
            name: "Context Relevance",
            status,
            message,
            severity: Severity::High,
        }
    }

    fn token_length(&self, prompt: &str) -> GuardrailFinding {
        let tokens = estimate_tokens(prompt);
        let count = tokens as u64;
        let (status, message) = if tokens <= self.token_pass {
            (FindingStatus::Pass, format!("{count} tokens (within limits)"))
        } else if tokens <= self.token_warn {
            (FindingStatus::Warning, format!("{count} tokens (approaching limit)"))
        } else {
            (FindingStatus::Fail, format!("{count} tokens (exceeds limit)"))
        };
        GuardrailFinding {
            id: "token-length",
            name: "Token Length",
            status,
            message,
            severity: Severity::High,
        }
    }
}

fn lowercase_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
