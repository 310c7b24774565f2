//! Testing utilities for the resonance workspace
//!
//! Shared scripted collaborators, fixtures, and corpus helpers.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use resonance_core::{CorpusWriter, GenerativeModel, ModelError, SampleDraft, Triad};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::Path;
use tempfile::TempDir;

/// Generative model that answers from a script and records every prompt
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    /// Answer every call with `reply`
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            fallback: Some(reply.into()),
            ..Self::default()
        }
    }

    /// Answer calls in order; fail with `EmptyResponse` once exhausted
    pub fn sequence(replies: impl IntoIterator<Item = Result<String, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Fail every call with `error`
    pub fn failing(error: ModelError) -> Self {
        Self::sequence([Err(error)])
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts.lock().push(prompt.to_string());
        match self.replies.lock().pop_front() {
            Some(reply) => reply,
            None => self.fallback.clone().ok_or(ModelError::EmptyResponse),
        }
    }
}

/// The example triad used throughout the docs
pub fn quiet_room_triad() -> Triad {
    Triad::new(
        "The room is quiet.",
        "Every object seems to whisper a story.",
        "Only the photo on the nightstand makes it real.",
    )
}

pub fn label_value(resulting_type: &str, resulting_strength: f64) -> Value {
    json!({
        "influence_description": "C makes the whispered stories concrete.",
        "resulting_type": resulting_type,
        "resulting_strength": resulting_strength,
    })
}

/// Model answer text for a label
pub fn label_reply(resulting_type: &str, resulting_strength: f64) -> String {
    label_value(resulting_type, resulting_strength).to_string()
}

/// Model answer text for a triad
pub fn triad_reply(a: &str, b: &str, c: &str) -> String {
    json!({ "fragment_a": a, "fragment_b": b, "fragment_c": c }).to_string()
}

/// Wrap text the way chatty models do despite instructions
pub fn fenced(body: &str) -> String {
    format!("```json\n{body}\n```")
}

pub fn sample_draft(a: &str, b: &str, c: &str, label: Value) -> SampleDraft {
    SampleDraft {
        fragment_a: Some(a.into()),
        fragment_b: Some(b.into()),
        fragment_c: Some(c.into()),
        label: Some(label),
    }
}

/// Writer for a fresh corpus file inside a temporary directory
pub fn temp_corpus() -> (TempDir, CorpusWriter) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let writer = CorpusWriter::new(dir.path().join("training_data.jsonl"));
    (dir, writer)
}

/// Raw bytes of a corpus file, empty if it does not exist yet
pub fn corpus_bytes(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap_or_default()
}

/// Every corpus line decoded as JSON
pub fn corpus_records(path: &Path) -> Vec<Value> {
    String::from_utf8(corpus_bytes(path))
        .expect("corpus is utf-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("corpus line is valid JSON"))
        .collect()
}
