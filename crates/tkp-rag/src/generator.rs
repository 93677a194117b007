//! Scripted generator for tests and offline runs

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use tkp_core::{Error, GenerationRequest, GenerationResult, Generator, Result};

/// Generator double that never leaves the process.
///
/// Queued replies are returned first, in order; once they run out every call returns
/// the fallback answer. Every request is recorded.
pub struct ScriptedGenerator {
    fallback: String,
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    calls: AtomicU32,
}

impl ScriptedGenerator {
    pub const MODEL_ID: &'static str = "scripted";

    /// Create a generator that always answers `fallback`
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Queue outcomes to return before falling back
    pub fn with_replies(self, replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..self
        }
    }

    /// Number of generate calls so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most recent request, if any
    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().ok()?.last().cloned()
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new(
            "Based on the provided documents, [Statement from Source A, Page 1]. \
             However, [Conflicting Statement from Source B, Page 2].",
        )
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        self.requests
            .lock()
            .map_err(|e| Error::Other(format!("Lock error: {}", e)))?
            .push(request.clone());

        let reply = self
            .replies
            .lock()
            .map_err(|e| Error::Other(format!("Lock error: {}", e)))?
            .pop_front();

        let text = match reply {
            Some(outcome) => outcome?,
            None => self.fallback.clone(),
        };

        Ok(GenerationResult {
            text,
            model_id: Self::MODEL_ID.to_string(),
            tokens_used: None,
        })
    }

    fn model_id(&self) -> &str {
        Self::MODEL_ID
    }
}
