//! Answer assembly: context block, confidence policy, sources and generation

use std::sync::Arc;

use tkp_core::{
    AnswerResult, ChunkPayload, Confidence, Conflict, Error, GenerationRequest,
    GenerationResult, Generator, Result, RetryConfig, ScoredChunk, TrustConfig,
};
use tracing::{info, warn};

use crate::citation::extract_citations;

/// Answer returned when retrieval produced nothing usable
pub const INSUFFICIENT_INFORMATION: &str =
    "I do not have enough reliable information to answer this question.";

/// Instructions sent with every generation request
pub const INSTRUCTION_CONTRACT: &str = "\
You are a trust-aware enterprise assistant. Answer the user's question using ONLY the provided context.
If the context is insufficient or conflicting, state it clearly.
Every claim MUST be followed by a citation in the format [Source Title, Page X].";

/// Number of top-ranked payloads reported as sources
pub const MAX_SOURCES: usize = 3;

const UNKNOWN: &str = "unknown";

/// Turns evaluated chunks into a cited answer
pub struct AnswerAssembler<G: Generator> {
    generator: Arc<G>,
    retry: RetryConfig,
    context_top_k: Option<usize>,
}

impl<G: Generator> AnswerAssembler<G> {
    /// Create an assembler with default retry policy and no context cap
    pub fn new(generator: Arc<G>) -> Self {
        Self {
            generator,
            retry: RetryConfig::default(),
            context_top_k: None,
        }
    }

    /// Create an assembler using the retry budget and context cap from `config`
    pub fn with_config(generator: Arc<G>, config: &TrustConfig) -> Self {
        Self {
            generator,
            retry: config.retry_config(),
            context_top_k: config.context_top_k,
        }
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Cap how many ranked chunks enter the context block
    pub fn with_context_top_k(mut self, top_k: Option<usize>) -> Self {
        self.context_top_k = top_k;
        self
    }

    /// Build the answer for `query` from ranked chunks and their conflicts.
    ///
    /// With no chunks this returns the fixed low-confidence answer and never calls the
    /// generator. Otherwise a generator failure is surfaced as
    /// [`Error::GenerationFailure`] once the retry budget is spent.
    pub async fn generate_answer(
        &self,
        query: &str,
        scored_chunks: &[ScoredChunk],
        conflicts: &[Conflict],
    ) -> Result<AnswerResult> {
        if scored_chunks.is_empty() {
            info!("no reliable chunks, answering with low confidence");
            return Ok(AnswerResult {
                answer: INSUFFICIENT_INFORMATION.to_string(),
                confidence: Confidence::Low,
                sources: Vec::new(),
                conflicts: Vec::new(),
            });
        }

        let confidence = confidence_for(conflicts);
        let sources = select_sources(scored_chunks);
        let request = GenerationRequest {
            instruction: INSTRUCTION_CONTRACT.to_string(),
            context: build_context(scored_chunks, self.context_top_k),
            question: query.to_string(),
        };

        info!(
            chunks = scored_chunks.len(),
            conflicts = conflicts.len(),
            %confidence,
            model = self.generator.model_id(),
            "requesting answer"
        );

        let result = self.generate_with_retry(&request).await?;

        if extract_citations(&result.text).is_empty() {
            warn!(model = %result.model_id, "generated answer carries no citations");
        }

        Ok(AnswerResult {
            answer: result.text,
            confidence,
            sources,
            conflicts: conflicts.to_vec(),
        })
    }

    async fn generate_with_retry(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.generator.generate(request).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.backoff_for(attempt);
                    warn!(attempt, ?delay, error = %e, "transient generation failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(Error::GenerationFailure {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Confidence depends only on whether any conflict was flagged
pub fn confidence_for(conflicts: &[Conflict]) -> Confidence {
    if conflicts.is_empty() {
        Confidence::High
    } else {
        Confidence::Medium
    }
}

/// Payloads of the top-ranked chunks reported back as sources
pub fn select_sources(scored_chunks: &[ScoredChunk]) -> Vec<ChunkPayload> {
    scored_chunks
        .iter()
        .take(MAX_SOURCES)
        .map(|chunk| chunk.payload().clone())
        .collect()
}

/// Render chunks, in ranked order, as citation-ready source blocks
pub fn build_context(scored_chunks: &[ScoredChunk], top_k: Option<usize>) -> String {
    let limit = top_k.unwrap_or(scored_chunks.len());
    let mut context = String::new();

    for chunk in scored_chunks.iter().take(limit) {
        let payload = chunk.payload();
        let page = payload
            .page
            .map(|p| p.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());

        context.push_str(&format!(
            "SOURCE: {} (Date: {}, Page: {})\n",
            payload.title,
            payload.created_at.as_deref().unwrap_or(UNKNOWN),
            page
        ));
        context.push_str(&format!("CONTENT: {}\n\n", payload.content));
    }

    context
}
