//! Query service: retrieval, trust gate, answer assembly and logging

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use tkp_core::{
    AnswerResult, ChunkRecord, Embedder, Error, EvaluationResult, Generator, QueryLogEntry,
    Result, ResultSink, SearchConfig, TrustConfig, VectorStore,
};
use tkp_trust::{AnswerAssembler, TrustGate};

/// End-to-end question answering over the trust gate.
///
/// Built once and shared behind an `Arc`; every call works on its own values, so the
/// service can serve concurrent requests without locking.
pub struct QueryService<E: Embedder, V: VectorStore, G: Generator, S: ResultSink> {
    embedder: Arc<E>,
    vector_store: Arc<V>,
    gate: TrustGate,
    assembler: AnswerAssembler<G>,
    sink: Arc<S>,
    search: SearchConfig,
}

impl<E: Embedder, V: VectorStore, G: Generator, S: ResultSink> QueryService<E, V, G, S> {
    /// Create a new query service
    pub fn new(
        embedder: Arc<E>,
        vector_store: Arc<V>,
        generator: Arc<G>,
        sink: Arc<S>,
        config: &TrustConfig,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            gate: TrustGate::new(config),
            assembler: AnswerAssembler::with_config(generator, config),
            sink,
            search: SearchConfig::from(config),
        }
    }

    /// Replace the answer assembler, e.g. to change its retry policy
    pub fn with_assembler(mut self, assembler: AnswerAssembler<G>) -> Self {
        self.assembler = assembler;
        self
    }

    /// Retrieve and evaluate chunks for `question` without generating an answer
    pub async fn evaluate(&self, question: &str) -> Result<EvaluationResult> {
        self.evaluate_at(question, Utc::now()).await
    }

    /// Like [`QueryService::evaluate`], scoring freshness as of `now`
    pub async fn evaluate_at(&self, question: &str, now: DateTime<Utc>) -> Result<EvaluationResult> {
        let chunks = self.retrieve(question).await?;
        Ok(self.gate.evaluate_retrieval_at(chunks, now))
    }

    /// Answer `question` and record the outcome
    pub async fn answer(&self, question: &str) -> Result<AnswerResult> {
        self.answer_at(question, Utc::now()).await
    }

    /// Like [`QueryService::answer`], scoring freshness as of `now`
    pub async fn answer_at(&self, question: &str, now: DateTime<Utc>) -> Result<AnswerResult> {
        let evaluation = self.evaluate_at(question, now).await?;

        let answer = self
            .assembler
            .generate_answer(question, &evaluation.scored_chunks, &evaluation.conflicts)
            .await?;

        info!(
            confidence = %answer.confidence,
            sources = answer.sources.len(),
            conflicts = answer.conflicts.len(),
            "query answered"
        );

        self.sink
            .record(&QueryLogEntry::new(question, answer.clone(), now))
            .await?;

        Ok(answer)
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<ChunkRecord>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question must not be empty".to_string()));
        }

        let vector = self.embedder.embed(question).await?;
        let chunks = self.vector_store.search(&vector, &self.search).await?;

        info!(
            hits = chunks.len(),
            limit = self.search.limit,
            threshold = ?self.search.score_threshold,
            "retrieved chunks"
        );

        Ok(chunks)
    }
}
