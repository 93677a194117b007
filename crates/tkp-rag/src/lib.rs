//! Retrieval collaborators and the query service for TKP
//!
//! This crate provides vector stores (Qdrant and in-memory), a deterministic local
//! embedder, a scripted generator double, query-log sinks, and [`QueryService`], which
//! wires them around the trust gate.

mod embedder;
mod generator;
mod query_log;
mod service;
mod vector_store;

#[cfg(test)]
mod tests;

pub use embedder::HashEmbedder;
pub use generator::ScriptedGenerator;
pub use query_log::{JsonlQueryLog, NullSink};
pub use service::QueryService;
pub use vector_store::{LocalVectorStore, QdrantVectorStore};

// Re-export core types for convenience
pub use tkp_core::{
    AnswerResult, ChunkPoint, ChunkRecord, Embedder, Error, EvaluationResult, Generator,
    QueryLogEntry, Result, ResultSink, SearchConfig, TrustConfig, VectorStore,
};
