//! Core traits and types for TKP (Trust-aware Knowledge Platform)
//!
//! This crate defines the data shapes exchanged between the trust pipeline and its
//! collaborators, plus the capability traits for embedding, vector search, text
//! generation and result persistence. Keeping the collaborators behind traits lets the
//! scoring and conflict logic run against in-memory doubles in tests.

pub mod config;
pub mod embedder;
pub mod error;
pub mod llm;
pub mod persistence;
pub mod types;
pub mod vector_store;

pub use config::TrustConfig;
pub use embedder::Embedder;
pub use error::{Error, Result};
pub use llm::{GenerationConfig, GenerationRequest, GenerationResult, Generator};
pub use persistence::{QueryLogEntry, ResultSink};
pub use types::*;
pub use vector_store::{ChunkPoint, SearchConfig, VectorStore};
