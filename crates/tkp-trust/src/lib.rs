//! Trust gate for TKP
//!
//! Re-ranks retrieved chunks by a blend of relevance and document freshness, flags
//! sources whose dates disagree, and turns the result into a cited-answer request
//! with a confidence label.

mod assembler;
mod citation;
mod conflict;
mod freshness;
mod gate;
mod ranker;


pub use assembler::{
    AnswerAssembler, INSTRUCTION_CONTRACT, INSUFFICIENT_INFORMATION, MAX_SOURCES,
    build_context, confidence_for, select_sources,
};
pub use citation::{Citation, extract_citations};
pub use conflict::ConflictDetector;
pub use freshness::{
    FRESHNESS_WEIGHT, FreshnessScorer, NEUTRAL_FRESHNESS, RELEVANCE_WEIGHT, parse_timestamp,
};
pub use gate::TrustGate;
pub use ranker::rank;

// Re-export core types for convenience
pub use tkp_core::{
    AnswerResult, ChunkPayload, ChunkRecord, Confidence, Conflict, ConflictType, Error,
    EvaluationResult, Result, ScoredChunk, TrustConfig,
};
