//! watsonx.ai integration for TKP
//!
//! This crate provides the watsonx.ai implementation of the [`Generator`] and
//! [`Embedder`] traits.

mod client;
mod config;


pub use client::WatsonxClient;
pub use config::WatsonxConfig;

// Re-export core types for convenience
pub use tkp_core::{
    Embedder, Error, GenerationConfig, GenerationRequest, GenerationResult, Generator, Result,
};
