//! Trust pipeline configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::{Error, Result, RetryConfig};

/// Read-only settings shared by every pipeline invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Minimum similarity the retrieval collaborator lets through
    pub relevance_threshold: f32,
    /// Freshness decays linearly to zero at ten times this many days
    pub freshness_penalty_days: u32,
    /// Result-count cap passed to the retrieval collaborator
    pub retrieval_limit: u64,
    /// Optional cap on the chunks rendered into the context block
    pub context_top_k: Option<usize>,
    /// Collapse repeated conflicts for the same source pair
    pub dedupe_conflicts: bool,
    pub generation_max_attempts: u32,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: 0.7,
            freshness_penalty_days: 365,
            retrieval_limit: 10,
            context_top_k: None,
            dedupe_conflicts: false,
            generation_max_attempts: RetryConfig::default().max_attempts,
        }
    }
}

impl TrustConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let relevance_threshold =
            parse_or(&lookup, "RELEVANCE_THRESHOLD", defaults.relevance_threshold)?;
        if !(0.0..=1.0).contains(&relevance_threshold) {
            return Err(Error::Configuration(format!(
                "RELEVANCE_THRESHOLD must be within [0, 1], got {}",
                relevance_threshold
            )));
        }

        let freshness_penalty_days =
            parse_or(&lookup, "FRESHNESS_PENALTY_DAYS", defaults.freshness_penalty_days)?;
        if freshness_penalty_days == 0 {
            return Err(Error::Configuration(
                "FRESHNESS_PENALTY_DAYS must be greater than zero".to_string(),
            ));
        }

        let retrieval_limit = parse_or(&lookup, "RETRIEVAL_LIMIT", defaults.retrieval_limit)?;

        let context_top_k = match lookup("CONTEXT_TOP_K") {
            Some(raw) if !raw.trim().is_empty() => Some(parse_value("CONTEXT_TOP_K", &raw)?),
            _ => None,
        };

        let dedupe_conflicts = match lookup("DEDUPE_CONFLICTS") {
            Some(raw) => parse_flag("DEDUPE_CONFLICTS", &raw)?,
            None => defaults.dedupe_conflicts,
        };

        let generation_max_attempts = parse_or(
            &lookup,
            "GENERATION_MAX_ATTEMPTS",
            defaults.generation_max_attempts,
        )?;
        if generation_max_attempts == 0 {
            return Err(Error::Configuration(
                "GENERATION_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            relevance_threshold,
            freshness_penalty_days,
            retrieval_limit,
            context_top_k,
            dedupe_conflicts,
            generation_max_attempts,
        })
    }

    /// Retry policy derived from the configured attempt budget
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.generation_max_attempts,
            ..Default::default()
        }
    }
}

/// Read a required variable, falling back to an alias
pub fn require_var<F>(lookup: &F, key: &str, alias: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).or_else(|| lookup(alias)).ok_or_else(|| {
        Error::Configuration(format!(
            "{} or {} environment variable not found",
            key, alias
        ))
    })
}

/// Read an HTTP(S) URL variable, validating it parses
pub fn url_var<F>(lookup: &F, key: &str, default: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    let parsed = url::Url::parse(&raw)
        .map_err(|e| Error::Configuration(format!("{} is not a valid URL ({}): {}", key, raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Configuration(format!(
            "{} must use http or https, got {}",
            key, raw
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Configuration(format!("Invalid value for {}: {} ({})", key, raw, e)))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::Configuration(format!(
            "Invalid value for {}: {} (expected true/false)",
            key, raw
        ))),
    }
}
