//! watsonx.ai configuration

use serde::{Deserialize, Serialize};
use std::env;
use tkp_core::Result;
use tkp_core::config::{require_var, url_var};

pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com";
pub const DEFAULT_API_URL: &str = "https://us-south.ml.cloud.ibm.com";
pub const DEFAULT_MODEL_ID: &str = "ibm/granite-3-3-8b-instruct";
pub const DEFAULT_EMBEDDING_MODEL_ID: &str = "ibm/slate-125m-english-rtrvr";

/// Configuration for the watsonx.ai client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatsonxConfig {
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub project_id: String,
    /// IAM base URL; tokens are requested from `{iam_url}/identity/token`
    pub iam_url: String,
    pub api_url: String,
    pub model_id: String,
    pub embedding_model_id: String,
}

impl WatsonxConfig {
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
        let api_key = require_var(&lookup, "WATSONX_API_KEY", "API_KEY")?;
        let project_id = require_var(&lookup, "WATSONX_PROJECT_ID", "PROJECT_ID")?;
        let iam_url = url_var(&lookup, "IAM_IBM_CLOUD_URL", DEFAULT_IAM_URL)?;
        let api_url = url_var(&lookup, "WATSONX_API_URL", DEFAULT_API_URL)?;

        let model_id = lookup("WATSONX_MODEL_ID").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());
        let embedding_model_id = lookup("WATSONX_EMBEDDING_MODEL_ID")
            .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL_ID.to_string());

        Ok(Self {
            api_key,
            project_id,
            iam_url,
            api_url,
            model_id,
            embedding_model_id,
        })
    }

    /// Create configuration with explicit credentials and default endpoints
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            iam_url: DEFAULT_IAM_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            embedding_model_id: DEFAULT_EMBEDDING_MODEL_ID.to_string(),
        }
    }

    /// Point both endpoints at one base URL (local mocks, proxies)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.iam_url = base.to_string();
        self.api_url = base.to_string();
        self
    }
}
