//! watsonx.ai client implementation

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, warn};

use tkp_core::{
    Embedder, Error, GenerationConfig, GenerationRequest, GenerationResult, Generator, Result,
};

use crate::config::WatsonxConfig;

const GENERATION_VERSION: &str = "2023-05-29";
const EMBEDDING_VERSION: &str = "2023-10-25";

/// watsonx.ai client
///
/// The IAM bearer token is fetched on first use (or eagerly via
/// [`WatsonxClient::connect`]) and dropped again when the API rejects it, so a
/// long-running server re-authenticates on the next call.
pub struct WatsonxClient {
    config: WatsonxConfig,
    access_token: RwLock<Option<String>>,
    client: Client,
    generation: GenerationConfig,
    embedding_dimension: usize,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    apikey: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct GenerationParams {
    decoding_method: String,
    max_new_tokens: u32,
    min_new_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    top_k: u32,
    top_p: f32,
    repetition_penalty: f32,
    stop_sequences: Vec<String>,
}

#[derive(Serialize)]
struct TextGenerationBody {
    input: String,
    parameters: GenerationParams,
    model_id: String,
    project_id: String,
}

#[derive(Deserialize)]
struct GenerationResults {
    generated_text: String,
    #[serde(default)]
    generated_token_count: Option<u32>,
}

#[derive(Deserialize)]
struct GenerationData {
    results: Vec<GenerationResults>,
}

#[derive(Serialize)]
struct EmbeddingBody<'a> {
    inputs: [&'a str; 1],
    model_id: &'a str,
    project_id: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResult {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    results: Vec<EmbeddingResult>,
}

impl WatsonxClient {
    /// Default generation model
    pub const GRANITE_3_3_8B_INSTRUCT: &'static str = "ibm/granite-3-3-8b-instruct";

    /// Vector length produced by the default embedding model
    pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

    /// Create a new watsonx.ai client from configuration
    pub fn new(config: WatsonxConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        let generation = GenerationConfig {
            model_id: config.model_id.clone(),
            ..Default::default()
        };

        Ok(Self {
            config,
            access_token: RwLock::new(None),
            client,
            generation,
            embedding_dimension: Self::DEFAULT_EMBEDDING_DIMENSION,
        })
    }

    /// Create a new watsonx.ai client from environment variables
    pub fn from_env() -> Result<Self> {
        let config = WatsonxConfig::from_env()?;
        Self::new(config)
    }

    /// Replace the generation parameters
    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Set the vector length of the configured embedding model
    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    pub fn config(&self) -> &WatsonxConfig {
        &self.config
    }

    /// Exchange the API key for an IAM bearer token
    pub async fn connect(&self) -> Result<()> {
        let token = self.request_token().await?;
        *self.access_token.write().await = Some(token);
        Ok(())
    }

    async fn request_token(&self) -> Result<String> {
        let token_request = TokenRequest {
            grant_type: "urn:ibm:params:oauth:grant-type:apikey",
            apikey: &self.config.api_key,
        };

        let url = format!("{}/identity/token", self.config.iam_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&token_request)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            return Err(Error::Authentication(format!(
                "Authentication failed: {}",
                response.status()
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;

        debug!("obtained IAM access token");
        Ok(token_response.access_token)
    }

    async fn bearer_token(&self) -> Result<String> {
        if let Some(token) = self.access_token.read().await.as_ref() {
            return Ok(token.clone());
        }

        let mut slot = self.access_token.write().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }
        let token = self.request_token().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Map a non-success API response to an error, forgetting a rejected token
    async fn check_response(&self, response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = format!("watsonx.ai {} request failed with status {}: {}", what, status, error_text);

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                self.access_token.write().await.take();
                Error::Authentication(message)
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Error::Timeout(message),
            StatusCode::TOO_MANY_REQUESTS => Error::Network(message),
            s if s.is_server_error() => Error::Network(message),
            _ if what == "embedding" => Error::Embedding(message),
            _ => Error::LLMProvider(message),
        })
    }

    /// Perform the actual generation request
    async fn perform_generation(&self, prompt: &str, config: &GenerationConfig) -> Result<GenerationResult> {
        let access_token = self.bearer_token().await?;

        let params = GenerationParams {
            decoding_method: (if config.temperature.is_some() { "sample" } else { "greedy" }).to_string(),
            max_new_tokens: config.max_tokens,
            min_new_tokens: 1,
            temperature: config.temperature,
            top_k: config.top_k.unwrap_or(50),
            top_p: config.top_p.unwrap_or(1.0),
            repetition_penalty: 1.1,
            stop_sequences: config.stop_sequences.clone(),
        };

        let request_body = TextGenerationBody {
            input: prompt.to_string(),
            parameters: params,
            model_id: config.model_id.clone(),
            project_id: self.config.project_id.clone(),
        };

        let url = format!(
            "{}/ml/v1/text/generation_stream?version={}",
            self.config.api_url, GENERATION_VERSION
        );

        let response = self
            .client
            .post(&url)
            .header("Accept", "text/event-stream")
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&request_body)
            .send()
            .await
            .map_err(map_send_error)?;

        let response = self.check_response(response, "generation").await?;
        let response_text = response.text().await.map_err(map_send_error)?;

        let (answer, tokens_used) = parse_event_stream(&response_text)?;
        let answer = clean_answer(&answer, &config.stop_sequences);

        if answer.is_empty() {
            return Err(Error::LLMProvider(format!(
                "Empty response from watsonx.ai. Raw response: {}",
                response_text
            )));
        }

        Ok(GenerationResult {
            text: answer,
            model_id: config.model_id.clone(),
            tokens_used,
        })
    }

    async fn perform_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let access_token = self.bearer_token().await?;

        let body = EmbeddingBody {
            inputs: [text],
            model_id: &self.config.embedding_model_id,
            project_id: &self.config.project_id,
        };

        let url = format!(
            "{}/ml/v1/text/embeddings?version={}",
            self.config.api_url, EMBEDDING_VERSION
        );

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let response = self.check_response(response, "embedding").await?;
        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let embedding = parsed
            .results
            .into_iter()
            .next()
            .map(|r| r.embedding)
            .ok_or_else(|| Error::Embedding("watsonx.ai returned no embedding".to_string()))?;

        if embedding.len() != self.embedding_dimension {
            return Err(Error::Embedding(format!(
                "expected {} dimensions from {}, got {}",
                self.embedding_dimension,
                self.config.embedding_model_id,
                embedding.len()
            )));
        }

        Ok(embedding)
    }
}

fn map_send_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Network(e.to_string())
    }
}

/// Concatenate the generated text of a server-sent event stream.
///
/// Returns the text and the last reported generated-token count.
fn parse_event_stream(body: &str) -> Result<(String, Option<u32>)> {
    let mut answer = String::new();
    let mut tokens_used = None;

    for line in body.lines() {
        let Some(json_data) = line.strip_prefix("data:") else {
            continue;
        };
        let json_data = json_data.trim();
        if json_data.is_empty() || json_data == "[DONE]" {
            continue;
        }

        let data: GenerationData = serde_json::from_str(json_data).map_err(|e| {
            warn!(line = json_data, "malformed generation stream event");
            Error::Serialization(format!("malformed generation stream event: {}", e))
        })?;

        if let Some(result) = data.results.first() {
            answer.push_str(&result.generated_text);
            if result.generated_token_count.is_some() {
                tokens_used = result.generated_token_count;
            }
        }
    }

    Ok((answer, tokens_used))
}

/// Trim a leading `Answer:` label and anything from the first echoed stop sequence on
fn clean_answer(raw: &str, stop_sequences: &[String]) -> String {
    let mut cleaned = raw.trim();

    if let Some(rest) = cleaned.strip_prefix("Answer:") {
        cleaned = rest.trim_start();
    }

    for stop in stop_sequences.iter().filter(|s| !s.is_empty()) {
        if let Some(pos) = cleaned.find(stop.as_str()) {
            cleaned = &cleaned[..pos];
        }
    }

    cleaned.trim().to_string()
}

#[async_trait]
impl Generator for WatsonxClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let prompt = request.to_prompt();
        let config = &self.generation;

        match timeout(config.timeout, self.perform_generation(&prompt, config)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout("Request timed out".to_string())),
        }
    }

    fn model_id(&self) -> &str {
        &self.generation.model_id
    }
}

#[async_trait]
impl Embedder for WatsonxClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match timeout(self.generation.timeout, self.perform_embedding(text)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout("Embedding request timed out".to_string())),
        }
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }
}
