//! Wiring of the production collaborators

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use tkp_core::config::url_var;
use tkp_core::{ChunkRecord, Embedder, QueryLogEntry, ResultSink, TrustConfig};
use tkp_rag::{JsonlQueryLog, NullSink, QdrantVectorStore, QueryService};
use tkp_watsonx::{WatsonxClient, WatsonxConfig};

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "knowledge_chunks";

/// Query service backed by watsonx.ai and Qdrant
pub type AppService = QueryService<WatsonxClient, QdrantVectorStore, WatsonxClient, QueryLogSink>;

/// Where answered queries are recorded
pub enum QueryLogSink {
    Jsonl(JsonlQueryLog),
    Discard(NullSink),
}

#[async_trait]
impl ResultSink for QueryLogSink {
    async fn record(&self, entry: &QueryLogEntry) -> tkp_core::Result<()> {
        match self {
            Self::Jsonl(log) => log.record(entry).await,
            Self::Discard(sink) => sink.record(entry).await,
        }
    }
}

/// Everything the binary reads from the environment
#[derive(Debug, Clone)]
pub struct Settings {
    pub trust: TrustConfig,
    pub qdrant_url: String,
    pub collection: String,
    pub query_log_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let trust = TrustConfig::from_lookup(&lookup)?;
        let qdrant_url = url_var(&lookup, "QDRANT_URL", DEFAULT_QDRANT_URL)?;
        let collection = lookup("QDRANT_COLLECTION")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        let query_log_path = lookup("QUERY_LOG_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            trust,
            qdrant_url,
            collection,
            query_log_path,
        })
    }

    pub fn sink(&self) -> QueryLogSink {
        match &self.query_log_path {
            Some(path) => QueryLogSink::Jsonl(JsonlQueryLog::new(path)),
            None => QueryLogSink::Discard(NullSink),
        }
    }
}

/// Connect to watsonx.ai and Qdrant and assemble the query service
pub async fn build_service(settings: &Settings) -> Result<AppService> {
    let watsonx = WatsonxClient::new(WatsonxConfig::from_env()?)?;
    watsonx
        .connect()
        .await
        .context("failed to authenticate with watsonx.ai")?;
    let watsonx = Arc::new(watsonx);

    let store = QdrantVectorStore::new(&settings.qdrant_url, settings.collection.clone())?;
    store
        .ensure_collection(watsonx.dimension())
        .await
        .with_context(|| format!("failed to prepare collection {}", store.collection_name()))?;

    info!(
        qdrant = %settings.qdrant_url,
        collection = %store.collection_name(),
        query_log = ?settings.query_log_path,
        "query service ready"
    );

    Ok(QueryService::new(
        watsonx.clone(),
        Arc::new(store),
        watsonx,
        Arc::new(settings.sink()),
        &settings.trust,
    ))
}

#[derive(Deserialize)]
struct RetrievedChunk {
    vector_id: Value,
    relevance_score: f32,
    payload: Value,
}

/// Load a saved retrieval result: a JSON array of `{vector_id, relevance_score, payload}`
pub fn load_retrieval(path: &Path) -> Result<Vec<ChunkRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let chunks: Vec<RetrievedChunk> =
        serde_json::from_str(&raw).with_context(|| format!("{} is not a retrieval dump", path.display()))?;

    chunks
        .into_iter()
        .map(|chunk| -> Result<ChunkRecord> {
            let vector_id = match chunk.vector_id {
                Value::String(id) => id,
                other => other.to_string(),
            };
            Ok(ChunkRecord::from_json(vector_id, chunk.relevance_score, &chunk.payload)?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings.qdrant_url, DEFAULT_QDRANT_URL);
        assert_eq!(settings.collection, DEFAULT_COLLECTION);
        assert!(settings.query_log_path.is_none());
        assert!(matches!(settings.sink(), QueryLogSink::Discard(_)));
        assert_eq!(settings.trust, TrustConfig::default());
    }

    #[test]
    fn test_settings_overrides() {
        let vars = HashMap::from([
            ("QDRANT_URL", "http://qdrant:6334/"),
            ("QDRANT_COLLECTION", "handbook"),
            ("QUERY_LOG_PATH", "/tmp/queries.jsonl"),
            ("RETRIEVAL_LIMIT", "25"),
        ]);
        let settings = Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(settings.qdrant_url, "http://qdrant:6334");
        assert_eq!(settings.collection, "handbook");
        assert_eq!(settings.trust.retrieval_limit, 25);
        assert!(matches!(settings.sink(), QueryLogSink::Jsonl(_)));
    }

    #[test]
    fn test_settings_reject_bad_url() {
        let err = Settings::from_lookup(|k| (k == "QDRANT_URL").then(|| "localhost".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("QDRANT_URL"));
    }

    #[test]
    fn test_load_retrieval() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("retrieval.json");
        std::fs::write(
            &path,
            r#"[
                {"vector_id": "a1", "relevance_score": 0.9,
                 "payload": {"document_id": 1, "title": "A", "content": "x", "page": 1, "created_at": "2024-01-01"}},
                {"vector_id": 7, "relevance_score": 0.8,
                 "payload": {"title": "B", "content": "y", "page": null}}
            ]"#,
        )
        .unwrap();

        let chunks = load_retrieval(&path).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].vector_id, "a1");
        assert_eq!(chunks[1].vector_id, "7");
        assert_eq!(chunks[1].payload.page, None);
    }

    #[test]
    fn test_load_retrieval_rejects_bad_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("retrieval.json");
        std::fs::write(
            &path,
            r#"[{"vector_id": "a1", "relevance_score": 0.9, "payload": {"title": "A", "content": "x", "page": "one"}}]"#,
        )
        .unwrap();

        let err = load_retrieval(&path).unwrap_err();
        assert!(err.to_string().contains("a1"));
    }
}
