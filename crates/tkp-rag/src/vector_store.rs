//! Vector store implementations

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointId, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

use tkp_core::{ChunkPayload, ChunkPoint, ChunkRecord, DocumentId, Error, Result, SearchConfig, VectorStore};

/// Local in-memory vector store implementation
pub struct LocalVectorStore {
    points: RwLock<Vec<ChunkPoint>>,
}

impl LocalVectorStore {
    /// Create a new local vector store
    pub fn new() -> Self {
        Self {
            points: RwLock::new(Vec::new()),
        }
    }

    /// Simple cosine similarity calculation
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }
}

impl Default for LocalVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn upsert_chunks(&self, points: Vec<ChunkPoint>) -> Result<usize> {
        let mut stored = self
            .points
            .write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let count = points.len();
        for point in points {
            match stored.iter_mut().find(|p| p.vector_id == point.vector_id) {
                Some(existing) => *existing = point,
                None => stored.push(point),
            }
        }

        Ok(count)
    }

    async fn search(&self, vector: &[f32], config: &SearchConfig) -> Result<Vec<ChunkRecord>> {
        let stored = self
            .points
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let mut results: Vec<ChunkRecord> = stored
            .iter()
            .map(|point| {
                let score = Self::cosine_similarity(vector, &point.vector);
                ChunkRecord::new(point.vector_id.clone(), score, point.payload.clone())
            })
            .filter(|record| {
                config
                    .score_threshold
                    .is_none_or(|threshold| record.relevance_score >= threshold)
            })
            .collect();

        results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        results.truncate(config.limit as usize);

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let stored = self
            .points
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        Ok(stored.len())
    }
}

/// Qdrant-backed vector store.
///
/// Point ids must be UUIDs or unsigned integers, as Qdrant requires.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection_name: String,
}

impl QdrantVectorStore {
    /// Connect to a Qdrant instance (gRPC URL, e.g. `http://localhost:6334`)
    pub fn new(url: &str, collection_name: impl Into<String>) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        Ok(Self {
            client,
            collection_name: collection_name.into(),
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Create the cosine collection if it does not exist yet
    pub async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let exists = self
            .client
            .collection_exists(self.collection_name.clone())
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(self.collection_name.clone()).vectors_config(
                        VectorParamsBuilder::new(dimension as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| Error::VectorStore(e.to_string()))?;
            info!(collection = %self.collection_name, dimension, "created qdrant collection");
        }

        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert_chunks(&self, points: Vec<ChunkPoint>) -> Result<usize> {
        let count = points.len();
        let points: Vec<PointStruct> = points
            .into_iter()
            .map(|point| PointStruct::new(point.vector_id, point.vector, payload_to_qdrant(&point.payload)))
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection_name.clone(), points).wait(true))
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        Ok(count)
    }

    async fn search(&self, vector: &[f32], config: &SearchConfig) -> Result<Vec<ChunkRecord>> {
        let mut request =
            SearchPointsBuilder::new(self.collection_name.clone(), vector.to_vec(), config.limit)
                .with_payload(true);
        if let Some(threshold) = config.score_threshold {
            request = request.score_threshold(threshold);
        }

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        debug!(hits = response.result.len(), collection = %self.collection_name, "qdrant search");

        response
            .result
            .into_iter()
            .map(|point| {
                let vector_id = point_id_to_string(point.id);
                let payload = payload_from_qdrant(point.payload);
                ChunkRecord::from_json(vector_id, point.score, &payload)
            })
            .collect()
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(self.collection_name.clone()).exact(true))
            .await
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        Ok(response.result.map_or(0, |r| r.count as usize))
    }
}

fn payload_to_qdrant(payload: &ChunkPayload) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("title".to_string(), Value::from(payload.title.clone()));
    fields.insert("content".to_string(), Value::from(payload.content.clone()));

    match &payload.document_id {
        Some(DocumentId::Int(id)) => {
            fields.insert("document_id".to_string(), Value::from(*id));
        }
        Some(DocumentId::Text(id)) => {
            fields.insert("document_id".to_string(), Value::from(id.clone()));
        }
        None => {}
    }
    if let Some(page) = payload.page {
        fields.insert("page".to_string(), Value::from(page as i64));
    }
    if let Some(created_at) = &payload.created_at {
        fields.insert("created_at".to_string(), Value::from(created_at.clone()));
    }

    fields
}

fn payload_from_qdrant(payload: HashMap<String, Value>) -> JsonValue {
    JsonValue::Object(
        payload
            .into_iter()
            .map(|(key, value)| (key, value_to_json(value)))
            .collect::<Map<String, JsonValue>>(),
    )
}

fn value_to_json(value: Value) -> JsonValue {
    match value.kind {
        None | Some(Kind::NullValue(_)) => JsonValue::Null,
        Some(Kind::BoolValue(b)) => JsonValue::Bool(b),
        Some(Kind::IntegerValue(i)) => JsonValue::from(i),
        Some(Kind::DoubleValue(d)) => JsonValue::from(d),
        Some(Kind::StringValue(s)) => JsonValue::String(s),
        Some(Kind::ListValue(list)) => {
            JsonValue::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(object)) => payload_from_qdrant(object.fields),
    }
}

fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => "unknown".to_string(),
    }
}
