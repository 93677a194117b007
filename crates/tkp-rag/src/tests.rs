//! Service tests wiring the trust pipeline to in-memory collaborators

#[cfg(test)]
mod snapshot_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use insta::assert_json_snapshot;
    use tempfile::tempdir;
    use tkp_core::{
        ChunkPayload, Confidence, DocumentId, QueryLogEntry, RetryConfig,
    };
    use tkp_trust::{AnswerAssembler, INSUFFICIENT_INFORMATION};

    use crate::{
        ChunkPoint, Embedder, Error, HashEmbedder, JsonlQueryLog, LocalVectorStore, NullSink,
        QueryService, Result, ResultSink, ScriptedGenerator, TrustConfig, VectorStore,
    };

    /// Embeds every question to the same unit vector
    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    /// Sink whose backing store is always unavailable
    struct BrokenSink;

    #[async_trait]
    impl ResultSink for BrokenSink {
        async fn record(&self, _entry: &QueryLogEntry) -> Result<()> {
            Err(Error::Persistence("query log unavailable".to_string()))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    /// Unit vector whose cosine with `[1, 0]` is `relevance`
    fn at_relevance(relevance: f32) -> Vec<f32> {
        vec![relevance, (1.0 - relevance * relevance).sqrt()]
    }

    fn point(title: &str, relevance: f32, created_at: Option<&str>, page: u32) -> ChunkPoint {
        ChunkPoint {
            vector_id: format!("vec-{}", title.to_lowercase()),
            vector: at_relevance(relevance),
            payload: ChunkPayload {
                document_id: Some(DocumentId::Int(page as i64)),
                title: title.to_string(),
                content: format!("{} content.", title),
                page: Some(page),
                created_at: created_at.map(str::to_string),
            },
        }
    }

    async fn seeded_store() -> Arc<LocalVectorStore> {
        let store = LocalVectorStore::new();
        store
            .upsert_chunks(vec![
                point("C", 0.6, None, 3),
                point("B", 0.8, Some("2020-06-01T09:00:00"), 2),
                point("A", 0.9, Some("2024-01-01T09:00:00"), 1),
                point("Unrelated", 0.1, Some("2024-02-01T09:00:00"), 9),
            ])
            .await
            .unwrap();
        Arc::new(store)
    }

    fn config() -> TrustConfig {
        TrustConfig {
            relevance_threshold: 0.5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_answer_end_to_end() {
        let dir = tempdir().unwrap();
        let log = Arc::new(JsonlQueryLog::new(dir.path().join("queries.jsonl")));
        let generator = Arc::new(ScriptedGenerator::new(
            "Policy changed in 2024 [A, Page 1]; earlier guidance differs [B, Page 2].",
        ));
        let service = QueryService::new(
            Arc::new(FixedEmbedder),
            seeded_store().await,
            generator.clone(),
            log.clone(),
            &config(),
        );

        let answer = service.answer_at("What is the policy?", now()).await.unwrap();

        assert_json_snapshot!(answer, @r###"
        {
          "answer": "Policy changed in 2024 [A, Page 1]; earlier guidance differs [B, Page 2].",
          "confidence": "medium",
          "sources": [
            {
              "document_id": 1,
              "title": "A",
              "content": "A content.",
              "page": 1,
              "created_at": "2024-01-01T09:00:00"
            },
            {
              "document_id": 2,
              "title": "B",
              "content": "B content.",
              "page": 2,
              "created_at": "2020-06-01T09:00:00"
            },
            {
              "document_id": 3,
              "title": "C",
              "content": "C content.",
              "page": 3,
              "created_at": null
            }
          ],
          "conflicts": [
            {
              "type": "temporal",
              "sources": [
                "A",
                "B"
              ],
              "description": "Information from 2024 and 2020 might conflict."
            }
          ]
        }
        "###);

        let request = generator.last_request().unwrap();
        assert_eq!(request.question, "What is the policy?");
        assert!(request.context.starts_with("SOURCE: A (Date: 2024-01-01T09:00:00, Page: 1)"));
        assert!(!request.context.contains("Unrelated"));

        let entries = log.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].query, "What is the policy?");
        assert_eq!(entries[0].confidence, Confidence::Medium);
        assert!(!entries[0].is_blocked);
        assert_eq!(entries[0].answer, answer);
    }

    #[tokio::test]
    async fn test_evaluate_scores_and_ranks() {
        let service = QueryService::new(
            Arc::new(FixedEmbedder),
            seeded_store().await,
            Arc::new(ScriptedGenerator::default()),
            Arc::new(NullSink),
            &config(),
        );

        let evaluation = service.evaluate_at("policy", now()).await.unwrap();
        let titles: Vec<_> = evaluation.scored_chunks.iter().map(|c| c.title()).collect();
        assert_eq!(titles, ["A", "B", "C"]);

        let c = &evaluation.scored_chunks[2];
        assert_eq!(c.freshness_score, 0.5);
        assert!((c.combined_score - (0.7 * 0.6 + 0.15)).abs() < 1e-4);
        assert_eq!(evaluation.conflicts.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_retrieval_is_low_confidence() {
        let dir = tempdir().unwrap();
        let log = Arc::new(JsonlQueryLog::new(dir.path().join("queries.jsonl")));
        let generator = Arc::new(ScriptedGenerator::default());
        let service = QueryService::new(
            Arc::new(HashEmbedder::default()),
            Arc::new(LocalVectorStore::new()),
            generator.clone(),
            log.clone(),
            &TrustConfig::default(),
        );

        let answer = service.answer("Anything at all?").await.unwrap();

        assert_eq!(answer.answer, INSUFFICIENT_INFORMATION);
        assert_eq!(answer.confidence, Confidence::Low);
        assert!(answer.sources.is_empty());
        assert!(answer.conflicts.is_empty());
        assert_eq!(generator.calls(), 0);

        let entries = log.entries().await.unwrap();
        assert!(entries[0].is_blocked);
    }

    #[tokio::test]
    async fn test_hash_embedder_retrieves_matching_text() {
        let embedder = Arc::new(HashEmbedder::default());
        let store = LocalVectorStore::new();
        let text = "vacation days carry over";
        store
            .upsert_chunks(vec![ChunkPoint {
                vector_id: "v1".to_string(),
                vector: embedder.embed(text).await.unwrap(),
                payload: ChunkPayload {
                    document_id: None,
                    title: "Leave Policy".to_string(),
                    content: text.to_string(),
                    page: Some(4),
                    created_at: Some("2024-03-01".to_string()),
                },
            }])
            .await
            .unwrap();

        let service = QueryService::new(
            embedder,
            Arc::new(store),
            Arc::new(ScriptedGenerator::new("They do [Leave Policy, Page 4].")),
            Arc::new(NullSink),
            &TrustConfig::default(),
        );

        let answer = service.answer_at("Vacation days carry over?", now()).await.unwrap();
        assert_eq!(answer.confidence, Confidence::High);
        assert_eq!(answer.sources[0].title, "Leave Policy");
    }

    #[tokio::test]
    async fn test_generation_failure_propagates_and_is_not_logged() {
        let dir = tempdir().unwrap();
        let log = Arc::new(JsonlQueryLog::new(dir.path().join("queries.jsonl")));
        let generator = Arc::new(ScriptedGenerator::default().with_replies(vec![
            Err(Error::Network("reset".to_string())),
            Err(Error::Network("reset".to_string())),
        ]));
        let retry = RetryConfig {
            max_attempts: 2,
            initial_backoff: Duration::ZERO,
            ..Default::default()
        };
        let service = QueryService::new(
            Arc::new(FixedEmbedder),
            seeded_store().await,
            generator.clone(),
            log.clone(),
            &config(),
        )
        .with_assembler(AnswerAssembler::new(generator.clone()).with_retry(retry));

        let err = service.answer_at("policy", now()).await.unwrap_err();

        assert!(matches!(err, Error::GenerationFailure { attempts: 2, .. }));
        assert_eq!(generator.calls(), 2);
        assert!(log.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_propagates() {
        let service = QueryService::new(
            Arc::new(FixedEmbedder),
            seeded_store().await,
            Arc::new(ScriptedGenerator::default()),
            Arc::new(BrokenSink),
            &config(),
        );

        let err = service.answer_at("policy", now()).await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let service = QueryService::new(
            Arc::new(FixedEmbedder),
            seeded_store().await,
            Arc::new(ScriptedGenerator::default()),
            Arc::new(NullSink),
            &config(),
        );

        let err = service.answer("   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_retrieval_limit_bounds_candidates() {
        let store = LocalVectorStore::new();
        let points = (0..25)
            .map(|i| point(&format!("Doc{i}"), 0.95, Some("2024-01-01"), i))
            .collect();
        store.upsert_chunks(points).await.unwrap();

        let service = QueryService::new(
            Arc::new(FixedEmbedder),
            Arc::new(store),
            Arc::new(ScriptedGenerator::default()),
            Arc::new(NullSink),
            &TrustConfig::default(),
        );

        let evaluation = service.evaluate_at("q", now()).await.unwrap();
        assert_eq!(evaluation.scored_chunks.len(), 10);
    }
}
