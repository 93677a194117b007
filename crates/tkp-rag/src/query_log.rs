//! Query log sinks

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use tkp_core::{Error, QueryLogEntry, Result, ResultSink};

/// Appends one JSON object per answered query to a file
pub struct JsonlQueryLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlQueryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every recorded entry, oldest first
    pub async fn entries(&self) -> Result<Vec<QueryLogEntry>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| Error::Persistence(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl ResultSink for JsonlQueryLog {
    async fn record(&self, entry: &QueryLogEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::Persistence(format!("{}: {}", self.path.display(), e)))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Persistence(format!("{}: {}", self.path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| Error::Persistence(format!("{}: {}", self.path.display(), e)))?;

        Ok(())
    }
}

/// Sink that discards every entry
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl ResultSink for NullSink {
    async fn record(&self, _entry: &QueryLogEntry) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tkp_core::{AnswerResult, Confidence};

    fn entry(query: &str, confidence: Confidence) -> QueryLogEntry {
        QueryLogEntry::new(
            query,
            AnswerResult {
                answer: format!("answer to {query}"),
                confidence,
                sources: vec![],
                conflicts: vec![],
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_appends_one_line_per_entry() {
        let dir = tempdir().unwrap();
        let log = JsonlQueryLog::new(dir.path().join("queries.jsonl"));

        assert!(log.entries().await.unwrap().is_empty());

        let first = entry("first", Confidence::High);
        let second = entry("second", Confidence::Low);
        log.record(&first).await.unwrap();
        log.record(&second).await.unwrap();

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);

        let entries = log.entries().await.unwrap();
        assert_eq!(entries, vec![first, second]);
        assert!(entries[1].is_blocked);
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempdir().unwrap();
        let log = Arc::new(JsonlQueryLog::new(dir.path().join("queries.jsonl")));

        let writes = (0..20).map(|i| {
            let log = log.clone();
            async move { log.record(&entry(&format!("q{i}"), Confidence::Medium)).await }
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap();
        }

        assert_eq!(log.entries().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_unwritable_path_is_a_persistence_error() {
        let dir = tempdir().unwrap();
        let log = JsonlQueryLog::new(dir.path().join("missing").join("queries.jsonl"));

        let err = log.record(&entry("q", Confidence::High)).await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }
}
