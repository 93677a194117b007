//! Time-decay reliability scoring

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tkp_core::{ChunkRecord, ScoredChunk};

/// Weight of the retrieval similarity in the combined score
pub const RELEVANCE_WEIGHT: f64 = 0.7;
/// Weight of the freshness score in the combined score
pub const FRESHNESS_WEIGHT: f64 = 0.3;
/// Freshness assigned when a chunk carries no usable creation date
pub const NEUTRAL_FRESHNESS: f64 = 0.5;

/// Decay horizon as a multiple of the penalty period
const DECAY_PERIODS: f64 = 10.0;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Scores chunks by document age.
///
/// Freshness falls linearly from 1.0 for a document created today to 0.0 at
/// `penalty_days × 10` days old, and stays at zero after that.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessScorer {
    penalty_days: u32,
}

impl FreshnessScorer {
    pub fn new(penalty_days: u32) -> Self {
        Self {
            penalty_days: penalty_days.max(1),
        }
    }

    /// Freshness of a document created at `created_at`, as seen at `now`
    pub fn freshness(&self, created_at: Option<&str>, now: DateTime<Utc>) -> f64 {
        let Some(created) = created_at.and_then(parse_timestamp) else {
            return NEUTRAL_FRESHNESS;
        };

        // Future-dated documents count as brand new.
        let age_days = (now - created).num_days().max(0) as f64;
        let horizon = self.penalty_days as f64 * DECAY_PERIODS;

        (1.0 - age_days / horizon).clamp(0.0, 1.0)
    }

    /// Attach freshness and combined scores to a chunk
    pub fn score(&self, chunk: ChunkRecord, now: DateTime<Utc>) -> ScoredChunk {
        let freshness_score = self.freshness(chunk.payload.created_at.as_deref(), now);
        let relevance = (chunk.relevance_score as f64).clamp(0.0, 1.0);
        let combined_score = RELEVANCE_WEIGHT * relevance + FRESHNESS_WEIGHT * freshness_score;

        ScoredChunk {
            chunk,
            freshness_score,
            combined_score,
        }
    }
}

impl Default for FreshnessScorer {
    fn default() -> Self {
        Self::new(365)
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with an offset or `Z`, a naive date-time (`T` or space separated)
/// and a bare date. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tkp_core::ChunkPayload;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn chunk(relevance: f32, created_at: Option<&str>) -> ChunkRecord {
        ChunkRecord::new(
            "v1",
            relevance,
            ChunkPayload {
                document_id: None,
                title: "Doc".to_string(),
                content: "Body".to_string(),
                page: Some(1),
                created_at: created_at.map(str::to_string),
            },
        )
    }

    #[test]
    fn test_neutral_freshness_when_absent() {
        let scored = FreshnessScorer::default().score(chunk(0.9, None), now());
        assert_eq!(scored.freshness_score, NEUTRAL_FRESHNESS);
        assert!((scored.combined_score - 0.78).abs() < 1e-6);
    }

    #[test]
    fn test_neutral_freshness_when_unparseable() {
        let scorer = FreshnessScorer::default();
        assert_eq!(scorer.freshness(Some("last spring"), now()), NEUTRAL_FRESHNESS);
        assert_eq!(scorer.freshness(Some(""), now()), NEUTRAL_FRESHNESS);
        assert_eq!(scorer.freshness(Some("2024-13-45"), now()), NEUTRAL_FRESHNESS);
    }

    #[test]
    fn test_linear_decay() {
        let scorer = FreshnessScorer::default();
        assert_eq!(scorer.freshness(Some("2025-01-01T00:00:00Z"), now()), 1.0);

        // 365 days of a 3650 day horizon.
        let one_year = scorer.freshness(Some("2024-01-02"), now());
        assert!((one_year - 0.9).abs() < 1e-9);

        assert_eq!(scorer.freshness(Some("2010-01-01"), now()), 0.0);
    }

    #[test]
    fn test_future_dates_are_clamped() {
        let scorer = FreshnessScorer::default();
        assert_eq!(scorer.freshness(Some("2030-06-01T12:00:00+02:00"), now()), 1.0);
    }

    #[test]
    fn test_penalty_days_shortens_horizon() {
        let scorer = FreshnessScorer::new(30);
        // 150 days of a 300 day horizon.
        let half = scorer.freshness(Some("2024-08-04"), now());
        assert!((half - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T10:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 10:30:00.000000"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-05-01"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("May 1st"), None);
    }

    #[test]
    fn test_relevance_outside_unit_interval_is_clamped() {
        let scored = FreshnessScorer::default().score(chunk(1.0000002, Some("2025-01-01")), now());
        assert!(scored.combined_score <= 1.0);
    }
}
