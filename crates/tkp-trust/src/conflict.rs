//! Temporal conflict detection between ranked sources

use std::collections::HashSet;

use tkp_core::{Conflict, ConflictType, ScoredChunk};
use tracing::debug;

const DATE_PREFIX: usize = 10;
const YEAR_PREFIX: usize = 4;

/// Flags pairs of chunks whose source dates fall in different calendar years.
///
/// Every unordered pair is compared, so cost is quadratic in the number of chunks.
/// Input size is bounded by the retrieval limit (10 by default, 45 comparisons);
/// raising that limit substantially means bucketing by year first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector {
    dedupe: bool,
}

impl ConflictDetector {
    pub fn new(dedupe: bool) -> Self {
        Self { dedupe }
    }

    /// Scan all pairs of `ranked` and report temporal conflicts in pair order
    pub fn detect(&self, ranked: &[ScoredChunk]) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        let mut seen: HashSet<(ConflictType, String, String)> = HashSet::new();

        for (i, first) in ranked.iter().enumerate() {
            for second in &ranked[i + 1..] {
                let Some(conflict) = temporal_conflict(first, second) else {
                    continue;
                };

                if self.dedupe && !seen.insert(dedupe_key(&conflict)) {
                    continue;
                }

                debug!(
                    first = %conflict.sources[0],
                    second = %conflict.sources[1],
                    "temporal conflict"
                );
                conflicts.push(conflict);
            }
        }

        conflicts
    }
}

fn temporal_conflict(first: &ScoredChunk, second: &ScoredChunk) -> Option<Conflict> {
    let (d1, d2) = (first.created_at()?, second.created_at()?);

    if prefix(d1, DATE_PREFIX) == prefix(d2, DATE_PREFIX) {
        return None;
    }

    let (year1, year2) = (prefix(d1, YEAR_PREFIX), prefix(d2, YEAR_PREFIX));
    if year1 == year2 {
        return None;
    }

    Some(Conflict {
        conflict_type: ConflictType::Temporal,
        sources: [first.title().to_string(), second.title().to_string()],
        description: format!("Information from {} and {} might conflict.", year1, year2),
    })
}

fn dedupe_key(conflict: &Conflict) -> (ConflictType, String, String) {
    let [a, b] = &conflict.sources;
    if a <= b {
        (conflict.conflict_type, a.clone(), b.clone())
    } else {
        (conflict.conflict_type, b.clone(), a.clone())
    }
}

/// First `chars` characters of `s`, or all of it when shorter
fn prefix(s: &str, chars: usize) -> &str {
    match s.char_indices().nth(chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tkp_core::{ChunkPayload, ChunkRecord};

    fn dated(title: &str, created_at: Option<&str>) -> ScoredChunk {
        ScoredChunk {
            chunk: ChunkRecord::new(
                title,
                0.8,
                ChunkPayload {
                    document_id: None,
                    title: title.to_string(),
                    content: String::new(),
                    page: None,
                    created_at: created_at.map(str::to_string),
                },
            ),
            freshness_score: 0.5,
            combined_score: 0.5,
        }
    }

    #[test]
    fn test_different_years_conflict() {
        let chunks = vec![
            dated("Old", Some("2020-05-01T00:00:00")),
            dated("New", Some("2023-05-01T00:00:00")),
        ];
        let conflicts = ConflictDetector::default().detect(&chunks);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::Temporal);
        assert_eq!(conflicts[0].sources, ["Old".to_string(), "New".to_string()]);
        assert_eq!(
            conflicts[0].description,
            "Information from 2020 and 2023 might conflict."
        );
    }

    #[test]
    fn test_same_year_does_not_conflict() {
        let chunks = vec![
            dated("Spring", Some("2020-03-01")),
            dated("Autumn", Some("2020-10-15")),
            dated("Same day", Some("2020-03-01T18:00:00")),
        ];
        assert!(ConflictDetector::default().detect(&chunks).is_empty());
    }

    #[test]
    fn test_missing_dates_are_skipped() {
        let chunks = vec![dated("Dated", Some("2019-01-01")), dated("Undated", None)];
        assert!(ConflictDetector::default().detect(&chunks).is_empty());
    }

    #[test]
    fn test_all_pairs_not_only_adjacent() {
        let chunks = vec![
            dated("A", Some("2021-01-01")),
            dated("B", Some("2021-06-01")),
            dated("C", Some("2024-01-01")),
        ];
        let conflicts = ConflictDetector::default().detect(&chunks);
        let pairs: Vec<_> = conflicts.iter().map(|c| c.sources.clone()).collect();

        assert_eq!(
            pairs,
            vec![
                ["A".to_string(), "C".to_string()],
                ["B".to_string(), "C".to_string()],
            ]
        );
    }

    #[test]
    fn test_duplicates_kept_unless_deduped() {
        let chunks = vec![
            dated("Policy", Some("2020-01-01")),
            dated("Memo", Some("2023-01-01")),
            dated("Policy", Some("2020-02-01")),
            dated("Memo", Some("2023-03-01")),
        ];

        let all = ConflictDetector::new(false).detect(&chunks);
        assert_eq!(all.len(), 4);

        let deduped = ConflictDetector::new(true).detect(&chunks);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].sources, ["Policy".to_string(), "Memo".to_string()]);
    }

    #[test]
    fn test_blank_dates_are_skipped() {
        let chunks = vec![
            dated("Dated", Some("2020-01-01")),
            dated("Blank", Some("")),
            dated("Spaces", Some("   ")),
        ];
        assert!(ConflictDetector::default().detect(&chunks).is_empty());

        let evaluation = crate::TrustGate::default().evaluate_retrieval(
            chunks.into_iter().map(|c| c.chunk).collect(),
        );
        assert!(evaluation.conflicts.is_empty());
    }

    #[test]
    fn test_short_and_non_ascii_dates_do_not_panic() {
        let chunks = vec![
            dated("Short", Some("2020")),
            dated("Wide", Some("２０２１年")),
            dated("Other", Some("2022-01")),
        ];
        let conflicts = ConflictDetector::default().detect(&chunks);
        assert_eq!(conflicts.len(), 3);
        assert_eq!(
            conflicts[0].description,
            "Information from 2020 and ２０２１ might conflict."
        );
    }

    #[test]
    fn test_prefix_is_char_based() {
        assert_eq!(prefix("2024-01-01T00:00:00", 10), "2024-01-01");
        assert_eq!(prefix("2024", 10), "2024");
        assert_eq!(prefix("éé", 1), "é");
        assert_eq!(prefix("", 4), "");
    }
}
