//! Citation extraction from generated answers

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\[\]]+?),\s*[Pp]age\s+(\d+)\]").expect("citation pattern is valid")
});

/// A `[Source Title, Page X]` reference found in an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub page: u32,
}

/// Extract every well-formed citation from `text`, in order of appearance
pub fn extract_citations(text: &str) -> Vec<Citation> {
    CITATION
        .captures_iter(text)
        .filter_map(|caps| {
            let page = caps[2].parse().ok()?;
            Some(Citation {
                title: caps[1].trim().to_string(),
                page,
            })
        })
        .collect()
}
