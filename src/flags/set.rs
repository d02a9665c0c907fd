use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where a label list was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum FlagSource {
    Inline,
    File(PathBuf),
}

/// Ordered list of classification labels.
///
/// Uniqueness is a convention only: duplicates are kept in input order and can
/// be inspected with [`LabelSet::duplicates`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelSet {
    pub source: FlagSource,
    pub labels: Vec<String>,
}

impl LabelSet {
    pub fn new(source: FlagSource, labels: Vec<String>) -> Self {
        Self { source, labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Labels that appear more than once, each reported once, sorted.
    pub fn duplicates(&self) -> Vec<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(label, _)| label)
            .collect()
    }
}
