use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_EXCLUDE_TERMS: [&str; 3] = ["localhost", "socket", "nextjs"];

/// Substrings that drop a span when found anywhere in its endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ExcludeTerms(BTreeSet<String>);

impl<'de> Deserialize<'de> for ExcludeTerms {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let terms = Vec::<String>::deserialize(deserializer)?;
        Ok(terms.into_iter().collect())
    }
}

impl Default for ExcludeTerms {
    fn default() -> Self {
        DEFAULT_EXCLUDE_TERMS.into_iter().collect()
    }
}

impl ExcludeTerms {
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Parses a comma separated list. Blank entries are skipped, so `""`
    /// yields an empty set.
    pub fn parse_list(raw: &str) -> Self {
        raw.split(',').collect()
    }

    pub fn matches(&self, endpoint: &str) -> bool {
        self.0.iter().any(|term| endpoint.contains(term.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExcludeTerms {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|t| t.as_ref().trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        )
    }
}
