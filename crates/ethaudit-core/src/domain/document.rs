//! Collected evidence documents and the deduplicated evidence set.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::category::Category;
use super::error::AnalysisError;

/// Which collector produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Web,
    Specialized,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Web => "web",
            SourceType::Specialized => "specialized",
        }
    }
}

/// Coarse reliability band derived from `reliability_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReliabilityTier {
    High,
    Medium,
    Low,
}

impl ReliabilityTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            ReliabilityTier::High
        } else if score >= 0.4 {
            ReliabilityTier::Medium
        } else {
            ReliabilityTier::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReliabilityTier::High => "high",
            ReliabilityTier::Medium => "medium",
            ReliabilityTier::Low => "low",
        }
    }
}

/// A single unit of evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub source_id: String,
    pub source_type: SourceType,
    pub url_or_ref: String,
    #[serde(default)]
    pub title: String,
    /// Short text the scorer and the judge read. Full page bodies are not kept.
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub retrieved_at: DateTime<Utc>,
    /// In `[0, 1]`.
    pub reliability_score: f64,
    /// Declared topics. When empty, topics are inferred from the text.
    #[serde(default)]
    pub topics: Vec<Category>,
}

fn url_pattern() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| {
        Regex::new(r"^(?i)(https?)://([^/?#\s]+)([^?#\s]*)").expect("url pattern is valid")
    })
}

/// Normalize a URL for de-duplication: lowercase scheme and host, keep the
/// path without a trailing slash, drop query and fragment.
///
/// Returns `None` for references that are not http(s) URLs.
pub fn normalize_url(raw: &str) -> Option<String> {
    let caps = url_pattern().captures(raw.trim())?;
    let scheme = caps.get(1)?.as_str().to_ascii_lowercase();
    let host = caps.get(2)?.as_str().to_ascii_lowercase();
    let path = caps.get(3).map(|m| m.as_str()).unwrap_or("");
    let path = path.trim_end_matches('/');
    Some(format!("{scheme}://{host}{path}"))
}

impl Document {
    /// Minimal constructor; optional fields start empty.
    pub fn new(
        source_id: impl Into<String>,
        source_type: SourceType,
        url_or_ref: impl Into<String>,
        reliability_score: f64,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_type,
            url_or_ref: url_or_ref.into(),
            title: String::new(),
            excerpt: String::new(),
            published_at: None,
            retrieved_at: Utc::now(),
            reliability_score,
            topics: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = excerpt.into();
        self
    }

    pub fn with_published_at(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    pub fn with_topics(mut self, topics: impl IntoIterator<Item = Category>) -> Self {
        self.topics = topics.into_iter().collect();
        self
    }

    /// Normalized source identity used as the evidence-set key.
    ///
    /// URLs normalize via [`normalize_url`]; anything else hashes the
    /// reference together with the excerpt.
    pub fn identity_key(&self) -> String {
        if let Some(url) = normalize_url(&self.url_or_ref) {
            return url;
        }
        let mut hasher = Sha256::new();
        hasher.update(self.url_or_ref.trim().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.excerpt.as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    /// Lowercased host for URL references.
    pub fn host(&self) -> Option<String> {
        let caps = url_pattern().captures(self.url_or_ref.trim())?;
        Some(caps.get(2)?.as_str().to_ascii_lowercase())
    }

    pub fn tier(&self) -> ReliabilityTier {
        ReliabilityTier::from_score(self.reliability_score)
    }

    /// Age in days relative to `now`; future dates clamp to zero.
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<f64> {
        let published = self.published_at?;
        let secs = (now - published).num_seconds().max(0) as f64;
        Some(secs / 86_400.0)
    }

    /// Structural checks the analysis stage relies on.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.source_id.trim().is_empty() {
            return Err(AnalysisError::MalformedDocument {
                source_id: "<empty>".to_string(),
                reason: "source_id is empty".to_string(),
            });
        }
        if !self.reliability_score.is_finite() || !(0.0..=1.0).contains(&self.reliability_score)
        {
            return Err(AnalysisError::MalformedDocument {
                source_id: self.source_id.clone(),
                reason: format!("reliability_score {} outside [0, 1]", self.reliability_score),
            });
        }
        if self.url_or_ref.trim().is_empty() {
            return Err(AnalysisError::MalformedDocument {
                source_id: self.source_id.clone(),
                reason: "url_or_ref is empty".to_string(),
            });
        }
        Ok(())
    }

    /// Declared topics, or topics inferred from title and excerpt.
    pub fn effective_topics(&self) -> BTreeSet<Category> {
        if !self.topics.is_empty() {
            return self.topics.iter().copied().collect();
        }
        let text = format!("{} {}", self.title, self.excerpt).to_lowercase();
        Category::ALL
            .into_iter()
            .filter(|c| {
                crate::scoring::keywords::category_terms(*c)
                    .iter()
                    .any(|kw| text.contains(kw))
            })
            .collect()
    }
}

/// Outcome of merging one batch into an [`EvidenceSet`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub added: usize,
    /// Duplicates that displaced a lower-reliability record.
    pub upgraded: usize,
    /// Duplicates dropped because the stored record was at least as reliable.
    pub ignored: usize,
}

/// Evidence keyed by normalized source identity.
///
/// Append-only: merging never removes a key, so the set's size is monotonic
/// across collection passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceSet {
    documents: BTreeMap<String, Document>,
}

impl EvidenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn get(&self, key: &str) -> Option<&Document> {
        self.documents.get(key)
    }

    pub fn find_by_source_id(&self, source_id: &str) -> Option<&Document> {
        self.documents.values().find(|d| d.source_id == source_id)
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.documents.values().map(|d| d.source_id.clone()).collect()
    }

    /// Merge a batch, keeping the higher-reliability record on duplicate keys.
    /// Ties keep the record already stored.
    pub fn merge<I>(&mut self, batch: I) -> MergeStats
    where
        I: IntoIterator<Item = Document>,
    {
        let mut stats = MergeStats::default();
        for doc in batch {
            let key = doc.identity_key();
            match self.documents.get(&key) {
                None => {
                    self.documents.insert(key, doc);
                    stats.added += 1;
                }
                Some(existing) if doc.reliability_score > existing.reliability_score => {
                    self.documents.insert(key, doc);
                    stats.upgraded += 1;
                }
                Some(_) => stats.ignored += 1,
            }
        }
        stats
    }
}
