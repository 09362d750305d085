use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::collaborators::{CollectionBatch, CollectionRequest, Collector};
use crate::domain::{Category, CollectionError, Document, SourceType};

/// On-disk document record. `retrieved_at` defaults to load time.
#[derive(Debug, Deserialize)]
struct DocumentRecord {
    source_id: String,
    url_or_ref: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    excerpt: String,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    retrieved_at: Option<DateTime<Utc>>,
    reliability_score: f64,
    #[serde(default)]
    topics: Vec<Category>,
    /// Company the record is about; records without one match every company.
    #[serde(default)]
    company: Option<String>,
}

/// Serves documents from a JSON array on disk.
pub struct JsonFileCollector {
    name: String,
    source_type: SourceType,
    path: PathBuf,
}

impl JsonFileCollector {
    pub fn new(name: impl Into<String>, source_type: SourceType, path: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            source_type,
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Collector for JsonFileCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        self.source_type
    }

    async fn collect(&self, request: &CollectionRequest) -> Result<CollectionBatch, CollectionError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CollectionError::Unavailable {
                collector: self.name.clone(),
                reason: format!("{}: {e}", self.path.display()),
            })?;
        let records: Vec<DocumentRecord> =
            serde_json::from_slice(&raw).map_err(|e| CollectionError::Malformed {
                collector: self.name.clone(),
                reason: e.to_string(),
            })?;

        let now = Utc::now();
        let company = request.company_name.to_lowercase();
        let mut batch = CollectionBatch::default();
        for record in records {
            if let Some(c) = &record.company {
                if c.to_lowercase() != company {
                    continue;
                }
            }
            if !(0.0..=1.0).contains(&record.reliability_score) {
                batch.warnings.push(format!(
                    "skipped {}: reliability {} outside [0, 1]",
                    record.source_id, record.reliability_score
                ));
                continue;
            }
            batch.documents.push(Document {
                source_id: record.source_id,
                source_type: self.source_type,
                url_or_ref: record.url_or_ref,
                title: record.title,
                excerpt: record.excerpt,
                published_at: record.published_at,
                retrieved_at: record.retrieved_at.unwrap_or(now),
                reliability_score: record.reliability_score,
                topics: record.topics,
            });
        }
        Ok(batch)
    }
}
