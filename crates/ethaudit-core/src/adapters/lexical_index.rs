use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::collaborators::{ClauseHit, ClauseIndex};
use crate::domain::{Category, RetrievalError};

/// One clause in a corpus snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseRecord {
    pub clause_id: String,
    pub text: String,
    /// Category tag; aliases such as `accuracy_validation` are accepted.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub importance: Option<f64>,
    /// Domains the clause applies to; empty means all.
    #[serde(default)]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone)]
struct IndexedClause {
    record: ClauseRecord,
    category: Option<Category>,
    tokens: BTreeSet<String>,
}

/// Token-overlap similarity over an in-memory clause snapshot.
///
/// `similarity = |q ∩ c| / sqrt(|q| * |c|)` over distinct lowercase tokens.
pub struct LexicalClauseIndex {
    clauses: Vec<IndexedClause>,
}

fn tokens(text: &str) -> BTreeSet<String> {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    let re = TOKEN.get_or_init(|| Regex::new(r"[a-z0-9]+").expect("token pattern is valid"));
    re.find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .filter(|t| t.len() > 2)
        .collect()
}

impl LexicalClauseIndex {
    pub fn from_clauses(records: Vec<ClauseRecord>) -> Self {
        let clauses = records
            .into_iter()
            .map(|record| IndexedClause {
                category: record.category.as_deref().and_then(Category::parse),
                tokens: tokens(&record.text),
                record,
            })
            .collect();
        Self { clauses }
    }

    /// Load a JSON array of [`ClauseRecord`]s.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RetrievalError> {
        let path = path.as_ref();
        let raw = std::fs::read(path)
            .map_err(|e| RetrievalError::IndexUnavailable(format!("{}: {e}", path.display())))?;
        let records: Vec<ClauseRecord> = serde_json::from_slice(&raw)
            .map_err(|e| RetrievalError::IndexUnavailable(format!("{}: {e}", path.display())))?;
        Ok(Self::from_clauses(records))
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[async_trait]
impl ClauseIndex for LexicalClauseIndex {
    async fn search(
        &self,
        query: &str,
        domain: &str,
        k: usize,
    ) -> Result<Vec<ClauseHit>, RetrievalError> {
        let query_tokens = tokens(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let domain = domain.to_lowercase();

        let mut hits: Vec<ClauseHit> = self
            .clauses
            .iter()
            .filter(|c| {
                c.record.domains.is_empty()
                    || c.record.domains.iter().any(|d| d.to_lowercase() == domain)
            })
            .filter_map(|c| {
                if c.tokens.is_empty() {
                    return None;
                }
                let overlap = c.tokens.intersection(&query_tokens).count();
                if overlap == 0 {
                    return None;
                }
                let similarity =
                    overlap as f64 / ((c.tokens.len() * query_tokens.len()) as f64).sqrt();
                Some(ClauseHit {
                    clause_id: c.record.clause_id.clone(),
                    similarity: similarity.min(1.0),
                    text: c.record.text.clone(),
                    category: c.category,
                    importance: c.record.importance,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.clause_id.cmp(&b.clause_id))
        });
        hits.truncate(k);
        Ok(hits)
    }
}
