//! Engine configuration.
//!
//! Every field has a default, so an empty TOML file is a valid config.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{Category, EthauditError, Result, MAX_RETRIES};

/// Gate thresholds. All values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum `quality_score` for collected data to count as sufficient.
    pub quality: f64,
    /// Minimum `analysis_score` for the analysis to count as sufficient.
    pub analysis: f64,
    /// Minimum overall criterion confidence checked after evaluation.
    pub evaluation_confidence: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            quality: 0.6,
            analysis: 0.6,
            evaluation_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Insufficiency back-edges allowed per run, at most [`MAX_RETRIES`].
    pub max_retries: u32,
    pub thresholds: Thresholds,
    /// Re-check confidence after evaluation and re-collect when it is low.
    pub recheck_after_evaluation: bool,
    /// Clauses requested per category query, 1..=10.
    pub retrieval_k: usize,
    pub max_criteria_per_category: usize,
    pub recency_half_life_days: f64,
    pub collector_timeout_secs: u64,
    /// Judgment floor per category name; missing categories use `default_risk_floor`.
    pub risk_floors: BTreeMap<String, f64>,
    pub default_risk_floor: f64,
    pub confidence_floor: f64,
    /// Most documents passed to the judge for one criterion.
    pub max_evidence_per_judgment: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            thresholds: Thresholds::default(),
            recheck_after_evaluation: true,
            retrieval_k: 10,
            max_criteria_per_category: 5,
            recency_half_life_days: 180.0,
            collector_timeout_secs: 60,
            risk_floors: BTreeMap::new(),
            default_risk_floor: 0.4,
            confidence_floor: 0.3,
            max_evidence_per_judgment: 8,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(raw).map_err(|e| EthauditError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn risk_floor(&self, category: Category) -> f64 {
        self.risk_floors
            .get(category.as_str())
            .copied()
            .unwrap_or(self.default_risk_floor)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries > MAX_RETRIES {
            return Err(EthauditError::Config(format!(
                "max_retries {} exceeds the ceiling of {}",
                self.max_retries, MAX_RETRIES
            )));
        }
        let unit = [
            ("thresholds.quality", self.thresholds.quality),
            ("thresholds.analysis", self.thresholds.analysis),
            (
                "thresholds.evaluation_confidence",
                self.thresholds.evaluation_confidence,
            ),
            ("default_risk_floor", self.default_risk_floor),
            ("confidence_floor", self.confidence_floor),
        ];
        for (name, value) in unit {
            check_unit(name, value)?;
        }
        for (name, value) in &self.risk_floors {
            if Category::parse(name).is_none() {
                return Err(EthauditError::Config(format!(
                    "risk_floors names unknown category {name}"
                )));
            }
            check_unit(&format!("risk_floors.{name}"), *value)?;
        }
        if !(self.recency_half_life_days.is_finite() && self.recency_half_life_days > 0.0) {
            return Err(EthauditError::Config(
                "recency_half_life_days must be positive".to_string(),
            ));
        }
        if !(1..=10).contains(&self.retrieval_k) {
            return Err(EthauditError::Config(format!(
                "retrieval_k {} outside 1..=10",
                self.retrieval_k
            )));
        }
        if self.max_criteria_per_category == 0 {
            return Err(EthauditError::Config(
                "max_criteria_per_category must be at least 1".to_string(),
            ));
        }
        if self.max_evidence_per_judgment == 0 {
            return Err(EthauditError::Config(
                "max_evidence_per_judgment must be at least 1".to_string(),
            ));
        }
        if self.collector_timeout_secs == 0 {
            return Err(EthauditError::Config(
                "collector_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EthauditError::Config(format!(
            "{name} = {value} outside [0, 1]"
        )))
    }
}
