//! Fixed ethical-risk taxonomy.

use serde::{Deserialize, Serialize};

/// One of the five ethical-risk dimensions every evaluation is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Transparency,
    DataGovernance,
    Accountability,
    /// Accuracy, validation and resilience. Older corpora tag it `accuracy_validation`.
    #[serde(alias = "accuracy_validation")]
    Robustness,
    HumanOversight,
}

impl Category {
    /// All categories in canonical order.
    pub const ALL: [Category; 5] = [
        Category::Transparency,
        Category::DataGovernance,
        Category::Accountability,
        Category::Robustness,
        Category::HumanOversight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Transparency => "transparency",
            Category::DataGovernance => "data_governance",
            Category::Accountability => "accountability",
            Category::Robustness => "robustness",
            Category::HumanOversight => "human_oversight",
        }
    }

    /// Human-readable heading used in criteria text and reports.
    pub fn title(self) -> &'static str {
        match self {
            Category::Transparency => "Transparency",
            Category::DataGovernance => "Data governance",
            Category::Accountability => "Accountability",
            Category::Robustness => "Robustness",
            Category::HumanOversight => "Human oversight",
        }
    }

    /// Parse a metadata tag. Accepts the canonical names plus common aliases.
    pub fn parse(tag: &str) -> Option<Category> {
        let normalized = tag.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "transparency" => Some(Category::Transparency),
            "data_governance" | "privacy" => Some(Category::DataGovernance),
            "accountability" => Some(Category::Accountability),
            "robustness" | "accuracy_validation" | "accuracy" => Some(Category::Robustness),
            "human_oversight" | "oversight" => Some(Category::HumanOversight),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!(Category::parse("Human Oversight"), Some(Category::HumanOversight));
        assert_eq!(Category::parse("accuracy_validation"), Some(Category::Robustness));
        assert_eq!(Category::parse("data-governance"), Some(Category::DataGovernance));
        assert_eq!(Category::parse("sustainability"), None);
    }

    #[test]
    fn serde_uses_snake_case_and_alias() {
        let json = serde_json::to_string(&Category::HumanOversight).unwrap();
        assert_eq!(json, "\"human_oversight\"");
        let parsed: Category = serde_json::from_str("\"accuracy_validation\"").unwrap();
        assert_eq!(parsed, Category::Robustness);
    }

    #[test]
    fn all_is_in_canonical_order() {
        let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "transparency",
                "data_governance",
                "accountability",
                "robustness",
                "human_oversight"
            ]
        );
    }
}
