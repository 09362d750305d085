//! Keyword tables for domains and categories, and query construction.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{Category, CollectionFocus};

/// Keywords for a known application domain. Unknown domains get a generic set.
pub fn domain_terms(domain: &str) -> &'static [&'static str] {
    match domain.trim().to_ascii_lowercase().as_str() {
        "medical" | "healthcare" => &[
            "healthcare",
            "medical",
            "diagnosis",
            "clinical",
            "patient",
            "safety",
        ],
        "finance" | "financial" => &[
            "financial",
            "credit",
            "risk",
            "discrimination",
            "lending",
        ],
        "recruitment" | "hiring" => &["employment", "hiring", "discrimination", "bias"],
        "law_enforcement" => &["criminal", "justice", "predictive", "policing"],
        "education" => &["student", "assessment", "learning", "profiling"],
        _ => &["ai", "system"],
    }
}

/// Keywords used for clause queries and topic inference.
pub fn category_terms(category: Category) -> &'static [&'static str] {
    match category {
        Category::Transparency => &[
            "transparency",
            "explainability",
            "disclosure",
            "information",
            "model card",
        ],
        Category::DataGovernance => &[
            "data quality",
            "bias",
            "training data",
            "dataset",
            "privacy",
            "data governance",
        ],
        Category::Accountability => &[
            "accountability",
            "liability",
            "responsibility",
            "redress",
            "audit",
        ],
        Category::Robustness => &[
            "accuracy",
            "performance",
            "validation",
            "testing",
            "robustness",
            "clinical trial",
        ],
        Category::HumanOversight => &[
            "human oversight",
            "human review",
            "supervision",
            "intervention",
            "human-in-the-loop",
        ],
    }
}

/// Clause-corpus query for one category in one domain.
pub fn criteria_query(category: Category, domain: &str) -> String {
    format!(
        "EU AI Act {} requirements for {} high-risk AI systems",
        category_terms(category).join(" "),
        domain_terms(domain).join(" ")
    )
}

/// Collector query; later passes append the focus hints.
pub fn collection_query(company_name: &str, domain: &str, focus: &CollectionFocus) -> String {
    let mut query = format!("{company_name} {domain} AI ethics");
    for category in &focus.categories {
        query.push(' ');
        query.push_str(category_terms(*category)[0]);
    }
    for facet in &focus.facets {
        match facet.as_str() {
            "recency" => query.push_str(" latest announcement"),
            "reliability" => query.push_str(" regulator filing standard"),
            "diversity" => query.push_str(" independent analysis"),
            _ => {}
        }
    }
    query
}

fn commitment_pattern() -> &'static Regex {
    static COMMITMENT: OnceLock<Regex> = OnceLock::new();
    COMMITMENT.get_or_init(|| {
        Regex::new(
            r"(?i)\b(we (?:will|commit|ensure|guarantee|maintain|publish|require)|commit(?:s|ted)? to|is required to|policy requires|certified|audited by|publishes)\b",
        )
        .expect("commitment pattern is valid")
    })
}

/// Whether text contains an explicit commitment marker.
pub fn has_commitment(text: &str) -> bool {
    commitment_pattern().is_match(text)
}

/// Number of domain keywords present in `text` (case-insensitive).
pub fn domain_keyword_hits(text: &str, domain: &str) -> usize {
    let text = text.to_lowercase();
    domain_terms(domain)
        .iter()
        .filter(|kw| text.contains(*kw))
        .count()
}
