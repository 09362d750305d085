//! Evidence and scoring engine: criteria retrieval, evidence mapping,
//! rubric lookup and weighted aggregation.

pub mod aggregate;
pub mod criteria;
pub mod keywords;
pub mod mapping;
pub mod rubric;

pub use aggregate::aggregate;
pub use criteria::generate_criteria;
pub use mapping::{evaluate_all, evaluate_criterion, Mapped};
pub use rubric::{Verdict, RUBRIC};
