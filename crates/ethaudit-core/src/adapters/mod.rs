//! Offline implementations of the collaborator traits.
//!
//! These read local JSON snapshots so the engine can run without network
//! access. They are not substitutes for the production search, retrieval
//! and model services.

mod file_collector;
mod lexical_index;
mod rule_judge;

pub use file_collector::JsonFileCollector;
pub use lexical_index::{ClauseRecord, LexicalClauseIndex};
pub use rule_judge::RuleJudge;
