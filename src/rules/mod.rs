//! Interpretable rules induced from bagged decision trees
//!
//! - [`Rule`]: a conjunction of threshold conditions read off a tree path
//! - [`SkopeRules`]: fits the trees, scores their rules out of bag, keeps the
//!   precise ones and removes near-duplicates

mod config;
pub mod rule;
pub mod skope;

pub use config::SkopeRulesConfig;
pub use rule::{extract_rules, Condition, Operator, Rule};
pub use skope::{ScoredRule, SkopeRules};
