//! Core domain types and logic.

pub mod diagnostics;
pub mod error;
pub mod functions;
pub mod indicator_builder;
pub mod metrics;
pub mod optimizer;
pub mod params;
pub mod position;
pub mod rule;
pub mod rule_compiler;
pub mod rule_eval;
pub mod search;
pub mod spec;
pub mod strategy;
pub mod table;
