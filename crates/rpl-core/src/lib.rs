//! # rpl-core
//!
//! The route policy runtime.
//!
//! This crate provides:
//! - The seam traits (`PolicyEngine`, `DiagnosticSink`)
//! - The two-phase policy registry (`PolicyRegistry` → `PolicyTable`)
//! - The `Evaluator` that interprets the policy IR against a route
//! - `simplify`, the semantics-preserving statement cleanup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rpl_core::{Evaluator, PolicyRegistry};
//!
//! let mut registry = PolicyRegistry::new();
//! registry.define(policy)?;
//! let table = registry.freeze(&sink);
//! let decision = Evaluator::new(&table, &sink).evaluate_policy("IMPORT", &route, Direction::Import)?;
//! ```

pub mod engine;
mod matching;
pub mod registry;
pub mod simplify;
pub mod traits;

pub use engine::{EvalOptions, Evaluator, DEFAULT_MAX_CALL_DEPTH};
pub use registry::{PolicyRegistry, PolicyTable};
pub use simplify::simplify;
