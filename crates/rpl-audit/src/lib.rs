//! # rpl-audit
//!
//! Diagnostic collection and epoch sealing for the route policy engine.
//!
//! ## Overview
//!
//! Recoverable problems (undefined references, unsupported constructs, call
//! cycles) are never errors; they are recorded into a `DiagnosticSink`.
//! `InMemoryDiagnostics` is the reference sink. At the end of a conversion
//! pass its contents are exported as a `DiagnosticReport`, together with a
//! SHA-256 `fingerprint` of the frozen policy table.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rpl_audit::{fingerprint, InMemoryDiagnostics};
//!
//! let diagnostics = InMemoryDiagnostics::new();
//! let table = rpl_policy::convert(&input, &diagnostics)?;
//! let seal = fingerprint(&table);
//! // ... evaluate routes in parallel ...
//! assert!(rpl_audit::verify_fingerprint(&table, &seal));
//! let report = diagnostics.export_report(Some(seal));
//! ```

pub mod fingerprint;
pub mod memory;
pub mod report;

pub use fingerprint::{fingerprint, verify_fingerprint};
pub use memory::InMemoryDiagnostics;
pub use report::{DiagnosticCounts, DiagnosticReport};

// ── Tests ─────────────────────────────────────────────────────────────────────
