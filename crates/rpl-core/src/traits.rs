//! Trait seams of the route policy engine.
//!
//! - `PolicyEngine`: what protocol logic calls once per candidate route
//! - `DiagnosticSink`: where recoverable problems are reported
//!
//! Protocol computations depend only on `PolicyEngine`, so they can be
//! tested against a canned engine without compiling any configuration.

use rpl_contracts::{
    decision::{Decision, Direction},
    diagnostic::Diagnostic,
    error::RplResult,
    route::Route,
};

/// Evaluates named routing policies against candidate routes.
///
/// Implementations must be deterministic and free of I/O: the surrounding
/// pipeline calls `evaluate` for many routes in parallel.
pub trait PolicyEngine: Send + Sync {
    /// Apply the policy called `policy` to `route` travelling in `direction`.
    ///
    /// Undefined references inside the policy are not errors. `Err` is
    /// returned only for malformed IR, which indicates a compiler defect.
    fn evaluate(&self, policy: &str, route: &Route, direction: Direction) -> RplResult<Decision>;
}

/// Collects diagnostics produced while compiling, linking and evaluating.
///
/// Recording must never fail; sinks that persist diagnostics swallow their
/// own I/O problems.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: Diagnostic);
}
