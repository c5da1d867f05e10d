//! Exported diagnostic report.
//!
//! A `DiagnosticReport` is the sealed record of one conversion epoch: every
//! distinct diagnostic in recording order, plus the fingerprint of the policy
//! table the diagnostics refer to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rpl_contracts::diagnostic::{Diagnostic, DiagnosticKind, EpochId};

/// Diagnostics of one conversion epoch, ready for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    /// The conversion pass these diagnostics belong to.
    pub epoch: EpochId,

    /// Distinct diagnostics, first occurrence order.
    pub diagnostics: Vec<Diagnostic>,

    /// SHA-256 fingerprint of the frozen policy table, when one was built.
    pub table_fingerprint: Option<String>,

    /// When the report was exported.
    pub generated_at: DateTime<Utc>,
}

/// Number of diagnostics per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticCounts {
    /// References to policies or prefix lists that do not exist.
    pub undefined_references: usize,
    /// Vendor clauses lowered to a no-op or never-matching predicate.
    pub unsupported_constructs: usize,
    /// Policies that re-entered themselves through calls.
    pub call_cycles: usize,
    /// Evaluations cut off at the maximum call depth.
    pub depth_exceeded: usize,
}

impl DiagnosticReport {
    /// True when the epoch produced no diagnostics.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Tally diagnostics by kind.
    pub fn counts(&self) -> DiagnosticCounts {
        let mut counts = DiagnosticCounts::default();
        for diagnostic in &self.diagnostics {
            match diagnostic.kind {
                DiagnosticKind::UndefinedReference { .. } => counts.undefined_references += 1,
                DiagnosticKind::UnsupportedConstruct { .. } => counts.unsupported_constructs += 1,
                DiagnosticKind::CallCycle { .. } => counts.call_cycles += 1,
                DiagnosticKind::CallDepthExceeded { .. } => counts.depth_exceeded += 1,
            }
        }
        counts
    }

    /// Diagnostics attributable to `policy`.
    pub fn for_policy<'a>(&'a self, policy: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.diagnostics.iter().filter(move |d| d.policy == policy)
    }
}
