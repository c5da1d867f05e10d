//! In-memory implementation of `DiagnosticSink`.
//!
//! `InMemoryDiagnostics` keeps every distinct diagnostic in a `Vec` behind a
//! `Mutex`, so the compiler, the registry and any number of evaluator threads
//! can share one collector. A diagnostic is distinct when its policy, term
//! and kind differ from every earlier one; the timestamp is ignored, so a
//! cycle hit by a million routes is reported once.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};

use rpl_contracts::diagnostic::{Diagnostic, DiagnosticKind, EpochId};
use rpl_core::traits::DiagnosticSink;

use crate::report::DiagnosticReport;

type DiagnosticKey = (String, Option<usize>, DiagnosticKind);

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Default)]
struct CollectorState {
    diagnostics: Vec<Diagnostic>,
    seen: HashSet<DiagnosticKey>,
    /// Total `record` calls, duplicates included.
    recorded: usize,
}

// ── Public collector ──────────────────────────────────────────────────────────

pub struct InMemoryDiagnostics {
    epoch: EpochId,
    state: Mutex<CollectorState>,
}

impl Default for InMemoryDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDiagnostics {
    /// A collector for a fresh epoch.
    pub fn new() -> Self {
        Self::with_epoch(EpochId::new())
    }

    pub fn with_epoch(epoch: EpochId) -> Self {
        Self {
            epoch,
            state: Mutex::new(CollectorState::default()),
        }
    }

    pub fn epoch(&self) -> &EpochId {
        &self.epoch
    }

    // A panic elsewhere must not silence diagnostics.
    fn state(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of distinct diagnostics.
    pub fn len(&self) -> usize {
        self.state().diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `record` calls, duplicates included.
    pub fn recorded(&self) -> usize {
        self.state().recorded
    }

    /// Copy of the distinct diagnostics, in first-occurrence order.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.state().diagnostics.clone()
    }

    /// Seal the diagnostics collected so far into a report.
    pub fn export_report(&self, table_fingerprint: Option<String>) -> DiagnosticReport {
        let state = self.state();
        info!(
            epoch = %self.epoch,
            distinct = state.diagnostics.len(),
            recorded = state.recorded,
            "diagnostic report exported"
        );
        DiagnosticReport {
            epoch: self.epoch.clone(),
            diagnostics: state.diagnostics.clone(),
            table_fingerprint,
            generated_at: Utc::now(),
        }
    }
}

// ── DiagnosticSink impl ───────────────────────────────────────────────────────

impl DiagnosticSink for InMemoryDiagnostics {
    fn record(&self, diagnostic: Diagnostic) {
        let mut state = self.state();
        state.recorded += 1;

        let (policy, term, kind) = diagnostic.key();
        let key = (policy.to_string(), term, kind.clone());
        if !state.seen.insert(key) {
            return;
        }
        debug!(epoch = %self.epoch, diagnostic = %diagnostic, "diagnostic recorded");
        state.diagnostics.push(diagnostic);
    }
}
