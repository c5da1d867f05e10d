//! Junos reference scenarios.
//!
//! Each scenario is a self-contained module that compiles an embedded TOML
//! configuration with the real conversion driver, evaluates mock routes
//! against the derived policies, and seals the result with a table
//! fingerprint and a diagnostic report.

pub mod aggregate;
pub mod peer_import;
pub mod vrf_leak;

use tracing::info;

use rpl_audit::{fingerprint, verify_fingerprint, DiagnosticReport, InMemoryDiagnostics};
use rpl_contracts::{
    decision::{Decision, Direction},
    error::{RplError, RplResult},
};
use rpl_core::{Evaluator, PolicyTable};
use rpl_policy::{convert, ConfigurationInput};

use crate::mock_routes::MockRoute;

/// One route evaluated against one policy.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub label: &'static str,
    pub policy: String,
    pub direction: Direction,
    pub decision: Decision,
}

/// Everything a scenario produced, for printing or inspection.
#[derive(Debug)]
pub struct ScenarioRun {
    pub table: PolicyTable,
    pub outcomes: Vec<Outcome>,
    pub report: DiagnosticReport,
}

impl ScenarioRun {
    /// The decision for `label` under `policy`, if that pair was evaluated.
    pub fn decision(&self, label: &str, policy: &str) -> Option<&Decision> {
        self.outcomes
            .iter()
            .find(|o| o.label == label && o.policy == policy)
            .map(|o| &o.decision)
    }
}

// ── Shared wiring ─────────────────────────────────────────────────────────────

/// A compiled configuration plus the collector its diagnostics went to.
pub(crate) struct Compiled {
    pub table: PolicyTable,
    pub diagnostics: InMemoryDiagnostics,
}

pub(crate) fn compile(toml: &str) -> RplResult<Compiled> {
    let input = ConfigurationInput::from_toml_str(toml)?;
    let diagnostics = InMemoryDiagnostics::new();
    let table = convert(&input, &diagnostics)?;
    info!(
        policies = table.len(),
        diagnostics = diagnostics.len(),
        epoch = %diagnostics.epoch(),
        "scenario configuration compiled"
    );
    Ok(Compiled { table, diagnostics })
}

pub(crate) fn evaluate(
    compiled: &Compiled,
    policy: &str,
    direction: Direction,
    routes: &[MockRoute],
) -> RplResult<Vec<Outcome>> {
    let evaluator = Evaluator::new(&compiled.table, &compiled.diagnostics);
    routes
        .iter()
        .map(|mock| {
            Ok(Outcome {
                label: mock.label,
                policy: policy.to_string(),
                direction,
                decision: evaluator.evaluate_policy(policy, &mock.route, direction)?,
            })
        })
        .collect()
}

/// Fingerprint the table, export the report and re-check the fingerprint.
pub(crate) fn seal(compiled: Compiled, outcomes: Vec<Outcome>) -> RplResult<ScenarioRun> {
    let digest = fingerprint(&compiled.table);
    let report = compiled.diagnostics.export_report(Some(digest.clone()));
    if !verify_fingerprint(&compiled.table, &digest) {
        return Err(RplError::ConfigError {
            reason: "policy table changed after evaluation".to_string(),
        });
    }
    Ok(ScenarioRun {
        table: compiled.table,
        outcomes,
        report,
    })
}

// ── Output ────────────────────────────────────────────────────────────────────

pub(crate) fn print_outcomes(outcomes: &[Outcome]) {
    for outcome in outcomes {
        let writes: Vec<String> = outcome
            .decision
            .attributes
            .iter()
            .map(|(field, value)| format!("{:?}={:?}", field, value))
            .collect();
        println!(
            "  {:<18} {:<10} {:<6} {}",
            outcome.label,
            outcome.direction.to_string(),
            outcome.decision.result.to_string(),
            writes.join(" ")
        );
    }
}

pub(crate) fn print_seal(run: &ScenarioRun) {
    let counts = run.report.counts();
    println!("  Policies in table:      {}", run.table.len());
    println!(
        "  Diagnostics:            {} undefined, {} unsupported, {} cycle(s), {} depth",
        counts.undefined_references, counts.unsupported_constructs, counts.call_cycles, counts.depth_exceeded
    );
    for diagnostic in &run.report.diagnostics {
        println!("    - {}", diagnostic);
    }
    println!(
        "  Table fingerprint:      {} (VERIFIED)",
        run.report.table_fingerprint.as_deref().unwrap_or("-")
    );
}
