//! Scenario 3: Routing-Instance Leaking
//!
//! Routes from the "blue" and "green" instances are offered to two leaking
//! paths:
//!
//! - the RIB group `BLUE-TO-RED`, whose import chain `LEAK-FROM-BLUE` is
//!   closed by the BGP default import policy;
//! - instance-import into "red" through `LEAK-FROM-BLUE LEAK-STATIC`, where
//!   a route no policy decides is not leaked.
//!
//! The configuration asks for simplification, so every policy is evaluated
//! in its cleaned-up form.

use rpl_contracts::{decision::Direction, error::RplResult};
use rpl_policy::derived::{instance_import_gate_name, rib_group_policy_name};

use crate::mock_routes::instance_routes;

use super::{compile, evaluate, print_outcomes, print_seal, seal, ScenarioRun};

// ── Policy TOML ───────────────────────────────────────────────────────────────

const LEAK_POLICY: &str = include_str!("../../policies/vrf_leak.toml");

pub const RIB_GROUP: &str = "BLUE-TO-RED";
pub const TARGET_VRF: &str = "red";

pub fn execute() -> RplResult<ScenarioRun> {
    let compiled = compile(LEAK_POLICY)?;
    let routes = instance_routes()?;

    let mut outcomes = evaluate(&compiled, &rib_group_policy_name(RIB_GROUP), Direction::Import, &routes)?;
    outcomes.extend(evaluate(
        &compiled,
        &instance_import_gate_name(TARGET_VRF),
        Direction::Import,
        &routes,
    )?);

    seal(compiled, outcomes)
}

// ── Scenario runner ───────────────────────────────────────────────────────────

/// Run Scenario 3: Routing-Instance Leaking.
pub fn run_scenario() -> RplResult<()> {
    println!("=== Scenario 3: Routing-Instance Leaking ===");
    println!();

    let run = execute()?;
    let (rib_group, instance_import) = run.outcomes.split_at(run.outcomes.len() / 2);

    println!("  RIB group {} (import chain LEAK-FROM-BLUE):", RIB_GROUP);
    print_outcomes(rib_group);
    println!();
    println!("  Instance-import into '{}' (LEAK-FROM-BLUE LEAK-STATIC):", TARGET_VRF);
    print_outcomes(instance_import);
    println!();
    print_seal(&run);
    println!();
    println!("  Scenario 3 complete.");
    println!();

    Ok(())
}
