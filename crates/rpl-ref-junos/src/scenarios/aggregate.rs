//! Scenario 2: Aggregate Contributors
//!
//! Two aggregates are configured. `10.0.0.0/8` carries the generation policy
//! `NO-LAB-CONTRIBUTORS`; `172.16.0.0/12` has none. Only strictly more
//! specific routes contribute, and a contributor is accepted unless a
//! generation policy rejects it explicitly.

use rpl_contracts::{decision::Direction, error::RplResult, route::Prefix};
use rpl_policy::derived::generation_policy_name;

use crate::mock_routes::campus_routes;

use super::{compile, evaluate, print_outcomes, print_seal, seal, ScenarioRun};

// ── Policy TOML ───────────────────────────────────────────────────────────────

const AGGREGATE_POLICY: &str = include_str!("../../policies/aggregate.toml");

pub const AGGREGATES: [&str; 2] = ["10.0.0.0/8", "172.16.0.0/12"];

/// Evaluate every campus route against every aggregate's generation policy.
pub fn execute() -> RplResult<ScenarioRun> {
    let compiled = compile(AGGREGATE_POLICY)?;
    let routes = campus_routes()?;

    let mut outcomes = Vec::new();
    for aggregate in AGGREGATES {
        let aggregate: Prefix = aggregate.parse()?;
        let policy = generation_policy_name(&aggregate);
        outcomes.extend(evaluate(&compiled, &policy, Direction::Generation, &routes)?);
    }

    seal(compiled, outcomes)
}

// ── Scenario runner ───────────────────────────────────────────────────────────

/// Run Scenario 2: Aggregate Contributors.
pub fn run_scenario() -> RplResult<()> {
    println!("=== Scenario 2: Aggregate Contributors ===");
    println!();

    let run = execute()?;

    for aggregate in AGGREGATES {
        let aggregate: Prefix = aggregate.parse()?;
        let policy = generation_policy_name(&aggregate);
        let contributors: Vec<&str> = run
            .outcomes
            .iter()
            .filter(|o| o.policy == policy && o.decision.is_accepted())
            .map(|o| o.label)
            .collect();
        println!("  Aggregate {:<15} contributors: {}", aggregate.to_string(), contributors.join(", "));
    }
    println!();
    print_outcomes(&run.outcomes);
    println!();
    print_seal(&run);
    println!();
    println!("  Scenario 2 complete.");
    println!();

    Ok(())
}
