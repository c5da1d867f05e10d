//! Scenario 1: Transit Peer Import and Export
//!
//! A transit peer's feed is filtered through the chain
//! `REJECT-BOGONS CUSTOMER-IN PARTNER-IN`, where `PARTNER-IN` was never
//! defined. Routes that no policy decides fall through to the BGP default
//! import policy. Accepted routes are then run, with their import writes
//! applied, through the export chain `EXPORT-CUSTOMERS`.
//!
//! Expected outcomes:
//!   - customer       import accept, local-preference 200, community 65000:100
//!   - rfc1918        import reject (bogon)
//!   - default        import reject (martian)
//!   - too-specific   import reject (/25)
//!   - prepended      import accept via the BGP default, local-preference 50
//!   - internet       import accept via the BGP default
//!   - customer       export accept with 65000 prepended twice; others reject

use rpl_contracts::{decision::Direction, error::RplResult};
use rpl_policy::derived::peer_chain_name;

use crate::mock_routes::{transit_feed, MockRoute};

use super::{compile, evaluate, print_outcomes, print_seal, seal, ScenarioRun};

// ── Policy TOML ───────────────────────────────────────────────────────────────

const PEER_POLICY: &str = include_str!("../../policies/peer_import.toml");

pub const PEER: &str = "transit-192.0.2.1";

/// Compile, evaluate the feed on import, then evaluate the survivors on
/// export.
pub fn execute() -> RplResult<ScenarioRun> {
    let compiled = compile(PEER_POLICY)?;
    let feed = transit_feed()?;

    let import_chain = peer_chain_name(PEER, Direction::Import);
    let mut outcomes = evaluate(&compiled, &import_chain, Direction::Import, &feed)?;

    // Only accepted routes are advertised onward, carrying their import writes.
    let mut accepted = Vec::new();
    for (mock, outcome) in feed.iter().zip(&outcomes) {
        if outcome.decision.is_accepted() {
            accepted.push(MockRoute {
                label: mock.label,
                route: outcome.decision.apply(&mock.route)?,
            });
        }
    }

    let export_chain = peer_chain_name(PEER, Direction::Export);
    outcomes.extend(evaluate(&compiled, &export_chain, Direction::Export, &accepted)?);

    seal(compiled, outcomes)
}

// ── Scenario runner ───────────────────────────────────────────────────────────

/// Run Scenario 1: Transit Peer Import and Export.
pub fn run_scenario() -> RplResult<()> {
    println!("=== Scenario 1: Transit Peer Import and Export ===");
    println!();
    println!("  Peer:          {}", PEER);
    println!("  Import chain:  REJECT-BOGONS CUSTOMER-IN PARTNER-IN");
    println!("  Export chain:  EXPORT-CUSTOMERS");
    println!();

    let run = execute()?;

    print_outcomes(&run.outcomes);
    println!();
    print_seal(&run);
    println!();
    println!("  Scenario 1 complete.");
    println!();

    Ok(())
}
