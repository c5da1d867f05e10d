//! Configuration conversion driver.
//!
//! Runs one compile phase end to end: user policy statements, protocol
//! defaults, peer chains, generation, RIB-group and instance-import policies,
//! optional simplification, then `freeze`.

use tracing::info;

use rpl_contracts::{decision::Direction, error::RplResult};
use rpl_core::{registry::PolicyTable, traits::DiagnosticSink, PolicyRegistry};

use crate::compiler::TermCompiler;
use crate::derived;
use crate::term::ConfigurationInput;

/// Compile `input` into a frozen policy table.
///
/// Dangling references and unsupported constructs are recorded in `sink`.
/// Errors are reserved for name collisions (`ReservedName`,
/// `DuplicatePolicy`).
pub fn convert(input: &ConfigurationInput, sink: &dyn DiagnosticSink) -> RplResult<PolicyTable> {
    let mut registry = PolicyRegistry::new();
    registry.define(derived::default_reject())?;
    registry.define(derived::default_accept())?;

    let compiler = TermCompiler::new(&input.prefix_lists, sink);
    for statement in &input.policy_statements {
        registry.define(compiler.compile(statement))?;
    }

    for peer in &input.peers {
        for (direction, policies) in [(Direction::Import, &peer.import), (Direction::Export, &peer.export)] {
            let default_policy = derived::protocol_default(peer.protocol, direction);
            let chain = derived::policy_chain(
                derived::peer_chain_name(&peer.name, direction),
                &default_policy.name,
                policies,
            );
            registry.define(default_policy)?;
            registry.define(chain)?;
        }
    }

    for aggregate in &input.aggregates {
        registry.define(derived::generation_policy(aggregate.prefix, &aggregate.policies))?;
    }

    for group in &input.rib_groups {
        registry.define(derived::protocol_default(group.protocol, Direction::Import))?;
        registry.define(derived::rib_group_policy(&group.name, group.protocol, &group.import))?;
    }

    for import in &input.instance_imports {
        registry.define(derived::instance_import_policy(&import.vrf, &import.policies))?;
        registry.define(derived::instance_import_gate(&import.vrf))?;
    }

    if input.simplify {
        registry.simplify_all();
    }

    info!(
        policies = registry.len(),
        statements = input.policy_statements.len(),
        simplified = input.simplify,
        "configuration converted"
    );
    Ok(registry.freeze(sink))
}
