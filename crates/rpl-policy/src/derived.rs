//! Derived-policy builders.
//!
//! These synthesize policies that no user wrote but that compose user
//! policies into protocol behavior. Every name they produce lives in the
//! reserved `~...~` namespace, so a derived policy can never shadow a user
//! policy.

use rpl_contracts::{
    decision::Direction,
    ir::{BooleanExpr, RoutePredicate, Statement, TerminalKind},
    policy::{derived_name, PolicyRef, RoutingPolicy},
    route::{Prefix, Protocol},
};

/// `~DEFAULT_REJECT~`.
pub fn default_reject_name() -> String {
    derived_name(&["DEFAULT_REJECT"])
}

/// `~DEFAULT_ACCEPT~`.
pub fn default_accept_name() -> String {
    derived_name(&["DEFAULT_ACCEPT"])
}

/// `~BGP_DEFAULT_IMPORT~`, `~OSPF_DEFAULT_EXPORT~`, ...
pub fn protocol_default_name(protocol: Protocol, direction: Direction) -> String {
    let direction = match direction {
        Direction::Import => "IMPORT",
        Direction::Export => "EXPORT",
        Direction::Generation => "GENERATION",
    };
    derived_name(&[&format!("{}_DEFAULT_{}", protocol.as_str().to_ascii_uppercase(), direction)])
}

/// `~PEER_IMPORT:<peer>~` and friends: the chain a neighbor evaluates in
/// `direction`.
pub fn peer_chain_name(peer: &str, direction: Direction) -> String {
    let tag = match direction {
        Direction::Import => "PEER_IMPORT",
        Direction::Export => "PEER_EXPORT",
        Direction::Generation => "PEER_GENERATION",
    };
    derived_name(&[tag, peer])
}

/// `~GENERATED_ROUTE_POLICY:<prefix>~`, the policy deciding whether a route
/// contributes to `aggregate`.
pub fn generation_policy_name(aggregate: &Prefix) -> String {
    derived_name(&["GENERATED_ROUTE_POLICY", &aggregate.to_string()])
}

/// `~RIB_GROUP_IMPORT:<group>~`.
pub fn rib_group_policy_name(group: &str) -> String {
    derived_name(&["RIB_GROUP_IMPORT", group])
}

/// `~INSTANCE_IMPORT:<vrf>~`, callable as a sub-evaluation.
pub fn instance_import_policy_name(vrf: &str) -> String {
    derived_name(&["INSTANCE_IMPORT", vrf])
}

fn terminal(kind: TerminalKind) -> Statement {
    Statement::Terminal(kind)
}

fn refs(names: &[String]) -> Vec<PolicyRef> {
    names.iter().map(PolicyRef::new).collect()
}

// ── Builders ──────────────────────────────────────────────────────────────────

/// Rejects every route. The fallback default policy of export chains.
pub fn default_reject() -> RoutingPolicy {
    RoutingPolicy::derived(default_reject_name(), vec![terminal(TerminalKind::ExitReject)])
}

/// Accepts every route.
pub fn default_accept() -> RoutingPolicy {
    RoutingPolicy::derived(default_accept_name(), vec![terminal(TerminalKind::ExitAccept)])
}

/// Accept routes of `protocol`, reject everything else.
pub fn protocol_default(protocol: Protocol, direction: Direction) -> RoutingPolicy {
    RoutingPolicy::derived(
        protocol_default_name(protocol, direction),
        vec![Statement::if_else(
            BooleanExpr::matching(RoutePredicate::Protocol(protocol)),
            vec![terminal(TerminalKind::ExitAccept)],
            vec![terminal(TerminalKind::ExitReject)],
        )],
    )
}

/// An ordered import/export chain: each policy is called in turn, the first
/// explicit accept or reject wins, and `default_policy` decides otherwise.
pub fn policy_chain(name: impl Into<String>, default_policy: &str, policies: &[String]) -> RoutingPolicy {
    let mut statements = Vec::with_capacity(policies.len() + 1);
    statements.push(Statement::set_default_policy(default_policy));
    statements.extend(policies.iter().map(Statement::call));
    RoutingPolicy::derived(name, statements)
}

/// Generation policy for an aggregate or generated route.
///
/// Non-contributing routes are rejected outright. A contributor is accepted
/// unless one of `policies` explicitly rejects it.
pub fn generation_policy(aggregate: Prefix, policies: &[String]) -> RoutingPolicy {
    let mut statements = vec![
        Statement::if_else(
            BooleanExpr::matching(RoutePredicate::ContributesTo(aggregate)),
            vec![],
            vec![terminal(TerminalKind::ExitReject)],
        ),
        terminal(TerminalKind::SetDefaultActionAccept),
    ];
    statements.extend(policies.iter().map(Statement::call));
    RoutingPolicy::derived(generation_policy_name(&aggregate), statements)
}

/// RIB-group import policy.
///
/// User import policies are consulted first; the protocol default import
/// policy closes the chain so every protocol has a definite answer.
pub fn rib_group_policy(group: &str, protocol: Protocol, import: &[String]) -> RoutingPolicy {
    let protocol_default = protocol_default_name(protocol, Direction::Import);
    let mut chain = refs(import);
    chain.push(PolicyRef::new(protocol_default.as_str()));
    RoutingPolicy::derived(
        rib_group_policy_name(group),
        vec![
            Statement::set_default_policy(protocol_default),
            Statement::if_else(
                BooleanExpr::FirstMatchChain(chain),
                vec![terminal(TerminalKind::ExitAccept)],
                vec![terminal(TerminalKind::ExitReject)],
            ),
        ],
    )
}

/// Cross-VRF instance-import policy.
///
/// Returns rather than exits, so it is meant to be invoked as a `CallExpr`
/// (see `instance_import_gate`). Evaluated top-level it falls through to
/// the default reject policy.
pub fn instance_import_policy(vrf: &str, policies: &[String]) -> RoutingPolicy {
    RoutingPolicy::derived(
        instance_import_policy_name(vrf),
        vec![
            Statement::set_default_policy(default_reject_name()),
            Statement::if_else(
                BooleanExpr::FirstMatchChain(refs(policies)),
                vec![terminal(TerminalKind::ReturnTrue)],
                vec![terminal(TerminalKind::ReturnFalse)],
            ),
        ],
    )
}

/// `~INSTANCE_IMPORT_GATE:<vrf>~`.
pub fn instance_import_gate_name(vrf: &str) -> String {
    derived_name(&["INSTANCE_IMPORT_GATE", vrf])
}

/// Top-level entry point for leaking into `vrf`: accepts exactly when the
/// instance-import policy yields `Matched(true)`.
pub fn instance_import_gate(vrf: &str) -> RoutingPolicy {
    RoutingPolicy::derived(
        instance_import_gate_name(vrf),
        vec![Statement::if_else(
            BooleanExpr::call(instance_import_policy_name(vrf)),
            vec![terminal(TerminalKind::ExitAccept)],
            vec![terminal(TerminalKind::ExitReject)],
        )],
    )
}
