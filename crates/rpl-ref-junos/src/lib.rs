//! # rpl-ref-junos
//!
//! Junos-style reference runtime for the route policy engine.
//!
//! Demonstrates three routing scenarios using mock routes:
//!
//! 1. **Transit Peer Import and Export**: bogon filtering, customer tagging,
//!    a dangling chain member and fallthrough to the BGP default policy.
//! 2. **Aggregate Contributors**: generation policies deciding which more
//!    specific routes contribute to an aggregate.
//! 3. **Routing-Instance Leaking**: a RIB group and an instance-import gate
//!    evaluated over simplified policies.
//!
//! All routes are hardcoded and fictional. Each scenario compiles an embedded
//! TOML configuration from `policies/`.

pub mod mock_routes;
pub mod scenarios;

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rpl_contracts::{
        decision::{Action, Direction},
        diagnostic::DiagnosticKind,
        route::{AttributeValue, Community, RouteField},
    };
    use rpl_policy::derived::{generation_policy_name, instance_import_gate_name, peer_chain_name, rib_group_policy_name};

    use crate::scenarios::{aggregate, peer_import, vrf_leak, ScenarioRun};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn result(run: &ScenarioRun, label: &str, policy: &str) -> Action {
        run.decision(label, policy)
            .unwrap_or_else(|| panic!("no outcome for {} under {}", label, policy))
            .result
    }

    // ── 1. Transit peer ───────────────────────────────────────────────────────

    /// Bogons, martians and over-specific routes are rejected by the first
    /// chain member.
    #[test]
    fn test_peer_import_rejects_bogons() {
        let run = peer_import::execute().unwrap();
        let import = peer_chain_name(peer_import::PEER, Direction::Import);

        for label in ["rfc1918", "default", "too-specific"] {
            assert_eq!(result(&run, label, &import), Action::Reject, "{} should be filtered", label);
        }
    }

    /// The customer term accepts with its writes; undecided routes fall
    /// through to the BGP default import policy and keep earlier writes.
    #[test]
    fn test_peer_import_accepts_and_falls_through() {
        let run = peer_import::execute().unwrap();
        let import = peer_chain_name(peer_import::PEER, Direction::Import);

        let customer = run.decision("customer", &import).unwrap();
        assert!(customer.is_accepted());
        assert_eq!(customer.attributes.get(RouteField::LocalPreference), Some(&AttributeValue::Number(200)));
        match customer.attributes.get(RouteField::Communities) {
            Some(AttributeValue::Communities(c)) => assert!(c.contains(&Community::new(65000, 100))),
            other => panic!("expected community write, got {:?}", other),
        }

        let prepended = run.decision("prepended", &import).unwrap();
        assert!(prepended.is_accepted(), "next-policy falls through to the BGP default");
        assert_eq!(prepended.attributes.get(RouteField::LocalPreference), Some(&AttributeValue::Number(50)));

        let internet = run.decision("internet", &import).unwrap();
        assert!(internet.is_accepted());
        assert!(internet.attributes.is_empty(), "the unsupported term never matches");
    }

    /// Export sees the route with import writes applied.
    #[test]
    fn test_peer_export_uses_import_writes() {
        let run = peer_import::execute().unwrap();
        let export = peer_chain_name(peer_import::PEER, Direction::Export);

        let customer = run.decision("customer", &export).unwrap();
        assert!(customer.is_accepted());
        assert_eq!(
            customer.attributes.get(RouteField::AsPath),
            Some(&AttributeValue::AsPath(vec![65000, 65000, 64500, 64501]))
        );
        assert_eq!(result(&run, "prepended", &export), Action::Reject);
        assert_eq!(result(&run, "internet", &export), Action::Reject);
        assert!(run.decision("rfc1918", &export).is_none(), "rejected routes are not exported");
    }

    /// The dangling chain member and the regex term are reported once each.
    #[test]
    fn test_peer_diagnostics_reported() {
        let run = peer_import::execute().unwrap();
        let counts = run.report.counts();
        assert_eq!(counts.undefined_references, 1);
        assert_eq!(counts.unsupported_constructs, 1);
        assert!(run.report.diagnostics.iter().any(|d| matches!(
            &d.kind,
            DiagnosticKind::UndefinedReference { name, .. } if name == "PARTNER-IN"
        )));
        assert_eq!(run.report.for_policy("CUSTOMER-IN").count(), 1);
        assert!(run.report.table_fingerprint.is_some());
    }

    // ── 2. Aggregates ─────────────────────────────────────────────────────────

    /// Only strictly more specific, non-rejected routes contribute.
    #[test]
    fn test_aggregate_contributors() {
        let run = aggregate::execute().unwrap();
        let contributors = |aggregate: &str| -> BTreeSet<&str> {
            let policy = generation_policy_name(&aggregate.parse().unwrap());
            run.outcomes
                .iter()
                .filter(|o| o.policy == policy && o.decision.is_accepted())
                .map(|o| o.label)
                .collect()
        };

        assert_eq!(contributors("10.0.0.0/8"), BTreeSet::from(["core"]));
        assert_eq!(contributors("172.16.0.0/12"), BTreeSet::from(["dorms"]));
        assert!(run.report.is_clean());
    }

    // ── 3. Instance leaking ───────────────────────────────────────────────────

    /// The RIB group closes its chain with the BGP default import policy.
    #[test]
    fn test_rib_group_leaking() {
        let run = vrf_leak::execute().unwrap();
        let policy = rib_group_policy_name(vrf_leak::RIB_GROUP);

        assert_eq!(result(&run, "blue-shared", &policy), Action::Accept);
        assert_eq!(result(&run, "blue-private", &policy), Action::Reject);
        assert_eq!(result(&run, "green-bgp", &policy), Action::Accept);
        assert_eq!(result(&run, "green-static", &policy), Action::Reject);
    }

    /// Instance-import leaks only what a policy explicitly accepts.
    #[test]
    fn test_instance_import_gate() {
        let run = vrf_leak::execute().unwrap();
        let gate = instance_import_gate_name(vrf_leak::TARGET_VRF);

        assert_eq!(result(&run, "blue-shared", &gate), Action::Accept);
        assert_eq!(result(&run, "blue-private", &gate), Action::Reject);
        assert_eq!(result(&run, "green-bgp", &gate), Action::Reject, "undecided routes are not leaked");

        let tagged = run.decision("green-static", &gate).unwrap();
        assert!(tagged.is_accepted());
        assert_eq!(tagged.attributes.get(RouteField::Tag), Some(&AttributeValue::Number(0)));
        assert!(run.report.is_clean());
    }

    /// The sealed report serializes with its fingerprint.
    #[test]
    fn test_report_serializes() {
        let run = vrf_leak::execute().unwrap();
        let json = serde_json::to_value(&run.report).unwrap();
        assert_eq!(json["table_fingerprint"].as_str(), run.report.table_fingerprint.as_deref());
        assert!(json["diagnostics"].as_array().unwrap().is_empty());
    }

    /// Every scenario runner completes.
    #[test]
    fn test_run_all_scenarios() {
        peer_import::run_scenario().unwrap();
        aggregate::run_scenario().unwrap();
        vrf_leak::run_scenario().unwrap();
    }
}
