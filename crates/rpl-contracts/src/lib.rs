//! # rpl-contracts
//!
//! Shared types for the route policy engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only the policy IR, the route model, evaluation results,
//! diagnostic records and error types.

pub mod decision;
pub mod diagnostic;
pub mod error;
pub mod ir;
pub mod policy;
pub mod route;

#[cfg(test)]
mod tests {
    use crate::{
        decision::{Action, Direction, TriState},
        diagnostic::{Diagnostic, DiagnosticKind, ReferenceKind},
        error::RplError,
        ir::{BooleanExpr, Statement, TerminalKind},
        policy::{derived_name, is_reserved_name, PolicyId, PolicyRef, RoutingPolicy},
    };

    // ── Names ────────────────────────────────────────────────────────────────

    #[test]
    fn derived_names_are_reserved() {
        let name = derived_name(&["BGP", "DEFAULT_IMPORT"]);
        assert_eq!(name, "~BGP:DEFAULT_IMPORT~");
        assert!(is_reserved_name(&name));
        assert!(!is_reserved_name("IMPORT-FROM-PEER"));
    }

    #[test]
    fn policy_ref_serializes_as_bare_name() {
        let linked = PolicyRef::new("EXPORT").linked(PolicyId(3));
        let json = serde_json::to_string(&linked).unwrap();
        assert_eq!(json, "\"EXPORT\"");

        let decoded: PolicyRef = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.name(), "EXPORT");
        assert_eq!(decoded.id(), None, "links are never serialized");
    }

    #[test]
    fn policy_ref_term_is_provenance_only() {
        let plain = PolicyRef::new("PEER");
        let attributed = PolicyRef::new("PEER").at_term(2);
        assert_eq!(plain, attributed, "the source term does not change identity");
        assert_eq!(attributed.linked(PolicyId(0)).term(), Some(2), "linking keeps the source term");
        assert_eq!(plain.term(), None);
    }

    // ── Directions and tri-state ─────────────────────────────────────────────

    #[test]
    fn conventional_default_actions() {
        assert_eq!(Direction::Import.conventional_default_action(), Action::Accept);
        assert_eq!(Direction::Export.conventional_default_action(), Action::Reject);
        assert_eq!(Direction::Generation.conventional_default_action(), Action::Reject);
    }

    #[test]
    fn tri_state_collapses_unmatched_to_false() {
        assert!(TriState::Matched(true).is_true());
        assert!(!TriState::Matched(false).is_true());
        assert!(!TriState::Unmatched.is_true());
        assert!(!TriState::Unmatched.is_definite());
    }

    // ── IR ───────────────────────────────────────────────────────────────────

    #[test]
    fn set_default_action_does_not_end_a_list() {
        assert!(!TerminalKind::SetDefaultActionAccept.ends_list());
        assert!(TerminalKind::ExitReject.ends_list());
        assert!(TerminalKind::NextPolicy.ends_list());
    }

    #[test]
    fn chains_invoke_policies_but_leaves_do_not() {
        assert!(BooleanExpr::first_match(["A"]).invokes_policies());
        assert!(BooleanExpr::not(BooleanExpr::call("A")).invokes_policies());
        assert!(!BooleanExpr::Conjunction(vec![BooleanExpr::InCallContext]).invokes_policies());
    }

    #[test]
    fn routing_policy_json_shape() {
        let policy = RoutingPolicy::new(
            "P",
            vec![
                Statement::call("Q"),
                Statement::Terminal(TerminalKind::ExitAccept),
            ],
        );
        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["name"], "P");
        assert_eq!(json["statements"][0]["call"]["target"], "Q");
        assert_eq!(json["statements"][1]["terminal"], "exit_accept");
        assert_eq!(json["origin"], "user");
    }

    // ── Diagnostics and errors ───────────────────────────────────────────────

    #[test]
    fn diagnostic_display_names_policy_and_term() {
        let d = Diagnostic::new(
            "IMPORT",
            DiagnosticKind::UndefinedReference {
                kind: ReferenceKind::PrefixList,
                name: "MISSING".to_string(),
            },
        )
        .at_term(2);
        let msg = d.to_string();
        assert!(msg.contains("IMPORT"));
        assert!(msg.contains("term #2"));
        assert!(msg.contains("prefix-list 'MISSING'"));
    }

    #[test]
    fn error_display_messages() {
        let err = RplError::MalformedIr {
            policy: "P".to_string(),
            reason: "bad field".to_string(),
        };
        assert!(err.to_string().contains("malformed policy IR in 'P'"));

        let err = RplError::ReservedName { name: "~X~".to_string() };
        assert!(err.to_string().contains("reserved"));
    }
}
