//! # rpl-policy
//!
//! Turns vendor policy configuration into the policy IR.
//!
//! ## Overview
//!
//! - [`term`]: the term/clause model handed over by vendor parsers, also
//!   loadable from TOML via [`ConfigurationInput::from_toml_str`].
//! - [`compiler`]: [`TermCompiler`] lowers one policy statement (ordered
//!   terms, first match wins) into a `RoutingPolicy`.
//! - [`derived`]: builders for synthetic policies (protocol defaults, peer
//!   chains, aggregate generation, RIB-group and instance import).
//! - [`convert`]: runs the whole compile phase and freezes the result.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use rpl_policy::{convert, ConfigurationInput};
//!
//! let input = ConfigurationInput::from_file(Path::new("policies/peer_import.toml"))?;
//! let table = convert(&input, &diagnostics)?;
//! ```

pub mod compiler;
pub mod convert;
pub mod derived;
pub mod term;

pub use compiler::{ActionPriority, TermCompiler};
pub use convert::convert;
pub use term::{ConfigurationInput, FromClause, PolicyStatement, Term, ThenClause};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use rpl_contracts::{
        decision::{Action, Direction},
        diagnostic::{Diagnostic, DiagnosticKind, ReferenceKind},
        error::RplError,
        ir::{BooleanExpr, RoutePredicate, Statement, TerminalKind},
        policy::is_reserved_name,
        route::{AttributeValue, Prefix, PrefixRange, PrefixSet, Protocol, Route, RouteField},
    };
    use rpl_core::{traits::DiagnosticSink, Evaluator, PolicyTable};

    use crate::derived;
    use crate::{convert, ConfigurationInput, TermCompiler};

    // ── Helpers ───────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct MockSink {
        diagnostics: Mutex<Vec<Diagnostic>>,
    }

    impl DiagnosticSink for MockSink {
        fn record(&self, diagnostic: Diagnostic) {
            self.diagnostics.lock().unwrap().push(diagnostic);
        }
    }

    /// Compile the single policy statement in `toml`.
    fn compile_one(toml: &str, sink: &MockSink) -> Vec<Statement> {
        let input = ConfigurationInput::from_toml_str(toml).unwrap();
        let compiler = TermCompiler::new(&input.prefix_lists, sink);
        compiler.compile(&input.policy_statements[0]).statements
    }

    fn route(prefix: &str, protocol: Protocol) -> Route {
        Route::new(prefix.parse().unwrap(), protocol)
    }

    fn decide(table: &PolicyTable, sink: &MockSink, policy: &str, route: &Route, direction: Direction) -> Action {
        Evaluator::new(table, sink).evaluate_policy(policy, route, direction).unwrap().result
    }

    fn dispatcher() -> Statement {
        Statement::if_else(BooleanExpr::InCallContext, vec![], vec![Statement::Terminal(TerminalKind::Return)])
    }

    const PEER_CONFIG: &str = r#"
        [prefix-lists]
        CUSTOMER-NETS = ["203.0.113.0/24"]

        [[policy-statements]]
        name = "IMPORT-FROM-PEER"

        [[policy-statements.terms]]
        name = "customers"
        from = [{ prefix-list = "CUSTOMER-NETS" }]
        then = ["accept", { local-preference = 200 }]

        [[policy-statements.terms]]
        name = "bogons"
        from = [{ route-filter = { prefix = "10.0.0.0/8", match = "orlonger" } }]
        then = ["reject"]

        [[peers]]
        name = "192.0.2.1"
        import = ["IMPORT-FROM-PEER"]
    "#;

    // ── 1. action ordering ────────────────────────────────────────────────────

    /// Attribute writes run before the terminal action, whatever the
    /// declared order.
    #[test]
    fn test_actions_sorted_mutations_first() {
        let sink = MockSink::default();
        let statements = compile_one(
            r#"
            [[policy-statements]]
            name = "P"
            [[policy-statements.terms]]
            then = ["accept", { tag = 7 }, "default-action-reject", { metric-add = 5 }]
            "#,
            &sink,
        );

        assert_eq!(
            statements,
            vec![
                Statement::set(RouteField::Tag, AttributeValue::Number(7)),
                Statement::SetAttribute {
                    field: RouteField::Metric,
                    expr: rpl_contracts::ir::AttributeExpr::Increment(5),
                },
                Statement::Terminal(TerminalKind::ExitAccept),
                Statement::Terminal(TerminalKind::SetDefaultActionReject),
                dispatcher(),
            ],
            "unconditional term must emit sorted actions followed by the dispatcher"
        );
    }

    // ── 2. guard construction ─────────────────────────────────────────────────

    /// One operand per clause kind; same-kind clauses are ORed; policy
    /// subroutines come last.
    #[test]
    fn test_guard_groups_clauses_by_kind() {
        let sink = MockSink::default();
        let statements = compile_one(
            r#"
            [[policy-statements]]
            name = "P"
            [[policy-statements.terms]]
            name = "t"
            from = [
                { policy = ["SUB"] },
                { protocol = "ospf" },
                { route-filter = { prefix = "10.0.0.0/8", match = "exact" } },
                { protocol = "static" },
                { route-filter = { prefix = "172.16.0.0/12", match = { upto = 24 } } },
            ]
            then = ["accept"]
            "#,
            &sink,
        );

        let expected_guard = BooleanExpr::Conjunction(vec![
            BooleanExpr::Disjunction(vec![
                BooleanExpr::matching(RoutePredicate::Protocol(Protocol::Ospf)),
                BooleanExpr::matching(RoutePredicate::Protocol(Protocol::Static)),
            ]),
            BooleanExpr::matching(RoutePredicate::PrefixIn(PrefixSet::new(vec![
                PrefixRange::exact("10.0.0.0/8".parse().unwrap()),
                PrefixRange::up_to("172.16.0.0/12".parse().unwrap(), 24),
            ]))),
            BooleanExpr::all_match(["SUB"]),
        ]);
        assert_eq!(statements[0], Statement::comment("term t"));
        assert_eq!(
            statements[1],
            Statement::if_then(expected_guard, vec![Statement::Terminal(TerminalKind::ExitAccept)])
        );
    }

    /// `policy-chain` clauses lower to a first-match chain.
    #[test]
    fn test_policy_chain_clause() {
        let sink = MockSink::default();
        let statements = compile_one(
            r#"
            [[policy-statements]]
            name = "P"
            [[policy-statements.terms]]
            from = [{ policy-chain = ["A", "B"] }]
            then = ["reject"]
            "#,
            &sink,
        );
        assert_eq!(
            statements[0],
            Statement::if_then(
                BooleanExpr::first_match(["A", "B"]),
                vec![Statement::Terminal(TerminalKind::ExitReject)]
            )
        );
    }

    // ── 3. route-filter entry actions ─────────────────────────────────────────

    /// An acting route-filter entry gets its own earlier `If`.
    #[test]
    fn test_route_filter_entry_actions_emitted_first() {
        let sink = MockSink::default();
        let statements = compile_one(
            r#"
            [[policy-statements]]
            name = "P"
            [[policy-statements.terms]]
            from = [
                { route-filter = { prefix = "10.0.0.0/8", match = "longer", then = [{ tag = 10 }] } },
                { route-filter = { prefix = "192.168.0.0/16", match = "orlonger" } },
            ]
            then = ["reject"]
            "#,
            &sink,
        );

        let entry = PrefixRange::longer("10.0.0.0/8".parse().unwrap());
        assert_eq!(
            statements[0],
            Statement::if_then(
                BooleanExpr::matching(RoutePredicate::PrefixIn(PrefixSet::single(entry.clone()))),
                vec![Statement::set(RouteField::Tag, AttributeValue::Number(10))],
            )
        );
        match &statements[1] {
            Statement::If { guard: BooleanExpr::MatchAttribute(RoutePredicate::PrefixIn(set)), .. } => {
                assert_eq!(set.ranges.len(), 2);
                assert_eq!(set.ranges[0], entry);
            }
            other => panic!("expected main If on the union set, got {:?}", other),
        }
    }

    /// Entry actions apply even when the term's guard later fails.
    #[test]
    fn test_route_filter_entry_actions_apply_without_term_match() {
        let sink = MockSink::default();
        let input = ConfigurationInput::from_toml_str(
            r#"
            [[policy-statements]]
            name = "P"
            [[policy-statements.terms]]
            from = [
                { protocol = "ospf" },
                { route-filter = { prefix = "10.0.0.0/8", match = "orlonger", then = [{ tag = 10 }] } },
            ]
            then = ["accept"]
            "#,
        )
        .unwrap();
        let table = convert(&input, &sink).unwrap();
        let decision = Evaluator::new(&table, &sink)
            .evaluate_policy("P", &route("10.1.0.0/16", Protocol::Bgp), Direction::Export)
            .unwrap();
        assert_eq!(decision.result, Action::Reject);
        assert_eq!(decision.attributes.get(RouteField::Tag), Some(&AttributeValue::Number(10)));
    }

    // ── 4. default term and dispatcher ────────────────────────────────────────

    /// The default term is compiled after all named terms; an empty one is
    /// omitted.
    #[test]
    fn test_default_term_compiled_last() {
        let sink = MockSink::default();
        let statements = compile_one(
            r#"
            [[policy-statements]]
            name = "P"
            default-term = { then = ["reject"] }
            [[policy-statements.terms]]
            from = [{ protocol = "bgp" }]
            then = ["accept"]
            "#,
            &sink,
        );
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[1], Statement::Terminal(TerminalKind::ExitReject));
        assert_eq!(statements[2], dispatcher());

        let empty = compile_one(
            r#"
            [[policy-statements]]
            name = "P"
            default-term = {}
            "#,
            &sink,
        );
        assert_eq!(empty, vec![dispatcher()]);
    }

    // ── 5. diagnostics ────────────────────────────────────────────────────────

    /// An undefined prefix list never matches and is reported with its term.
    #[test]
    fn test_undefined_prefix_list() {
        let sink = MockSink::default();
        let statements = compile_one(
            r#"
            [[policy-statements]]
            name = "P"
            [[policy-statements.terms]]
            from = [{ prefix-list = "NOPE" }]
            then = ["accept"]
            "#,
            &sink,
        );
        assert_eq!(
            statements[0],
            Statement::if_then(
                BooleanExpr::matching(RoutePredicate::PrefixIn(PrefixSet::default())),
                vec![Statement::Terminal(TerminalKind::ExitAccept)],
            )
        );

        let diagnostics = sink.diagnostics.lock().unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].term, Some(0));
        assert_eq!(
            diagnostics[0].kind,
            DiagnosticKind::UndefinedReference {
                kind: ReferenceKind::PrefixList,
                name: "NOPE".to_string()
            }
        );
    }

    /// Unsupported clauses lower to explicit never-matching predicates and
    /// no-op actions, each reported.
    #[test]
    fn test_unsupported_constructs_are_conservative() {
        let sink = MockSink::default();
        let input = ConfigurationInput::from_toml_str(
            r#"
            [[policy-statements]]
            name = "P"
            [[policy-statements.terms]]
            name = "a"
            from = [{ unsupported = "rib inet.3" }]
            then = ["accept"]
            [[policy-statements.terms]]
            name = "b"
            then = [{ unsupported = "damping AGGRESSIVE" }]
            "#,
        )
        .unwrap();
        let table = convert(&input, &sink).unwrap();
        assert_eq!(
            decide(&table, &sink, "P", &route("10.0.0.0/8", Protocol::Bgp), Direction::Export),
            Action::Reject
        );

        let diagnostics = sink.diagnostics.lock().unwrap();
        let terms: Vec<Option<usize>> = diagnostics
            .iter()
            .filter(|d| matches!(d.kind, DiagnosticKind::UnsupportedConstruct { .. }))
            .map(|d| d.term)
            .collect();
        assert_eq!(terms, vec![Some(0), Some(1)]);
    }

    /// Undefined subroutine policies are reported against the term whose
    /// `from` clause names them.
    #[test]
    fn test_undefined_subroutine_reported_with_term() {
        let sink = MockSink::default();
        let input = ConfigurationInput::from_toml_str(
            r#"
            [[policy-statements]]
            name = "P"
            [[policy-statements.terms]]
            name = "first"
            from = [{ protocol = "bgp" }]
            then = ["next-term"]
            [[policy-statements.terms]]
            name = "second"
            from = [{ policy-chain = ["MISSING"] }]
            then = ["accept"]
            [[policy-statements.terms]]
            name = "third"
            from = [{ policy = ["ALSO-MISSING"] }]
            then = ["accept"]
            "#,
        )
        .unwrap();
        convert(&input, &sink).unwrap();

        let diagnostics = sink.diagnostics.lock().unwrap();
        let undefined: Vec<(&str, Option<usize>)> = diagnostics
            .iter()
            .filter_map(|d| match &d.kind {
                DiagnosticKind::UndefinedReference { kind: ReferenceKind::Policy, name } => {
                    Some((name.as_str(), d.term))
                }
                _ => None,
            })
            .collect();
        assert_eq!(undefined, vec![("MISSING", Some(1)), ("ALSO-MISSING", Some(2))]);
    }

    // ── 6. end-to-end conversion ──────────────────────────────────────────────

    /// A peer import chain: user terms first, protocol default on fallthrough.
    #[test]
    fn test_peer_import_chain() {
        let sink = MockSink::default();
        let input = ConfigurationInput::from_toml_str(PEER_CONFIG).unwrap();
        let table = convert(&input, &sink).unwrap();
        let chain = derived::peer_chain_name("192.0.2.1", Direction::Import);

        let customer = route("203.0.113.0/24", Protocol::Bgp);
        let decision = Evaluator::new(&table, &sink)
            .evaluate_policy(&chain, &customer, Direction::Import)
            .unwrap();
        assert!(decision.is_accepted());
        assert_eq!(decision.apply(&customer).unwrap().local_preference, 200);

        assert_eq!(
            decide(&table, &sink, &chain, &route("10.1.0.0/16", Protocol::Bgp), Direction::Import),
            Action::Reject,
            "bogon term must reject"
        );
        assert_eq!(
            decide(&table, &sink, &chain, &route("198.51.100.0/24", Protocol::Bgp), Direction::Import),
            Action::Accept,
            "unmatched BGP route falls to the BGP default import"
        );
        assert_eq!(
            decide(&table, &sink, &chain, &route("198.51.100.0/24", Protocol::Ospf), Direction::Import),
            Action::Reject
        );
        assert!(table.resolve(&derived::peer_chain_name("192.0.2.1", Direction::Export)).is_some());
        assert!(sink.diagnostics.lock().unwrap().is_empty());
    }

    /// The user policy evaluated on its own falls through to the direction's
    /// default action.
    #[test]
    fn test_user_policy_top_level_fallthrough() {
        let sink = MockSink::default();
        let table = convert(&ConfigurationInput::from_toml_str(PEER_CONFIG).unwrap(), &sink).unwrap();
        let other = route("198.51.100.0/24", Protocol::Bgp);
        assert_eq!(decide(&table, &sink, "IMPORT-FROM-PEER", &other, Direction::Export), Action::Reject);
        assert_eq!(decide(&table, &sink, "IMPORT-FROM-PEER", &other, Direction::Import), Action::Accept);
    }

    /// Aggregate generation: contributors accepted by default, others
    /// rejected whatever the policies say.
    #[test]
    fn test_generation_policy_contributor_check() {
        let sink = MockSink::default();
        let input = ConfigurationInput::from_toml_str(
            r#"
            [[policy-statements]]
            name = "NO-LABS"
            [[policy-statements.terms]]
            from = [{ route-filter = { prefix = "172.16.99.0/24", match = "orlonger" } }]
            then = ["reject"]

            [[aggregates]]
            prefix = "10.0.0.0/8"

            [[aggregates]]
            prefix = "172.16.0.0/12"
            policies = ["NO-LABS"]
            "#,
        )
        .unwrap();
        let table = convert(&input, &sink).unwrap();
        let plain = derived::generation_policy_name(&"10.0.0.0/8".parse().unwrap());
        let filtered = derived::generation_policy_name(&"172.16.0.0/12".parse().unwrap());
        assert_eq!(plain, "~GENERATED_ROUTE_POLICY:10.0.0.0/8~");

        let generate = |policy: &str, prefix: &str| {
            decide(&table, &sink, policy, &route(prefix, Protocol::Static), Direction::Generation)
        };
        assert_eq!(generate(&plain, "10.1.0.0/16"), Action::Accept);
        assert_eq!(generate(&plain, "192.168.0.0/16"), Action::Reject);
        assert_eq!(generate(&plain, "10.0.0.0/8"), Action::Reject, "the aggregate does not contribute to itself");
        assert_eq!(generate(&filtered, "172.16.1.0/24"), Action::Accept);
        assert_eq!(generate(&filtered, "172.16.99.0/24"), Action::Reject, "user policy rejects the contributor");
        assert_eq!(generate(&filtered, "10.1.0.0/16"), Action::Reject);
    }

    /// Simplification before freezing changes no decision.
    #[test]
    fn test_simplified_conversion_is_equivalent() {
        let sink = MockSink::default();
        let plain = convert(&ConfigurationInput::from_toml_str(PEER_CONFIG).unwrap(), &sink).unwrap();
        let mut input = ConfigurationInput::from_toml_str(PEER_CONFIG).unwrap();
        input.simplify = true;
        let simplified = convert(&input, &sink).unwrap();

        let chain = derived::peer_chain_name("192.0.2.1", Direction::Import);
        for prefix in ["203.0.113.0/24", "10.1.0.0/16", "198.51.100.0/24"] {
            for protocol in [Protocol::Bgp, Protocol::Ospf] {
                let r = route(prefix, protocol);
                for policy in [chain.as_str(), "IMPORT-FROM-PEER"] {
                    for direction in [Direction::Import, Direction::Export] {
                        assert_eq!(
                            decide(&plain, &sink, policy, &r, direction),
                            decide(&simplified, &sink, policy, &r, direction),
                            "{} {} {}",
                            policy,
                            prefix,
                            direction
                        );
                    }
                }
            }
        }
        let compiled = simplified.resolve("IMPORT-FROM-PEER").unwrap();
        assert!(compiled.statements.iter().all(|s| !matches!(s, Statement::Comment { .. })));
    }

    // ── 7. errors ─────────────────────────────────────────────────────────────

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = ConfigurationInput::from_toml_str("[[policy-statements]]\nname = 5").unwrap_err();
        assert!(matches!(err, RplError::ConfigError { .. }));
    }

    #[test]
    fn test_user_policy_in_reserved_namespace_is_rejected() {
        let sink = MockSink::default();
        let input = ConfigurationInput::from_toml_str(
            r#"
            [[policy-statements]]
            name = "~DEFAULT_REJECT~"
            "#,
        )
        .unwrap();
        let err = convert(&input, &sink).unwrap_err();
        assert!(matches!(err, RplError::ReservedName { .. }));
    }

    #[test]
    fn test_duplicate_policy_statement_is_rejected() {
        let sink = MockSink::default();
        let input = ConfigurationInput::from_toml_str(
            r#"
            [[policy-statements]]
            name = "P"
            [[policy-statements]]
            name = "P"
            "#,
        )
        .unwrap();
        assert!(matches!(convert(&input, &sink).unwrap_err(), RplError::DuplicatePolicy { .. }));
    }

    #[test]
    fn test_prefix_lists_roundtrip_from_toml() {
        let input = ConfigurationInput::from_toml_str(PEER_CONFIG).unwrap();
        let mut expected = BTreeMap::new();
        expected.insert("CUSTOMER-NETS".to_string(), vec!["203.0.113.0/24".parse().unwrap()]);
        assert_eq!(input.prefix_lists, expected);
        assert_eq!(input.peers[0].protocol, Protocol::Bgp, "peers default to BGP");
    }

    // ── 8. RIB groups and instance import ─────────────────────────────────────

    const LEAK_CONFIG: &str = r#"
        [[policy-statements]]
        name = "LEAK-CUSTOMERS"

        [[policy-statements.terms]]
        name = "no-default"
        from = [{ route-filter = { prefix = "0.0.0.0/0", match = "exact" } }]
        then = ["reject"]

        [[policy-statements.terms]]
        name = "customers"
        from = [{ community = "65000:100" }]
        then = ["accept"]

        [[rib-groups]]
        name = "CUSTOMER-RIB"
        import = ["LEAK-CUSTOMERS"]

        [[instance-imports]]
        vrf = "blue"
        policies = ["LEAK-CUSTOMERS"]
    "#;

    fn customer(prefix: &str, protocol: Protocol) -> Route {
        route(prefix, protocol).with_communities([rpl_contracts::route::Community::new(65000, 100)])
    }

    /// User import policies decide first; the protocol default closes the
    /// chain.
    #[test]
    fn test_rib_group_import() {
        let sink = MockSink::default();
        let table = convert(&ConfigurationInput::from_toml_str(LEAK_CONFIG).unwrap(), &sink).unwrap();
        let policy = derived::rib_group_policy_name("CUSTOMER-RIB");

        let import = |r: &Route| decide(&table, &sink, &policy, r, Direction::Import);
        assert_eq!(import(&customer("198.51.100.0/24", Protocol::Ospf)), Action::Accept);
        assert_eq!(import(&customer("0.0.0.0/0", Protocol::Bgp)), Action::Reject, "explicit reject wins");
        assert_eq!(import(&route("198.51.100.0/24", Protocol::Bgp)), Action::Accept, "BGP default import");
        assert_eq!(import(&route("198.51.100.0/24", Protocol::Ospf)), Action::Reject);
    }

    /// The instance-import policy is meant to be called; its gate gives the
    /// top-level decision.
    #[test]
    fn test_instance_import_callable_and_gated() {
        let sink = MockSink::default();
        let table = convert(&ConfigurationInput::from_toml_str(LEAK_CONFIG).unwrap(), &sink).unwrap();
        let gate = derived::instance_import_gate_name("blue");
        let policy = derived::instance_import_policy_name("blue");

        let leaked = customer("198.51.100.0/24", Protocol::Bgp);
        assert_eq!(decide(&table, &sink, &gate, &leaked, Direction::Import), Action::Accept);
        assert_eq!(
            decide(&table, &sink, &gate, &route("198.51.100.0/24", Protocol::Bgp), Direction::Import),
            Action::Reject,
            "no policy decided, so nothing leaks"
        );
        assert_eq!(
            decide(&table, &sink, &policy, &leaked, Direction::Import),
            Action::Reject,
            "top-level evaluation falls through to the default reject policy"
        );
    }

    /// Provenance follows user call edges only.
    #[test]
    fn test_sources_exclude_derived_callers() {
        let sink = MockSink::default();
        let table = convert(&ConfigurationInput::from_toml_str(LEAK_CONFIG).unwrap(), &sink).unwrap();
        let sources = table.sources_reaching("LEAK-CUSTOMERS");
        assert_eq!(sources.into_iter().collect::<Vec<_>>(), vec!["LEAK-CUSTOMERS".to_string()]);
        assert!(table.sources_reaching(&derived::default_reject_name()).is_empty());
    }

    /// Derived names follow their documented shapes in the reserved namespace.
    #[test]
    fn test_derived_names() {
        let aggregate: Prefix = "10.0.0.0/8".parse().unwrap();
        let names = [
            (derived::default_reject_name(), "~DEFAULT_REJECT~"),
            (derived::default_accept_name(), "~DEFAULT_ACCEPT~"),
            (derived::peer_chain_name("192.0.2.1", Direction::Export), "~PEER_EXPORT:192.0.2.1~"),
            (derived::generation_policy_name(&aggregate), "~GENERATED_ROUTE_POLICY:10.0.0.0/8~"),
            (derived::rib_group_policy_name("MIRROR"), "~RIB_GROUP_IMPORT:MIRROR~"),
            (derived::instance_import_policy_name("blue"), "~INSTANCE_IMPORT:blue~"),
            (derived::instance_import_gate_name("blue"), "~INSTANCE_IMPORT_GATE:blue~"),
        ];
        for (name, expected) in names {
            assert_eq!(name, expected);
            assert!(is_reserved_name(&name));
        }
        assert_eq!(derived::default_reject().name, "~DEFAULT_REJECT~");
        assert_eq!(derived::default_accept().name, "~DEFAULT_ACCEPT~");
    }
}
