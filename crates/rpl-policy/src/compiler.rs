//! Term compiler: vendor term lists to IR statement lists.
//!
//! Compilation of one policy statement:
//!
//! 1. Each named term is compiled in order, then the default term if it has
//!    any match or action clauses.
//! 2. Per term, actions are sorted by an explicit priority tag: attribute
//!    writes first, control flow last. The sort is stable, so writes keep
//!    their declared order.
//! 3. A term without match clauses emits its actions unconditionally. A term
//!    with match clauses emits `If{guard, actions, []}` where the guard is the
//!    AND of one operand per clause kind.
//! 4. Route-filter entries that carry their own actions are emitted as
//!    separate `If`s on a single-entry prefix set, just before the term's
//!    main `If`.
//! 5. A trailing `If{InCallContext, [], [Return]}` ends every policy.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use rpl_contracts::{
    diagnostic::{Diagnostic, DiagnosticKind, ReferenceKind},
    ir::{AsPathPattern, AttributeExpr, BooleanExpr, RoutePredicate, Statement, TerminalKind},
    policy::{PolicyRef, RoutingPolicy},
    route::{AttributeValue, Prefix, PrefixRange, PrefixSet, RouteField},
};
use rpl_core::traits::DiagnosticSink;

use crate::term::{AsPathMatch, ClauseKind, FromClause, PolicyStatement, Term, ThenClause};

/// Ordering tag for emitted actions. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionPriority {
    Mutation,
    Control,
}

/// Compiles policy statements against one configuration's prefix lists.
pub struct TermCompiler<'a> {
    prefix_lists: &'a BTreeMap<String, Vec<Prefix>>,
    sink: &'a dyn DiagnosticSink,
}

/// Where a diagnostic came from.
#[derive(Clone, Copy)]
struct Site<'p> {
    policy: &'p str,
    term: usize,
}

impl<'a> TermCompiler<'a> {
    pub fn new(prefix_lists: &'a BTreeMap<String, Vec<Prefix>>, sink: &'a dyn DiagnosticSink) -> Self {
        Self { prefix_lists, sink }
    }

    pub fn compile(&self, statement: &PolicyStatement) -> RoutingPolicy {
        let mut statements = Vec::new();
        for (index, term) in statement.terms.iter().enumerate() {
            let site = Site { policy: &statement.name, term: index };
            statements.extend(self.compile_term(site, term));
        }
        if let Some(default_term) = statement.default_term.as_ref().filter(|t| !t.is_empty()) {
            let site = Site { policy: &statement.name, term: statement.terms.len() };
            statements.extend(self.compile_term(site, default_term));
        }
        statements.push(Statement::if_else(
            BooleanExpr::InCallContext,
            vec![],
            vec![Statement::Terminal(TerminalKind::Return)],
        ));

        debug!(
            policy = %statement.name,
            terms = statement.terms.len(),
            statements = statements.len(),
            "policy statement compiled"
        );
        RoutingPolicy::new(statement.name.clone(), statements)
    }

    fn compile_term(&self, site: Site<'_>, term: &Term) -> Vec<Statement> {
        let mut out = Vec::new();
        if !term.name.is_empty() {
            out.push(Statement::comment(format!("term {}", term.name)));
        }

        for filter in term.from.iter().filter_map(|clause| match clause {
            FromClause::RouteFilter(filter) if !filter.then.is_empty() => Some(filter),
            _ => None,
        }) {
            out.push(Statement::if_then(
                BooleanExpr::matching(RoutePredicate::PrefixIn(PrefixSet::single(filter.range()))),
                self.actions(site, &filter.then),
            ));
        }

        let actions = self.actions(site, &term.then);
        match self.guard(site, &term.from) {
            None => out.extend(actions),
            Some(guard) => out.push(Statement::if_then(guard, actions)),
        }
        out
    }

    // ── Guards ───────────────────────────────────────────────────────────────

    /// AND of one operand per clause kind, or `None` for a term without
    /// match clauses.
    fn guard(&self, site: Site<'_>, clauses: &[FromClause]) -> Option<BooleanExpr> {
        let mut by_kind: BTreeMap<ClauseKind, Vec<&FromClause>> = BTreeMap::new();
        for clause in clauses {
            by_kind.entry(clause.kind()).or_default().push(clause);
        }

        let mut operands: Vec<BooleanExpr> = by_kind
            .into_iter()
            .map(|(kind, clauses)| self.operand(site, kind, &clauses))
            .collect();
        match operands.len() {
            0 => None,
            1 => operands.pop(),
            _ => Some(BooleanExpr::Conjunction(operands)),
        }
    }

    /// Combine all clauses of one kind into a single guard operand.
    fn operand(&self, site: Site<'_>, kind: ClauseKind, clauses: &[&FromClause]) -> BooleanExpr {
        match kind {
            ClauseKind::Policy => BooleanExpr::ConjunctionChain(subroutines(site, clauses)),
            ClauseKind::PolicyChain => BooleanExpr::FirstMatchChain(subroutines(site, clauses)),
            ClauseKind::Prefix => {
                let mut filters = PrefixSet::default();
                let mut sets = Vec::new();
                for clause in clauses {
                    match clause {
                        FromClause::RouteFilter(filter) => {
                            filters = filters.union(&PrefixSet::single(filter.range()));
                        }
                        FromClause::PrefixList(name) => sets.push(self.prefix_list(site, name)),
                        _ => {}
                    }
                }
                if !filters.ranges.is_empty() {
                    sets.push(filters);
                }
                any_of(sets.into_iter().map(|set| BooleanExpr::matching(RoutePredicate::PrefixIn(set))).collect())
            }
            _ => any_of(clauses.iter().map(|clause| self.leaf(site, clause)).collect()),
        }
    }

    fn leaf(&self, site: Site<'_>, clause: &FromClause) -> BooleanExpr {
        let predicate = match clause {
            FromClause::Protocol(protocol) => RoutePredicate::Protocol(*protocol),
            FromClause::Community(community) => RoutePredicate::Community(*community),
            FromClause::AsPath(pattern) => RoutePredicate::AsPath(match pattern {
                AsPathMatch::Contains(asn) => AsPathPattern::Contains(*asn),
                AsPathMatch::OriginAs(asn) => AsPathPattern::OriginAs(*asn),
                AsPathMatch::NeighborAs(asn) => AsPathPattern::NeighborAs(*asn),
                AsPathMatch::Empty => AsPathPattern::Empty,
            }),
            FromClause::Tag(tag) => RoutePredicate::Tag(*tag),
            FromClause::LocalPreference(pref) => RoutePredicate::LocalPreference(*pref),
            FromClause::Metric(metric) => RoutePredicate::Metric(*metric),
            FromClause::Interface(name) => RoutePredicate::SourceInterface(name.clone()),
            FromClause::Instance(name) => RoutePredicate::SourceVrf(name.clone()),
            FromClause::Family(family) => RoutePredicate::AddressFamily(*family),
            FromClause::Color(color) => RoutePredicate::Color(*color),
            FromClause::Unsupported(construct) => {
                self.unsupported(site, format!("from {}", construct));
                RoutePredicate::Unsupported(construct.clone())
            }
            FromClause::PrefixList(_)
            | FromClause::RouteFilter(_)
            | FromClause::Policy(_)
            | FromClause::PolicyChain(_) => {
                // Grouped by `operand`; never reaches here.
                return BooleanExpr::Literal(false);
            }
        };
        BooleanExpr::matching(predicate)
    }

    fn prefix_list(&self, site: Site<'_>, name: &str) -> PrefixSet {
        match self.prefix_lists.get(name) {
            Some(prefixes) => PrefixSet::new(prefixes.iter().copied().map(PrefixRange::exact).collect()),
            None => {
                warn!(policy = %site.policy, term = site.term, prefix_list = %name, "undefined prefix-list never matches");
                self.sink.record(
                    Diagnostic::new(
                        site.policy,
                        DiagnosticKind::UndefinedReference {
                            kind: ReferenceKind::PrefixList,
                            name: name.to_string(),
                        },
                    )
                    .at_term(site.term),
                );
                PrefixSet::default()
            }
        }
    }

    // ── Actions ──────────────────────────────────────────────────────────────

    fn actions(&self, site: Site<'_>, clauses: &[ThenClause]) -> Vec<Statement> {
        let mut tagged: Vec<(ActionPriority, Statement)> =
            clauses.iter().map(|clause| self.action(site, clause)).collect();
        tagged.sort_by_key(|(priority, _)| *priority);
        tagged.into_iter().map(|(_, statement)| statement).collect()
    }

    fn action(&self, site: Site<'_>, clause: &ThenClause) -> (ActionPriority, Statement) {
        use ActionPriority::{Control, Mutation};

        let set = |field: RouteField, expr: AttributeExpr| (Mutation, Statement::SetAttribute { field, expr });
        let control = |kind: TerminalKind| (Control, Statement::Terminal(kind));

        match clause {
            ThenClause::Accept => control(TerminalKind::ExitAccept),
            ThenClause::Reject => control(TerminalKind::ExitReject),
            ThenClause::NextPolicy => control(TerminalKind::NextPolicy),
            ThenClause::DefaultActionAccept => control(TerminalKind::SetDefaultActionAccept),
            ThenClause::DefaultActionReject => control(TerminalKind::SetDefaultActionReject),
            // Falling out of the term's If already moves on to the next term.
            ThenClause::NextTerm => (Control, Statement::comment("next term")),
            ThenClause::LocalPreference(n) => {
                set(RouteField::LocalPreference, AttributeExpr::Literal(AttributeValue::Number(*n)))
            }
            ThenClause::Metric(n) => set(RouteField::Metric, AttributeExpr::Literal(AttributeValue::Number(*n))),
            ThenClause::MetricAdd(n) => set(RouteField::Metric, AttributeExpr::Increment(*n)),
            ThenClause::MetricSubtract(n) => set(RouteField::Metric, AttributeExpr::Decrement(*n)),
            ThenClause::MetricType(t) => {
                set(RouteField::MetricType, AttributeExpr::Literal(AttributeValue::MetricType(*t)))
            }
            ThenClause::Tag(n) => set(RouteField::Tag, AttributeExpr::Literal(AttributeValue::Number(*n))),
            ThenClause::Origin(o) => set(RouteField::Origin, AttributeExpr::Literal(AttributeValue::Origin(*o))),
            ThenClause::NextHop(ip) => set(RouteField::NextHop, AttributeExpr::Literal(AttributeValue::NextHop(*ip))),
            ThenClause::CommunityAdd(c) => {
                set(RouteField::Communities, AttributeExpr::AddCommunities(c.iter().copied().collect()))
            }
            ThenClause::CommunityDelete(c) => {
                set(RouteField::Communities, AttributeExpr::RemoveCommunities(c.iter().copied().collect()))
            }
            ThenClause::CommunitySet(c) => set(
                RouteField::Communities,
                AttributeExpr::Literal(AttributeValue::Communities(c.iter().copied().collect::<BTreeSet<_>>())),
            ),
            ThenClause::AsPathPrepend(asns) => set(RouteField::AsPath, AttributeExpr::Prepend(asns.clone())),
            ThenClause::Unsupported(construct) => {
                self.unsupported(site, format!("then {}", construct));
                (Mutation, Statement::comment(format!("unsupported: then {}", construct)))
            }
        }
    }

    fn unsupported(&self, site: Site<'_>, construct: String) {
        warn!(policy = %site.policy, term = site.term, construct = %construct, "unsupported construct");
        self.sink.record(
            Diagnostic::new(site.policy, DiagnosticKind::UnsupportedConstruct { construct }).at_term(site.term),
        );
    }
}

/// Subroutine references named by `clauses`, tagged with the term they came
/// from so an undefined target is reported against it at link time.
fn subroutines(site: Site<'_>, clauses: &[&FromClause]) -> Vec<PolicyRef> {
    clauses
        .iter()
        .flat_map(|clause| match clause {
            FromClause::Policy(names) | FromClause::PolicyChain(names) => names.as_slice(),
            _ => &[][..],
        })
        .map(|name| PolicyRef::new(name.as_str()).at_term(site.term))
        .collect()
}

fn any_of(mut operands: Vec<BooleanExpr>) -> BooleanExpr {
    if operands.len() == 1 {
        if let Some(only) = operands.pop() {
            return only;
        }
    }
    BooleanExpr::Disjunction(operands)
}
