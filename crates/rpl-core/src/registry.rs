//! Policy registry: the per-configuration table of named policies.
//!
//! The registry has two phases, enforced by the type system:
//!
//! 1. **Compile phase**: `PolicyRegistry` is mutable. The term compiler and
//!    the derived-policy builders `define` policies; `simplify_all` may
//!    replace them with simplified copies.
//! 2. **Evaluation phase**: `freeze` consumes the registry and produces an
//!    immutable `PolicyTable`. Freezing interns every name to a dense
//!    `PolicyId`, links every reference, records a diagnostic for each
//!    dangling one and computes provenance `sources`. Dangling `Call`s and
//!    first-match entries are dropped; conjunction-chain members and call
//!    expressions stay unlinked and evaluate as Unmatched.
//!
//! A `PolicyTable` is `Send + Sync` and never changes, so any number of
//! threads may evaluate routes against it at once.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tracing::{debug, warn};

use rpl_contracts::{
    diagnostic::{Diagnostic, DiagnosticKind, ReferenceKind},
    error::{RplError, RplResult},
    ir::{BooleanExpr, Statement},
    policy::{is_reserved_name, PolicyId, PolicyRef, RoutingPolicy},
};

use crate::simplify::simplify;
use crate::traits::DiagnosticSink;

// ── Compile phase ─────────────────────────────────────────────────────────────

/// Mutable, compile-phase policy table.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, RoutingPolicy>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy.
    ///
    /// User policies may not use the reserved derived-policy namespace.
    /// Registering an identical derived policy twice is allowed, since
    /// several builders share the same protocol defaults; any other
    /// redefinition is `DuplicatePolicy`.
    pub fn define(&mut self, policy: RoutingPolicy) -> RplResult<()> {
        if !policy.is_derived() && is_reserved_name(&policy.name) {
            return Err(RplError::ReservedName { name: policy.name });
        }
        if let Some(existing) = self.policies.get(&policy.name) {
            if policy.is_derived() && *existing == policy {
                return Ok(());
            }
            return Err(RplError::DuplicatePolicy { name: policy.name });
        }
        debug!(
            policy = %policy.name,
            statements = policy.statements.len(),
            derived = policy.is_derived(),
            "policy defined"
        );
        self.policies.insert(policy.name.clone(), policy);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&RoutingPolicy> {
        self.policies.get(name)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Replace every policy with its simplified equivalent.
    ///
    /// Only callable before `freeze`, so no evaluation can observe the swap.
    pub fn simplify_all(&mut self) {
        for policy in self.policies.values_mut() {
            *policy = simplify(policy);
        }
    }

    /// End the compile phase: intern names, link references and compute
    /// provenance.
    pub fn freeze(self, sink: &dyn DiagnosticSink) -> PolicyTable {
        let index: HashMap<String, PolicyId> = self
            .policies
            .keys()
            .enumerate()
            .map(|(i, name)| (name.clone(), PolicyId(i as u32)))
            .collect();

        let mut policies: Vec<RoutingPolicy> = self
            .policies
            .into_values()
            .map(|policy| {
                let linker = Linker { index: &index, policy: &policy.name, sink };
                let statements = linker.link_list(&policy.statements);
                RoutingPolicy {
                    statements,
                    sources: BTreeSet::new(),
                    ..policy
                }
            })
            .collect();

        // Reverse call edges, used for provenance.
        let mut callers: Vec<BTreeSet<PolicyId>> = vec![BTreeSet::new(); policies.len()];
        for (i, policy) in policies.iter().enumerate() {
            for callee in called_ids(&policy.statements) {
                callers[callee.index()].insert(PolicyId(i as u32));
            }
        }

        let mut table = PolicyTable { policies: Vec::new(), index, callers };
        let sources: Vec<BTreeSet<String>> = (0..policies.len())
            .map(|i| table.sources_of(PolicyId(i as u32), &policies))
            .collect();
        for (policy, sources) in policies.iter_mut().zip(sources) {
            policy.sources = sources;
        }
        table.policies = policies;
        table
    }
}

/// Rewrites one policy's statements with linked references.
struct Linker<'a> {
    index: &'a HashMap<String, PolicyId>,
    policy: &'a str,
    sink: &'a dyn DiagnosticSink,
}

impl Linker<'_> {
    fn resolve(&self, target: &PolicyRef) -> Option<PolicyRef> {
        match self.index.get(target.name()) {
            Some(id) => Some(target.linked(*id)),
            None => {
                warn!(
                    policy = %self.policy,
                    target = %target.name(),
                    "reference to undefined policy ignored"
                );
                let diagnostic = Diagnostic::new(
                    self.policy,
                    DiagnosticKind::UndefinedReference {
                        kind: ReferenceKind::Policy,
                        name: target.name().to_string(),
                    },
                );
                self.sink.record(match target.term() {
                    Some(term) => diagnostic.at_term(term),
                    None => diagnostic,
                });
                None
            }
        }
    }

    fn link_list(&self, statements: &[Statement]) -> Vec<Statement> {
        statements.iter().filter_map(|s| self.link_statement(s)).collect()
    }

    fn link_statement(&self, statement: &Statement) -> Option<Statement> {
        let linked = match statement {
            Statement::If { guard, then_branch, else_branch } => Statement::If {
                guard: self.link_expr(guard),
                then_branch: self.link_list(then_branch),
                else_branch: self.link_list(else_branch),
            },
            Statement::Call { target } => Statement::Call { target: self.resolve(target)? },
            Statement::SetDefaultPolicy { target } => Statement::SetDefaultPolicy { target: self.resolve(target)? },
            Statement::SetAttribute { .. } | Statement::Comment { .. } | Statement::Terminal(_) => statement.clone(),
        };
        Some(linked)
    }

    fn link_expr(&self, expr: &BooleanExpr) -> BooleanExpr {
        match expr {
            BooleanExpr::Not(inner) => BooleanExpr::not(self.link_expr(inner)),
            BooleanExpr::Conjunction(items) => {
                BooleanExpr::Conjunction(items.iter().map(|e| self.link_expr(e)).collect())
            }
            BooleanExpr::Disjunction(items) => {
                BooleanExpr::Disjunction(items.iter().map(|e| self.link_expr(e)).collect())
            }
            BooleanExpr::FirstMatchChain(refs) => {
                BooleanExpr::FirstMatchChain(refs.iter().filter_map(|r| self.resolve(r)).collect())
            }
            // An undefined member stays unlinked: it evaluates as Unmatched,
            // so the chain is false, but members before it still run.
            BooleanExpr::ConjunctionChain(refs) => BooleanExpr::ConjunctionChain(
                refs.iter().map(|r| self.resolve(r).unwrap_or_else(|| r.clone())).collect(),
            ),
            BooleanExpr::CallExpr(target) => match self.resolve(target) {
                Some(linked) => BooleanExpr::CallExpr(linked),
                None => BooleanExpr::CallExpr(target.clone()),
            },
            BooleanExpr::Literal(_) | BooleanExpr::MatchAttribute(_) | BooleanExpr::InCallContext => expr.clone(),
        }
    }
}

/// Every linked callee reachable by a `Call` or `CallExpr` edge.
fn called_ids(statements: &[Statement]) -> BTreeSet<PolicyId> {
    fn walk_expr(expr: &BooleanExpr, out: &mut BTreeSet<PolicyId>) {
        match expr {
            BooleanExpr::Not(inner) => walk_expr(inner, out),
            BooleanExpr::Conjunction(items) | BooleanExpr::Disjunction(items) => {
                items.iter().for_each(|e| walk_expr(e, out))
            }
            BooleanExpr::FirstMatchChain(refs) | BooleanExpr::ConjunctionChain(refs) => {
                out.extend(refs.iter().filter_map(PolicyRef::id))
            }
            BooleanExpr::CallExpr(target) => out.extend(target.id()),
            BooleanExpr::Literal(_) | BooleanExpr::MatchAttribute(_) | BooleanExpr::InCallContext => {}
        }
    }

    fn walk(statements: &[Statement], out: &mut BTreeSet<PolicyId>) {
        for statement in statements {
            match statement {
                Statement::If { guard, then_branch, else_branch } => {
                    walk_expr(guard, out);
                    walk(then_branch, out);
                    walk(else_branch, out);
                }
                Statement::Call { target } => out.extend(target.id()),
                Statement::SetDefaultPolicy { .. }
                | Statement::SetAttribute { .. }
                | Statement::Comment { .. }
                | Statement::Terminal(_) => {}
            }
        }
    }

    let mut out = BTreeSet::new();
    walk(statements, &mut out);
    out
}

// ── Evaluation phase ──────────────────────────────────────────────────────────

/// Immutable, linked policy table for one configuration.
#[derive(Debug)]
pub struct PolicyTable {
    policies: Vec<RoutingPolicy>,
    index: HashMap<String, PolicyId>,
    /// `callers[i]` = policies with a `Call`/`CallExpr` edge into policy `i`.
    callers: Vec<BTreeSet<PolicyId>>,
}

impl PolicyTable {
    pub fn resolve(&self, name: &str) -> Option<&RoutingPolicy> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    pub fn id_of(&self, name: &str) -> Option<PolicyId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, id: PolicyId) -> Option<&RoutingPolicy> {
        self.policies.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Policies in id order.
    pub fn iter(&self) -> impl Iterator<Item = &RoutingPolicy> {
        self.policies.iter()
    }

    /// User-authored policies that can reach `name` through `Call`/`CallExpr`
    /// edges, not following edges out of derived policies. Includes `name`
    /// itself when it is user-authored. Display-only; never consulted during
    /// evaluation.
    pub fn sources_reaching(&self, name: &str) -> BTreeSet<String> {
        match self.id_of(name) {
            Some(id) => self.sources_of(id, &self.policies),
            None => BTreeSet::new(),
        }
    }

    fn sources_of(&self, target: PolicyId, policies: &[RoutingPolicy]) -> BTreeSet<String> {
        let mut sources = BTreeSet::new();
        let mut seen = BTreeSet::from([target]);
        let mut queue = VecDeque::from([target]);
        if !policies[target.index()].is_derived() {
            sources.insert(policies[target.index()].name.clone());
        }
        while let Some(current) = queue.pop_front() {
            for caller in &self.callers[current.index()] {
                if policies[caller.index()].is_derived() || !seen.insert(*caller) {
                    continue;
                }
                sources.insert(policies[caller.index()].name.clone());
                queue.push_back(*caller);
            }
        }
        sources
    }
}
