//! Policy IR: the statement and boolean-expression program every vendor
//! conversion lowers its route maps into.
//!
//! The IR is pure data. `rpl-core` interprets it; `rpl-policy` emits it.
//! Both sides match exhaustively on every variant, so a new variant is a
//! compile error in each until it is handled.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::policy::PolicyRef;
use crate::route::{
    AddressFamily, AttributeValue, Community, Prefix, PrefixSet, Protocol, RouteField,
};

/// One step of a routing policy program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    /// Evaluate `guard` against the current route and run exactly one branch.
    If {
        guard: BooleanExpr,
        #[serde(default)]
        then_branch: Vec<Statement>,
        #[serde(default)]
        else_branch: Vec<Statement>,
    },

    /// Compute `expr` against the current route and record the write.
    SetAttribute { field: RouteField, expr: AttributeExpr },

    /// Policy consulted when the top-level evaluation falls off the end.
    SetDefaultPolicy { target: PolicyRef },

    /// Run another policy's statements as if inlined. An `Exit*` inside the
    /// callee ends the whole evaluation.
    Call { target: PolicyRef },

    /// No-op, kept for provenance.
    Comment { text: String },

    Terminal(TerminalKind),
}

impl Statement {
    pub fn call(name: impl Into<String>) -> Self {
        Statement::Call { target: PolicyRef::new(name) }
    }

    pub fn set_default_policy(name: impl Into<String>) -> Self {
        Statement::SetDefaultPolicy { target: PolicyRef::new(name) }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Statement::Comment { text: text.into() }
    }

    pub fn if_then(guard: BooleanExpr, then_branch: Vec<Statement>) -> Self {
        Statement::If { guard, then_branch, else_branch: Vec::new() }
    }

    pub fn if_else(guard: BooleanExpr, then_branch: Vec<Statement>, else_branch: Vec<Statement>) -> Self {
        Statement::If { guard, then_branch, else_branch }
    }

    pub fn set(field: RouteField, value: AttributeValue) -> Self {
        Statement::SetAttribute { field, expr: AttributeExpr::Literal(value) }
    }
}

/// Control-flow statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    /// End the whole evaluation, accepting the route.
    ExitAccept,
    /// End the whole evaluation, rejecting the route.
    ExitReject,
    /// End the current statement list with `Matched(true)`.
    ReturnTrue,
    /// End the current statement list with `Matched(false)`.
    ReturnFalse,
    /// End the current statement list with no decision.
    Return,
    SetDefaultActionAccept,
    SetDefaultActionReject,
    /// Stop evaluating this policy and move on to the next one in the chain.
    NextPolicy,
}

impl TerminalKind {
    /// Whether statements after this one in the same list are unreachable.
    pub fn ends_list(&self) -> bool {
        !matches!(self, TerminalKind::SetDefaultActionAccept | TerminalKind::SetDefaultActionReject)
    }
}

/// A guard expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanExpr {
    Literal(bool),
    MatchAttribute(RoutePredicate),
    Not(Box<BooleanExpr>),
    /// Plain AND of its operands.
    Conjunction(Vec<BooleanExpr>),
    /// Plain OR of its operands.
    Disjunction(Vec<BooleanExpr>),
    /// Calls each policy in order; the first definite result decides.
    FirstMatchChain(Vec<PolicyRef>),
    /// Calls each policy in order; all must return `Matched(true)`.
    ConjunctionChain(Vec<PolicyRef>),
    /// Calls a policy as a sub-evaluation yielding a tri-state result.
    CallExpr(PolicyRef),
    /// True iff the evaluation is nested inside a `Call` or `CallExpr`.
    InCallContext,
}

impl BooleanExpr {
    pub fn matching(predicate: RoutePredicate) -> Self {
        BooleanExpr::MatchAttribute(predicate)
    }

    pub fn not(expr: BooleanExpr) -> Self {
        BooleanExpr::Not(Box::new(expr))
    }

    pub fn call(name: impl Into<String>) -> Self {
        BooleanExpr::CallExpr(PolicyRef::new(name))
    }

    pub fn first_match<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BooleanExpr::FirstMatchChain(names.into_iter().map(PolicyRef::new).collect())
    }

    pub fn all_match<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BooleanExpr::ConjunctionChain(names.into_iter().map(PolicyRef::new).collect())
    }

    /// True if evaluating this expression can run policy code (and therefore
    /// have side effects on the overlay).
    pub fn invokes_policies(&self) -> bool {
        match self {
            BooleanExpr::Literal(_) | BooleanExpr::MatchAttribute(_) | BooleanExpr::InCallContext => false,
            BooleanExpr::Not(inner) => inner.invokes_policies(),
            BooleanExpr::Conjunction(items) | BooleanExpr::Disjunction(items) => {
                items.iter().any(BooleanExpr::invokes_policies)
            }
            BooleanExpr::FirstMatchChain(_) | BooleanExpr::ConjunctionChain(_) | BooleanExpr::CallExpr(_) => true,
        }
    }
}

/// A leaf test against route attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePredicate {
    Protocol(Protocol),
    PrefixIn(PrefixSet),
    /// The route is a more-specific contributor to the given aggregate.
    ContributesTo(Prefix),
    AsPath(AsPathPattern),
    Community(Community),
    Tag(u32),
    LocalPreference(u32),
    Metric(u32),
    SourceInterface(String),
    /// Source VRF ("instance").
    SourceVrf(String),
    AddressFamily(AddressFamily),
    Color(u32),
    /// A vendor construct with no IR mapping. Never matches.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsPathPattern {
    /// The AS appears anywhere in the path.
    Contains(u32),
    /// The last (originating) AS.
    OriginAs(u32),
    /// The first (neighboring) AS.
    NeighborAs(u32),
    /// Locally originated: the path is empty.
    Empty,
}

/// The right-hand side of a `SetAttribute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeExpr {
    Literal(AttributeValue),
    AddCommunities(BTreeSet<Community>),
    RemoveCommunities(BTreeSet<Community>),
    /// Saturating add on a numeric field.
    Increment(u32),
    /// Saturating subtract on a numeric field.
    Decrement(u32),
    /// Prepend to the AS path.
    Prepend(Vec<u32>),
}
