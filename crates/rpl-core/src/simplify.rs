//! Semantics-preserving cleanup of compiled policies.
//!
//! `simplify` never mutates its input; it returns a new policy whose
//! statement list evaluates identically for every route and direction.
//! Applying it twice gives the same result as applying it once.
//!
//! Rewrites:
//! - comments are dropped;
//! - an `If` on a constant guard is replaced by the branch it always takes;
//! - an `If` with two empty branches is dropped when its guard cannot run
//!   policy code;
//! - statements after one that always ends the list are dropped;
//! - boolean expressions are flattened and constant-folded, keeping every
//!   operand that may run policy code alongside a folded constant.

use rpl_contracts::{
    ir::{BooleanExpr, Statement},
    policy::RoutingPolicy,
};

/// Return a simplified copy of `policy`.
pub fn simplify(policy: &RoutingPolicy) -> RoutingPolicy {
    RoutingPolicy {
        name: policy.name.clone(),
        statements: simplify_list(&policy.statements),
        sources: policy.sources.clone(),
        origin: policy.origin,
    }
}

// ── Statements ────────────────────────────────────────────────────────────────

fn simplify_list(statements: &[Statement]) -> Vec<Statement> {
    let mut out = Vec::with_capacity(statements.len());
    for statement in statements {
        for simplified in simplify_statement(statement) {
            let ends = always_ends(&simplified);
            out.push(simplified);
            if ends {
                return out;
            }
        }
    }
    out
}

fn simplify_statement(statement: &Statement) -> Vec<Statement> {
    match statement {
        Statement::Comment { .. } => Vec::new(),
        Statement::If { guard, then_branch, else_branch } => {
            let guard = simplify_expr(guard);
            match guard {
                BooleanExpr::Literal(true) => simplify_list(then_branch),
                BooleanExpr::Literal(false) => simplify_list(else_branch),
                guard => {
                    let then_branch = simplify_list(then_branch);
                    let else_branch = simplify_list(else_branch);
                    if then_branch.is_empty() && else_branch.is_empty() && !guard.invokes_policies() {
                        Vec::new()
                    } else {
                        vec![Statement::If { guard, then_branch, else_branch }]
                    }
                }
            }
        }
        Statement::SetAttribute { .. }
        | Statement::SetDefaultPolicy { .. }
        | Statement::Call { .. }
        | Statement::Terminal(_) => vec![statement.clone()],
    }
}

/// Whether control can never reach the statement after this one.
fn always_ends(statement: &Statement) -> bool {
    match statement {
        Statement::Terminal(kind) => kind.ends_list(),
        Statement::If { then_branch, else_branch, .. } => {
            then_branch.iter().any(always_ends) && else_branch.iter().any(always_ends)
        }
        _ => false,
    }
}

// ── Expressions ───────────────────────────────────────────────────────────────

fn simplify_expr(expr: &BooleanExpr) -> BooleanExpr {
    match expr {
        BooleanExpr::Not(inner) => match simplify_expr(inner) {
            BooleanExpr::Literal(b) => BooleanExpr::Literal(!b),
            BooleanExpr::Not(inner) => *inner,
            other => BooleanExpr::not(other),
        },
        BooleanExpr::Conjunction(items) => fold(items, true),
        BooleanExpr::Disjunction(items) => fold(items, false),
        BooleanExpr::FirstMatchChain(targets) | BooleanExpr::ConjunctionChain(targets) if targets.is_empty() => {
            BooleanExpr::Literal(false)
        }
        _ => expr.clone(),
    }
}

/// Fold a conjunction (`identity == true`) or disjunction (`identity == false`).
///
/// The identity element is dropped. Every operand is evaluated at run time,
/// so an absorbing element fixes the result but cannot remove operands that
/// may run policy code; those are kept, in order, ahead of the constant.
fn fold(items: &[BooleanExpr], identity: bool) -> BooleanExpr {
    let mut flat = Vec::with_capacity(items.len());
    for item in items {
        match (simplify_expr(item), identity) {
            (BooleanExpr::Conjunction(inner), true) | (BooleanExpr::Disjunction(inner), false) => {
                flat.extend(inner)
            }
            (other, _) => flat.push(other),
        }
    }

    let mut absorbed = false;
    let mut out: Vec<BooleanExpr> = Vec::with_capacity(flat.len());
    for item in flat {
        match item {
            BooleanExpr::Literal(b) if b == identity => {}
            BooleanExpr::Literal(_) => absorbed = true,
            other => out.push(other),
        }
    }

    if absorbed {
        out.retain(BooleanExpr::invokes_policies);
        if out.is_empty() {
            return BooleanExpr::Literal(!identity);
        }
        out.push(BooleanExpr::Literal(!identity));
    }

    match out.len() {
        0 => BooleanExpr::Literal(identity),
        1 => out.pop().unwrap_or(BooleanExpr::Literal(identity)),
        _ if identity => BooleanExpr::Conjunction(out),
        _ => BooleanExpr::Disjunction(out),
    }
}
