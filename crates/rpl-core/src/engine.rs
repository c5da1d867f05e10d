//! The execution engine: a recursive interpreter for the policy IR.
//!
//! Evaluation model:
//!
//! 1. The named policy's statements run top to bottom against a private
//!    `Environment` (copy-on-write route, attribute overlay, default action,
//!    default policy, call stack).
//! 2. `Exit*` ends the whole evaluation, through any number of nested
//!    `Call`s. `Return*` ends only the innermost statement list.
//! 3. When the top level finishes without an exit, the default policy (if
//!    one was set) is evaluated in its place with a fresh default action;
//!    otherwise the default action is the decision.
//! 4. `CallExpr` and the chain combinators run a callee as a nested
//!    sub-evaluation producing a tri-state result. They never terminate the
//!    caller; the callee's exits become `Matched(true/false)`.
//!
//! Call cycles and runaway nesting are caught by the call stack and a depth
//! bound. They are recorded as diagnostics and resolved conservatively:
//! a cyclic `Call` rejects, a cyclic `CallExpr` is `Unmatched`.

use std::borrow::Cow;

use tracing::{debug, trace, warn};

use rpl_contracts::{
    decision::{Action, Decision, Direction, TriState},
    diagnostic::{Diagnostic, DiagnosticKind, ReferenceKind},
    error::{RplError, RplResult},
    ir::{BooleanExpr, Statement, TerminalKind},
    policy::{PolicyId, PolicyRef, RoutingPolicy},
    route::{AttributeOverlay, Route},
};

use crate::matching::{compute, matches};
use crate::registry::PolicyTable;
use crate::traits::{DiagnosticSink, PolicyEngine};

/// Nesting bound for `Call`/`CallExpr`, independent of cycle detection.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Per-caller evaluation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    /// Default action at the start of every top-level run. `None` uses the
    /// direction's convention (accept on import, reject otherwise).
    pub default_action: Option<Action>,
    pub max_call_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            default_action: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl EvalOptions {
    pub fn with_default_action(action: Action) -> Self {
        Self {
            default_action: Some(action),
            ..Self::default()
        }
    }
}

/// How control leaves a statement list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Fell off the end (or the statement did not transfer control).
    Continue,
    /// `ExitAccept`/`ExitReject`: unwinds every level.
    Exit(Action),
    /// `Return*`/`NextPolicy`: ends the innermost list only.
    Return(TriState),
}

/// Mutable scratch state of one evaluation.
struct Environment<'r> {
    /// Input route with the overlay applied, cloned on first write.
    route: Cow<'r, Route>,
    direction: Direction,
    default_action: Action,
    default_policy: Option<PolicyId>,
    call_depth: usize,
    call_stack: Vec<PolicyId>,
    overlay: AttributeOverlay,
}

/// Evaluates policies from one frozen `PolicyTable`.
///
/// Cheap to construct; holds only references. Every `evaluate` call owns a
/// private environment, so one evaluator may be shared across threads.
pub struct Evaluator<'a> {
    table: &'a PolicyTable,
    sink: &'a dyn DiagnosticSink,
    options: EvalOptions,
}

impl<'a> Evaluator<'a> {
    pub fn new(table: &'a PolicyTable, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            table,
            sink,
            options: EvalOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn table(&self) -> &PolicyTable {
        self.table
    }

    /// Evaluate the policy called `name`.
    ///
    /// An undefined top-level policy rejects the route and records an
    /// `UndefinedReference` diagnostic.
    pub fn evaluate_policy(&self, name: &str, route: &Route, direction: Direction) -> RplResult<Decision> {
        match self.table.id_of(name) {
            Some(id) => self.run(id, route, direction),
            None => {
                warn!(policy = %name, "evaluation of undefined policy rejects");
                self.sink.record(Diagnostic::new(
                    name,
                    DiagnosticKind::UndefinedReference {
                        kind: ReferenceKind::Policy,
                        name: name.to_string(),
                    },
                ));
                Ok(Decision::reject(AttributeOverlay::default()))
            }
        }
    }

    fn initial_default_action(&self, direction: Direction, policy: &str) -> Action {
        match self.options.default_action {
            Some(action) => action,
            None => {
                if direction == Direction::Import {
                    debug!(
                        policy = %policy,
                        "import evaluation relies on the conventional default action"
                    );
                }
                direction.conventional_default_action()
            }
        }
    }

    /// Top-level run, including default-policy fallthrough resolution.
    fn run(&self, id: PolicyId, route: &Route, direction: Direction) -> RplResult<Decision> {
        let mut env = Environment {
            route: Cow::Borrowed(route),
            direction,
            default_action: Action::Reject,
            default_policy: None,
            call_depth: 0,
            call_stack: Vec::new(),
            overlay: AttributeOverlay::default(),
        };
        let mut visited: Vec<PolicyId> = Vec::new();
        let mut current = id;

        loop {
            let policy = self.policy(current)?;
            visited.push(current);
            env.default_action = self.initial_default_action(direction, &policy.name);
            env.default_policy = None;
            env.call_depth = 0;
            env.call_stack = vec![current];

            trace!(policy = %policy.name, direction = %env.direction, "top-level evaluation");
            match self.exec_list(&policy.statements, &mut env, policy)? {
                Flow::Exit(action) => return Ok(self.decide(action, env, policy)),
                Flow::Continue | Flow::Return(_) => match env.default_policy.take() {
                    None => {
                        let action = env.default_action;
                        return Ok(self.decide(action, env, policy));
                    }
                    Some(next) if visited.contains(&next) => {
                        let mut path: Vec<String> = visited.iter().map(|id| self.name_of(*id)).collect();
                        path.push(self.name_of(next));
                        self.report_cycle(&policy.name, path);
                        return Ok(self.decide(Action::Reject, env, policy));
                    }
                    Some(next) => {
                        debug!(
                            policy = %policy.name,
                            default_policy = %self.name_of(next),
                            "falling through to default policy"
                        );
                        current = next;
                    }
                },
            }
        }
    }

    fn decide(&self, action: Action, env: Environment<'_>, policy: &RoutingPolicy) -> Decision {
        debug!(
            policy = %policy.name,
            direction = %env.direction,
            result = %action,
            writes = env.overlay.len(),
            "policy evaluated"
        );
        Decision { result: action, attributes: env.overlay }
    }

    fn policy(&self, id: PolicyId) -> RplResult<&'a RoutingPolicy> {
        self.table.get(id).ok_or_else(|| RplError::MalformedIr {
            policy: format!("#{}", id.0),
            reason: "reference linked to a policy id outside the table".to_string(),
        })
    }

    fn name_of(&self, id: PolicyId) -> String {
        self.table
            .get(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("#{}", id.0))
    }

    fn report_cycle(&self, policy: &str, path: Vec<String>) {
        warn!(policy = %policy, path = %path.join(" -> "), "policy call cycle detected");
        self.sink.record(Diagnostic::new(policy, DiagnosticKind::CallCycle { path }));
    }

    // ── Statements ───────────────────────────────────────────────────────────

    fn exec_list(&self, statements: &[Statement], env: &mut Environment<'_>, policy: &RoutingPolicy) -> RplResult<Flow> {
        for statement in statements {
            let flow = self.exec(statement, env, policy)?;
            if flow != Flow::Continue {
                return Ok(flow);
            }
        }
        Ok(Flow::Continue)
    }

    fn exec(&self, statement: &Statement, env: &mut Environment<'_>, policy: &RoutingPolicy) -> RplResult<Flow> {
        match statement {
            Statement::If { guard, then_branch, else_branch } => {
                let branch = if self.test(guard, env, policy)? { then_branch } else { else_branch };
                self.exec_list(branch, env, policy)
            }
            Statement::SetAttribute { field, expr } => {
                let malformed = |reason: String| RplError::MalformedIr { policy: policy.name.clone(), reason };
                let value = compute(*field, expr, &env.route).map_err(malformed)?;
                env.route.to_mut().set_attribute(*field, value.clone()).map_err(|e| match e {
                    RplError::MalformedIr { reason, .. } => malformed(reason),
                    other => other,
                })?;
                env.overlay.set(*field, value);
                Ok(Flow::Continue)
            }
            Statement::SetDefaultPolicy { target } => {
                match target.id() {
                    Some(id) => env.default_policy = Some(id),
                    None => debug!(policy = %policy.name, target = %target, "unresolved default policy ignored"),
                }
                Ok(Flow::Continue)
            }
            Statement::Call { target } => self.call(target, env, policy),
            Statement::Comment { .. } => Ok(Flow::Continue),
            Statement::Terminal(kind) => Ok(match kind {
                TerminalKind::ExitAccept => Flow::Exit(Action::Accept),
                TerminalKind::ExitReject => Flow::Exit(Action::Reject),
                TerminalKind::ReturnTrue => Flow::Return(TriState::Matched(true)),
                TerminalKind::ReturnFalse => Flow::Return(TriState::Matched(false)),
                TerminalKind::Return | TerminalKind::NextPolicy => Flow::Return(TriState::Unmatched),
                TerminalKind::SetDefaultActionAccept => {
                    env.default_action = Action::Accept;
                    Flow::Continue
                }
                TerminalKind::SetDefaultActionReject => {
                    env.default_action = Action::Reject;
                    Flow::Continue
                }
            }),
        }
    }

    /// Check cycle and depth bounds before entering `id`. Returns the callee
    /// when the call may proceed.
    fn enter(&self, id: PolicyId, env: &Environment<'_>, caller: &RoutingPolicy) -> RplResult<Option<&'a RoutingPolicy>> {
        if env.call_stack.contains(&id) {
            let mut path: Vec<String> = env.call_stack.iter().map(|id| self.name_of(*id)).collect();
            path.push(self.name_of(id));
            self.report_cycle(&caller.name, path);
            return Ok(None);
        }
        if env.call_depth >= self.options.max_call_depth {
            warn!(policy = %caller.name, depth = env.call_depth, "policy call depth exceeded");
            self.sink.record(Diagnostic::new(
                caller.name.as_str(),
                DiagnosticKind::CallDepthExceeded { depth: env.call_depth },
            ));
            return Ok(None);
        }
        self.policy(id).map(Some)
    }

    /// `Call`: inline execution sharing the caller's environment.
    fn call(&self, target: &PolicyRef, env: &mut Environment<'_>, caller: &RoutingPolicy) -> RplResult<Flow> {
        let Some(id) = target.id() else {
            debug!(policy = %caller.name, target = %target, "call to unresolved policy skipped");
            return Ok(Flow::Continue);
        };
        let Some(callee) = self.enter(id, env, caller)? else {
            return Ok(Flow::Exit(Action::Reject));
        };

        env.call_stack.push(id);
        env.call_depth += 1;
        let flow = self.exec_list(&callee.statements, env, callee)?;
        env.call_depth -= 1;
        env.call_stack.pop();

        Ok(match flow {
            Flow::Exit(action) => Flow::Exit(action),
            Flow::Continue | Flow::Return(_) => Flow::Continue,
        })
    }

    /// `CallExpr`: nested sub-evaluation yielding a tri-state result.
    ///
    /// Attribute writes persist; default action and default policy changes
    /// made by the callee do not leak into the caller.
    fn call_expr(&self, target: &PolicyRef, env: &mut Environment<'_>, caller: &RoutingPolicy) -> RplResult<TriState> {
        let Some(id) = target.id() else {
            return Ok(TriState::Unmatched);
        };
        let Some(callee) = self.enter(id, env, caller)? else {
            return Ok(TriState::Unmatched);
        };

        let saved_action = env.default_action;
        let saved_policy = env.default_policy;
        env.call_stack.push(id);
        env.call_depth += 1;
        let flow = self.exec_list(&callee.statements, env, callee)?;
        env.call_depth -= 1;
        env.call_stack.pop();
        env.default_action = saved_action;
        env.default_policy = saved_policy;

        let result = match flow {
            Flow::Exit(Action::Accept) => TriState::Matched(true),
            Flow::Exit(Action::Reject) => TriState::Matched(false),
            Flow::Return(result) => result,
            Flow::Continue => TriState::Unmatched,
        };
        trace!(policy = %caller.name, callee = %callee.name, ?result, "call expression evaluated");
        Ok(result)
    }

    // ── Expressions ──────────────────────────────────────────────────────────

    fn test(&self, expr: &BooleanExpr, env: &mut Environment<'_>, policy: &RoutingPolicy) -> RplResult<bool> {
        Ok(self.eval(expr, env, policy)?.is_true())
    }

    fn eval(&self, expr: &BooleanExpr, env: &mut Environment<'_>, policy: &RoutingPolicy) -> RplResult<TriState> {
        let result = match expr {
            BooleanExpr::Literal(b) => TriState::Matched(*b),
            BooleanExpr::MatchAttribute(predicate) => TriState::Matched(matches(predicate, &env.route)),
            BooleanExpr::Not(inner) => TriState::Matched(!self.test(inner, env, policy)?),
            // Plain AND/OR: every operand runs, so subroutine writes are
            // observed even once the result is settled.
            BooleanExpr::Conjunction(items) => {
                let mut all = true;
                for item in items {
                    all &= self.test(item, env, policy)?;
                }
                TriState::Matched(all)
            }
            BooleanExpr::Disjunction(items) => {
                let mut any = false;
                for item in items {
                    any |= self.test(item, env, policy)?;
                }
                TriState::Matched(any)
            }
            BooleanExpr::FirstMatchChain(targets) => {
                for target in targets {
                    let result = self.call_expr(target, env, policy)?;
                    if result.is_definite() {
                        return Ok(result);
                    }
                }
                TriState::Unmatched
            }
            BooleanExpr::ConjunctionChain(targets) => {
                if targets.is_empty() {
                    return Ok(TriState::Matched(false));
                }
                for target in targets {
                    if !self.call_expr(target, env, policy)?.is_true() {
                        return Ok(TriState::Matched(false));
                    }
                }
                TriState::Matched(true)
            }
            BooleanExpr::CallExpr(target) => self.call_expr(target, env, policy)?,
            BooleanExpr::InCallContext => TriState::Matched(env.call_depth > 0),
        };
        Ok(result)
    }
}

impl PolicyEngine for Evaluator<'_> {
    fn evaluate(&self, policy: &str, route: &Route, direction: Direction) -> RplResult<Decision> {
        self.evaluate_policy(policy, route, direction)
    }
}
