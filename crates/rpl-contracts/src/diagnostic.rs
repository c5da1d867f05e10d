//! Diagnostic records: recoverable problems found while compiling, linking
//! or evaluating policies.
//!
//! Diagnostics are collected, never thrown. Each one names the policy it is
//! attributable to and, when known, the index of the vendor term.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one configuration-conversion pass (compile, freeze, evaluate).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpochId(pub uuid::Uuid);

impl EpochId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for EpochId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What kind of named object a dangling reference pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    Policy,
    PrefixList,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A referenced policy or list does not exist; the reference never matches.
    UndefinedReference { kind: ReferenceKind, name: String },

    /// A vendor clause with no IR mapping; lowered to a never-matching
    /// predicate or a no-op action.
    UnsupportedConstruct { construct: String },

    /// A policy reached itself through `Call`/`CallExpr`/default-policy edges.
    CallCycle { path: Vec<String> },

    /// Nesting exceeded the engine's call-depth bound.
    CallDepthExceeded { depth: usize },
}

/// One recorded problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The policy the problem is attributable to.
    pub policy: String,
    /// Zero-based index of the vendor term, when the problem came from one.
    pub term: Option<usize>,
    pub kind: DiagnosticKind,
    pub recorded_at: DateTime<Utc>,
}

impl Diagnostic {
    pub fn new(policy: impl Into<String>, kind: DiagnosticKind) -> Self {
        Self {
            policy: policy.into(),
            term: None,
            kind,
            recorded_at: Utc::now(),
        }
    }

    pub fn at_term(mut self, term: usize) -> Self {
        self.term = Some(term);
        self
    }

    /// Identity used for de-duplication: everything except the timestamp.
    pub fn key(&self) -> (&str, Option<usize>, &DiagnosticKind) {
        (&self.policy, self.term, &self.kind)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "policy '{}'", self.policy)?;
        if let Some(term) = self.term {
            write!(f, " term #{}", term)?;
        }
        match &self.kind {
            DiagnosticKind::UndefinedReference { kind, name } => {
                let what = match kind {
                    ReferenceKind::Policy => "policy",
                    ReferenceKind::PrefixList => "prefix-list",
                };
                write!(f, ": undefined {} '{}' (reference ignored)", what, name)
            }
            DiagnosticKind::UnsupportedConstruct { construct } => {
                write!(f, ": unsupported construct '{}' (never matches)", construct)
            }
            DiagnosticKind::CallCycle { path } => {
                write!(f, ": call cycle {}", path.join(" -> "))
            }
            DiagnosticKind::CallDepthExceeded { depth } => {
                write!(f, ": call depth exceeded {}", depth)
            }
        }
    }
}
