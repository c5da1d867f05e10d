//! Evaluation inputs and outputs: direction, action, tri-state results and
//! the final `Decision`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RplResult;
use crate::route::{AttributeOverlay, Route};

/// Which way a route is moving when the policy is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Entering a routing process or table.
    Import,
    /// Leaving a routing process.
    Export,
    /// Being synthesized (aggregate / generated routes).
    Generation,
}

impl Direction {
    /// The default action used when no statement sets one and the caller did
    /// not supply an explicit default: accept on import, reject otherwise.
    pub fn conventional_default_action(&self) -> Action {
        match self {
            Direction::Import => Action::Accept,
            Direction::Export | Direction::Generation => Action::Reject,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Import => "import",
            Direction::Export => "export",
            Direction::Generation => "generation",
        };
        f.write_str(s)
    }
}

/// The binary outcome of a top-level evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Accept,
    Reject,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Accept => f.write_str("accept"),
            Action::Reject => f.write_str("reject"),
        }
    }
}

/// The outcome of a nested policy sub-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriState {
    Matched(bool),
    Unmatched,
}

impl TriState {
    /// Collapse to a boolean, treating `Unmatched` as false.
    pub fn is_true(&self) -> bool {
        matches!(self, TriState::Matched(true))
    }

    pub fn is_definite(&self) -> bool {
        matches!(self, TriState::Matched(_))
    }
}

impl From<bool> for TriState {
    fn from(b: bool) -> Self {
        TriState::Matched(b)
    }
}

/// The externally visible result of evaluating a policy against a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub result: Action,
    /// Attribute writes made during the evaluation.
    pub attributes: AttributeOverlay,
}

impl Decision {
    pub fn accept(attributes: AttributeOverlay) -> Self {
        Self { result: Action::Accept, attributes }
    }

    pub fn reject(attributes: AttributeOverlay) -> Self {
        Self { result: Action::Reject, attributes }
    }

    pub fn is_accepted(&self) -> bool {
        self.result == Action::Accept
    }

    /// The route as downstream protocol logic should see it.
    pub fn apply(&self, route: &Route) -> RplResult<Route> {
        self.attributes.apply_to(route)
    }
}
