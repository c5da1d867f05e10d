//! The `RoutingPolicy` container and name references between policies.
//!
//! Policies refer to each other by name. When a registry is frozen, every
//! `PolicyRef` is linked to a dense `PolicyId` so evaluation resolves calls
//! with an index lookup instead of hashing the name.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::ir::Statement;

/// Marker that brackets derived policy names, e.g. `~BGP_DEFAULT_IMPORT~`.
///
/// Vendor grammars never produce names starting with this character, so a
/// derived policy can never shadow a user policy.
pub const RESERVED_MARK: char = '~';

/// True if `name` lives in the derived-policy namespace.
pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with(RESERVED_MARK)
}

/// Build a derived policy name from its parts: `~A:B:C~`.
pub fn derived_name(parts: &[&str]) -> String {
    format!("{mark}{}{mark}", parts.join(":"), mark = RESERVED_MARK)
}

/// Dense index of a policy inside a frozen policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyId(pub u32);

impl PolicyId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A by-name reference to another policy.
///
/// `id` is filled in by linking and is never serialized; an unlinked or
/// dangling reference has `id == None`. `term` records the vendor term the
/// reference was compiled from so a dangling reference can be reported
/// against it. It is provenance only and takes no part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PolicyRef {
    name: String,
    id: Option<PolicyId>,
    term: Option<usize>,
}

impl PolicyRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), id: None, term: None }
    }

    /// A copy of this reference attributed to term `term` of its policy.
    pub fn at_term(mut self, term: usize) -> Self {
        self.term = Some(term);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The linked index, if this reference has been resolved.
    pub fn id(&self) -> Option<PolicyId> {
        self.id
    }

    pub fn term(&self) -> Option<usize> {
        self.term
    }

    /// A copy of this reference bound to `id`.
    pub fn linked(&self, id: PolicyId) -> Self {
        Self { name: self.name.clone(), id: Some(id), term: self.term }
    }
}

impl PartialEq for PolicyRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.id == other.id
    }
}

impl Eq for PolicyRef {}

impl Hash for PolicyRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.id.hash(state);
    }
}

impl From<String> for PolicyRef {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<PolicyRef> for String {
    fn from(r: PolicyRef) -> Self {
        r.name
    }
}

impl fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Who authored a policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyOrigin {
    /// Compiled from a named policy in the device configuration.
    #[default]
    User,
    /// Synthesized by a derived-policy builder.
    Derived,
}

/// A compiled, named routing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    pub name: String,
    pub statements: Vec<Statement>,
    /// Non-derived policies that can reach this one through calls. Used for
    /// display only; evaluation never reads it.
    #[serde(default)]
    pub sources: BTreeSet<String>,
    #[serde(default)]
    pub origin: PolicyOrigin,
}

impl RoutingPolicy {
    pub fn new(name: impl Into<String>, statements: Vec<Statement>) -> Self {
        Self {
            name: name.into(),
            statements,
            sources: BTreeSet::new(),
            origin: PolicyOrigin::User,
        }
    }

    pub fn derived(name: impl Into<String>, statements: Vec<Statement>) -> Self {
        Self {
            origin: PolicyOrigin::Derived,
            ..Self::new(name, statements)
        }
    }

    pub fn is_derived(&self) -> bool {
        self.origin == PolicyOrigin::Derived
    }
}
