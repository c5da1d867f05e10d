//! Vendor term model and configuration input schema.
//!
//! This is the in-memory contract between a vendor parser and the term
//! compiler. It also derives `Deserialize`, so a whole configuration can be
//! written as TOML:
//!
//! ```toml
//! [prefix-lists]
//! CUSTOMER-NETS = ["203.0.113.0/24", "198.51.100.0/24"]
//!
//! [[policy-statements]]
//! name = "IMPORT-FROM-PEER"
//!
//! [[policy-statements.terms]]
//! name = "customers"
//! from = [{ prefix-list = "CUSTOMER-NETS" }, { protocol = "bgp" }]
//! then = ["accept", { local-preference = 200 }]
//!
//! [[peers]]
//! name = "192.0.2.1"
//! import = ["IMPORT-FROM-PEER"]
//! ```

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use rpl_contracts::{
    error::{RplError, RplResult},
    route::{AddressFamily, Community, MetricType, OriginType, Prefix, PrefixRange, Protocol},
};

// ── Match clauses ─────────────────────────────────────────────────────────────

/// One "from" clause of a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FromClause {
    Protocol(Protocol),
    /// Reference to a named prefix list, resolved at compile time.
    PrefixList(String),
    RouteFilter(RouteFilter),
    Community(Community),
    AsPath(AsPathMatch),
    Tag(u32),
    LocalPreference(u32),
    Metric(u32),
    Interface(String),
    /// Source routing instance (VRF).
    Instance(String),
    Family(AddressFamily),
    Color(u32),
    /// Policy subroutines that must all accept the route.
    Policy(Vec<String>),
    /// Policy subroutines consulted in order; the first decisive one wins.
    PolicyChain(Vec<String>),
    /// A clause the vendor parser recognised but the IR cannot express.
    Unsupported(String),
}

/// Grouping key for match clauses. One guard operand is built per kind.
///
/// Declaration order is the operand order in the guard; subroutine kinds come
/// last so cheap attribute tests run before any policy code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClauseKind {
    Protocol,
    Prefix,
    Community,
    AsPath,
    Tag,
    LocalPreference,
    Metric,
    Interface,
    Instance,
    Family,
    Color,
    Unsupported,
    Policy,
    PolicyChain,
}

impl FromClause {
    pub fn kind(&self) -> ClauseKind {
        match self {
            FromClause::Protocol(_) => ClauseKind::Protocol,
            FromClause::PrefixList(_) | FromClause::RouteFilter(_) => ClauseKind::Prefix,
            FromClause::Community(_) => ClauseKind::Community,
            FromClause::AsPath(_) => ClauseKind::AsPath,
            FromClause::Tag(_) => ClauseKind::Tag,
            FromClause::LocalPreference(_) => ClauseKind::LocalPreference,
            FromClause::Metric(_) => ClauseKind::Metric,
            FromClause::Interface(_) => ClauseKind::Interface,
            FromClause::Instance(_) => ClauseKind::Instance,
            FromClause::Family(_) => ClauseKind::Family,
            FromClause::Color(_) => ClauseKind::Color,
            FromClause::Unsupported(_) => ClauseKind::Unsupported,
            FromClause::Policy(_) => ClauseKind::Policy,
            FromClause::PolicyChain(_) => ClauseKind::PolicyChain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AsPathMatch {
    Contains(u32),
    OriginAs(u32),
    NeighborAs(u32),
    Empty,
}

/// One route-filter entry: a prefix, a match type and optional entry-level
/// actions applied whenever a route falls inside this entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteFilter {
    pub prefix: Prefix,
    #[serde(rename = "match", default)]
    pub match_type: MatchType,
    #[serde(default)]
    pub then: Vec<ThenClause>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    #[default]
    Exact,
    Orlonger,
    Longer,
    Upto(u8),
    PrefixLengthRange { min: u8, max: u8 },
}

impl RouteFilter {
    pub fn range(&self) -> PrefixRange {
        match self.match_type {
            MatchType::Exact => PrefixRange::exact(self.prefix),
            MatchType::Orlonger => PrefixRange::or_longer(self.prefix),
            MatchType::Longer => PrefixRange::longer(self.prefix),
            MatchType::Upto(max) => PrefixRange::up_to(self.prefix, max),
            MatchType::PrefixLengthRange { min, max } => PrefixRange::length_range(self.prefix, min, max),
        }
    }
}

// ── Action clauses ────────────────────────────────────────────────────────────

/// One "then" clause of a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThenClause {
    Accept,
    Reject,
    NextTerm,
    NextPolicy,
    DefaultActionAccept,
    DefaultActionReject,
    LocalPreference(u32),
    Metric(u32),
    MetricAdd(u32),
    MetricSubtract(u32),
    MetricType(MetricType),
    Tag(u32),
    Origin(OriginType),
    NextHop(Ipv4Addr),
    CommunityAdd(Vec<Community>),
    CommunityDelete(Vec<Community>),
    CommunitySet(Vec<Community>),
    AsPathPrepend(Vec<u32>),
    Unsupported(String),
}

// ── Terms and policy statements ───────────────────────────────────────────────

/// One vendor term: first matching term wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub from: Vec<FromClause>,
    #[serde(default)]
    pub then: Vec<ThenClause>,
}

impl Term {
    pub fn is_empty(&self) -> bool {
        self.from.is_empty() && self.then.is_empty()
    }
}

/// A named policy statement: ordered terms plus the unnamed default term.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyStatement {
    pub name: String,
    #[serde(default)]
    pub terms: Vec<Term>,
    #[serde(default)]
    pub default_term: Option<Term>,
}

// ── Protocol wiring ───────────────────────────────────────────────────────────

fn default_protocol() -> Protocol {
    Protocol::Bgp
}

/// A protocol neighbor with import/export policy chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInput {
    pub name: String,
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,
    #[serde(default)]
    pub import: Vec<String>,
    #[serde(default)]
    pub export: Vec<String>,
}

/// An aggregate or generated route and its generation policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateInput {
    pub prefix: Prefix,
    #[serde(default)]
    pub policies: Vec<String>,
}

/// A RIB group: routes of `protocol` are copied into other tables subject
/// to `import` policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RibGroupInput {
    pub name: String,
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,
    #[serde(default)]
    pub import: Vec<String>,
}

/// Cross-VRF route leaking into `vrf`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceImportInput {
    pub vrf: String,
    #[serde(default)]
    pub policies: Vec<String>,
}

/// Everything the conversion driver needs for one device configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigurationInput {
    #[serde(default)]
    pub prefix_lists: BTreeMap<String, Vec<Prefix>>,
    #[serde(default)]
    pub policy_statements: Vec<PolicyStatement>,
    #[serde(default)]
    pub peers: Vec<PeerInput>,
    #[serde(default)]
    pub aggregates: Vec<AggregateInput>,
    #[serde(default)]
    pub rib_groups: Vec<RibGroupInput>,
    #[serde(default)]
    pub instance_imports: Vec<InstanceImportInput>,
    /// Run `simplify` over every policy before freezing.
    #[serde(default)]
    pub simplify: bool,
}

impl ConfigurationInput {
    /// Parse `s` as a TOML configuration.
    ///
    /// Returns `RplError::ConfigError` if the TOML is malformed or does not
    /// match the schema.
    pub fn from_toml_str(s: &str) -> RplResult<Self> {
        toml::from_str(s).map_err(|e| RplError::ConfigError {
            reason: format!("failed to parse configuration TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as a TOML configuration.
    pub fn from_file(path: &Path) -> RplResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| RplError::ConfigError {
            reason: format!("failed to read configuration file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}
