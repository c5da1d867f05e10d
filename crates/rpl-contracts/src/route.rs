//! Route model: the attribute bag a routing policy reads and rewrites.
//!
//! A `Route` is the immutable input of one evaluation. Writes performed by
//! `SetAttribute` statements are collected in an `AttributeOverlay` and only
//! applied to a copy of the route, never to the caller's value.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RplError, RplResult};

// ── Prefix ────────────────────────────────────────────────────────────────────

/// An IPv4 prefix in canonical form (host bits cleared).
///
/// Serialized as the usual `a.b.c.d/len` string so prefixes can be written
/// directly in TOML configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix {
    network: Ipv4Addr,
    length: u8,
}

impl Prefix {
    /// Build a prefix, clearing any host bits in `addr`.
    pub fn new(addr: Ipv4Addr, length: u8) -> RplResult<Self> {
        if length > 32 {
            return Err(RplError::ConfigError {
                reason: format!("prefix length {} exceeds 32", length),
            });
        }
        let network = Ipv4Addr::from(u32::from(addr) & Self::mask(length));
        Ok(Self { network, length })
    }

    /// The default route, `0.0.0.0/0`.
    pub const fn zero() -> Self {
        Self {
            network: Ipv4Addr::UNSPECIFIED,
            length: 0,
        }
    }

    fn mask(length: u8) -> u32 {
        if length == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(length))
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn length(&self) -> u8 {
        self.length
    }

    /// True if `other` lies inside this prefix (including equality).
    pub fn contains(&self, other: &Prefix) -> bool {
        other.length >= self.length
            && u32::from(other.network) & Self::mask(self.length) == u32::from(self.network)
    }

    /// True if this prefix is strictly more specific than `aggregate` and
    /// contained in it, i.e. it may contribute to `aggregate`.
    pub fn is_more_specific_of(&self, aggregate: &Prefix) -> bool {
        self.length > aggregate.length && aggregate.contains(self)
    }
}

impl Default for Prefix {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.length)
    }
}

impl FromStr for Prefix {
    type Err = RplError;

    fn from_str(s: &str) -> RplResult<Self> {
        let (addr, length) = s.split_once('/').ok_or_else(|| RplError::ConfigError {
            reason: format!("prefix '{}' is missing a '/length' suffix", s),
        })?;
        let addr: Ipv4Addr = addr.trim().parse().map_err(|e| RplError::ConfigError {
            reason: format!("invalid prefix address in '{}': {}", s, e),
        })?;
        let length: u8 = length.trim().parse().map_err(|e| RplError::ConfigError {
            reason: format!("invalid prefix length in '{}': {}", s, e),
        })?;
        Self::new(addr, length)
    }
}

impl TryFrom<String> for Prefix {
    type Error = RplError;

    fn try_from(s: String) -> RplResult<Self> {
        s.parse()
    }
}

impl From<Prefix> for String {
    fn from(p: Prefix) -> Self {
        p.to_string()
    }
}

/// A prefix with an accepted range of route lengths, the unit of prefix-set
/// and route-filter membership.
///
/// A route matches when its prefix lies inside `prefix` and its length is in
/// `min_length..=max_length`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrefixRange {
    pub prefix: Prefix,
    pub min_length: u8,
    pub max_length: u8,
}

impl PrefixRange {
    /// Only `prefix` itself.
    pub fn exact(prefix: Prefix) -> Self {
        Self { prefix, min_length: prefix.length(), max_length: prefix.length() }
    }

    /// `prefix` and everything more specific.
    pub fn or_longer(prefix: Prefix) -> Self {
        Self { prefix, min_length: prefix.length(), max_length: 32 }
    }

    /// Strictly more specific than `prefix`. Empty for a /32.
    pub fn longer(prefix: Prefix) -> Self {
        Self { prefix, min_length: prefix.length() + 1, max_length: 32 }
    }

    /// `prefix` and more specifics up to `max_length`.
    pub fn up_to(prefix: Prefix, max_length: u8) -> Self {
        Self { prefix, min_length: prefix.length(), max_length: max_length.min(32) }
    }

    pub fn length_range(prefix: Prefix, min_length: u8, max_length: u8) -> Self {
        Self { prefix, min_length, max_length: max_length.min(32) }
    }

    pub fn matches(&self, candidate: &Prefix) -> bool {
        self.prefix.contains(candidate)
            && candidate.length() >= self.min_length
            && candidate.length() <= self.max_length
    }
}

/// An unordered union of prefix ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixSet {
    pub ranges: Vec<PrefixRange>,
}

impl PrefixSet {
    pub fn new(ranges: Vec<PrefixRange>) -> Self {
        Self { ranges }
    }

    pub fn single(range: PrefixRange) -> Self {
        Self { ranges: vec![range] }
    }

    pub fn contains(&self, candidate: &Prefix) -> bool {
        self.ranges.iter().any(|r| r.matches(candidate))
    }

    /// Union of `self` and `other`.
    pub fn union(mut self, other: &PrefixSet) -> Self {
        for range in &other.ranges {
            if !self.ranges.contains(range) {
                self.ranges.push(range.clone());
            }
        }
        self
    }
}

// ── Communities ───────────────────────────────────────────────────────────────

/// A standard (RFC 1997) community, written `asn:value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Community(pub u32);

impl Community {
    pub fn new(asn: u16, value: u16) -> Self {
        Self((u32::from(asn) << 16) | u32::from(value))
    }
}

impl fmt::Display for Community {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0 >> 16, self.0 & 0xffff)
    }
}

impl FromStr for Community {
    type Err = RplError;

    fn from_str(s: &str) -> RplResult<Self> {
        let bad = || RplError::ConfigError {
            reason: format!("invalid community '{}', expected 'asn:value'", s),
        };
        let (asn, value) = s.split_once(':').ok_or_else(bad)?;
        let asn: u16 = asn.trim().parse().map_err(|_| bad())?;
        let value: u16 = value.trim().parse().map_err(|_| bad())?;
        Ok(Self::new(asn, value))
    }
}

impl TryFrom<String> for Community {
    type Error = RplError;

    fn try_from(s: String) -> RplResult<Self> {
        s.parse()
    }
}

impl From<Community> for String {
    fn from(c: Community) -> Self {
        c.to_string()
    }
}

// ── Enumerated attributes ─────────────────────────────────────────────────────

/// The protocol that produced a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    Connected,
    Local,
    Static,
    Aggregate,
    Generated,
    Ospf,
    Isis,
    /// External BGP.
    Bgp,
    /// Internal BGP.
    Ibgp,
}

impl Protocol {
    /// Whether a `protocol` match clause naming `self` accepts a route learned
    /// via `route_protocol`. `bgp` covers both eBGP and iBGP routes.
    pub fn covers(&self, route_protocol: Protocol) -> bool {
        match self {
            Protocol::Bgp => matches!(route_protocol, Protocol::Bgp | Protocol::Ibgp),
            other => *other == route_protocol,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Connected => "connected",
            Protocol::Local => "local",
            Protocol::Static => "static",
            Protocol::Aggregate => "aggregate",
            Protocol::Generated => "generated",
            Protocol::Ospf => "ospf",
            Protocol::Isis => "isis",
            Protocol::Bgp => "bgp",
            Protocol::Ibgp => "ibgp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = RplError;

    fn from_str(s: &str) -> RplResult<Self> {
        let protocol = match s.to_ascii_lowercase().as_str() {
            "connected" | "direct" => Protocol::Connected,
            "local" => Protocol::Local,
            "static" => Protocol::Static,
            "aggregate" => Protocol::Aggregate,
            "generated" => Protocol::Generated,
            "ospf" => Protocol::Ospf,
            "isis" => Protocol::Isis,
            "bgp" | "ebgp" => Protocol::Bgp,
            "ibgp" => Protocol::Ibgp,
            other => {
                return Err(RplError::ConfigError {
                    reason: format!("unknown protocol '{}'", other),
                })
            }
        };
        Ok(protocol)
    }
}

/// BGP origin attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginType {
    #[default]
    Igp,
    Egp,
    Incomplete,
}

/// OSPF external metric type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricType {
    Type1,
    #[default]
    Type2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressFamily {
    #[default]
    Ipv4Unicast,
    Ipv6Unicast,
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// A candidate route presented to a routing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Route {
    pub prefix: Prefix,
    pub protocol: Protocol,
    pub next_hop: Ipv4Addr,
    pub as_path: Vec<u32>,
    pub communities: BTreeSet<Community>,
    pub local_preference: u32,
    pub metric: u32,
    pub metric_type: MetricType,
    pub tag: u32,
    pub origin: OriginType,
    /// The VRF ("routing instance") the route was learned in.
    pub source_vrf: Option<String>,
    pub source_interface: Option<String>,
    pub address_family: AddressFamily,
    pub color: Option<u32>,
}

impl Default for Route {
    fn default() -> Self {
        Self::new(Prefix::zero(), Protocol::Static)
    }
}

impl Route {
    /// A route with protocol-neutral attribute defaults (local-preference 100).
    pub fn new(prefix: Prefix, protocol: Protocol) -> Self {
        Self {
            prefix,
            protocol,
            next_hop: Ipv4Addr::UNSPECIFIED,
            as_path: Vec::new(),
            communities: BTreeSet::new(),
            local_preference: 100,
            metric: 0,
            metric_type: MetricType::default(),
            tag: 0,
            origin: OriginType::default(),
            source_vrf: None,
            source_interface: None,
            address_family: AddressFamily::default(),
            color: None,
        }
    }

    pub fn with_as_path(mut self, as_path: Vec<u32>) -> Self {
        self.as_path = as_path;
        self
    }

    pub fn with_communities(mut self, communities: impl IntoIterator<Item = Community>) -> Self {
        self.communities = communities.into_iter().collect();
        self
    }

    pub fn with_next_hop(mut self, next_hop: Ipv4Addr) -> Self {
        self.next_hop = next_hop;
        self
    }

    pub fn with_tag(mut self, tag: u32) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_metric(mut self, metric: u32) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_source_vrf(mut self, vrf: impl Into<String>) -> Self {
        self.source_vrf = Some(vrf.into());
        self
    }

    pub fn with_source_interface(mut self, interface: impl Into<String>) -> Self {
        self.source_interface = Some(interface.into());
        self
    }

    /// Read the current value of a writable attribute.
    pub fn attribute(&self, field: RouteField) -> AttributeValue {
        match field {
            RouteField::Communities => AttributeValue::Communities(self.communities.clone()),
            RouteField::Origin => AttributeValue::Origin(self.origin),
            RouteField::NextHop => AttributeValue::NextHop(self.next_hop),
            RouteField::MetricType => AttributeValue::MetricType(self.metric_type),
            RouteField::LocalPreference => AttributeValue::Number(self.local_preference),
            RouteField::Metric => AttributeValue::Number(self.metric),
            RouteField::Tag => AttributeValue::Number(self.tag),
            RouteField::AsPath => AttributeValue::AsPath(self.as_path.clone()),
        }
    }

    /// Write `value` into `field`.
    ///
    /// Returns `MalformedIr` when the value's type does not fit the field;
    /// only a compiler defect can produce such a pair.
    pub fn set_attribute(&mut self, field: RouteField, value: AttributeValue) -> RplResult<()> {
        match (field, value) {
            (RouteField::Communities, AttributeValue::Communities(c)) => self.communities = c,
            (RouteField::Origin, AttributeValue::Origin(o)) => self.origin = o,
            (RouteField::NextHop, AttributeValue::NextHop(n)) => self.next_hop = n,
            (RouteField::MetricType, AttributeValue::MetricType(t)) => self.metric_type = t,
            (RouteField::LocalPreference, AttributeValue::Number(n)) => self.local_preference = n,
            (RouteField::Metric, AttributeValue::Number(n)) => self.metric = n,
            (RouteField::Tag, AttributeValue::Number(n)) => self.tag = n,
            (RouteField::AsPath, AttributeValue::AsPath(p)) => self.as_path = p,
            (field, value) => {
                return Err(RplError::MalformedIr {
                    policy: String::new(),
                    reason: format!("value {:?} cannot be written to field {:?}", value, field),
                })
            }
        }
        Ok(())
    }
}

/// The writable route attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteField {
    Communities,
    Origin,
    NextHop,
    MetricType,
    LocalPreference,
    Metric,
    Tag,
    AsPath,
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    Communities(BTreeSet<Community>),
    Origin(OriginType),
    NextHop(Ipv4Addr),
    MetricType(MetricType),
    Number(u32),
    AsPath(Vec<u32>),
}

/// Attribute writes accumulated during one evaluation, layered over the
/// input route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeOverlay {
    writes: BTreeMap<RouteField, AttributeValue>,
}

impl AttributeOverlay {
    pub fn get(&self, field: RouteField) -> Option<&AttributeValue> {
        self.writes.get(&field)
    }

    pub fn set(&mut self, field: RouteField, value: AttributeValue) {
        self.writes.insert(field, value);
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RouteField, &AttributeValue)> {
        self.writes.iter()
    }

    /// Return a copy of `route` with every write applied.
    pub fn apply_to(&self, route: &Route) -> RplResult<Route> {
        let mut out = route.clone();
        for (field, value) in &self.writes {
            out.set_attribute(*field, value.clone())?;
        }
        Ok(out)
    }
}
