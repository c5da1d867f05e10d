//! Simulated routing tables for the Junos reference scenarios.
//!
//! All routes in this module are hardcoded and fictional. Prefixes come from
//! documentation and private ranges; AS numbers from the private range.

use std::net::Ipv4Addr;

use rpl_contracts::{
    error::RplResult,
    route::{Community, Protocol, Route},
};

/// A route with the label the scenarios print it under.
#[derive(Debug, Clone)]
pub struct MockRoute {
    pub label: &'static str,
    pub route: Route,
}

fn route(label: &'static str, prefix: &str, protocol: Protocol) -> RplResult<MockRoute> {
    Ok(MockRoute {
        label,
        route: Route::new(prefix.parse()?, protocol),
    })
}

fn with(mut mock: MockRoute, f: impl FnOnce(Route) -> Route) -> MockRoute {
    mock.route = f(mock.route);
    mock
}

// ── Transit peer feed (mock) ──────────────────────────────────────────────────

/// Routes received from the transit peer at 192.0.2.1.
///
/// - `customer`     203.0.113.0/24 via AS 64500, tagged and preferred
/// - `rfc1918`      10.20.0.0/16, a bogon
/// - `default`      0.0.0.0/0, a martian
/// - `too-specific` 198.51.100.128/25, longer than /24
/// - `prepended`    192.0.2.0/24 through AS 64666, de-preferred
/// - `internet`     100.100.0.0/16, no term matches
pub fn transit_feed() -> RplResult<Vec<MockRoute>> {
    let peer = Ipv4Addr::new(192, 0, 2, 1);
    let from_peer = |as_path: Vec<u32>| move |r: Route| r.with_as_path(as_path).with_next_hop(peer);
    Ok(vec![
        with(route("customer", "203.0.113.0/24", Protocol::Bgp)?, from_peer(vec![64500, 64501])),
        with(route("rfc1918", "10.20.0.0/16", Protocol::Bgp)?, from_peer(vec![64510, 64520])),
        with(route("default", "0.0.0.0/0", Protocol::Bgp)?, from_peer(vec![64510])),
        with(route("too-specific", "198.51.100.128/25", Protocol::Bgp)?, from_peer(vec![64510, 64502])),
        with(route("prepended", "192.0.2.0/24", Protocol::Bgp)?, from_peer(vec![64510, 64666, 64666])),
        with(route("internet", "100.100.0.0/16", Protocol::Bgp)?, from_peer(vec![64510, 64520])),
    ])
}

// ── Campus contributors (mock) ────────────────────────────────────────────────

/// Candidate contributors to the campus aggregates.
pub fn campus_routes() -> RplResult<Vec<MockRoute>> {
    Ok(vec![
        route("core", "10.1.0.0/16", Protocol::Static)?,
        route("lab", "10.99.4.0/24", Protocol::Static)?,
        route("igp", "10.2.0.0/16", Protocol::Ospf)?,
        route("aggregate-itself", "10.0.0.0/8", Protocol::Static)?,
        route("dorms", "172.16.5.0/24", Protocol::Static)?,
        route("guest", "192.168.0.0/16", Protocol::Static)?,
    ])
}

// ── Routing instances (mock) ──────────────────────────────────────────────────

/// Routes learned in VRFs other than "red".
pub fn instance_routes() -> RplResult<Vec<MockRoute>> {
    let shared = Community::new(65000, 300);
    Ok(vec![
        with(route("blue-shared", "10.30.1.0/24", Protocol::Bgp)?, |r| {
            r.with_source_vrf("blue").with_communities([shared])
        }),
        with(route("blue-private", "10.30.2.0/24", Protocol::Bgp)?, |r| r.with_source_vrf("blue")),
        with(route("green-bgp", "10.40.1.0/24", Protocol::Bgp)?, |r| r.with_source_vrf("green")),
        with(route("green-static", "10.40.9.0/24", Protocol::Static)?, |r| {
            r.with_source_vrf("green").with_tag(42)
        }),
    ])
}
