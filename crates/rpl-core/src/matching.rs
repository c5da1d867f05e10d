//! Leaf predicate and attribute-expression evaluation.

use rpl_contracts::{
    ir::{AsPathPattern, AttributeExpr, RoutePredicate},
    route::{AttributeValue, Route, RouteField},
};

/// Test one leaf predicate against the current route.
pub(crate) fn matches(predicate: &RoutePredicate, route: &Route) -> bool {
    match predicate {
        RoutePredicate::Protocol(protocol) => protocol.covers(route.protocol),
        RoutePredicate::PrefixIn(set) => set.contains(&route.prefix),
        RoutePredicate::ContributesTo(aggregate) => route.prefix.is_more_specific_of(aggregate),
        RoutePredicate::AsPath(pattern) => match pattern {
            AsPathPattern::Contains(asn) => route.as_path.contains(asn),
            AsPathPattern::OriginAs(asn) => route.as_path.last() == Some(asn),
            AsPathPattern::NeighborAs(asn) => route.as_path.first() == Some(asn),
            AsPathPattern::Empty => route.as_path.is_empty(),
        },
        RoutePredicate::Community(community) => route.communities.contains(community),
        RoutePredicate::Tag(tag) => route.tag == *tag,
        RoutePredicate::LocalPreference(pref) => route.local_preference == *pref,
        RoutePredicate::Metric(metric) => route.metric == *metric,
        RoutePredicate::SourceInterface(name) => route.source_interface.as_deref() == Some(name.as_str()),
        RoutePredicate::SourceVrf(name) => route.source_vrf.as_deref() == Some(name.as_str()),
        RoutePredicate::AddressFamily(family) => route.address_family == *family,
        RoutePredicate::Color(color) => route.color == Some(*color),
        RoutePredicate::Unsupported(_) => false,
    }
}

/// Compute the value a `SetAttribute` writes into `field`.
///
/// `Err` carries a description of the type mismatch; the caller wraps it
/// into `MalformedIr` with the policy name.
pub(crate) fn compute(field: RouteField, expr: &AttributeExpr, route: &Route) -> Result<AttributeValue, String> {
    let current = route.attribute(field);
    let mismatch = || format!("{:?} cannot be applied to field {:?}", expr, field);
    let value = match (expr, current) {
        (AttributeExpr::Literal(value), _) => value.clone(),
        (AttributeExpr::AddCommunities(add), AttributeValue::Communities(mut set)) => {
            set.extend(add.iter().copied());
            AttributeValue::Communities(set)
        }
        (AttributeExpr::RemoveCommunities(remove), AttributeValue::Communities(mut set)) => {
            set.retain(|c| !remove.contains(c));
            AttributeValue::Communities(set)
        }
        (AttributeExpr::Increment(n), AttributeValue::Number(v)) => AttributeValue::Number(v.saturating_add(*n)),
        (AttributeExpr::Decrement(n), AttributeValue::Number(v)) => AttributeValue::Number(v.saturating_sub(*n)),
        (AttributeExpr::Prepend(asns), AttributeValue::AsPath(path)) => {
            AttributeValue::AsPath(asns.iter().copied().chain(path).collect())
        }
        _ => return Err(mismatch()),
    };
    Ok(value)
}
