//! Typed representation of the routing configuration delivered by the
//! control plane in LDS/RDS responses.

use regex::Regex;

/// The listener resource watched by a channel, reduced to the pieces the
/// client cares about.  The embedded route configuration may have been
/// delivered inline or through a separate RDS subscription; by the time the
/// watcher sees it, the two cases are indistinguishable.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ListenerUpdate {
    /// The route configuration to apply for the watched server name.
    pub route_config: RouteConfigUpdate,
}

/// An ordered list of routes.  The first matching route wins, so order is
/// semantically significant and must be preserved end to end.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct RouteConfigUpdate {
    pub routes: Vec<Route>,
}

/// A single match-and-act rule from the route configuration.
#[derive(Debug, Clone)]
pub struct Route {
    pub matchers: RouteMatchers,
    pub action: RouteAction,
}

/// The match predicate of a route.
#[derive(Debug, Clone)]
pub struct RouteMatchers {
    pub path_matcher: PathMatcher,
    /// Ordered; all header matchers must match for the route to match.
    pub header_matchers: Vec<HeaderMatcher>,
    /// Optional runtime fraction, in parts per million of requests.
    pub fraction_per_million: Option<u32>,
}

/// Matches the request path (":path" pseudo-header).
#[derive(Debug, Clone)]
pub enum PathMatcher {
    Prefix(String),
    Path(String),
    Regex(Regex),
}

/// Matches a single request header.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    pub name: String,
    pub header_match: HeaderMatch,
    /// If set, the route matches when the predicate does NOT match.
    pub invert_match: bool,
}

/// The predicate applied to a header's value.
#[derive(Debug, Clone)]
pub enum HeaderMatch {
    Exact(String),
    Regex(Regex),
    /// Matches when the value, interpreted as an integer, is in
    /// [start, end).
    Range { start: i64, end: i64 },
    /// Matches on the presence (true) or absence (false) of the header.
    Present(bool),
    Prefix(String),
    Suffix(String),
}

/// Where a matched request is sent.
#[derive(Debug, Clone)]
pub enum RouteAction {
    /// Route to a single cluster.
    Cluster(String),
    /// Split traffic over several clusters; the list is never empty.
    WeightedClusters(Vec<ClusterWeight>),
}

/// One cluster's share of a weighted action.
#[derive(Debug, Clone)]
pub struct ClusterWeight {
    pub name: String,
    pub weight: u32,
}
