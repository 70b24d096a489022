//! Generation of the service config document for a route configuration
//! update.
//!
//! The generated config selects the xds_routing LB policy, handing it the
//! route table and one named action per distinct route target.  Single
//! clusters become cds child policies; weighted clusters become a
//! weighted_target policy whose targets are themselves cds children.  The
//! document is built as structured JSON values and serialized in one step,
//! so escaping and whitespace are the serializer's problem, not ours.

use serde_json::{json, Map, Value};

use super::weighted_clusters::{weighted_clusters_action_name, WeightedClusterIndexMap};
use crate::xds::route::{
    ClusterWeight, HeaderMatch, HeaderMatcher, PathMatcher, Route, RouteAction, RouteConfigUpdate,
};

fn cluster_action_config(cluster_name: &str) -> Value {
    json!({
        "childPolicy": [ { "cds_experimental": { "cluster": cluster_name } } ]
    })
}

fn weighted_cluster_action_config(weighted_clusters: &[ClusterWeight]) -> Value {
    // Targets keep the order in which the update listed the clusters.
    let mut targets = Map::new();
    for cluster_weight in weighted_clusters {
        targets.insert(
            cluster_weight.name.clone(),
            json!({
                "weight": cluster_weight.weight,
                "childPolicy": [ { "cds_experimental": { "cluster": cluster_weight.name } } ]
            }),
        );
    }
    json!({
        "childPolicy": [ { "weighted_target_experimental": { "targets": targets } } ]
    })
}

fn header_matcher_config(header: &HeaderMatcher) -> Value {
    let mut config = Map::new();
    config.insert("name".to_string(), json!(header.name));
    let (key, value) = match &header.header_match {
        HeaderMatch::Exact(value) => ("exact_match", json!(value)),
        HeaderMatch::Regex(regex) => ("regex_match", json!(regex.as_str())),
        HeaderMatch::Range { start, end } => ("range_match", json!({ "start": start, "end": end })),
        HeaderMatch::Present(present) => ("present_match", json!(present)),
        HeaderMatch::Prefix(value) => ("prefix_match", json!(value)),
        HeaderMatch::Suffix(value) => ("suffix_match", json!(value)),
    };
    config.insert(key.to_string(), value);
    if header.invert_match {
        config.insert("invert_match".to_string(), json!(true));
    }
    Value::Object(config)
}

fn route_config(action_name: &str, route: &Route) -> Value {
    let mut config = Map::new();
    match &route.matchers.path_matcher {
        PathMatcher::Prefix(prefix) => config.insert("prefix".to_string(), json!(prefix)),
        PathMatcher::Path(path) => config.insert("path".to_string(), json!(path)),
        PathMatcher::Regex(regex) => config.insert("regex".to_string(), json!(regex.as_str())),
    };
    if !route.matchers.header_matchers.is_empty() {
        let headers: Vec<Value> = route
            .matchers
            .header_matchers
            .iter()
            .map(header_matcher_config)
            .collect();
        config.insert("headers".to_string(), Value::Array(headers));
    }
    if let Some(fraction) = route.matchers.fraction_per_million {
        config.insert("match_fraction".to_string(), json!(fraction));
    }
    config.insert("action".to_string(), json!(action_name));
    Value::Object(config)
}

/// Renders the service config document for an update.  The index map must
/// already have been rebuilt for this update.
pub(super) fn generate_service_config(
    update: &RouteConfigUpdate,
    index_map: &WeightedClusterIndexMap,
) -> String {
    let mut actions = Map::new();
    let mut routes = Vec::with_capacity(update.routes.len());
    for route in &update.routes {
        let action_name = match &route.action {
            RouteAction::Cluster(cluster_name) => format!("cds:{cluster_name}"),
            RouteAction::WeightedClusters(weighted_clusters) => format!(
                "weighted:{}",
                weighted_clusters_action_name(index_map, weighted_clusters)
            ),
        };
        // Emit each action entry once; later routes only reference it.
        if !actions.contains_key(&action_name) {
            let action_config = match &route.action {
                RouteAction::Cluster(cluster_name) => cluster_action_config(cluster_name),
                RouteAction::WeightedClusters(weighted_clusters) => {
                    weighted_cluster_action_config(weighted_clusters)
                }
            };
            actions.insert(action_name.clone(), action_config);
        }
        routes.push(route_config(&action_name, route));
    }
    json!({
        "loadBalancingConfig": [
            { "xds_routing_experimental": { "actions": actions, "routes": routes } }
        ]
    })
    .to_string()
}
