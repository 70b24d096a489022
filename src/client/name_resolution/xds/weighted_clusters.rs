//! Stable naming for weighted-cluster actions.
//!
//! Weighted-cluster actions are identified in the generated LB config by a
//! short name derived from their cluster set plus a small index.  The index
//! map below preserves those names across route configuration updates: an
//! action that reappears with the same clusters and weights keeps its name,
//! and an action whose weights changed reuses a released index from its
//! group instead of taking an ever-growing one.  The names identify
//! long-lived child policies downstream, so keeping them stable lets the
//! weighted_target policy reuse its subtrees instead of rebuilding them on
//! every update.

use std::collections::{BTreeMap, BTreeSet};

use crate::xds::route::{ClusterWeight, RouteAction, RouteConfigUpdate};

pub(super) struct WeightedClustersKeys {
    pub(super) cluster_names_key: String,
    pub(super) cluster_weights_key: String,
}

/// Computes the canonical keys for a weighted action: the sorted cluster
/// names joined with '_', and the sorted name_weight pairs joined with '_'.
pub(super) fn weighted_clusters_keys(weighted_clusters: &[ClusterWeight]) -> WeightedClustersKeys {
    let cluster_names: BTreeSet<String> = weighted_clusters
        .iter()
        .map(|cluster_weight| cluster_weight.name.clone())
        .collect();
    let cluster_weights: BTreeSet<String> = weighted_clusters
        .iter()
        .map(|cluster_weight| format!("{}_{}", cluster_weight.name, cluster_weight.weight))
        .collect();
    WeightedClustersKeys {
        cluster_names_key: cluster_names.into_iter().collect::<Vec<_>>().join("_"),
        cluster_weights_key: cluster_weights.into_iter().collect::<Vec<_>>().join("_"),
    }
}

/// Bookkeeping for the group of weighted actions sharing one cluster-names
/// key.  Indices in cluster_weights_map are unique within the group.
#[derive(Debug, Default)]
pub(super) struct ClusterNamesInfo {
    next_index: u64,
    cluster_weights_map: BTreeMap<String, u64>,
}

/// Two-level map assigning indices to weighted actions: keyed by
/// cluster-names key, then by cluster-weights key.  Ordered maps keep index
/// reuse deterministic.
pub(super) type WeightedClusterIndexMap = BTreeMap<String, ClusterNamesInfo>;

/// Rebuilds the index map for a new route configuration update.
///
/// Consumes the previous map and returns the map for this update, which
/// contains exactly the weighted actions appearing in it:
///
/// 1. Actions whose clusters and weights both appeared in the previous
///    update keep their index; their group also keeps its next_index.
/// 2. Remaining actions reuse the lowest released entry of their group, or
///    take a fresh index from next_index if the group has none left.
///
/// Everything else from the previous map is discarded.
pub(super) fn update_weighted_cluster_index_map(
    mut old_index_map: WeightedClusterIndexMap,
    update: &RouteConfigUpdate,
) -> WeightedClusterIndexMap {
    // The unique weighted actions in this update, keyed by cluster-weights
    // key.  Routes repeating the same clusters and weights collapse here.
    let mut actions_to_process: BTreeMap<String, String> = BTreeMap::new();
    for route in &update.routes {
        if let RouteAction::WeightedClusters(weighted_clusters) = &route.action {
            let keys = weighted_clusters_keys(weighted_clusters);
            actions_to_process
                .entry(keys.cluster_weights_key)
                .or_insert(keys.cluster_names_key);
        }
    }

    let mut new_index_map = WeightedClusterIndexMap::new();
    actions_to_process.retain(|cluster_weights_key, cluster_names_key| {
        let Some(old_info) = old_index_map.get_mut(cluster_names_key.as_str()) else {
            return true;
        };
        let new_info = new_index_map
            .entry(cluster_names_key.clone())
            .or_default();
        new_info.next_index = old_info.next_index;
        match old_info.cluster_weights_map.remove(cluster_weights_key) {
            Some(index) => {
                // Exact match: move the entry over and drop the action from
                // further processing.
                new_info
                    .cluster_weights_map
                    .insert(cluster_weights_key.clone(), index);
                false
            }
            None => true,
        }
    });

    for (cluster_weights_key, cluster_names_key) in &actions_to_process {
        let new_info = new_index_map
            .entry(cluster_names_key.clone())
            .or_default();
        let recycled = old_index_map
            .get_mut(cluster_names_key.as_str())
            .and_then(|old_info| old_info.cluster_weights_map.pop_first());
        let index = match recycled {
            Some((_, index)) => index,
            None => {
                let index = new_info.next_index;
                new_info.next_index += 1;
                index
            }
        };
        new_info
            .cluster_weights_map
            .insert(cluster_weights_key.clone(), index);
    }
    new_index_map
}

/// Returns the action name allocated for the given weighted clusters:
/// `<cluster-names key>_<index>`.
///
/// The index map must already have been rebuilt for the update containing
/// this action; a missing entry is a bug in the caller.
pub(super) fn weighted_clusters_action_name(
    index_map: &WeightedClusterIndexMap,
    weighted_clusters: &[ClusterWeight],
) -> String {
    let keys = weighted_clusters_keys(weighted_clusters);
    let info = index_map
        .get(&keys.cluster_names_key)
        .expect("cluster names key missing from weighted cluster index map");
    let index = info
        .cluster_weights_map
        .get(&keys.cluster_weights_key)
        .expect("cluster weights key missing from weighted cluster index map");
    format!("{}_{}", keys.cluster_names_key, index)
}
