// SPDX-License-Identifier: MIT OR Apache-2.0

//! Propagation of a single (document type, permission) pair through the group graph.
use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::Direction;
use petgraph::prelude::DiGraphMap;

use crate::graph::{ancestors, reachable};
use crate::registry::GroupIdx;

/// Transitive closure of one permission layer, maintained incrementally.
///
/// Every group records, for each group it can reach, the set of direct successors ("requestors")
/// through which that group is reached. A target stays in the closure as long as at least one
/// requestor remains.
#[derive(Clone, Debug, Default)]
pub(crate) struct PermissionLayer {
    /// Active ACL edges, pointing from the granted group to the group whose documents it may act on.
    graph: DiGraphMap<GroupIdx, ()>,

    /// group -> reachable target -> requestors justifying the target.
    requestors: HashMap<GroupIdx, HashMap<GroupIdx, BTreeSet<GroupIdx>>>,
}

impl PermissionLayer {
    pub fn is_empty(&self) -> bool {
        self.graph.edge_count() == 0
    }

    pub fn graph(&self) -> &DiGraphMap<GroupIdx, ()> {
        &self.graph
    }

    /// All groups reachable from `group` through this layer.
    pub fn closure(&self, group: GroupIdx) -> impl Iterator<Item = GroupIdx> + '_ {
        self.requestors
            .get(&group)
            .into_iter()
            .flat_map(|targets| targets.keys().copied())
    }

    /// Direct successors of `group` through which `target` is reached.
    pub fn requestors(&self, group: GroupIdx, target: GroupIdx) -> Option<&BTreeSet<GroupIdx>> {
        self.requestors
            .get(&group)
            .and_then(|targets| targets.get(&target))
    }

    /// Insert an edge and propagate the newly reachable groups to every group reaching `source`.
    ///
    /// Returns `false` when the edge was already present.
    pub fn add_edge(&mut self, source: GroupIdx, target: GroupIdx) -> bool {
        if self.graph.contains_edge(source, target) {
            return false;
        }

        self.graph.add_edge(source, target, ());
        let affected = ancestors(&self.graph, source);
        self.rederive(&affected, Some((source, target)));
        true
    }

    /// Remove an edge and retract every target which lost its last requestor.
    ///
    /// Returns the retracted `(group, target)` pairs.
    pub fn remove_edge(&mut self, source: GroupIdx, target: GroupIdx) -> Vec<(GroupIdx, GroupIdx)> {
        if !self.graph.contains_edge(source, target) {
            return Vec::new();
        }

        // Only groups which reached `source` before the removal can lose targets.
        let affected = ancestors(&self.graph, source);
        self.graph.remove_edge(source, target);

        if let Some(targets) = self.requestors.get_mut(&source) {
            for requestors in targets.values_mut() {
                requestors.remove(&target);
            }
        }

        self.rederive(&affected, None)
    }

    /// Remove all edges of a group and the group itself from this layer.
    pub fn remove_node(&mut self, group: GroupIdx) -> Vec<(GroupIdx, GroupIdx)> {
        if !self.graph.contains_node(group) {
            return Vec::new();
        }

        let mut retracted = Vec::new();

        let outgoing: Vec<_> = self
            .graph
            .neighbors_directed(group, Direction::Outgoing)
            .collect();
        for target in outgoing {
            retracted.extend(self.remove_edge(group, target));
        }

        let incoming: Vec<_> = self
            .graph
            .neighbors_directed(group, Direction::Incoming)
            .collect();
        for source in incoming {
            retracted.extend(self.remove_edge(source, group));
        }

        self.graph.remove_node(group);
        self.requestors.remove(&group);
        retracted
    }

    /// Recompute the requestor sets of all affected groups against the current graph.
    ///
    /// Only successors which are themselves affected (plus the freshly inserted edge) can have a
    /// changed reachable set, all other contributions stay valid.
    fn rederive(
        &mut self,
        affected: &HashSet<GroupIdx>,
        inserted: Option<(GroupIdx, GroupIdx)>,
    ) -> Vec<(GroupIdx, GroupIdx)> {
        let mut reach_cache: HashMap<GroupIdx, HashSet<GroupIdx>> = HashMap::new();

        for &group in affected {
            let successors: Vec<_> = self
                .graph
                .neighbors_directed(group, Direction::Outgoing)
                .filter(|successor| {
                    affected.contains(successor) || inserted == Some((group, *successor))
                })
                .collect();

            for successor in successors {
                let reach = reach_cache
                    .entry(successor)
                    .or_insert_with(|| reachable(&self.graph, successor));

                let targets = self.requestors.entry(group).or_default();
                for (target, requestors) in targets.iter_mut() {
                    if !reach.contains(target) {
                        requestors.remove(&successor);
                    }
                }
                for target in reach.iter() {
                    targets.entry(*target).or_default().insert(successor);
                }
            }
        }

        let mut retracted = Vec::new();
        for &group in affected {
            let Some(targets) = self.requestors.get_mut(&group) else {
                continue;
            };

            targets.retain(|target, requestors| {
                if requestors.is_empty() {
                    retracted.push((group, *target));
                    false
                } else {
                    true
                }
            });

            if targets.is_empty() {
                self.requestors.remove(&group);
            }
        }

        retracted
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::registry::GroupIdx;

    use super::PermissionLayer;

    fn idx(value: u32) -> GroupIdx {
        GroupIdx(value)
    }

    fn closure(layer: &PermissionLayer, group: u32) -> BTreeSet<u32> {
        layer.closure(idx(group)).map(|group| group.0).collect()
    }

    #[test]
    fn transitive_chain() {
        let mut layer = PermissionLayer::default();
        assert!(layer.add_edge(idx(1), idx(2)));
        assert!(layer.add_edge(idx(2), idx(3)));
        assert!(!layer.add_edge(idx(2), idx(3)));

        assert_eq!(closure(&layer, 1), BTreeSet::from([2, 3]));
        assert_eq!(closure(&layer, 2), BTreeSet::from([3]));
        assert!(closure(&layer, 3).is_empty());

        // Group 3 is reached by group 1 through its successor 2.
        assert_eq!(
            layer.requestors(idx(1), idx(3)),
            Some(&BTreeSet::from([idx(2)]))
        );
    }

    #[test]
    fn multiple_paths_are_counted() {
        //   1 -> 2 -> 4
        //   1 -> 3 -> 4
        let mut layer = PermissionLayer::default();
        layer.add_edge(idx(1), idx(2));
        layer.add_edge(idx(1), idx(3));
        layer.add_edge(idx(2), idx(4));
        layer.add_edge(idx(3), idx(4));

        assert_eq!(
            layer.requestors(idx(1), idx(4)),
            Some(&BTreeSet::from([idx(2), idx(3)]))
        );

        let retracted = layer.remove_edge(idx(2), idx(4));
        assert_eq!(retracted, vec![(idx(2), idx(4))]);
        assert_eq!(closure(&layer, 1), BTreeSet::from([2, 3, 4]));

        let retracted = layer.remove_edge(idx(3), idx(4));
        assert!(retracted.contains(&(idx(1), idx(4))));
        assert!(retracted.contains(&(idx(3), idx(4))));
        assert_eq!(closure(&layer, 1), BTreeSet::from([2, 3]));
    }

    #[test]
    fn cycles_do_not_keep_retracted_targets() {
        //   2 <-> 3, 2 -> 5
        let mut layer = PermissionLayer::default();
        layer.add_edge(idx(2), idx(3));
        layer.add_edge(idx(3), idx(2));
        layer.add_edge(idx(2), idx(5));

        assert_eq!(closure(&layer, 2), BTreeSet::from([2, 3, 5]));
        assert_eq!(closure(&layer, 3), BTreeSet::from([2, 3, 5]));

        // Group 2 reached 5 directly and through 3, but 3 only reached 5 through 2.
        layer.remove_edge(idx(2), idx(5));
        assert_eq!(closure(&layer, 2), BTreeSet::from([2, 3]));
        assert_eq!(closure(&layer, 3), BTreeSet::from([2, 3]));

        layer.remove_edge(idx(3), idx(2));
        assert_eq!(closure(&layer, 2), BTreeSet::from([3]));
        assert!(closure(&layer, 3).is_empty());
    }

    #[test]
    fn self_loop() {
        let mut layer = PermissionLayer::default();
        layer.add_edge(idx(1), idx(1));
        layer.add_edge(idx(0), idx(1));
        assert_eq!(closure(&layer, 1), BTreeSet::from([1]));
        assert_eq!(closure(&layer, 0), BTreeSet::from([1]));

        layer.remove_edge(idx(1), idx(1));
        assert!(closure(&layer, 1).is_empty());
        assert_eq!(closure(&layer, 0), BTreeSet::from([1]));
    }

    #[test]
    fn remove_node_retracts_everything_through_it() {
        let mut layer = PermissionLayer::default();
        layer.add_edge(idx(1), idx(2));
        layer.add_edge(idx(2), idx(3));
        layer.add_edge(idx(4), idx(2));

        layer.remove_node(idx(2));
        assert!(closure(&layer, 1).is_empty());
        assert!(closure(&layer, 4).is_empty());
        assert!(layer.is_empty());
        assert!(!layer.graph().contains_node(idx(2)));
    }
}
