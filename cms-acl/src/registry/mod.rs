// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group ACL graph and incremental permission propagation.
//!
//! Each group declares ACL entries of the form "this group holds permission P on documents of
//! type T belonging to group H". The registry derives, for every group, the transitive closure of
//! these grants: a group holding (T, P) on H also holds (T, P) on every group H holds (T, P) on.
//!
//! Permissions are propagated per (T, P) pair, see [`PermissionLayer`]. Each layer tracks which
//! direct successor justifies a reachable group so that revoking one path never removes access
//! which is still justified by another one.
mod display;
mod layer;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::Direction;
use tracing::{debug, trace};

use crate::access::{AclPermission, PermissionSet};
use crate::access_map::AccessMap;
use crate::document::{AclEntry, DocType, GroupDocument, GroupId};

use layer::PermissionLayer;

/// Interned index of a group id, used as node in the permission graphs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct GroupIdx(pub(crate) u32);

/// ACL entries of a group merged by (document type, target group).
pub type AclMap = BTreeMap<(DocType, GroupId), PermissionSet>;

/// Propagated permissions of a group: document type -> permission -> groups.
pub type PropagatedMap = BTreeMap<DocType, BTreeMap<AclPermission, BTreeSet<GroupId>>>;

#[derive(Clone, Debug, Default)]
struct GroupNode {
    /// Declared ACL of this group. Entries referencing unknown groups are kept but not wired
    /// into any layer until that group appears.
    acl: BTreeMap<(DocType, GroupIdx), PermissionSet>,
}

/// In-memory mirror of all groups and their propagated permissions.
#[derive(Clone, Debug, Default)]
pub struct PermissionRegistry {
    /// Group ids by interned index.
    ids: Vec<GroupId>,

    /// Interned index by group id.
    index: HashMap<GroupId, GroupIdx>,

    /// Currently existing groups.
    groups: HashMap<GroupIdx, GroupNode>,

    /// Inactive ACL entries by missing target: target -> (source, document type).
    pending: HashMap<GroupIdx, BTreeSet<(GroupIdx, DocType)>>,

    /// One propagation layer per (document type, permission) pair.
    layers: BTreeMap<(DocType, AclPermission), PermissionLayer>,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from a full set of group documents.
    pub fn from_groups(groups: impl IntoIterator<Item = GroupDocument>) -> Self {
        let mut registry = Self::new();
        registry.upsert_groups(groups);
        registry
    }

    /// Return `true` if the group exists in the registry.
    pub fn contains(&self, group_id: &GroupId) -> bool {
        self.lookup(group_id)
            .is_some_and(|idx| self.groups.contains_key(&idx))
    }

    /// Number of existing groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Ids of all existing groups, sorted.
    pub fn group_ids(&self) -> Vec<GroupId> {
        let mut ids: Vec<_> = self.groups.keys().map(|idx| self.id(*idx).clone()).collect();
        ids.sort();
        ids
    }

    /// Declared ACL of a group, including entries referencing groups which do not exist (yet).
    pub fn acl(&self, group_id: &GroupId) -> Option<AclMap> {
        let node = self.node(group_id)?;
        Some(
            node.acl
                .iter()
                .map(|((doc_type, target), permissions)| {
                    ((*doc_type, self.id(*target).clone()), permissions.clone())
                })
                .collect(),
        )
    }

    /// Create or update all given groups as one batch.
    ///
    /// Every group of the batch is registered before any ACL edge is wired, ACL entries can
    /// therefore reference groups appearing later in the same batch. Entries referencing groups
    /// which are still unknown after the batch stay inactive until such group is created.
    ///
    /// Upserting a group with an unchanged ACL is a no-op.
    pub fn upsert_groups(&mut self, groups: impl IntoIterator<Item = GroupDocument>) {
        let groups: Vec<_> = groups.into_iter().collect();

        let mut created = Vec::new();
        for group in &groups {
            let idx = self.intern(&group.id);
            if !self.groups.contains_key(&idx) {
                self.groups.insert(idx, GroupNode::default());
                created.push(idx);
            }
        }

        // Wire up entries of known groups which were waiting for one of the new groups.
        for target in created {
            let Some(sources) = self.pending.remove(&target) else {
                continue;
            };

            let pending: Vec<_> = sources
                .into_iter()
                .filter_map(|(source, doc_type)| {
                    let permissions = self.groups.get(&source)?.acl.get(&(doc_type, target))?;
                    Some((source, doc_type, permissions.clone()))
                })
                .flat_map(|(source, doc_type, permissions)| {
                    permissions
                        .into_iter()
                        .map(move |permission| (source, doc_type, permission))
                })
                .collect();

            for (source, doc_type, permission) in pending {
                debug!(
                    source = %self.id(source),
                    target = %self.id(target),
                    %doc_type,
                    %permission,
                    "activate pending acl entry"
                );
                self.layer_mut(doc_type, permission)
                    .add_edge(source, target);
            }
        }

        for group in groups {
            let idx = self.intern(&group.id);
            let acl = self.acl_map(&group.acl);
            self.apply_acl(idx, acl);
        }
    }

    /// Remove all given groups.
    ///
    /// Every permission other groups derived through a removed group is retracted, unless still
    /// justified by another path. ACL entries of other groups pointing at a removed group are
    /// kept inactive and re-activate when a group with the same id is created again.
    pub fn remove_groups<'a>(&mut self, group_ids: impl IntoIterator<Item = &'a GroupId>) {
        for group_id in group_ids {
            let Some(idx) = self.lookup(group_id) else {
                continue;
            };
            let Some(node) = self.groups.remove(&idx) else {
                continue;
            };

            debug!(group = %group_id, "remove group");

            // Inactive entries of the removed group are gone with it.
            for (doc_type, target) in node.acl.keys() {
                self.unmark_pending(idx, *doc_type, *target);
            }

            // Entries of other groups pointing at the removed group become inactive.
            for ((doc_type, _), layer) in &self.layers {
                let sources = layer
                    .graph()
                    .neighbors_directed(idx, Direction::Incoming)
                    .filter(|source| *source != idx)
                    .map(|source| (source, *doc_type));
                self.pending.entry(idx).or_default().extend(sources);
            }
            if self.pending.get(&idx).is_some_and(BTreeSet::is_empty) {
                self.pending.remove(&idx);
            }

            for ((doc_type, permission), layer) in self.layers.iter_mut() {
                for (group, target) in layer.remove_node(idx) {
                    trace!(
                        group = %self.ids[group.0 as usize],
                        target = %self.ids[target.0 as usize],
                        %doc_type,
                        %permission,
                        "retract permission"
                    );
                }
            }
            self.layers.retain(|_, layer| !layer.is_empty());
        }
    }

    /// Clear all state and load the given groups.
    pub fn rebuild(&mut self, groups: impl IntoIterator<Item = GroupDocument>) {
        *self = Self::from_groups(groups);
    }

    /// Propagated permissions of a single group.
    pub fn propagated(&self, group_id: &GroupId) -> PropagatedMap {
        let mut map = PropagatedMap::new();
        let Some(idx) = self.lookup(group_id) else {
            return map;
        };
        self.collect_propagated(idx, &mut map);
        map
    }

    /// Merged access of all given groups, for example the memberships of a user.
    ///
    /// Unknown group ids are ignored.
    pub fn access_map<'a>(&self, group_ids: impl IntoIterator<Item = &'a GroupId>) -> AccessMap {
        let mut map = PropagatedMap::new();
        for group_id in group_ids {
            if let Some(idx) = self.lookup(group_id) {
                self.collect_propagated(idx, &mut map);
            }
        }
        AccessMap::from(map)
    }

    /// Direct ACL targets of `group_id` through which it holds `permission` on `target`.
    ///
    /// Returns an empty list when the permission is not held.
    pub fn justifications(
        &self,
        group_id: &GroupId,
        doc_type: DocType,
        permission: AclPermission,
        target: &GroupId,
    ) -> Vec<GroupId> {
        let (Some(group), Some(target)) = (self.lookup(group_id), self.lookup(target)) else {
            return Vec::new();
        };

        let mut requestors: Vec<_> = self
            .layers
            .get(&(doc_type, permission))
            .and_then(|layer| layer.requestors(group, target))
            .map(|requestors| requestors.iter().map(|idx| self.id(*idx).clone()).collect())
            .unwrap_or_default();
        requestors.sort();
        requestors
    }

    fn collect_propagated(&self, idx: GroupIdx, map: &mut PropagatedMap) {
        for ((doc_type, permission), layer) in &self.layers {
            let mut targets = layer.closure(idx).peekable();
            if targets.peek().is_none() {
                continue;
            }

            map.entry(*doc_type)
                .or_default()
                .entry(*permission)
                .or_default()
                .extend(targets.map(|target| self.id(target).clone()));
        }
    }

    /// Replace the declared ACL of a group and update all layers with the difference.
    fn apply_acl(&mut self, source: GroupIdx, acl: BTreeMap<(DocType, GroupIdx), PermissionSet>) {
        let Some(node) = self.groups.get_mut(&source) else {
            return;
        };
        let previous = std::mem::replace(&mut node.acl, acl.clone());

        let empty = PermissionSet::new();
        let keys: BTreeSet<_> = previous.keys().chain(acl.keys()).copied().collect();

        for (doc_type, target) in keys {
            let before = previous.get(&(doc_type, target)).unwrap_or(&empty);
            let after = acl.get(&(doc_type, target)).unwrap_or(&empty);

            if !self.groups.contains_key(&target) {
                for permission in after.difference(before) {
                    debug!(
                        source = %self.id(source),
                        target = %self.id(target),
                        %doc_type,
                        %permission,
                        "acl entry references unknown group"
                    );
                }
                if after.is_empty() {
                    self.unmark_pending(source, doc_type, target);
                } else {
                    self.pending
                        .entry(target)
                        .or_default()
                        .insert((source, doc_type));
                }
                continue;
            }

            for permission in after.difference(before) {
                debug!(
                    source = %self.id(source),
                    target = %self.id(target),
                    %doc_type,
                    %permission,
                    "add acl edge"
                );
                self.layer_mut(doc_type, *permission)
                    .add_edge(source, target);
            }

            for permission in before.difference(after) {
                let Some(layer) = self.layers.get_mut(&(doc_type, *permission)) else {
                    continue;
                };

                debug!(
                    source = %self.ids[source.0 as usize],
                    target = %self.ids[target.0 as usize],
                    %doc_type,
                    %permission,
                    "remove acl edge"
                );
                for (group, retracted) in layer.remove_edge(source, target) {
                    trace!(
                        group = %self.ids[group.0 as usize],
                        target = %self.ids[retracted.0 as usize],
                        %doc_type,
                        %permission,
                        "retract permission"
                    );
                }
                if layer.is_empty() {
                    self.layers.remove(&(doc_type, *permission));
                }
            }
        }
    }

    fn unmark_pending(&mut self, source: GroupIdx, doc_type: DocType, target: GroupIdx) {
        if let Some(sources) = self.pending.get_mut(&target) {
            sources.remove(&(source, doc_type));
            if sources.is_empty() {
                self.pending.remove(&target);
            }
        }
    }

    fn acl_map(&mut self, entries: &[AclEntry]) -> BTreeMap<(DocType, GroupIdx), PermissionSet> {
        let mut acl: BTreeMap<(DocType, GroupIdx), PermissionSet> = BTreeMap::new();
        for entry in entries {
            if entry.permission.is_empty() {
                continue;
            }
            let target = self.intern(&entry.group_id);
            acl.entry((entry.doc_type, target))
                .or_default()
                .extend(entry.permission.iter().copied());
        }
        acl
    }

    fn layer_mut(&mut self, doc_type: DocType, permission: AclPermission) -> &mut PermissionLayer {
        self.layers.entry((doc_type, permission)).or_default()
    }

    fn node(&self, group_id: &GroupId) -> Option<&GroupNode> {
        self.lookup(group_id).and_then(|idx| self.groups.get(&idx))
    }

    fn lookup(&self, group_id: &GroupId) -> Option<GroupIdx> {
        self.index.get(group_id).copied()
    }

    fn intern(&mut self, group_id: &GroupId) -> GroupIdx {
        if let Some(idx) = self.index.get(group_id) {
            return *idx;
        }
        let idx = GroupIdx(self.ids.len() as u32);
        self.ids.push(group_id.clone());
        self.index.insert(group_id.clone(), idx);
        idx
    }

    fn id(&self, idx: GroupIdx) -> &GroupId {
        &self.ids[idx.0 as usize]
    }
}
