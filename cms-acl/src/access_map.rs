// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::access::AclPermission;
use crate::document::{DocType, GroupId};
use crate::registry::PropagatedMap;

/// Snapshot of everything a user may do, merged across all groups the user belongs to.
///
/// Access maps are derived per request from the [`PermissionRegistry`](crate::PermissionRegistry)
/// and never persisted. They serialize to the nested JSON object
/// `{ docType: { permission: [groupId] } }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessMap(PropagatedMap);

impl AccessMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Groups on which the permission is held for any of the given document types.
    ///
    /// The result is sorted and free of duplicates.
    pub fn calculate_access(&self, types: &[DocType], permission: AclPermission) -> Vec<GroupId> {
        let groups: BTreeSet<&GroupId> = types
            .iter()
            .filter_map(|doc_type| self.groups(*doc_type, permission))
            .flatten()
            .collect();
        groups.into_iter().cloned().collect()
    }

    /// Return `true` if the permission is held on documents of `doc_type` in `group_id`.
    pub fn has_access(
        &self,
        doc_type: DocType,
        group_id: &GroupId,
        permission: AclPermission,
    ) -> bool {
        self.groups(doc_type, permission)
            .is_some_and(|groups| groups.contains(group_id))
    }

    /// Return `true` if the permission is held in every given group.
    ///
    /// An empty list of groups is never accessible.
    pub fn has_access_to_all<'a>(
        &self,
        doc_type: DocType,
        group_ids: impl IntoIterator<Item = &'a GroupId>,
        permission: AclPermission,
    ) -> bool {
        let mut group_ids = group_ids.into_iter().peekable();
        if group_ids.peek().is_none() {
            return false;
        }
        group_ids.all(|group_id| self.has_access(doc_type, group_id, permission))
    }

    /// Return `true` if the permission is held in at least one of the given groups.
    pub fn has_access_to_any<'a>(
        &self,
        doc_type: DocType,
        group_ids: impl IntoIterator<Item = &'a GroupId>,
        permission: AclPermission,
    ) -> bool {
        group_ids
            .into_iter()
            .any(|group_id| self.has_access(doc_type, group_id, permission))
    }

    /// Add all permissions of another access map to this one.
    pub fn merge(&mut self, other: AccessMap) {
        for (doc_type, permissions) in other.0 {
            let entry = self.0.entry(doc_type).or_default();
            for (permission, groups) in permissions {
                entry.entry(permission).or_default().extend(groups);
            }
        }
    }

    /// Grant a single permission. Mostly useful to hand-craft access maps in tests.
    pub fn insert(&mut self, doc_type: DocType, permission: AclPermission, group_id: GroupId) {
        self.0
            .entry(doc_type)
            .or_default()
            .entry(permission)
            .or_default()
            .insert(group_id);
    }

    fn groups(&self, doc_type: DocType, permission: AclPermission) -> Option<&BTreeSet<GroupId>> {
        self.0
            .get(&doc_type)
            .and_then(|permissions| permissions.get(&permission))
    }
}

impl From<PropagatedMap> for AccessMap {
    fn from(map: PropagatedMap) -> Self {
        Self(map)
    }
}

impl From<AccessMap> for BTreeMap<DocType, BTreeMap<AclPermission, BTreeSet<GroupId>>> {
    fn from(map: AccessMap) -> Self {
        map.0
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::access::AclPermission::{Edit, Publish, View};
    use crate::document::DocType::{Post, Tag};
    use crate::test_utils::group_ids;

    use super::AccessMap;

    fn access_map() -> AccessMap {
        let mut map = AccessMap::new();
        map.insert(Post, Edit, "b".into());
        map.insert(Post, Edit, "a".into());
        map.insert(Tag, Edit, "a".into());
        map.insert(Tag, Edit, "c".into());
        map.insert(Post, View, "d".into());
        map
    }

    #[test]
    fn calculate_access_is_sound_and_complete() {
        let map = access_map();

        assert_eq!(map.calculate_access(&[Post], Edit), group_ids(&["a", "b"]));
        assert_eq!(map.calculate_access(&[Post, Tag], Edit), group_ids(&["a", "b", "c"]));
        assert_eq!(map.calculate_access(&[Tag, Post], View), group_ids(&["d"]));
        assert!(map.calculate_access(&[Tag], Publish).is_empty());
        assert!(map.calculate_access(&[], Edit).is_empty());
    }

    #[test]
    fn group_checks() {
        let map = access_map();
        let ids = group_ids(&["a", "b", "x"]);

        assert!(map.has_access(Post, &ids[0], Edit));
        assert!(!map.has_access(Post, &ids[2], Edit));
        assert!(map.has_access_to_all(Post, &ids[..2], Edit));
        assert!(!map.has_access_to_all(Post, &ids, Edit));
        assert!(!map.has_access_to_all(Post, &[], Edit));
        assert!(map.has_access_to_any(Post, &ids, Edit));
        assert!(!map.has_access_to_any(Tag, &ids[1..], Edit));
    }

    #[test]
    fn merge_and_serialize() {
        let mut map = AccessMap::new();
        map.insert(Post, View, "a".into());

        let mut other = AccessMap::new();
        other.insert(Post, View, "b".into());
        other.insert(Tag, Publish, "c".into());
        map.merge(other);

        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(
            value,
            json!({
                "post": { "view": ["a", "b"] },
                "tag": { "publish": ["c"] }
            })
        );

        let parsed: AccessMap = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, map);
    }
}
