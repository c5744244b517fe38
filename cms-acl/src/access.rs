// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Permissions which an ACL entry can grant on the documents of another group.
///
/// Permissions are independent of each other: holding `Edit` does not imply `View`. Every
/// permission is propagated along its own layer of the group graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclPermission {
    /// Permission to read documents.
    View,

    /// Permission to create new documents.
    Create,

    /// Permission to modify existing documents.
    Edit,

    /// Permission to add or change translated content of a document.
    Translate,

    /// Permission to publish content.
    Publish,

    /// Permission to reference a group from another group's ACL.
    Assign,
}

impl AclPermission {
    /// All permissions in their canonical order.
    pub const ALL: [AclPermission; 6] = [
        AclPermission::View,
        AclPermission::Create,
        AclPermission::Edit,
        AclPermission::Translate,
        AclPermission::Publish,
        AclPermission::Assign,
    ];
}

impl Display for AclPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AclPermission::View => "view",
            AclPermission::Create => "create",
            AclPermission::Edit => "edit",
            AclPermission::Translate => "translate",
            AclPermission::Publish => "publish",
            AclPermission::Assign => "assign",
        };

        write!(f, "{}", s)
    }
}

/// Set of permissions granted by a single ACL entry.
pub type PermissionSet = BTreeSet<AclPermission>;
