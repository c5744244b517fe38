// SPDX-License-Identifier: MIT OR Apache-2.0

//! Documents as they are stored in the shared document database.
//!
//! Only the fields relevant for authorization are typed, everything else is kept as raw JSON in
//! `fields` so documents survive a round-trip through this crate unchanged.
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::access::{AclPermission, PermissionSet};

/// Identifier of a group document.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GroupId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for GroupId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for GroupId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Types of documents known to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocType {
    Group,
    User,
    Post,
    Tag,
    Content,
    Language,
    Redirect,
    Storage,
    AuthProvider,
}

impl DocType {
    /// Return `true` if documents of this type can be the parent of a content document.
    pub fn is_content_parent(&self) -> bool {
        matches!(self, DocType::Post | DocType::Tag)
    }
}

impl Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocType::Group => "group",
            DocType::User => "user",
            DocType::Post => "post",
            DocType::Tag => "tag",
            DocType::Content => "content",
            DocType::Language => "language",
            DocType::Redirect => "redirect",
            DocType::Storage => "storage",
            DocType::AuthProvider => "authProvider",
        };

        write!(f, "{}", s)
    }
}

/// A directed grant stored on a group: the owning group holds `permission` on documents of type
/// `doc_type` which belong to `group_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    #[serde(rename = "type")]
    pub doc_type: DocType,

    #[serde(rename = "groupId")]
    pub group_id: GroupId,

    #[serde(default)]
    pub permission: PermissionSet,
}

impl AclEntry {
    pub fn new(
        doc_type: DocType,
        group_id: impl Into<GroupId>,
        permission: impl IntoIterator<Item = AclPermission>,
    ) -> Self {
        Self {
            doc_type,
            group_id: group_id.into(),
            permission: permission.into_iter().collect(),
        }
    }
}

/// Publication state of a content document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Draft,
    Published,
}

/// Generic document of any type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "type")]
    pub doc_type: DocType,

    #[serde(rename = "memberOf", default, skip_serializing_if = "Vec::is_empty")]
    pub member_of: Vec<GroupId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acl: Vec<AclEntry>,

    #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Type of the parent document, content inherits access from the parent's type.
    #[serde(rename = "parentType", default, skip_serializing_if = "Option::is_none")]
    pub parent_type: Option<DocType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PublishStatus>,

    /// All remaining fields of the document.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, doc_type: DocType) -> Self {
        Self {
            id: id.into(),
            doc_type,
            member_of: Vec::new(),
            acl: Vec::new(),
            parent_id: None,
            parent_type: None,
            status: None,
            fields: Map::new(),
        }
    }

    pub fn with_member_of<I, G>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<GroupId>,
    {
        self.member_of = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parent(mut self, parent_type: DocType, parent_id: impl Into<String>) -> Self {
        self.parent_type = Some(parent_type);
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_status(mut self, status: PublishStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_acl(mut self, entry: AclEntry) -> Self {
        self.acl.push(entry);
        self
    }

    pub fn is_published(&self) -> bool {
        self.status == Some(PublishStatus::Published)
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("document {id} has type {doc_type}, expected a group")]
pub struct NotAGroupError {
    pub id: String,
    pub doc_type: DocType,
}

/// A group document: a set of users and content sharing the same access rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupDocument {
    #[serde(rename = "_id")]
    pub id: GroupId,

    #[serde(default)]
    pub acl: Vec<AclEntry>,
}

impl GroupDocument {
    pub fn new(id: impl Into<GroupId>) -> Self {
        Self {
            id: id.into(),
            acl: Vec::new(),
        }
    }

    /// Add an ACL entry granting `permission` on `doc_type` documents of `group_id`.
    pub fn grant(
        mut self,
        doc_type: DocType,
        group_id: impl Into<GroupId>,
        permission: impl IntoIterator<Item = AclPermission>,
    ) -> Self {
        self.acl.push(AclEntry::new(doc_type, group_id, permission));
        self
    }
}

impl TryFrom<&Document> for GroupDocument {
    type Error = NotAGroupError;

    fn try_from(document: &Document) -> Result<Self, Self::Error> {
        if document.doc_type != DocType::Group {
            return Err(NotAGroupError {
                id: document.id.clone(),
                doc_type: document.doc_type,
            });
        }

        Ok(Self {
            id: GroupId::new(document.id.clone()),
            acl: document.acl.clone(),
        })
    }
}

impl From<GroupDocument> for Document {
    fn from(group: GroupDocument) -> Self {
        let mut document = Document::new(group.id.as_str(), DocType::Group);
        document.acl = group.acl;
        document
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::access::AclPermission;

    use super::{DocType, Document, GroupDocument, GroupId, NotAGroupError, PublishStatus};

    #[test]
    fn parse_group_document() {
        let document: Document = serde_json::from_value(json!({
            "_id": "group-editors",
            "type": "group",
            "name": "Editors",
            "acl": [
                { "type": "post", "groupId": "group-public", "permission": ["view", "edit"] },
                { "type": "group", "groupId": "group-editors", "permission": ["view"] }
            ]
        }))
        .unwrap();

        assert_eq!(document.doc_type, DocType::Group);
        assert_eq!(document.fields.get("name"), Some(&json!("Editors")));

        let group = GroupDocument::try_from(&document).unwrap();
        assert_eq!(group.id, GroupId::from("group-editors"));
        assert_eq!(group.acl.len(), 2);
        assert_eq!(group.acl[0].doc_type, DocType::Post);
        assert!(group.acl[0].permission.contains(&AclPermission::Edit));
    }

    #[test]
    fn unknown_doc_type_is_rejected() {
        let result = serde_json::from_value::<Document>(json!({
            "_id": "x",
            "type": "spaceship",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn content_document_fields() {
        let document: Document = serde_json::from_value(json!({
            "_id": "content-1",
            "type": "content",
            "parentId": "post-1",
            "parentType": "post",
            "memberOf": ["group-a"],
            "status": "published",
            "language": "lang-en",
        }))
        .unwrap();

        assert_eq!(document.parent_id.as_deref(), Some("post-1"));
        assert_eq!(document.parent_type, Some(DocType::Post));
        assert!(document.is_published());
        assert_eq!(document.member_of, vec![GroupId::from("group-a")]);

        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["language"], json!("lang-en"));
        assert_eq!(value["status"], json!("published"));
        assert_eq!(value["parentType"], json!("post"));
    }

    #[test]
    fn only_group_documents_convert() {
        let post = Document::new("post-1", DocType::Post).with_status(PublishStatus::Draft);
        assert_eq!(
            GroupDocument::try_from(&post),
            Err(NotAGroupError {
                id: "post-1".into(),
                doc_type: DocType::Post
            })
        );
    }
}
