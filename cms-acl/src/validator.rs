// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authorization of proposed document mutations ("change requests").
use std::error::Error;

use thiserror::Error;
use tracing::debug;

use crate::access::AclPermission;
use crate::access_map::AccessMap;
use crate::document::{DocType, Document, GroupId};
use crate::traits::DocumentStore;

/// Reasons for rejecting a change request.
///
/// The `Display` output of every variant is the rejection message handed back to the client.
#[derive(Debug, Error)]
pub enum ChangeRequestError {
    #[error("no {permission} access to {doc_type} documents of group {group_id}")]
    MissingPermission {
        doc_type: DocType,
        permission: AclPermission,
        group_id: GroupId,
    },

    #[error("document {0} is not a member of any group")]
    NoGroupMembership(String),

    #[error("content document {0} has no parent")]
    MissingParent(String),

    #[error("content document {0} has no parent type")]
    MissingParentType(String),

    #[error("parent document {0} not found")]
    ParentNotFound(String),

    #[error("parent document {parent_id} has type {actual}, but {declared} was declared")]
    ParentTypeMismatch {
        parent_id: String,
        declared: DocType,
        actual: DocType,
    },

    #[error("parent document {parent_id} has type {doc_type}, expected a post or tag")]
    InvalidParent { parent_id: String, doc_type: DocType },

    #[error("failed to load document {0} from store")]
    Store(String, #[source] Box<dyn Error + Send + Sync>),
}

/// Check if the holder of `access` may write `document`.
///
/// - Group documents require `edit` on the group itself and `assign` on every group referenced in
///   its ACL.
/// - Content documents require `translate` on their parent post or tag (in every group of the
///   parent) and additionally `publish` when the content is published. The declared parent type
///   must match the stored parent.
/// - All other documents require `edit` in every group they are a member of, and in every group
///   the stored version of the document is a member of.
pub fn validate_change_request<S>(
    store: &S,
    document: &Document,
    access: &AccessMap,
) -> Result<(), ChangeRequestError>
where
    S: DocumentStore,
{
    let result = match document.doc_type {
        DocType::Group => validate_group(document, access),
        DocType::Content => validate_content(store, document, access),
        _ => validate_member_of(store, document, access),
    };

    result.inspect_err(|err| {
        debug!(
            document = %document.id,
            doc_type = %document.doc_type,
            %err,
            "reject change request"
        )
    })
}

fn require(
    access: &AccessMap,
    doc_type: DocType,
    group_id: &GroupId,
    permission: AclPermission,
) -> Result<(), ChangeRequestError> {
    if access.has_access(doc_type, group_id, permission) {
        Ok(())
    } else {
        Err(ChangeRequestError::MissingPermission {
            doc_type,
            permission,
            group_id: group_id.clone(),
        })
    }
}

fn validate_group(document: &Document, access: &AccessMap) -> Result<(), ChangeRequestError> {
    require(
        access,
        DocType::Group,
        &GroupId::new(document.id.as_str()),
        AclPermission::Edit,
    )?;

    for entry in &document.acl {
        require(access, DocType::Group, &entry.group_id, AclPermission::Assign)?;
    }

    Ok(())
}

fn validate_content<S>(
    store: &S,
    document: &Document,
    access: &AccessMap,
) -> Result<(), ChangeRequestError>
where
    S: DocumentStore,
{
    let Some(parent_id) = &document.parent_id else {
        return Err(ChangeRequestError::MissingParent(document.id.clone()));
    };
    let Some(declared) = document.parent_type else {
        return Err(ChangeRequestError::MissingParentType(document.id.clone()));
    };

    let parent = load(store, parent_id)?
        .ok_or_else(|| ChangeRequestError::ParentNotFound(parent_id.clone()))?;

    if !parent.doc_type.is_content_parent() {
        return Err(ChangeRequestError::InvalidParent {
            parent_id: parent.id,
            doc_type: parent.doc_type,
        });
    }

    // Queries select content by its declared parent type.
    if declared != parent.doc_type {
        return Err(ChangeRequestError::ParentTypeMismatch {
            parent_id: parent.id,
            declared,
            actual: parent.doc_type,
        });
    }

    if parent.member_of.is_empty() {
        return Err(ChangeRequestError::NoGroupMembership(parent.id));
    }

    for group_id in &parent.member_of {
        require(access, parent.doc_type, group_id, AclPermission::Translate)?;
        if document.is_published() {
            require(access, parent.doc_type, group_id, AclPermission::Publish)?;
        }
    }

    Ok(())
}

fn validate_member_of<S>(
    store: &S,
    document: &Document,
    access: &AccessMap,
) -> Result<(), ChangeRequestError>
where
    S: DocumentStore,
{
    if document.member_of.is_empty() {
        return Err(ChangeRequestError::NoGroupMembership(document.id.clone()));
    }

    for group_id in &document.member_of {
        require(access, document.doc_type, group_id, AclPermission::Edit)?;
    }

    // Moving a document out of a group requires edit access in that group as well.
    if let Some(previous) = load(store, &document.id)? {
        for group_id in previous
            .member_of
            .iter()
            .filter(|group_id| !document.member_of.contains(group_id))
        {
            require(access, previous.doc_type, group_id, AclPermission::Edit)?;
        }
    }

    Ok(())
}

fn load<S>(store: &S, id: &str) -> Result<Option<Document>, ChangeRequestError>
where
    S: DocumentStore,
{
    store
        .get_document(id)
        .map_err(|err| ChangeRequestError::Store(id.to_owned(), Box::new(err)))
}
