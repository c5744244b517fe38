// SPDX-License-Identifier: MIT OR Apache-2.0

//! Build database selectors which only match documents the holder of an access map may see.
//!
//! Selectors follow the Mongo-style query language of the document store:
//!
//! ```json
//! { "$or": [
//!     { "type": "group", "_id": { "$in": ["group-a"] } },
//!     { "type": "post", "memberOf": { "$elemMatch": { "$in": ["group-a", "group-b"] } } }
//! ] }
//! ```
use serde_json::{Value, json};

use crate::access::AclPermission;
use crate::access_map::AccessMap;
use crate::document::DocType;

/// Document types whose access is decided by the groups of their parent.
const CONTENT_PARENT_TYPES: [DocType; 2] = [DocType::Post, DocType::Tag];

/// Selector clause for a single document type, `None` if no document of that type is accessible.
///
/// Content documents are matched per parent type, access to tags never selects content below a
/// post of the same group.
pub fn type_selector(
    access: &AccessMap,
    doc_type: DocType,
    permission: AclPermission,
) -> Option<Value> {
    any_of(clauses(access, doc_type, permission))
}

/// Selector matching every accessible document of the given types.
///
/// Returns `None` when nothing is accessible, callers should skip the query altogether.
pub fn selector(
    access: &AccessMap,
    types: &[DocType],
    permission: AclPermission,
) -> Option<Value> {
    any_of(
        types
            .iter()
            .flat_map(|doc_type| clauses(access, *doc_type, permission))
            .collect(),
    )
}

fn clauses(access: &AccessMap, doc_type: DocType, permission: AclPermission) -> Vec<Value> {
    match doc_type {
        DocType::Group => {
            let groups = access.calculate_access(&[DocType::Group], permission);
            if groups.is_empty() {
                return Vec::new();
            }
            vec![json!({
                "type": doc_type,
                "_id": { "$in": groups },
            })]
        }
        DocType::Content => CONTENT_PARENT_TYPES
            .iter()
            .filter_map(|parent_type| {
                let groups = access.calculate_access(&[*parent_type], permission);
                (!groups.is_empty()).then(|| {
                    json!({
                        "type": doc_type,
                        "parentType": parent_type,
                        "memberOf": { "$elemMatch": { "$in": groups } },
                    })
                })
            })
            .collect(),
        _ => {
            let groups = access.calculate_access(&[doc_type], permission);
            if groups.is_empty() {
                return Vec::new();
            }
            vec![json!({
                "type": doc_type,
                "memberOf": { "$elemMatch": { "$in": groups } },
            })]
        }
    }
}

fn any_of(mut clauses: Vec<Value>) -> Option<Value> {
    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(json!({ "$or": clauses })),
    }
}
