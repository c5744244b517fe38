// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hierarchical group permissions for a multi-tenant content management system.
//!
//! Groups grant each other permissions on their documents through ACL entries. The
//! [`PermissionRegistry`] mirrors all groups of the document store and incrementally maintains
//! the transitive closure of these grants. Per request an [`AccessMap`] is derived from the
//! groups a user belongs to, which is then used to authorize change requests
//! ([`validate_change_request`]) and to restrict database queries ([`query::selector`]).
//!
//! With the `processor` feature the [`PermissionService`] keeps a shared registry in sync with the
//! group change feed of the store.
mod access;
mod access_map;
mod config;
pub mod document;
pub mod graph;
mod memory_store;
#[cfg(feature = "processor")]
mod processor;
pub mod query;
pub mod registry;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod traits;
mod validator;

pub use access::{AclPermission, PermissionSet};
pub use access_map::AccessMap;
pub use config::{Config, DEFAULT_EVENT_CAPACITY};
pub use document::{AclEntry, DocType, Document, GroupDocument, GroupId, PublishStatus};
pub use memory_store::{MemoryStore, MemoryStoreError};
#[cfg(feature = "processor")]
pub use processor::{GroupEvent, PermissionService, ProcessorError};
pub use registry::PermissionRegistry;
pub use validator::{ChangeRequestError, validate_change_request};
