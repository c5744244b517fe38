// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use crate::document::{Document, GroupDocument};

/// API of the shared document database as far as authorization is concerned.
pub trait DocumentStore {
    type Error: Error + Send + Sync + 'static;

    /// Get all group documents.
    fn get_groups(&self) -> Result<Vec<GroupDocument>, Self::Error>;

    /// Get a single document of any type.
    fn get_document(&self, id: &str) -> Result<Option<Document>, Self::Error>;
}
