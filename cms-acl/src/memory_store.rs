// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory document store.
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
#[cfg(feature = "processor")]
use tokio::sync::broadcast;
#[cfg(feature = "processor")]
use tracing::trace;

use crate::document::{DocType, Document, GroupDocument};
#[cfg(feature = "processor")]
use crate::document::GroupId;
#[cfg(feature = "processor")]
use crate::processor::GroupEvent;
use crate::traits::DocumentStore;

#[derive(Debug, Error)]
pub enum MemoryStoreError {}

/// Document store keeping all documents in memory.
///
/// Clones share the same documents. When an event sender is attached every change to a group
/// document is announced as a [`GroupEvent`](crate::GroupEvent), similar to the change feed of
/// a real database.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    documents: Arc<RwLock<HashMap<String, Document>>>,

    #[cfg(feature = "processor")]
    events: Option<broadcast::Sender<GroupEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce group changes on the given channel.
    #[cfg(feature = "processor")]
    pub fn with_events(mut self, events: broadcast::Sender<GroupEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Insert or replace a document.
    ///
    /// Replacing a group with a document of another type announces the group as removed.
    pub fn insert(&self, document: Document) {
        #[cfg(feature = "processor")]
        let group = GroupDocument::try_from(&document).ok();

        let previous = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document.id.clone(), document);

        #[cfg(feature = "processor")]
        match (group, previous) {
            (Some(group), _) => self.announce(GroupEvent::Updated(group)),
            (None, Some(previous)) if previous.doc_type == DocType::Group => {
                self.announce(GroupEvent::Removed(GroupId::new(previous.id)));
            }
            _ => (),
        }

        #[cfg(not(feature = "processor"))]
        drop(previous);
    }

    /// Remove a document, returning it when it existed.
    pub fn remove(&self, id: &str) -> Option<Document> {
        let removed = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);

        #[cfg(feature = "processor")]
        if let Some(document) = &removed {
            if document.doc_type == DocType::Group {
                self.announce(GroupEvent::Removed(GroupId::new(document.id.as_str())));
            }
        }

        removed
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(feature = "processor")]
    fn announce(&self, event: GroupEvent) {
        let Some(events) = &self.events else {
            return;
        };
        if events.send(event).is_err() {
            trace!("no subscriber for group event");
        }
    }
}

impl DocumentStore for MemoryStore {
    type Error = MemoryStoreError;

    fn get_groups(&self) -> Result<Vec<GroupDocument>, Self::Error> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        let mut groups: Vec<_> = documents
            .values()
            .filter(|document| document.doc_type == DocType::Group)
            .filter_map(|document| GroupDocument::try_from(document).ok())
            .collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(groups)
    }

    fn get_document(&self, id: &str) -> Result<Option<Document>, Self::Error> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Ok(documents.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use crate::access::AclPermission;
    use crate::document::{DocType, Document, GroupDocument, GroupId};
    use crate::traits::DocumentStore;

    use super::MemoryStore;

    #[test]
    fn groups_and_documents() {
        let store = MemoryStore::new();
        store.insert(GroupDocument::new("b").into());
        store.insert(
            GroupDocument::new("a")
                .grant(DocType::Post, "b", [AclPermission::View])
                .into(),
        );
        store.insert(Document::new("post-1", DocType::Post).with_member_of(["a"]));

        let groups = store.get_groups().unwrap();
        assert_eq!(
            groups.iter().map(|group| group.id.clone()).collect::<Vec<_>>(),
            vec![GroupId::from("a"), GroupId::from("b")]
        );
        assert_eq!(groups[0].acl.len(), 1);

        let post = store.get_document("post-1").unwrap().unwrap();
        assert_eq!(post.member_of, vec![GroupId::from("a")]);
        assert!(store.get_document("post-2").unwrap().is_none());

        // Clones share their documents.
        let clone = store.clone();
        assert!(clone.remove("post-1").is_some());
        assert!(store.remove("post-1").is_none());
        assert_eq!(store.len(), 2);
    }

    #[cfg(feature = "processor")]
    #[test]
    fn announce_group_changes() {
        use tokio::sync::broadcast;

        use crate::processor::GroupEvent;

        let (tx, mut rx) = broadcast::channel(16);
        let store = MemoryStore::new().with_events(tx);

        store.insert(GroupDocument::new("a").into());
        store.insert(Document::new("post-1", DocType::Post).with_member_of(["a"]));
        store.remove("post-1");
        store.remove("a");

        // Overwriting a group with another document type removes the group.
        store.insert(GroupDocument::new("b").into());
        store.insert(Document::new("b", DocType::Post).with_member_of(["a"]));
        store.insert(Document::new("b", DocType::Tag).with_member_of(["a"]));

        assert_eq!(
            rx.try_recv().unwrap(),
            GroupEvent::Updated(GroupDocument::new("a"))
        );
        assert_eq!(rx.try_recv().unwrap(), GroupEvent::Removed("a".into()));
        assert_eq!(
            rx.try_recv().unwrap(),
            GroupEvent::Updated(GroupDocument::new("b"))
        );
        assert_eq!(rx.try_recv().unwrap(), GroupEvent::Removed("b".into()));
        assert!(rx.try_recv().is_err());
        assert!(store.get_groups().unwrap().is_empty());
    }
}
