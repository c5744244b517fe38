// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keep a shared permission registry in sync with the group change feed of the document store.
use std::error::Error;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::access_map::AccessMap;
use crate::config::Config;
use crate::document::{GroupDocument, GroupId};
use crate::registry::PermissionRegistry;
use crate::traits::DocumentStore;

/// Change of a group document in the store.
#[derive(Clone, Debug, PartialEq)]
pub enum GroupEvent {
    Updated(GroupDocument),
    Removed(GroupId),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("failed to load groups from store")]
    Store(#[source] Box<dyn Error + Send + Sync>),
}

/// Shared permission registry with a single writer applying group change events.
///
/// Readers take synchronous snapshots of the registry. Every event (or batch of events) is
/// applied under one write lock, readers never observe a half-applied batch.
#[derive(Clone, Debug)]
pub struct PermissionService {
    registry: Arc<RwLock<PermissionRegistry>>,
    config: Config,
}

impl PermissionService {
    pub fn new(config: Config) -> Self {
        Self {
            registry: Default::default(),
            config,
        }
    }

    /// Create the service and load all groups from the store.
    pub fn from_store<S>(store: &S, config: Config) -> Result<Self, ProcessorError>
    where
        S: DocumentStore,
    {
        let service = Self::new(config);
        service.load(store)?;
        Ok(service)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a group change feed channel with the configured capacity.
    pub fn channel(&self) -> (Sender<GroupEvent>, Receiver<GroupEvent>) {
        broadcast::channel(self.config.event_capacity)
    }

    /// Replace the registry with all groups currently held by the store.
    pub fn load<S>(&self, store: &S) -> Result<(), ProcessorError>
    where
        S: DocumentStore,
    {
        let groups = store
            .get_groups()
            .map_err(|err| ProcessorError::Store(Box::new(err)))?;
        info!(groups = groups.len(), "rebuild permission registry");
        self.write().rebuild(groups);
        Ok(())
    }

    /// Access map of a user who is a member of the given groups.
    pub fn access_map<'a>(&self, group_ids: impl IntoIterator<Item = &'a GroupId>) -> AccessMap {
        self.read().access_map(group_ids)
    }

    /// Read-only snapshot of the registry.
    pub fn read(&self) -> RwLockReadGuard<'_, PermissionRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a single group change.
    pub fn apply(&self, event: GroupEvent) {
        self.apply_batch([event]);
    }

    /// Apply a batch of group changes atomically.
    ///
    /// Consecutive updates are merged into one upsert batch so references between them resolve
    /// in any order.
    pub fn apply_batch(&self, events: impl IntoIterator<Item = GroupEvent>) {
        let mut registry = self.write();
        let mut updated = Vec::new();

        for event in events {
            match event {
                GroupEvent::Updated(group) => {
                    debug!(group = %group.id, "group updated");
                    updated.push(group);
                }
                GroupEvent::Removed(group_id) => {
                    debug!(group = %group_id, "group removed");
                    if !updated.is_empty() {
                        registry.upsert_groups(std::mem::take(&mut updated));
                    }
                    registry.remove_groups([&group_id]);
                }
            }
        }

        if !updated.is_empty() {
            registry.upsert_groups(updated);
        }
    }

    /// Apply all events currently buffered in the channel without waiting for new ones.
    ///
    /// Returns the number of applied events. When events were missed the registry is rebuilt
    /// from the store instead (if configured).
    pub fn apply_pending<S>(
        &self,
        store: &S,
        events: &mut Receiver<GroupEvent>,
    ) -> Result<usize, ProcessorError>
    where
        S: DocumentStore,
    {
        let mut pending = Vec::new();
        let mut skipped = 0;

        loop {
            match events.try_recv() {
                Ok(event) => pending.push(event),
                Err(TryRecvError::Lagged(count)) => skipped += count,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        if skipped > 0 {
            warn!(skipped, "group change feed lagged");
            if self.config.rebuild_on_lag {
                self.load(store)?;
                return Ok(0);
            }
        }

        let count = pending.len();
        self.apply_batch(pending);
        Ok(count)
    }

    /// Apply group changes until the change feed closes.
    pub async fn run<S>(
        &self,
        store: &S,
        mut events: Receiver<GroupEvent>,
    ) -> Result<(), ProcessorError>
    where
        S: DocumentStore,
    {
        loop {
            match events.recv().await {
                Ok(event) => self.apply(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "group change feed lagged");
                    if !self.config.rebuild_on_lag {
                        continue;
                    }

                    // Everything still buffered is already contained in the store.
                    let mut closed = false;
                    loop {
                        match events.try_recv() {
                            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Closed) => {
                                closed = true;
                                break;
                            }
                        }
                    }

                    self.load(store)?;
                    if closed {
                        return Ok(());
                    }
                }
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, PermissionRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}
