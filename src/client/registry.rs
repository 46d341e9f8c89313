//! Client registry
//!
//! The single shared directory of registered clients. Every operation takes
//! the lock for exactly its own duration, so no caller ever sees a record
//! mid-update. Fan-out iterates a [`snapshot`](ClientRegistry::snapshot),
//! never the live map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::client::{ClientKey, ClientRecord, ProtocolFilter};

/// Shared registry handle; clones refer to the same directory.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<Mutex<HashMap<ClientKey, ClientRecord>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the record under its key, replacing any previous registration.
    ///
    /// Returns the replaced record, if any.
    pub async fn upsert(&self, record: ClientRecord) -> Option<ClientRecord> {
        let mut clients = self.clients.lock().await;
        clients.insert(*record.key(), record)
    }

    /// Replaces the status of an existing record.
    ///
    /// Returns the record's username when the update applied, `None` when
    /// the key is not registered.
    pub async fn update_status(&self, key: &ClientKey, status: impl Into<String>) -> Option<String> {
        let mut clients = self.clients.lock().await;
        clients.get_mut(key).map(|record| {
            record.set_status(status.into());
            record.username().to_string()
        })
    }

    /// Removes a record. Removing an absent key is not an error.
    pub async fn remove(&self, key: &ClientKey) -> Option<ClientRecord> {
        let mut clients = self.clients.lock().await;
        clients.remove(key)
    }

    /// Point-in-time copy of every record matching the filter.
    pub async fn snapshot(&self, filter: ProtocolFilter) -> Vec<ClientRecord> {
        let clients = self.clients.lock().await;
        clients
            .values()
            .filter(|record| filter.matches(record.protocol()))
            .cloned()
            .collect()
    }

    pub async fn get(&self, key: &ClientKey) -> Option<ClientRecord> {
        let clients = self.clients.lock().await;
        clients.get(key).cloned()
    }

    pub async fn contains(&self, key: &ClientKey) -> bool {
        let clients = self.clients.lock().await;
        clients.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    /// Removes and returns every record. Used at shutdown.
    pub async fn drain(&self) -> Vec<ClientRecord> {
        let mut clients = self.clients.lock().await;
        clients.drain().map(|(_, record)| record).collect()
    }
}
