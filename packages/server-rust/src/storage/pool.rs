//! Per-database store registry.
//!
//! [`StorePool`] hands out one shared [`DocumentStore`] per database name.
//! Stores are either registered up front or created on first use by the
//! pool's factory.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::error::StoreError;
use crate::traits::DocumentStore;

/// Creates a store for a database the pool has not seen yet. Returning
/// `None` marks the database as unknown.
pub type StoreFactory = Box<dyn Fn(&str) -> Option<Arc<dyn DocumentStore>> + Send + Sync>;

/// Registry of stores keyed by database name.
pub struct StorePool {
    stores: DashMap<String, Arc<dyn DocumentStore>>,
    factory: Option<StoreFactory>,
}

impl StorePool {
    /// Pool that only serves registered stores.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stores: DashMap::new(),
            factory: None,
        }
    }

    /// Pool that falls back to `factory` for unregistered databases.
    #[must_use]
    pub fn with_factory(factory: StoreFactory) -> Self {
        Self {
            stores: DashMap::new(),
            factory: Some(factory),
        }
    }

    /// Registers `store` under its own database name, replacing any earlier one.
    pub fn register(&self, store: Arc<dyn DocumentStore>) {
        let name = store.database_name().to_string();
        info!(database = %name, "store registered");
        self.stores.insert(name, store);
    }

    /// Store for `database`, created through the factory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownDatabase`] when the database is neither
    /// registered nor produced by the factory.
    pub fn get(&self, database: &str) -> Result<Arc<dyn DocumentStore>, StoreError> {
        if let Some(store) = self.stores.get(database) {
            return Ok(Arc::clone(store.value()));
        }
        let created = self
            .factory
            .as_ref()
            .and_then(|factory| factory(database))
            .ok_or_else(|| StoreError::UnknownDatabase(database.to_string()))?;
        let entry = self
            .stores
            .entry(database.to_string())
            .or_insert_with(|| created);
        Ok(Arc::clone(entry.value()))
    }

    /// Database names with a live store.
    #[must_use]
    pub fn databases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for StorePool {
    fn default() -> Self {
        Self::new()
    }
}
