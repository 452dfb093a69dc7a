//! Owned, shareable holder of the current catalog.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::catalog::{Catalog, CatalogError};

/// Holds the currently published [`Catalog`].
///
/// Starts unconfigured. A successful load swaps in the new catalog as a whole;
/// a failed load leaves whatever was published before. Readers get an
/// `Arc<Catalog>` snapshot that stays valid across later reloads.
#[derive(Debug, Default)]
pub struct CatalogStore {
    current: RwLock<Option<Arc<Catalog>>>,
    /// Serializes loads so two reloads cannot interleave their publish step.
    load_lock: Mutex<()>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current catalog, or `None` before the first successful load.
    pub fn current(&self) -> Option<Arc<Catalog>> {
        self.current.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    /// Decode a definitions document from `source` and publish it.
    pub fn load<R: Read>(&self, source: R) -> Result<Arc<Catalog>, CatalogError> {
        let _guard = self.load_lock.lock();
        self.publish(Catalog::from_reader(source))
    }

    /// Decode a definitions file and publish it.
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<Arc<Catalog>, CatalogError> {
        let _guard = self.load_lock.lock();
        self.publish(Catalog::from_path(path))
    }

    /// Publish an already built catalog.
    pub fn replace(&self, catalog: Catalog) -> Arc<Catalog> {
        let _guard = self.load_lock.lock();
        self.swap(catalog)
    }

    fn publish(&self, result: Result<Catalog, CatalogError>) -> Result<Arc<Catalog>, CatalogError> {
        match result {
            Ok(catalog) => Ok(self.swap(catalog)),
            Err(e) => {
                warn!(
                    error = %e,
                    loaded = self.is_loaded(),
                    "Catalog load failed, keeping previous definitions"
                );
                Err(e)
            }
        }
    }

    fn swap(&self, catalog: Catalog) -> Arc<Catalog> {
        let catalog = Arc::new(catalog);
        let previous = self.current.write().replace(catalog.clone());
        info!(
            definitions = catalog.len(),
            replaced = ?previous.map(|c| c.len()),
            "Published register catalog"
        );
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::sample;

    const ONE: &str = r#"[
        { "address": 1, "modbustype": "holding", "modbusaccess": "read", "valuetype": "uint16", "mqtt": "visible", "interval": 1, "topic": "a", "title": "A" }
    ]"#;

    #[test]
    fn test_unconfigured_store() {
        let store = CatalogStore::new();
        assert!(store.current().is_none());
        assert!(!store.is_loaded());
    }

    #[test]
    fn test_failed_first_load_stays_unconfigured() {
        let store = CatalogStore::new();
        assert!(store.load("[{}]".as_bytes()).is_err());
        assert!(store.current().is_none());
    }

    #[test]
    fn test_load_and_reload() {
        let store = CatalogStore::new();

        let first = store.load(ONE.as_bytes()).unwrap();
        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first, &store.current().unwrap()));

        let second = store.load("[]".as_bytes()).unwrap();
        assert!(second.is_empty());
        assert!(store.current().unwrap().is_empty());

        // Earlier snapshots are unaffected by the reload
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let store = CatalogStore::new();
        store.load(ONE.as_bytes()).unwrap();

        assert!(store.load("not json".as_bytes()).is_err());
        assert_eq!(store.current().unwrap().len(), 1);
    }

    #[test]
    fn test_replace() {
        let store = CatalogStore::new();
        let catalog = Catalog::from_definitions(vec![sample(7)]).unwrap();

        store.replace(catalog);
        assert!(store.current().unwrap().contains(7));
    }

    #[test]
    fn test_stores_are_isolated() {
        let a = CatalogStore::new();
        let b = CatalogStore::new();

        a.load(ONE.as_bytes()).unwrap();
        assert!(a.is_loaded());
        assert!(!b.is_loaded());
    }
}
