//! # Driver Module
//!
//! Scheme-keyed driver registries for the graph-store and search-engine
//! backends. Registration is append-only; resolution walks drivers in
//! registration order and the first one accepting the URL scheme wins.

use crate::error::{BuilderError, Result};
use crate::model::SpgRecordManipulateCmd;
use crate::reason::GraphState;
use crate::schema::SpgTypeIdentifier;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Graph-store backend client.
pub trait GraphStoreClient: Send + Sync {
    fn manipulate_record(&self, cmd: &SpgRecordManipulateCmd) -> Result<()>;
}

/// One candidate returned by a search-engine lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub score: f64,
}

/// Search-engine backend client.
pub trait SearchEngineClient: Send + Sync {
    fn manipulate_record(&self, cmd: &SpgRecordManipulateCmd) -> Result<()>;

    /// Best textual matches for `text` among indexed records of `spg_type`,
    /// highest score first.
    fn search(&self, spg_type: &SpgTypeIdentifier, text: &str, top_k: usize)
        -> Result<Vec<SearchHit>>;
}

pub trait Driver: Send + Sync {
    fn driver_name(&self) -> &str;

    fn accepts_scheme(&self, scheme: &str) -> bool;
}

pub trait GraphStoreDriver: Driver {
    fn connect(&self, url: &str) -> Result<Arc<dyn GraphStoreClient>>;

    /// Read view over the same backend, handed to the rule evaluator.
    fn graph_state(&self, url: &str) -> Result<Arc<dyn GraphState>>;
}

pub trait SearchEngineDriver: Driver {
    fn connect(&self, url: &str) -> Result<Arc<dyn SearchEngineClient>>;
}

/// `scheme` of a `scheme://rest` URL.
pub fn url_scheme(url: &str) -> Option<&str> {
    url.split_once("://")
        .map(|(scheme, _)| scheme)
        .filter(|scheme| !scheme.is_empty())
}

/// Ordered, append-only driver list.
pub struct DriverRegistry<D: ?Sized> {
    drivers: RwLock<Vec<Arc<D>>>,
}

impl<D: ?Sized> Default for DriverRegistry<D> {
    fn default() -> Self {
        Self {
            drivers: RwLock::new(Vec::new()),
        }
    }
}

impl<D: Driver + ?Sized> DriverRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a driver. Returns `false` when a driver with the same name is
    /// already registered; the registry is left unchanged in that case.
    pub fn register(&self, driver: Arc<D>) -> bool {
        let mut drivers = self.drivers.write();
        if drivers
            .iter()
            .any(|existing| existing.driver_name() == driver.driver_name())
        {
            debug!(driver = driver.driver_name(), "driver already registered");
            return false;
        }
        info!(driver = driver.driver_name(), "registered driver");
        drivers.push(driver);
        true
    }

    pub fn resolve(&self, url: &str) -> Result<Arc<D>> {
        let scheme =
            url_scheme(url).ok_or_else(|| BuilderError::DriverNotFound(url.to_string()))?;
        self.drivers
            .read()
            .iter()
            .find(|driver| driver.accepts_scheme(scheme))
            .cloned()
            .ok_or_else(|| BuilderError::DriverNotFound(url.to_string()))
    }

    pub fn len(&self) -> usize {
        self.drivers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Both backend registries, shared by the context.
#[derive(Default)]
pub struct Drivers {
    pub graph_store: DriverRegistry<dyn GraphStoreDriver>,
    pub search_engine: DriverRegistry<dyn SearchEngineDriver>,
}

impl Drivers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registries pre-populated with the in-memory `memory://` backends.
    pub fn with_memory_drivers() -> Self {
        let drivers = Self::new();
        drivers
            .graph_store
            .register(Arc::new(crate::store::MemoryGraphStoreDriver::new()));
        drivers
            .search_engine
            .register(Arc::new(crate::index::MemorySearchEngineDriver::new()));
        drivers
    }

    pub fn graph_store_client(&self, url: &str) -> Result<Arc<dyn GraphStoreClient>> {
        self.graph_store.resolve(url)?.connect(url)
    }

    pub fn graph_state(&self, url: &str) -> Result<Arc<dyn GraphState>> {
        self.graph_store.resolve(url)?.graph_state(url)
    }

    pub fn search_engine_client(&self, url: &str) -> Result<Arc<dyn SearchEngineClient>> {
        self.search_engine.resolve(url)?.connect(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedDriver {
        name: &'static str,
        scheme: &'static str,
    }

    impl Driver for NamedDriver {
        fn driver_name(&self) -> &str {
            self.name
        }

        fn accepts_scheme(&self, scheme: &str) -> bool {
            scheme == self.scheme
        }
    }

    #[test]
    fn test_url_scheme() {
        assert_eq!(url_scheme("memory://graph"), Some("memory"));
        assert_eq!(url_scheme("tugraph://10.0.0.1:9090"), Some("tugraph"));
        assert_eq!(url_scheme("no-scheme"), None);
        assert_eq!(url_scheme("://x"), None);
    }

    #[test]
    fn test_first_registered_match_wins() {
        let registry: DriverRegistry<dyn Driver> = DriverRegistry::new();
        registry.register(Arc::new(NamedDriver {
            name: "first",
            scheme: "mem",
        }));
        registry.register(Arc::new(NamedDriver {
            name: "second",
            scheme: "mem",
        }));
        let driver = registry.resolve("mem://x").unwrap();
        assert_eq!(driver.driver_name(), "first");
    }

    #[test]
    fn test_duplicate_registration_is_noop() {
        let registry: DriverRegistry<dyn Driver> = DriverRegistry::new();
        assert!(registry.register(Arc::new(NamedDriver {
            name: "mem",
            scheme: "mem",
        })));
        assert!(!registry.register(Arc::new(NamedDriver {
            name: "mem",
            scheme: "other",
        })));
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve("other://x").is_err());
    }

    #[test]
    fn test_unknown_scheme_is_fatal() {
        let drivers = Drivers::with_memory_drivers();
        let err = drivers.graph_store_client("neo4j://localhost").err().unwrap();
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "cannot find driver for neo4j://localhost");
        assert!(drivers.search_engine_client("memory://search").is_ok());
    }
}
