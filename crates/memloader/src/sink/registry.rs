//! Device-type to store routing.

use std::sync::Arc;

use indexmap::IndexMap;
use snafu::prelude::*;

use super::memcache::MemcacheStore;
use super::traits::Store;
use crate::config::StoreConfig;
use crate::error::{RoutingError, UnknownDeviceTypeSnafu};

/// Fixed mapping from device type to the store that owns it.
///
/// Built once before the run and only read afterwards.
#[derive(Default, Clone)]
pub struct StoreRegistry {
    stores: IndexMap<String, Arc<dyn Store>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One memcached store per configured device type.
    pub fn from_config(stores: &IndexMap<String, StoreConfig>) -> Self {
        stores
            .iter()
            .fold(Self::new(), |registry, (device_type, config)| {
                registry.with_store(
                    device_type.clone(),
                    Arc::new(MemcacheStore::new(&config.address, config.timeout())),
                )
            })
    }

    pub fn with_store(mut self, device_type: impl Into<String>, store: Arc<dyn Store>) -> Self {
        self.stores.insert(device_type.into(), store);
        self
    }

    /// Store responsible for `device_type`.
    pub fn route(&self, device_type: &str) -> Result<&dyn Store, RoutingError> {
        self.stores
            .get(device_type)
            .map(|store| store.as_ref())
            .context(UnknownDeviceTypeSnafu { device_type })
    }

    pub fn device_types(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.stores.iter().map(|(k, v)| (k, v.address())))
            .finish()
    }
}
