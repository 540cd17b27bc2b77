// ABOUTME: Delivery-state persistence: the DeliveryStore trait, key layout and backend choice
// ABOUTME: Writes are last-write-wins flags per destination; failures are logged, never fatal

//! Delivery-state store.
//!
//! Two flags are written per destination as sends progress:
//!
//! ```text
//! <sent-prefix>/<msisdn>       = "true"   once the SMSC accepted a segment
//! <delivered-prefix>/<msisdn>  = "true"   once a delivery receipt arrived
//! ```
//!
//! - [`MemoryStore`]: in-process map, the default and what the tests use
//! - [`RedisStore`]: Redis over a multiplexed tokio connection

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use crate::config::{StoreBackend, StoreSettings};
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value sink for delivery flags
pub trait DeliveryStore: Send + Sync + 'static {
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Key prefixes for the sent and delivered flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryKeys {
    pub sent_prefix: String,
    pub delivered_prefix: String,
}

impl Default for DeliveryKeys {
    fn default() -> Self {
        Self {
            sent_prefix: "smpp:is_sent".to_string(),
            delivered_prefix: "smpp:is_delivered".to_string(),
        }
    }
}

impl DeliveryKeys {
    pub fn sent(&self, destination: &str) -> String {
        format!("{}/{}", self.sent_prefix, destination)
    }

    pub fn delivered(&self, destination: &str) -> String {
        format!("{}/{}", self.delivered_prefix, destination)
    }
}

/// Backend chosen at startup from settings
#[derive(Debug, Clone)]
pub enum Store {
    Memory(MemoryStore),
    Redis(RedisStore),
}

impl Store {
    pub fn from_settings(settings: &StoreSettings) -> Result<Store, StoreError> {
        match settings.backend {
            StoreBackend::Memory => {
                tracing::info!("using in-memory delivery store (volatile)");
                Ok(Store::Memory(MemoryStore::new()))
            }
            StoreBackend::Redis => {
                let store = RedisStore::open(
                    &settings.host,
                    settings.port,
                    settings.password.as_deref(),
                )?;
                tracing::info!(
                    host = %settings.host,
                    port = settings.port,
                    "using redis delivery store"
                );
                Ok(Store::Redis(store))
            }
        }
    }

    pub fn keys(settings: &StoreSettings) -> DeliveryKeys {
        DeliveryKeys {
            sent_prefix: settings.sent_key.clone(),
            delivered_prefix: settings.delivered_key.clone(),
        }
    }
}

impl DeliveryStore for Store {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            Store::Memory(store) => store.set(key, value).await,
            Store::Redis(store) => store.set(key, value).await,
        }
    }
}
