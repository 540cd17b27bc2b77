// ABOUTME: Builder for the gateway facade, from explicit values or from loaded settings
// ABOUTME: Collects session, segmentation and delivery options before the store is supplied

use crate::client::gateway::Gateway;
use crate::client::keepalive::KeepAliveConfig;
use crate::client::session::SessionConfig;
use crate::client::types::{BindCredentials, SubmitOptions};
use crate::config::Settings;
use crate::macros::builder_setters;
use crate::message::Segmenter;
use crate::store::{DeliveryKeys, DeliveryStore, Store};
use std::time::Duration;

/// Builder pattern for gateway configuration
///
/// ```rust
/// use smpp_gateway::client::{BindCredentials, GatewayBuilder};
/// use smpp_gateway::store::MemoryStore;
/// use std::time::Duration;
///
/// let gateway = GatewayBuilder::new("localhost", 2775, BindCredentials::transceiver("id", "pw"))
///     .delivery_timeout(Duration::from_secs(5))
///     .pack_gsm7(false)
///     .build(MemoryStore::new());
/// assert!(!gateway.state().is_bound());
/// ```
#[derive(Debug, Clone)]
pub struct GatewayBuilder {
    session: SessionConfig,
    keys: DeliveryKeys,
    pack_gsm7: bool,
    delivery_timeout: Duration,
}

impl GatewayBuilder {
    pub fn new(host: impl Into<String>, port: u16, credentials: BindCredentials) -> Self {
        Self {
            session: SessionConfig::new(host, port, credentials),
            keys: DeliveryKeys::default(),
            pack_gsm7: true,
            delivery_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            session: settings.smsc.session_config(),
            keys: Store::keys(&settings.store),
            pack_gsm7: settings.smsc.pack_gsm7,
            delivery_timeout: settings.smsc.delivery_timeout(),
        }
    }

    builder_setters! {
        keys: DeliveryKeys,
        pack_gsm7: bool,
        delivery_timeout: Duration,
    }

    pub fn submit_options(mut self, submit: SubmitOptions) -> Self {
        self.session.submit = submit;
        self
    }

    pub fn keep_alive(mut self, keep_alive: KeepAliveConfig) -> Self {
        self.session.keep_alive = keep_alive;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.session.response_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.session.connect_timeout = timeout;
        self
    }

    pub fn build<S: DeliveryStore>(self, store: S) -> Gateway<S> {
        Gateway::new(
            self.session,
            store,
            self.keys,
            Segmenter::new(self.pack_gsm7),
            self.delivery_timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn settings_flow_into_session() {
        let mut settings = Settings::default();
        settings.smsc.host = "10.0.0.5".into();
        settings.smsc.source_addr = "ACME".into();
        settings.store.sent_key = "custom:sent".into();

        let gateway = GatewayBuilder::from_settings(&settings).build(MemoryStore::new());
        let config = gateway.session().config();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.submit.source_addr, "ACME");
        assert_eq!(config.port, 2775);
    }
}
