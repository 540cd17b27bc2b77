// ABOUTME: Gateway facade used by the HTTP layer: connect, disconnect and send-with-outcome
// ABOUTME: Retries a failed send once, reconnecting first when the session was lost or unbound

use crate::client::error::{SmppError, SmppResult};
use crate::client::session::{Session, SessionConfig};
use crate::client::tracker::DeliveryTracker;
use crate::client::types::{SendOutcome, SessionState};
use crate::message::Segmenter;
use crate::store::{DeliveryKeys, DeliveryStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Single entry point for sending SMS through one SMSC session
pub struct Gateway<S> {
    session: Session<DeliveryTracker<S>>,
    tracker: Arc<DeliveryTracker<S>>,
    delivery_timeout: Duration,
}

impl<S: DeliveryStore> Gateway<S> {
    pub fn new(
        config: SessionConfig,
        store: S,
        keys: DeliveryKeys,
        segmenter: Segmenter,
        delivery_timeout: Duration,
    ) -> Self {
        let tracker = Arc::new(DeliveryTracker::new(store, keys, segmenter));
        Self {
            session: Session::new(config, tracker.clone()),
            tracker,
            delivery_timeout,
        }
    }

    /// Connect and bind
    pub async fn connect(&self) -> SmppResult<()> {
        self.session.connect().await?;
        self.session.bind().await
    }

    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &Session<DeliveryTracker<S>> {
        &self.session
    }

    pub fn tracker(&self) -> &DeliveryTracker<S> {
        &self.tracker
    }

    /// Send `text` and wait for delivery. Never fails: errors become a
    /// failed outcome with a diagnostic message.
    pub async fn send(&self, destination: &str, text: &str) -> SendOutcome {
        let error = match self.attempt(destination, text).await {
            Ok(()) => return SendOutcome::success(),
            Err(error) => error,
        };

        // Bad input fails the same way every time
        if matches!(error, SmppError::InvalidData(_)) {
            return SendOutcome::from(&error);
        }

        warn!(destination, error = %error, "Send failed, retrying once");
        if needs_reconnect(&error) {
            if let Err(e) = self.reconnect().await {
                warn!(error = %e, "Reconnect failed");
                return SendOutcome::from(&e);
            }
        }

        match self.attempt(destination, text).await {
            Ok(()) => SendOutcome::success(),
            Err(error) => {
                warn!(destination, error = %error, "Send failed after retry");
                SendOutcome::from(&error)
            }
        }
    }

    async fn attempt(&self, destination: &str, text: &str) -> SmppResult<()> {
        self.tracker
            .send_and_wait(&self.session, destination, text, self.delivery_timeout)
            .await
    }

    async fn reconnect(&self) -> SmppResult<()> {
        info!(state = %self.state(), "Reconnecting to SMSC");
        self.connect().await
    }
}

fn needs_reconnect(error: &SmppError) -> bool {
    matches!(error, SmppError::WrongState { .. }) || error.is_connection_failure()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BindCredentials;
    use crate::store::MemoryStore;

    #[test]
    fn reconnect_only_for_state_and_transport_failures() {
        assert!(needs_reconnect(&SmppError::WrongState {
            operation: "submit",
            state: "OPEN".into()
        }));
        assert!(needs_reconnect(&SmppError::ConnectionLost("eof".into())));
        assert!(!needs_reconnect(&SmppError::Timeout));
    }

    #[tokio::test]
    async fn unreachable_smsc_reports_connection_failure() {
        // Port 9 on loopback is closed in test environments
        let mut config = SessionConfig::new(
            "127.0.0.1",
            9,
            BindCredentials::transceiver("id", "pw"),
        );
        config.connect_timeout = Duration::from_secs(2);
        let gateway = Gateway::new(
            config,
            MemoryStore::new(),
            DeliveryKeys::default(),
            Segmenter::default(),
            Duration::from_secs(1),
        );

        let outcome = gateway.send("06304988888", "Hello").await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.code, SendOutcome::CONNECTION_FAILURE_CODE);
        assert_eq!(gateway.state(), SessionState::Closed);
    }
}
