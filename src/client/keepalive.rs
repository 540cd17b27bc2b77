// ABOUTME: SMPP keep-alive bookkeeping for idle links
// ABOUTME: Decides when the receive loop sends enquire_link and when the link counts as dead

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Configuration for SMPP keep-alive functionality
///
/// Controls the enquire_link PDUs the connection sends on its own when no
/// traffic has been written for `interval`. Carriers drop idle binds, so this
/// is enabled by default.
///
/// # Example
///
/// ```rust
/// use smpp_gateway::client::KeepAliveConfig;
/// use std::time::Duration;
///
/// // Default configuration (30s interval, 10s timeout, 3 max failures)
/// let config = KeepAliveConfig::default();
///
/// let config = KeepAliveConfig::new(Duration::from_secs(60))
///     .with_timeout(Duration::from_secs(15))
///     .with_max_failures(5);
/// assert_eq!(config.max_failures, 5);
///
/// let config = KeepAliveConfig::disabled();
/// assert!(!config.enabled);
/// ```
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    /// Idle time after which an enquire_link is sent (default: 30 seconds)
    pub interval: Duration,

    /// Time allowed for the enquire_link_resp (default: 10 seconds)
    pub timeout: Duration,

    /// Consecutive unanswered enquire_links before the link is declared lost (default: 3)
    pub max_failures: u32,

    /// When false, no enquire_link PDUs are sent automatically
    pub enabled: bool,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
            max_failures: 3,
            enabled: true,
        }
    }
}

impl KeepAliveConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Tracks idle time and outstanding enquire_link requests for one connection.
///
/// The receive loop owns the manager and drives it:
/// 1. `should_ping` with the time of the last outbound write
/// 2. `on_ping_sent` once the enquire_link is written
/// 3. `on_pong` when an enquire_link_resp arrives
/// 4. `check_timeout` on every tick; `is_connection_failed` ends the loop
#[derive(Debug)]
pub struct KeepAliveManager {
    config: KeepAliveConfig,
    /// Sequence number and send time of the unanswered enquire_link
    outstanding: Option<(u32, Instant)>,
    consecutive_failures: u32,
}

impl KeepAliveManager {
    pub fn new(config: KeepAliveConfig) -> Self {
        Self {
            config,
            outstanding: None,
            consecutive_failures: 0,
        }
    }

    /// True when the link has been idle for a full interval and no
    /// enquire_link is already in flight.
    pub fn should_ping(&self, now: Instant, last_write: Instant) -> bool {
        if !self.config.enabled || self.outstanding.is_some() || self.is_connection_failed() {
            return false;
        }
        now.saturating_duration_since(last_write) >= self.config.interval
    }

    pub fn on_ping_sent(&mut self, sequence_number: u32, now: Instant) {
        self.outstanding = Some((sequence_number, now));
        debug!(sequence_number, "Keep-alive enquire_link sent");
    }

    /// Record an enquire_link_resp. Returns false if it answers something
    /// other than the outstanding keep-alive.
    pub fn on_pong(&mut self, sequence_number: u32) -> bool {
        match self.outstanding {
            Some((expected, _)) if expected == sequence_number => {
                self.outstanding = None;
                self.consecutive_failures = 0;
                debug!(sequence_number, "Keep-alive answered");
                true
            }
            _ => false,
        }
    }

    /// Expire the outstanding enquire_link if its response is overdue.
    /// Returns true when a failure was recorded.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        match self.outstanding {
            Some((sequence_number, sent_at))
                if now.saturating_duration_since(sent_at) >= self.config.timeout =>
            {
                self.outstanding = None;
                self.consecutive_failures += 1;
                warn!(
                    sequence_number,
                    consecutive_failures = self.consecutive_failures,
                    "Keep-alive enquire_link unanswered"
                );
                true
            }
            _ => false,
        }
    }

    /// Any inbound PDU proves the peer is alive
    pub fn reset_failures(&mut self) {
        if self.consecutive_failures > 0 {
            debug!("Resetting {} consecutive failures", self.consecutive_failures);
            self.consecutive_failures = 0;
        }
    }

    pub fn is_connection_failed(&self) -> bool {
        self.config.enabled && self.consecutive_failures >= self.config.max_failures
    }

    /// Next instant at which the manager has something to decide
    pub fn next_deadline(&self, last_write: Instant) -> Option<Instant> {
        if !self.config.enabled {
            return None;
        }
        Some(match self.outstanding {
            Some((_, sent_at)) => sent_at + self.config.timeout,
            None => last_write + self.config.interval,
        })
    }
}
