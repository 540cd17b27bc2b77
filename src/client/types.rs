// ABOUTME: Supporting types for the session and gateway: credentials, state and submit addressing
// ABOUTME: Also holds the send outcome and the result codes reported to HTTP callers

use crate::client::error::SmppError;
use crate::datatypes::{Address, BindType, InterfaceVersion, NumericPlanIndicator, TypeOfNumber};
use serde::Serialize;
use std::fmt;

/// SMPP bind operation credentials
///
/// Contains authentication information and bind type for establishing
/// SMPP sessions with the SMSC.
#[derive(Debug, Clone)]
pub struct BindCredentials {
    pub system_id: String,
    pub password: String,
    /// System type (optional, defaults to empty string)
    pub system_type: Option<String>,
    pub bind_type: BindType,
    pub interface_version: InterfaceVersion,
}

impl BindCredentials {
    pub fn transmitter(system_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_bind_type(BindType::Transmitter, system_id, password)
    }

    pub fn receiver(system_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_bind_type(BindType::Receiver, system_id, password)
    }

    pub fn transceiver(system_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_bind_type(BindType::Transceiver, system_id, password)
    }

    pub fn with_bind_type(
        bind_type: BindType,
        system_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            system_id: system_id.into(),
            password: password.into(),
            system_type: None,
            bind_type,
            interface_version: InterfaceVersion::SmppV34,
        }
    }

    pub fn with_system_type(mut self, system_type: impl Into<String>) -> Self {
        self.system_type = Some(system_type.into());
        self
    }
}

/// Bind state of one session
///
/// ```text
/// Closed -> Open -> BoundTx | BoundRx | BoundTrx -> Open -> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No transport
    #[default]
    Closed,
    /// TCP connected, not bound
    Open,
    BoundTx,
    BoundRx,
    BoundTrx,
}

impl SessionState {
    pub fn bound(bind_type: BindType) -> Self {
        match bind_type {
            BindType::Transmitter => SessionState::BoundTx,
            BindType::Receiver => SessionState::BoundRx,
            BindType::Transceiver => SessionState::BoundTrx,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(
            self,
            SessionState::BoundTx | SessionState::BoundRx | SessionState::BoundTrx
        )
    }

    /// submit_sm is only valid on transmitter and transceiver binds
    pub fn can_submit(&self) -> bool {
        matches!(self, SessionState::BoundTx | SessionState::BoundTrx)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Closed => "CLOSED",
            SessionState::Open => "OPEN",
            SessionState::BoundTx => "BOUND_TX",
            SessionState::BoundRx => "BOUND_RX",
            SessionState::BoundTrx => "BOUND_TRX",
        };
        f.write_str(name)
    }
}

/// Addressing and flags applied to every submit_sm
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Sender id shown on the handset
    pub source_addr: String,
    pub source_ton: TypeOfNumber,
    pub source_npi: NumericPlanIndicator,
    pub dest_ton: TypeOfNumber,
    pub dest_npi: NumericPlanIndicator,
    /// 1 requests a final delivery receipt
    pub registered_delivery: u8,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            source_addr: String::new(),
            source_ton: TypeOfNumber::Alphanumeric,
            source_npi: NumericPlanIndicator::Isdn,
            dest_ton: TypeOfNumber::International,
            dest_npi: NumericPlanIndicator::Isdn,
            registered_delivery: 1,
        }
    }
}

impl SubmitOptions {
    pub fn new(source_addr: impl Into<String>) -> Self {
        Self {
            source_addr: source_addr.into(),
            ..Default::default()
        }
    }

    pub fn source(&self) -> Address {
        Address::new(self.source_ton, self.source_npi, self.source_addr.clone())
    }

    pub fn destination(&self, msisdn: &str) -> Address {
        Address::new(self.dest_ton, self.dest_npi, msisdn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Success,
    Failed,
}

/// Result of one gateway send, as reported to HTTP callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    pub status: SendStatus,
    pub code: u16,
    pub message: String,
}

impl SendOutcome {
    pub const SUCCESS_CODE: u16 = 200;
    pub const CONNECTION_FAILURE_CODE: u16 = 520;
    pub const PROTOCOL_FAILURE_CODE: u16 = 521;
    pub const UNKNOWN_COMMAND_CODE: u16 = 522;
    pub const OTHER_FAILURE_CODE: u16 = 523;

    pub fn success() -> Self {
        Self {
            status: SendStatus::Success,
            code: Self::SUCCESS_CODE,
            message: "Message sent".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SendStatus::Success
    }
}

impl From<&SmppError> for SendOutcome {
    fn from(err: &SmppError) -> Self {
        let code = match err {
            SmppError::ConnectionError(_) | SmppError::ConnectionLost(_) => {
                SendOutcome::CONNECTION_FAILURE_CODE
            }
            SmppError::MalformedPdu(_) | SmppError::Protocol(_) => {
                SendOutcome::PROTOCOL_FAILURE_CODE
            }
            SmppError::UnknownCommand { .. } => SendOutcome::UNKNOWN_COMMAND_CODE,
            _ => SendOutcome::OTHER_FAILURE_CODE,
        };
        Self {
            status: SendStatus::Failed,
            code,
            message: err.to_string(),
        }
    }
}
