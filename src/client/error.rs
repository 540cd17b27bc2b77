// ABOUTME: SMPP session and gateway error types
// ABOUTME: Keeps transport, protocol and delivery failures apart so sends map to outcome codes

use crate::codec::CodecError;
use crate::datatypes::{CommandStatus, MessageState};
use std::io;
use thiserror::Error;

/// Error type for connection, session and delivery operations
#[derive(Debug, Error)]
pub enum SmppError {
    /// Transport failure reaching or maintaining the link
    #[error("Connection error: {0}")]
    ConnectionError(#[from] io::Error),

    /// Framing or field violation in a received or outgoing PDU
    #[error("Malformed PDU: {0}")]
    MalformedPdu(CodecError),

    #[error("Unknown command_id {command_id:#010x}")]
    UnknownCommand { command_id: u32 },

    /// Operation attempted outside the states it is valid in
    #[error("{operation} not allowed in state {state}")]
    WrongState {
        operation: &'static str,
        state: String,
    },

    #[error("Operation timeout")]
    Timeout,

    /// The link went away while the operation was in flight
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Negative command_status in a response or generic_nack
    #[error("Protocol error: {0}")]
    Protocol(CommandStatus),

    /// Final delivery receipt with a state other than DELIVRD
    #[error("Delivery failed: {0}")]
    DeliveryFailed(MessageState),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl SmppError {
    /// Transport-level failures that leave the session Closed
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            SmppError::ConnectionError(_) | SmppError::ConnectionLost(_)
        )
    }
}

impl From<CodecError> for SmppError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnknownCommand { command_id, .. } => {
                SmppError::UnknownCommand { command_id }
            }
            other => SmppError::MalformedPdu(other),
        }
    }
}

/// Result type alias for SMPP operations
pub type SmppResult<T> = Result<T, SmppError>;
