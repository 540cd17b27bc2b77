// ABOUTME: SMPP client side: session state machine, delivery tracking and the gateway facade
// ABOUTME: Exports all client components including builder, error types and keep-alive settings

//! SMPP Client Module
//!
//! Layers, bottom up:
//!
//! * [`Session`] - Closed/Open/Bound state machine over a
//!   [`Connection`](crate::connection::Connection)
//! * [`DeliveryTracker`] - correlates submit_sm_resp and delivery receipts with waiting callers
//! * [`Gateway`] - connect, disconnect and `send(destination, text) -> SendOutcome`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smpp_gateway::client::{BindCredentials, GatewayBuilder};
//! use smpp_gateway::store::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = GatewayBuilder::new(
//!     "smscsim.smpp.org",
//!     2775,
//!     BindCredentials::transceiver("system_id", "password"),
//! )
//! .build(MemoryStore::new());
//!
//! gateway.connect().await?;
//! let outcome = gateway.send("06304988888", "Hello World!").await;
//! println!("{} {}", outcome.code, outcome.message);
//! gateway.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod error;
pub mod gateway;
pub mod keepalive;
pub mod session;
pub mod tracker;
pub mod types;

// Re-export the main types for easy access
pub use builder::GatewayBuilder;
pub use error::{SmppError, SmppResult};
pub use gateway::Gateway;
pub use keepalive::{KeepAliveConfig, KeepAliveManager};
pub use session::{PendingSubmission, Session, SessionConfig, SessionEvents};
pub use tracker::DeliveryTracker;
pub use types::{BindCredentials, SendOutcome, SendStatus, SessionState, SubmitOptions};
