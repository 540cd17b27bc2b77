pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod datatypes;
pub mod gsm;
pub mod http;
pub mod logging;
mod macros;
pub mod message;
pub mod store;

#[cfg(test)]
mod tests;

// Re-export codec types for direct access
pub use codec::{CodecError, Decodable, Encodable, Pdu, PduHeader, PduRegistry};

// Re-export the gateway API for easy access
pub use client::{
    BindCredentials, Gateway, GatewayBuilder, SendOutcome, SendStatus, Session, SessionState,
    SmppError, SmppResult,
};
pub use config::Settings;
pub use store::{DeliveryStore, MemoryStore, RedisStore, Store};

/// Error returned by the service entry points.
///
/// Protocol and session code uses [`SmppError`]; this boxed form is for
/// startup paths that combine configuration, logging and I/O failures.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for service startup operations.
///
/// # Examples
///
/// ```rust,no_run
/// use smpp_gateway::{GatewayBuilder, Settings, Store};
///
/// #[tokio::main]
/// async fn main() -> smpp_gateway::Result<()> {
///     let settings = Settings::default();
///     let store = Store::from_settings(&settings.store)?;
///     let gateway = GatewayBuilder::from_settings(&settings).build(store);
///
///     gateway.connect().await?;
///     let outcome = gateway.send("06304988888", "Hello World!").await;
///     println!("{}: {}", outcome.code, outcome.message);
///
///     gateway.disconnect().await;
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;
