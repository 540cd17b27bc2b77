use super::{DeliveryStore, StoreError};
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Limit on establishing the first connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Limit on a single command once connected
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);
const RECONNECT_RETRIES: usize = 2;

/// Redis-backed store. The connection manager is created on first write,
/// shared by every clone, and reconnects on its own after the server goes
/// away. A failed first connect leaves the cell empty so the next write
/// tries again.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    connection: Arc<OnceCell<ConnectionManager>>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connected", &self.connection.initialized())
            .finish()
    }
}

impl RedisStore {
    pub fn open(host: &str, port: u16, password: Option<&str>) -> Result<Self, StoreError> {
        let url = match password.filter(|p| !p.is_empty()) {
            Some(password) => format!("redis://:{}@{}:{}/", password, host, port),
            None => format!("redis://{}:{}/", host, port),
        };
        Ok(Self {
            client: redis::Client::open(url)?,
            connection: Arc::new(OnceCell::new()),
        })
    }

    async fn connect(&self) -> Result<ConnectionManager, StoreError> {
        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(CONNECT_TIMEOUT)
            .set_response_timeout(RESPONSE_TIMEOUT)
            .set_number_of_retries(RECONNECT_RETRIES);
        match tokio::time::timeout(
            CONNECT_TIMEOUT,
            self.client.get_connection_manager_with_config(config),
        )
        .await
        {
            Ok(connection) => Ok(connection?),
            Err(_) => Err(StoreError::Unavailable(format!(
                "redis connect timed out after {:?}",
                CONNECT_TIMEOUT
            ))),
        }
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let connection = self.connection.get_or_try_init(|| self.connect()).await?;
        Ok(connection.clone())
    }
}

impl DeliveryStore for RedisStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut connection = self.connection().await?;
        connection.set::<_, _, ()>(key, value).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// A port nothing listens on
    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn unreachable_server_fails_fast_and_retries_on_next_write() {
        let store = RedisStore::open("127.0.0.1", closed_port().await, None).unwrap();

        for _ in 0..2 {
            let started = std::time::Instant::now();
            assert!(store.set("smpp:is_sent/1", "true").await.is_err());
            assert!(started.elapsed() <= CONNECT_TIMEOUT + Duration::from_secs(1));
            assert!(!store.connection.initialized());
        }
    }

    #[test]
    fn empty_password_is_left_out_of_the_url() {
        let store = RedisStore::open("localhost", 6379, Some("")).unwrap();
        assert!(store.client.get_connection_info().redis.password.is_none());

        let store = RedisStore::open("localhost", 6379, Some("hunter2")).unwrap();
        assert_eq!(
            store.client.get_connection_info().redis.password.as_deref(),
            Some("hunter2")
        );
    }
}
