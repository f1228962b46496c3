use super::{CorrelationStore, StoreError};
use async_trait::async_trait;
use deadpool_redis::{Config, Pool, PoolConfig, Runtime, redis::AsyncCommands};
use secrecy::{ExposeSecret, SecretString};
use std::{future::Future, time::Duration};
use tokio::time::timeout;
use tracing::{debug, info, instrument};
use url::Url;

const DEFAULT_POOL_SIZE: usize = 16;
const DEFAULT_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_KEY_PREFIX: &str = "hoda:";

/// Connection parameters for the Redis correlation store.
#[derive(Clone)]
pub struct RedisConfig {
    host: String,
    port: u16,
    password: Option<SecretString>,
    db: i64,
    pool_size: usize,
    timeout: Duration,
    key_prefix: String,
}

impl RedisConfig {
    #[must_use]
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            password: None,
            db: 0,
            pool_size: DEFAULT_POOL_SIZE,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: Option<SecretString>) -> Self {
        self.password = password;
        self
    }

    #[must_use]
    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_key_prefix(mut self, key_prefix: String) -> Self {
        self.key_prefix = key_prefix;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Connection URL including the password, when one is set.
    ///
    /// # Errors
    /// Returns an error if host, password or db do not form a valid URL.
    pub fn url(&self) -> Result<String, StoreError> {
        let mut url = Url::parse(&format!("redis://{}:{}/{}", self.host, self.port, self.db))
            .map_err(|err| StoreError::Config(format!("invalid redis address: {err}")))?;

        if let Some(password) = &self.password {
            url.set_password(Some(password.expose_secret()))
                .map_err(|()| StoreError::Config("error setting redis password".to_string()))?;
        }

        Ok(url.to_string())
    }
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .field("pool_size", &self.pool_size)
            .field("timeout", &self.timeout)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

pub struct RedisStore {
    pool: Pool,
    key_prefix: String,
    timeout: Duration,
}

impl RedisStore {
    /// Create the connection pool. Connections are opened lazily.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(config.timeout);
        pool_config.timeouts.create = Some(config.timeout);
        pool_config.timeouts.recycle = Some(config.timeout);

        let mut redis_config = Config::from_url(config.url()?);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|err| StoreError::Config(err.to_string()))?;

        info!(host = %config.host, port = config.port, db = config.db, "Redis correlation store configured");

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
            timeout: config.timeout,
        })
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}{session_id}", self.key_prefix)
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        timeout(self.timeout, operation)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl CorrelationStore for RedisStore {
    #[instrument(skip(self, callback_url), fields(db.system = "redis", db.operation = "SET"))]
    async fn put(
        &self,
        session_id: &str,
        callback_url: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let key = self.key(session_id);
        let ttl_secs = ttl.as_secs().max(1);

        self.bounded(async {
            let mut conn = self.pool.get().await?;
            conn.set_ex::<_, _, ()>(&key, callback_url, ttl_secs).await?;
            Ok(())
        })
        .await?;

        debug!(key = %key, ttl_secs, "correlation record stored");
        Ok(())
    }

    #[instrument(skip(self), fields(db.system = "redis", db.operation = "GET"))]
    async fn get(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        let key = self.key(session_id);

        self.bounded(async {
            let mut conn = self.pool.get().await?;
            Ok(conn.get::<_, Option<String>>(&key).await?)
        })
        .await
    }

    #[instrument(skip(self), fields(db.system = "redis", db.operation = "GETDEL"))]
    async fn take(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        let key = self.key(session_id);

        self.bounded(async {
            let mut conn = self.pool.get().await?;
            Ok(conn.get_del::<_, Option<String>>(&key).await?)
        })
        .await
    }

    #[instrument(skip(self), fields(db.system = "redis", db.operation = "PING"))]
    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(async {
            let mut conn = self.pool.get().await?;
            let _pong: String = deadpool_redis::redis::cmd("PING")
                .query_async(&mut conn)
                .await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn url_without_password() {
        let config = RedisConfig::new("localhost".to_string(), 6379).with_db(2);
        assert_eq!(config.url().unwrap(), "redis://localhost:6379/2");
    }

    #[test]
    fn url_encodes_password() {
        let config = RedisConfig::new("redis.internal".to_string(), 6380)
            .with_password(Some(SecretString::from("p@ss word".to_string())));
        assert_eq!(
            config.url().unwrap(),
            "redis://:p%40ss%20word@redis.internal:6380/0"
        );
    }

    #[test]
    fn invalid_host_is_config_error() {
        let config = RedisConfig::new("bad host".to_string(), 6379);
        assert!(matches!(config.url(), Err(StoreError::Config(_))));
    }

    #[test]
    fn debug_hides_password() {
        let config = RedisConfig::new("localhost".to_string(), 6379)
            .with_password(Some(SecretString::from("hunter2".to_string())));
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[tokio::test]
    async fn keys_are_prefixed() {
        let config = RedisConfig::new("localhost".to_string(), 6379)
            .with_key_prefix("relay:".to_string());
        let store = RedisStore::connect(&config).unwrap();
        assert_eq!(store.key("S1"), "relay:S1");
    }

    #[tokio::test]
    async fn unreachable_server_surfaces_error() {
        // Port 1 is never a Redis server; the call must fail, not hang.
        let config = RedisConfig::new("127.0.0.1".to_string(), 1)
            .with_timeout(Duration::from_millis(500));
        let store = RedisStore::connect(&config).unwrap();
        assert!(store.ping().await.is_err());
        assert!(store.get("S1").await.is_err());
    }
}
