//! Minimal key-value client surface used by the KV backed stores
//!
//! Only the handful of string and hash commands the stores issue are exposed,
//! so a store can run against redis, a test double, or anything speaking the
//! same commands.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

/// Key-value commands needed by [`KvBlobStore`](crate::store::KvBlobStore)
/// and [`KvHashStore`](crate::store::KvHashStore).
///
/// Implementations must be safe to call from many tasks at once.
#[async_trait]
pub trait KvClient: Send + Sync + 'static {
    /// GET
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// SET with EX
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// DEL
    async fn del(&self, key: &str) -> Result<()>;

    /// EXPIRE; returns whether the key existed
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool>;

    /// EXISTS
    async fn exists(&self, key: &str) -> Result<bool>;

    /// HGET
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// HSET of a single field
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// HSET of many fields in one command
    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// HGETALL
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;

    /// HLEN
    async fn hlen(&self, key: &str) -> Result<usize>;

    /// HDEL
    async fn hdel(&self, key: &str, fields: &[&str]) -> Result<()>;
}

#[cfg(feature = "redis-store")]
mod redis_client {
    use super::*;
    use redis::aio::ConnectionManager;
    use redis::AsyncCommands;

    // `ConnectionManager` implements both traits with the same method names,
    // so every redis command is called through `AsyncCommands` by path.
    #[async_trait]
    impl KvClient for ConnectionManager {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            let mut conn = self.clone();
            let value: Option<String> = AsyncCommands::get(&mut conn, key).await?;
            Ok(value)
        }

        async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
            let mut conn = self.clone();
            AsyncCommands::set_ex::<_, _, ()>(&mut conn, key, value, ttl_secs).await?;
            Ok(())
        }

        async fn del(&self, key: &str) -> Result<()> {
            let mut conn = self.clone();
            AsyncCommands::del::<_, ()>(&mut conn, key).await?;
            Ok(())
        }

        async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
            let mut conn = self.clone();
            let seconds = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
            let existed: bool = AsyncCommands::expire(&mut conn, key, seconds).await?;
            Ok(existed)
        }

        async fn exists(&self, key: &str) -> Result<bool> {
            let mut conn = self.clone();
            let exists: bool = AsyncCommands::exists(&mut conn, key).await?;
            Ok(exists)
        }

        async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
            let mut conn = self.clone();
            let value: Option<String> = AsyncCommands::hget(&mut conn, key, field).await?;
            Ok(value)
        }

        async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
            let mut conn = self.clone();
            AsyncCommands::hset::<_, _, _, ()>(&mut conn, key, field, value).await?;
            Ok(())
        }

        async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
            if fields.is_empty() {
                return Ok(());
            }
            let mut conn = self.clone();
            AsyncCommands::hset_multiple::<_, _, _, ()>(&mut conn, key, fields).await?;
            Ok(())
        }

        async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
            let mut conn = self.clone();
            let fields: HashMap<String, String> = AsyncCommands::hgetall(&mut conn, key).await?;
            Ok(fields)
        }

        async fn hlen(&self, key: &str) -> Result<usize> {
            let mut conn = self.clone();
            let len: usize = AsyncCommands::hlen(&mut conn, key).await?;
            Ok(len)
        }

        async fn hdel(&self, key: &str, fields: &[&str]) -> Result<()> {
            if fields.is_empty() {
                return Ok(());
            }
            let mut conn = self.clone();
            AsyncCommands::hdel::<_, _, ()>(&mut conn, key, fields).await?;
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::sync::Arc;

        fn assert_kv_client<C: KvClient>() {}

        #[test]
        fn test_connection_manager_is_a_kv_client() {
            assert_kv_client::<ConnectionManager>();
            // the stores take the client as a trait object
            let _erase = |conn: ConnectionManager| -> Arc<dyn KvClient> { Arc::new(conn) };
        }

        #[test]
        fn test_commands_match_the_wire_format() {
            // the same builders `AsyncCommands` uses, without a server
            let packed = redis::Cmd::set_ex("session:a", "{}", 60).get_packed_command();
            assert_eq!(
                String::from_utf8(packed).unwrap(),
                "*4\r\n$5\r\nSETEX\r\n$9\r\nsession:a\r\n$2\r\n60\r\n$2\r\n{}\r\n"
            );

            let packed = redis::Cmd::expire("session:a", 60).get_packed_command();
            assert_eq!(
                String::from_utf8(packed).unwrap(),
                "*3\r\n$6\r\nEXPIRE\r\n$9\r\nsession:a\r\n$2\r\n60\r\n"
            );
        }
    }
}
