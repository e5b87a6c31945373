//! Key-value session store keeping each session field as a hash field
//!
//! A session is a hash under `prefix + session_id`. Fields are read and
//! written one at a time, so two requests editing different fields of the same
//! session don't overwrite each other. The TTL applies to the whole hash.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::{ttl_secs, SessionStore};
use crate::config::KvStoreOptions;
use crate::error::Result;
use crate::kv::KvClient;
use crate::session::SessionData;

/// Stored form of a field value: strings as-is, anything else as JSON text.
fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Text that parses as JSON comes back as that value, anything else as a
/// string. A string that looks like JSON (`"42"`, `"true"`) therefore comes
/// back as a number or bool.
fn decode_value(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

/// Key-value session store using one hash per session
///
/// [`get_session`](SessionStore::get_session) does not load any fields; it
/// returns an empty map when the hash exists, which tells the session to read
/// and write fields through the store. Closing a session only issues
/// `EXPIRE`, there is nothing else to flush.
pub struct KvHashStore {
    client: Arc<dyn KvClient>,
    prefix: String,
}

impl KvHashStore {
    /// Create a store with the default prefix
    pub fn new<C: KvClient>(client: C) -> Self {
        Self::with_options(Arc::new(client), KvStoreOptions::default())
    }

    /// Create a store with custom options; the refresh interval is unused
    pub fn with_options(client: Arc<dyn KvClient>, options: KvStoreOptions) -> Self {
        Self {
            client,
            prefix: options.prefix,
        }
    }

    /// Make a storage key from session ID
    fn make_key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }
}

impl Clone for KvHashStore {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            prefix: self.prefix.clone(),
        }
    }
}

#[async_trait]
impl SessionStore for KvHashStore {
    async fn get(&self, id: &str, key: &str) -> Result<Option<Value>> {
        let raw = self.client.hget(&self.make_key(id), key).await?;
        Ok(raw.map(decode_value))
    }

    async fn set(&self, id: &str, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        let hash = self.make_key(id);
        self.client.hset(&hash, key, &encode_value(value)).await?;
        // the hash may have just been created; don't leave it without a TTL
        self.client.expire(&hash, ttl_secs(ttl)).await.map(|_| ())
    }

    async fn set_map(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let hash = self.make_key(id);
        let fields: Vec<(String, String)> = data
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect();
        self.client.hset_multiple(&hash, &fields).await?;
        self.client.expire(&hash, ttl_secs(ttl)).await.map(|_| ())
    }

    async fn remove(&self, id: &str, keys: &[&str]) -> Result<()> {
        self.client.hdel(&self.make_key(id), keys).await
    }

    async fn data(&self, id: &str) -> Result<SessionData> {
        let fields = self.client.hgetall(&self.make_key(id)).await?;
        Ok(fields
            .into_iter()
            .map(|(k, v)| (k, decode_value(v)))
            .collect())
    }

    async fn get_size(&self, id: &str) -> Result<usize> {
        self.client.hlen(&self.make_key(id)).await
    }

    async fn remove_all(&self, id: &str) -> Result<()> {
        self.client.del(&self.make_key(id)).await
    }

    async fn get_session(&self, id: &str, _ttl: Duration) -> Result<Option<SessionData>> {
        if self.client.exists(&self.make_key(id)).await? {
            Ok(Some(SessionData::new()))
        } else {
            Ok(None)
        }
    }

    async fn set_session(&self, id: &str, _data: &SessionData, ttl: Duration) -> Result<()> {
        self.client
            .expire(&self.make_key(id), ttl_secs(ttl))
            .await
            .map(|_| ())
    }

    async fn update_ttl(&self, id: &str, ttl: Duration) -> Result<()> {
        self.client
            .expire(&self.make_key(id), ttl_secs(ttl))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::testing::FakeKv;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(3600);

    fn store() -> (Arc<FakeKv>, KvHashStore) {
        let kv = Arc::new(FakeKv::new());
        let store = KvHashStore::with_options(kv.clone(), KvStoreOptions::new());
        (kv, store)
    }

    #[tokio::test]
    async fn test_per_key_round_trip() {
        let (_, store) = store();
        assert!(store.get_session("s", TTL).await.unwrap().is_none());

        store.set("s", "name", &json!("alice"), TTL).await.unwrap();
        store.set("s", "n", &json!(42), TTL).await.unwrap();

        assert_eq!(store.get("s", "name").await.unwrap(), Some(json!("alice")));
        assert_eq!(store.get("s", "n").await.unwrap(), Some(json!(42)));
        assert_eq!(store.get("s", "missing").await.unwrap(), None);
        assert_eq!(store.get_size("s").await.unwrap(), 2);

        // presence only, no data
        assert_eq!(
            store.get_session("s", TTL).await.unwrap(),
            Some(SessionData::new())
        );

        store.remove("s", &["name"]).await.unwrap();
        assert_eq!(
            store.data("s").await.unwrap(),
            serde_json::from_value::<SessionData>(json!({"n": 42})).unwrap()
        );

        store.remove_all("s").await.unwrap();
        assert!(store.get_session("s", TTL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_map_and_foreign_values() {
        let (kv, store) = store();
        let data: SessionData =
            serde_json::from_value(json!({"a": 1, "b": {"c": true}})).unwrap();
        store.set_map("s", &data, TTL).await.unwrap();
        kv.hset("session:s", "plain", "not json").await.unwrap();

        let loaded = store.data("s").await.unwrap();
        assert_eq!(loaded["a"], json!(1));
        assert_eq!(loaded["b"], json!({"c": true}));
        assert_eq!(loaded["plain"], json!("not json"));
    }

    #[tokio::test]
    async fn test_strings_stored_bare() {
        let (kv, store) = store();
        store.set("s", "name", &json!("alice"), TTL).await.unwrap();
        store.set("s", "n", &json!(1), TTL).await.unwrap();
        store.set("s", "list", &json!([1, "x"]), TTL).await.unwrap();

        assert_eq!(kv.hget("session:s", "name").await.unwrap().as_deref(), Some("alice"));
        assert_eq!(kv.hget("session:s", "n").await.unwrap().as_deref(), Some("1"));
        assert_eq!(
            kv.hget("session:s", "list").await.unwrap().as_deref(),
            Some(r#"[1,"x"]"#)
        );

        // numeric-looking strings read back as numbers
        store.set("s", "code", &json!("42"), TTL).await.unwrap();
        assert_eq!(store.get("s", "code").await.unwrap(), Some(json!(42)));
    }

    #[tokio::test]
    async fn test_writes_set_ttl() {
        let (kv, store) = store();
        store.set("s", "a", &json!(1), TTL).await.unwrap();
        let data: SessionData = serde_json::from_value(json!({"b": 2})).unwrap();
        store.set_map("t", &data, Duration::from_secs(60)).await.unwrap();
        // nothing to write, no key created
        store.set_map("u", &SessionData::new(), TTL).await.unwrap();

        assert_eq!(
            kv.expire_calls(),
            vec![
                ("session:s".to_string(), 3600),
                ("session:t".to_string(), 60)
            ]
        );
        assert!(!kv.exists("session:u").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_ops_only_expire() {
        let (kv, store) = store();
        store.set("s", "a", &json!(1), TTL).await.unwrap();

        store.set_session("s", &SessionData::new(), TTL).await.unwrap();
        store.update_ttl("s", Duration::from_secs(60)).await.unwrap();

        assert_eq!(
            kv.expire_calls(),
            vec![
                ("session:s".to_string(), 3600),
                ("session:s".to_string(), 3600),
                ("session:s".to_string(), 60)
            ]
        );
        assert_eq!(store.get("s", "a").await.unwrap(), Some(json!(1)));
    }
}
