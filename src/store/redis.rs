//! Redis storage backend for task persistence.
//!
//! [`RedisBackend`] implements [`StorageBackend`] using Redis. Reads use
//! `HGETALL`; writes are Lua scripts (`redis::Script`) that update the record
//! hash and the listing index in a single round-trip.
//!
//! # Key Schema
//!
//! | Key Pattern | Type | Purpose |
//! |-------------|------|---------|
//! | `{prefix}:{storage_key}` | Hash | Task record (`version`, `data`) |
//! | `{prefix}:idx` | Sorted Set | Storage keys scored by creation time |
//!
//! Storage keys are the `task:{task_id}` strings handed in by
//! [`GenericTaskStore`](crate::store::generic::GenericTaskStore). The
//! backend never interprets record bytes, except for reading `createdAt`
//! to score the index.
//!
//! # Usage
//!
//! ```rust,no_run
//! use artifact_tasks::store::redis::RedisBackend;
//! use artifact_tasks::store::generic::GenericTaskStore;
//!
//! # async fn example() {
//! let backend = RedisBackend::new("redis://127.0.0.1:6379").await.unwrap();
//! let store = GenericTaskStore::new(backend);
//! # }
//! ```

use std::collections::HashMap;

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Script};
use async_trait::async_trait;

use crate::store::backend::{StorageBackend, StorageError, VersionedRecord};

/// Create-only put.
///
/// KEYS[1] = record hash key, KEYS[2] = index sorted set key.
/// ARGV[1] = data, ARGV[2] = storage key (index member), ARGV[3] = score.
/// Returns: 1 if written, 0 if the key was already present.
const LUA_PUT_IF_ABSENT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1], 'version', '1', 'data', ARGV[1])
redis.call('ZADD', KEYS[2], 'NX', tonumber(ARGV[3]), ARGV[2])
return 1
"#;

/// Conditional put (CAS): check version, then update or reject.
///
/// KEYS[1] = record hash key.
/// ARGV[1] = data, ARGV[2] = expected version.
/// Returns: {status, value} where status 1=success, 0=mismatch, -1=missing.
const LUA_PUT_IF_VERSION: &str = r#"
local current_version = redis.call('HGET', KEYS[1], 'version')
if not current_version then
    return {-1, 0}
end

local expected = tonumber(ARGV[2])
local actual = tonumber(current_version)
if actual ~= expected then
    return {0, actual}
end

local new_version = actual + 1
redis.call('HSET', KEYS[1], 'version', tostring(new_version), 'data', ARGV[1])
return {1, new_version}
"#;

/// Delete: remove hash and index entry.
///
/// KEYS[1] = record hash key, KEYS[2] = index sorted set key.
/// ARGV[1] = storage key (index member).
/// Returns: 1 if the key existed and was deleted, 0 otherwise.
const LUA_DELETE: &str = r#"
local existed = redis.call('EXISTS', KEYS[1])
redis.call('ZREM', KEYS[2], ARGV[1])
if existed == 1 then
    redis.call('DEL', KEYS[1])
    return 1
end
return 0
"#;

/// Redis storage backend for task persistence.
///
/// Lets several service replicas share one view of every task. CAS is
/// enforced inside the Lua scripts, so two replicas racing to complete the
/// same task still produce exactly one applied transition.
///
/// # Connection Model
///
/// Holds a [`MultiplexedConnection`]; clones share one TCP connection.
#[derive(Debug, Clone)]
pub struct RedisBackend {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisBackend {
    /// Connects to Redis at `url` with the key prefix `"artifact-tasks"`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the client cannot be created or
    /// the connection cannot be established.
    pub async fn new(url: &str) -> Result<Self, StorageError> {
        let client = ::redis::Client::open(url)
            .map_err(|e| StorageError::backend(format!("failed to create Redis client: {e}"), e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StorageError::backend(format!("failed to connect to Redis: {e}"), e))?;
        Ok(Self::with_connection(conn))
    }

    /// Creates a backend with a pre-built multiplexed connection.
    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            key_prefix: "artifact-tasks".to_string(),
        }
    }

    /// Sets a custom key prefix. Useful for isolating test runs.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn hash_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    fn index_key(&self) -> String {
        format!("{}:idx", self.key_prefix)
    }
}

fn utf8(data: &[u8]) -> Result<&str, StorageError> {
    std::str::from_utf8(data)
        .map_err(|e| StorageError::backend(format!("data is not valid UTF-8: {e}"), e))
}

/// Reads `createdAt` from serialized record JSON as epoch milliseconds.
fn extract_created_at_ms(data: &[u8]) -> Option<i64> {
    let value: serde_json::Value = serde_json::from_slice(data).ok()?;
    let created_at = value.get("createdAt")?.as_str()?;
    let dt = chrono::DateTime::parse_from_rfc3339(created_at).ok()?;
    Some(dt.timestamp_millis())
}

fn map_redis_error(err: ::redis::RedisError, key: &str) -> StorageError {
    StorageError::Backend {
        message: format!("Redis error for key {key}: {err}"),
        source: Some(Box::new(err)),
    }
}

fn decode_fields(
    key: &str,
    fields: &HashMap<String, String>,
) -> Result<VersionedRecord, StorageError> {
    let version: u64 = fields
        .get("version")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| StorageError::Backend {
            message: format!("missing or invalid version field for key {key}"),
            source: None,
        })?;
    let data = fields.get("data").ok_or_else(|| StorageError::Backend {
        message: format!("missing data field for key {key}"),
        source: None,
    })?;
    Ok(VersionedRecord {
        data: data.as_bytes().to_vec(),
        version,
    })
}

#[async_trait]
impl StorageBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<VersionedRecord, StorageError> {
        let fields: HashMap<String, String> = self
            .conn
            .clone()
            .hgetall(self.hash_key(key))
            .await
            .map_err(|e| map_redis_error(e, key))?;

        if fields.is_empty() {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }
        decode_fields(key, &fields)
    }

    async fn put_if_absent(&self, key: &str, data: &[u8]) -> Result<u64, StorageError> {
        let data_str = utf8(data)?;
        let score = extract_created_at_ms(data).unwrap_or(0);

        let written: i64 = Script::new(LUA_PUT_IF_ABSENT)
            .key(self.hash_key(key))
            .key(self.index_key())
            .arg(data_str)
            .arg(key)
            .arg(score)
            .invoke_async(&mut self.conn.clone())
            .await
            .map_err(|e| map_redis_error(e, key))?;

        if written == 1 {
            Ok(1)
        } else {
            Err(StorageError::AlreadyExists {
                key: key.to_string(),
            })
        }
    }

    async fn put_if_version(
        &self,
        key: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StorageError> {
        let data_str = utf8(data)?;

        let result: (i64, i64) = Script::new(LUA_PUT_IF_VERSION)
            .key(self.hash_key(key))
            .arg(data_str)
            .arg(expected_version)
            .invoke_async(&mut self.conn.clone())
            .await
            .map_err(|e| map_redis_error(e, key))?;

        match result.0 {
            1 => Ok(result.1 as u64),
            0 => Err(StorageError::VersionConflict {
                key: key.to_string(),
                expected: expected_version,
                actual: result.1 as u64,
            }),
            _ => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let result: i64 = Script::new(LUA_DELETE)
            .key(self.hash_key(key))
            .key(self.index_key())
            .arg(key)
            .invoke_async(&mut self.conn.clone())
            .await
            .map_err(|e| map_redis_error(e, key))?;

        Ok(result == 1)
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, VersionedRecord)>, StorageError> {
        let idx_key = self.index_key();
        let members: Vec<String> = self
            .conn
            .clone()
            .zrange(&idx_key, 0, -1)
            .await
            .map_err(|e| map_redis_error(e, prefix))?;

        let mut results = Vec::new();
        let mut orphaned: Vec<String> = Vec::new();

        for key in members.into_iter().filter(|k| k.starts_with(prefix)) {
            let fields: HashMap<String, String> = self
                .conn
                .clone()
                .hgetall(self.hash_key(&key))
                .await
                .map_err(|e| map_redis_error(e, &key))?;

            if fields.is_empty() {
                orphaned.push(key);
                continue;
            }
            let record = decode_fields(&key, &fields)?;
            results.push((key, record));
        }

        if !orphaned.is_empty() {
            // Best-effort index cleanup.
            let _: Result<(), ::redis::RedisError> =
                self.conn.clone().zrem(&idx_key, &orphaned).await;
        }

        Ok(results)
    }
}


#[cfg(all(test, feature = "redis-tests"))]
mod integration {
    use super::*;

    async fn backend() -> RedisBackend {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        RedisBackend::new(&url)
            .await
            .unwrap()
            .with_prefix(format!("test-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn cas_round_trip() {
        let backend = backend().await;
        assert_eq!(backend.put_if_absent("task:a", b"{}").await.unwrap(), 1);
        assert!(matches!(
            backend.put_if_absent("task:a", b"{}").await,
            Err(StorageError::AlreadyExists { .. })
        ));
        assert_eq!(backend.put_if_version("task:a", b"{}", 1).await.unwrap(), 2);
        assert!(matches!(
            backend.put_if_version("task:a", b"{}", 1).await,
            Err(StorageError::VersionConflict { actual: 2, .. })
        ));
        assert_eq!(backend.list_by_prefix("task:").await.unwrap().len(), 1);
        assert!(backend.delete("task:a").await.unwrap());
        assert!(backend.list_by_prefix("task:").await.unwrap().is_empty());
    }
}
