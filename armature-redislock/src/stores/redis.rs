//! Redis lock store
//!
//! Acquires with `SET key value NX PX ttl` and runs refresh, release and
//! TTL queries as Lua scripts so the value comparison and the action happen
//! in one step on the server. Requires the `redis` feature.

use crate::config::RedisConfig;
use crate::error::{LockError, LockResult};
use crate::stores::{CheckAndAct, LockStore, ScriptOutcome, ttl_millis};
use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, trace};

/// Script reply for a key that does not exist
const REPLY_ABSENT: i64 = -2;

/// Script reply for a key holding another value
const REPLY_MISMATCH: i64 = -3;

/// Extend the expiration if the key still holds our value.
const REFRESH_SCRIPT: &str = r#"
local current = redis.call("get", KEYS[1])
if not current then
    return -2
elseif current ~= ARGV[1] then
    return -3
end
return redis.call("pexpire", KEYS[1], ARGV[2])
"#;

/// Delete the key if it still holds our value.
const RELEASE_SCRIPT: &str = r#"
local current = redis.call("get", KEYS[1])
if not current then
    return -2
elseif current ~= ARGV[1] then
    return -3
end
return redis.call("del", KEYS[1])
"#;

/// Report the remaining expiration if the key still holds our value.
const PTTL_SCRIPT: &str = r#"
local current = redis.call("get", KEYS[1])
if not current then
    return -2
elseif current ~= ARGV[1] then
    return -3
end
return redis.call("pttl", KEYS[1])
"#;

/// Redis-backed lock store
///
/// Cloning is cheap; clones share the underlying connection manager.
#[derive(Clone)]
pub struct RedisStore {
    /// Redis connection manager
    conn: ConnectionManager,
    refresh: Script,
    release: Script,
    pttl: Script,
}

impl RedisStore {
    /// Create a store from an existing connection manager
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            refresh: Script::new(REFRESH_SCRIPT),
            release: Script::new(RELEASE_SCRIPT),
            pttl: Script::new(PTTL_SCRIPT),
        }
    }

    /// Connect using the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails, or it
    /// does not complete within the configured connection timeout.
    pub async fn connect(config: &RedisConfig) -> LockResult<Self> {
        debug!(url = %config.url, "Connecting to Redis for distributed locks");

        let client = redis::Client::open(config.connection_url())
            .map_err(|e| LockError::config(e.to_string()))?;
        let conn = tokio::time::timeout(config.connection_timeout(), ConnectionManager::new(client))
            .await
            .map_err(|_| LockError::store("Redis connection timed out"))??;

        Ok(Self::new(conn))
    }

    fn script(&self, op: CheckAndAct) -> &Script {
        match op {
            CheckAndAct::Refresh { .. } => &self.refresh,
            CheckAndAct::Release => &self.release,
            CheckAndAct::TimeToLive => &self.pttl,
        }
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl LockStore for RedisStore {
    async fn create_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let mut conn = self.conn.clone();

        // Atomic SET key value NX PX milliseconds
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;

        trace!(key = %key, created = result.is_some(), "Redis SET NX");
        Ok(result.is_some())
    }

    async fn check_and_act(
        &self,
        op: CheckAndAct,
        key: &str,
        expected: &str,
    ) -> LockResult<ScriptOutcome> {
        let mut conn = self.conn.clone();

        let mut invocation = self.script(op).key(key);
        invocation.arg(expected);
        if let CheckAndAct::Refresh { ttl } = op {
            invocation.arg(ttl_millis(ttl));
        }
        let reply: i64 = invocation.invoke_async(&mut conn).await?;

        let outcome = script_outcome(op, reply);
        trace!(key = %key, op = op.name(), reply = reply, outcome = ?outcome, "Redis script");
        Ok(outcome)
    }

    fn store_type(&self) -> &'static str {
        "redis"
    }
}

/// Map a script reply to an outcome.
fn script_outcome(op: CheckAndAct, reply: i64) -> ScriptOutcome {
    match (op, reply) {
        (_, REPLY_ABSENT) => ScriptOutcome::Absent,
        (_, REPLY_MISMATCH) => ScriptOutcome::Mismatch,
        (CheckAndAct::TimeToLive, ms) => {
            ScriptOutcome::Remaining(Duration::from_millis(u64::try_from(ms).unwrap_or(0)))
        }
        // PEXPIRE and DEL reply 1 when they touched the key
        (_, 1) => ScriptOutcome::Acted,
        _ => ScriptOutcome::Absent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_compare_before_acting() {
        for script in [REFRESH_SCRIPT, RELEASE_SCRIPT, PTTL_SCRIPT] {
            assert!(script.contains("redis.call(\"get\", KEYS[1])"));
            assert!(script.contains("current ~= ARGV[1]"));
        }
        assert!(REFRESH_SCRIPT.contains("redis.call(\"pexpire\", KEYS[1], ARGV[2])"));
        assert!(RELEASE_SCRIPT.contains("redis.call(\"del\", KEYS[1])"));
        assert!(PTTL_SCRIPT.contains("return redis.call(\"pttl\", KEYS[1])"));
    }

    #[test]
    fn test_script_outcome_mapping() {
        let refresh = CheckAndAct::Refresh {
            ttl: Duration::from_secs(1),
        };

        assert_eq!(script_outcome(refresh, 1), ScriptOutcome::Acted);
        assert_eq!(script_outcome(refresh, 0), ScriptOutcome::Absent);
        assert_eq!(script_outcome(CheckAndAct::Release, 1), ScriptOutcome::Acted);
        assert_eq!(script_outcome(CheckAndAct::Release, -3), ScriptOutcome::Mismatch);
        assert_eq!(script_outcome(CheckAndAct::Release, -2), ScriptOutcome::Absent);
        assert_eq!(
            script_outcome(CheckAndAct::TimeToLive, 1500),
            ScriptOutcome::Remaining(Duration::from_millis(1500))
        );
        // A key without expiry reports -1; never surface a negative TTL
        assert_eq!(
            script_outcome(CheckAndAct::TimeToLive, -1),
            ScriptOutcome::Remaining(Duration::ZERO)
        );
    }
}
