//! Gateway to the Redis store that owns all counter state.
//!
//! Every counting decision executes as a single atomic Lua script on the
//! store, which is the sole synchronization primitive the library relies
//! on. The [`ScriptClient`] trait is the seam between the rate limiting
//! logic and the concrete client, so unit tests can substitute a scripted
//! mock.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{RedisError, Script, Value};

/// A client capable of running a Lua script against the store.
///
/// Implementations must be safe for concurrent use from the caller's
/// execution model; every call is one round trip and the store serializes
/// script executions per key.
#[async_trait]
pub trait ScriptClient: Send + Sync {
    /// Run the script with the given keys and integer arguments and return
    /// the raw reply.
    ///
    /// Transport errors are surfaced verbatim.
    async fn run_script(
        &self,
        script: &Script,
        keys: &[String],
        args: &[i64],
    ) -> Result<Value, RedisError>;
}

/// Redis-backed [`ScriptClient`].
///
/// Wraps a [`ConnectionManager`], which multiplexes requests over one
/// connection and reconnects on failure. Clones share the connection.
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
}

impl RedisClient {
    /// Connect to Redis at the given URL, e.g. `redis://127.0.0.1:6379`.
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }

    /// Wrap an existing connection manager.
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ScriptClient for RedisClient {
    async fn run_script(
        &self,
        script: &Script,
        keys: &[String],
        args: &[i64],
    ) -> Result<Value, RedisError> {
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(key.as_str());
        }
        for arg in args {
            invocation.arg(*arg);
        }
        // Script runs EVALSHA first and retries with EVAL when the store
        // has not cached the source yet (NOSCRIPT).
        let mut conn = self.manager.clone();
        invocation.invoke_async(&mut conn).await
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted mock client for unit tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Hands out canned replies in order and records the keys and args of
    /// every call.
    pub(crate) struct MockClient {
        replies: Mutex<VecDeque<Result<Value, RedisError>>>,
        pub(crate) calls: Mutex<Vec<(Vec<String>, Vec<i64>)>>,
    }

    impl MockClient {
        pub(crate) fn new(replies: Vec<Result<Value, RedisError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// A reply of two integers, as the window scripts produce.
        pub(crate) fn pair(counter: i64, ttl_ms: i64) -> Result<Value, RedisError> {
            Ok(Value::Array(vec![Value::Int(counter), Value::Int(ttl_ms)]))
        }

        /// A transport error.
        pub(crate) fn io_error() -> Result<Value, RedisError> {
            Err(RedisError::from((
                redis::ErrorKind::IoError,
                "connection reset",
            )))
        }
    }

    #[async_trait]
    impl ScriptClient for MockClient {
        async fn run_script(
            &self,
            _script: &Script,
            keys: &[String],
            args: &[i64],
        ) -> Result<Value, RedisError> {
            self.calls
                .lock()
                .unwrap()
                .push((keys.to_vec(), args.to_vec()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("no reply scripted for this call")
        }
    }
}
