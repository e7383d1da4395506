//! Window counter implementation.

use std::sync::Arc;
use std::time::Duration;

use redis::{Script, Value};
use tracing::trace;

use crate::error::{FloodgateError, Result};
use crate::store::ScriptClient;

use super::limit::Algorithm;
use super::script::{FIXED_WINDOW, SLIDING_WINDOW};

/// Outcome of counting a key against a limit.
///
/// A rejection is not an error: callers check [`is_allowed`] and consult
/// [`retry_after`] to decide backoff.
///
/// [`is_allowed`]: Decision::is_allowed
/// [`retry_after`]: Decision::retry_after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    ok: bool,
    counter: i64,
    limit: i64,
    ttl_ms: i64,
}

impl Decision {
    /// Build from a two-integer window script reply. Admission is
    /// signalled by the TTL sentinel `-1`; a surfaced `-2` (key expired
    /// while the script ran) is normalized to zero.
    pub(crate) fn from_count(counter: i64, ttl_ms: i64, limit: i64) -> Self {
        let ok = ttl_ms == -1;
        Self {
            ok,
            counter,
            limit,
            ttl_ms: if ok { ttl_ms } else { ttl_ms.max(0) },
        }
    }

    /// Build from the four-integer batch script reply, which carries the
    /// admission flag explicitly.
    pub(crate) fn from_batch(ok: bool, counter: i64, ttl_ms: i64, limit: i64) -> Self {
        Self {
            ok,
            counter,
            limit,
            ttl_ms: if ok { -1 } else { ttl_ms.max(0) },
        }
    }

    /// Whether the increment was admitted and committed.
    pub fn is_allowed(&self) -> bool {
        self.ok
    }

    /// Counter value after the operation.
    pub fn counter(&self) -> i64 {
        self.counter
    }

    /// The limit the decision was made against.
    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Quota left in the window, `limit - counter`.
    pub fn remainder(&self) -> i64 {
        self.limit - self.counter
    }

    /// Time until the caller may reasonably retry.
    ///
    /// `None` on admission. On rejection this is the remaining fixed
    /// window, or the wait until the next sub-window boundary for sliding
    /// windows; zero when the key expired mid-flight.
    pub fn retry_after(&self) -> Option<Duration> {
        if self.ok {
            None
        } else {
            Some(Duration::from_millis(self.ttl_ms as u64))
        }
    }
}

/// Binding of a store client, one window script, and a limit
/// configuration.
///
/// Owns no counter state; all state lives on the store under the TTLs the
/// scripts set. A counter is constructed once and shared freely across
/// concurrent callers.
pub struct Counter {
    client: Arc<dyn ScriptClient>,
    script: Script,
    size_ms: i64,
    limit: i64,
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counter")
            .field("size_ms", &self.size_ms)
            .field("limit", &self.limit)
            .finish()
    }
}

impl Counter {
    /// Counter using the fixed window algorithm: counts expire `size`
    /// after the first count, and the next window is independent.
    ///
    /// `size` is truncated to whole milliseconds.
    pub fn fixed_window(
        client: Arc<dyn ScriptClient>,
        size: Duration,
        limit: i64,
    ) -> Result<Self> {
        Self::for_algorithm(client, Algorithm::FixedWindow, size.as_millis() as i64, limit)
    }

    /// Counter using the sliding window algorithm: the previous window
    /// weighs in by the fraction of it not yet elapsed.
    ///
    /// `size` is truncated to whole milliseconds.
    pub fn sliding_window(
        client: Arc<dyn ScriptClient>,
        size: Duration,
        limit: i64,
    ) -> Result<Self> {
        Self::for_algorithm(
            client,
            Algorithm::SlidingWindow,
            size.as_millis() as i64,
            limit,
        )
    }

    pub(crate) fn for_algorithm(
        client: Arc<dyn ScriptClient>,
        algorithm: Algorithm,
        size_ms: i64,
        limit: i64,
    ) -> Result<Self> {
        if size_ms < 1 {
            return Err(FloodgateError::InvalidSize);
        }
        if limit < 1 {
            return Err(FloodgateError::InvalidLimit);
        }
        let source = match algorithm {
            Algorithm::FixedWindow => FIXED_WINDOW,
            Algorithm::SlidingWindow => SLIDING_WINDOW,
        };
        Ok(Self {
            client,
            script: Script::new(source),
            size_ms,
            limit,
        })
    }

    /// Increment the counter for `key` by `value` and decide admission.
    ///
    /// The script reply must be exactly two integers; anything else is
    /// [`FloodgateError::UnexpectedReply`]. Transport errors propagate
    /// verbatim.
    pub async fn count(&self, key: &str, value: i64) -> Result<Decision> {
        let keys = [key.to_string()];
        let args = [value, self.size_ms, self.limit];
        let reply = self.client.run_script(&self.script, &keys, &args).await?;
        let [counter, ttl_ms] = int_reply(reply)?;

        trace!(key, value, counter, ttl_ms, "counted");

        Ok(Decision::from_count(counter, ttl_ms, self.limit))
    }
}

/// Parse a script reply into exactly `N` integers.
pub(crate) fn int_reply<const N: usize>(value: Value) -> Result<[i64; N]> {
    let Value::Array(items) = value else {
        return Err(FloodgateError::UnexpectedReply);
    };
    if items.len() != N {
        return Err(FloodgateError::UnexpectedReply);
    }
    let mut out = [0i64; N];
    for (slot, item) in out.iter_mut().zip(items) {
        let Value::Int(v) = item else {
            return Err(FloodgateError::UnexpectedReply);
        };
        *slot = v;
    }
    Ok(out)
}
