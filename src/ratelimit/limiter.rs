//! Core limiter implementation.

use std::sync::Arc;

use redis::Script;
use tracing::{debug, trace};

use crate::error::{FloodgateError, Result};
use crate::store::ScriptClient;

use super::counter::{int_reply, Counter, Decision};
use super::limit::Limit;
use super::script::BATCH_LIMIT;

/// Applies one or more limits to a key in a single atomic store
/// operation.
///
/// A limiter with one limit runs the matching window script directly.
/// With several limits, one batch script evaluates them all over the
/// intersection: every counter advances only when all limits would admit,
/// so there is no intermediate state in which some windows moved and
/// others did not.
///
/// The reported decision is the tightest admission (smallest remainder)
/// or the rejection with the longest wait; ties are broken by the order
/// the limits were given.
///
/// A limiter is constructed once and shared freely across concurrent
/// callers; it holds no mutable state.
pub struct Limiter {
    inner: Inner,
}

impl std::fmt::Debug for Limiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Limiter").finish_non_exhaustive()
    }
}

enum Inner {
    Single {
        counter: Counter,
        prefix: String,
        rate: i64,
    },
    Batch {
        client: Arc<dyn ScriptClient>,
        script: Script,
        prefixes: Vec<String>,
        args: Vec<i64>,
    },
}

impl Limiter {
    /// Build a limiter from the given limits.
    ///
    /// Errors when `limits` is empty or any limit carries a zero window
    /// size or limit.
    pub fn new(client: Arc<dyn ScriptClient>, mut limits: Vec<Limit>) -> Result<Self> {
        if limits.is_empty() {
            return Err(FloodgateError::NoLimits);
        }
        for limit in &limits {
            limit.validate()?;
        }

        let inner = if limits.len() == 1 {
            let limit = limits.swap_remove(0);
            let counter =
                Counter::for_algorithm(client, limit.algorithm, limit.size_ms, limit.limit)?;
            Inner::Single {
                counter,
                prefix: limit.prefix,
                rate: limit.rate,
            }
        } else {
            // Four arguments per limit, order preserved: the batch script
            // reads them at a fixed stride.
            let mut prefixes = Vec::with_capacity(limits.len());
            let mut args = Vec::with_capacity(limits.len() * 4);
            for limit in &limits {
                prefixes.push(limit.prefix.clone());
                args.extend_from_slice(&[
                    limit.rate,
                    limit.size_ms,
                    limit.limit,
                    limit.algorithm.tag(),
                ]);
            }
            Inner::Batch {
                client,
                script: Script::new(BATCH_LIMIT),
                prefixes,
                args,
            }
        };

        Ok(Self { inner })
    }

    /// Apply the limits to `key` and decide admission.
    ///
    /// The key is namespaced under each limit's prefix before it reaches
    /// the store.
    pub async fn limit(&self, key: &str) -> Result<Decision> {
        match &self.inner {
            Inner::Single {
                counter,
                prefix,
                rate,
            } => counter.count(&format!("{prefix}{key}"), *rate).await,
            Inner::Batch {
                client,
                script,
                prefixes,
                args,
            } => {
                let keys: Vec<String> =
                    prefixes.iter().map(|p| format!("{p}{key}")).collect();

                trace!(key, limits = prefixes.len(), "checking limits");

                let reply = client.run_script(script, &keys, args).await?;
                let [ok, counter, ttl_ms, limit] = int_reply(reply)?;
                let decision = Decision::from_batch(ok == 1, counter, ttl_ms, limit);

                if !decision.is_allowed() {
                    debug!(
                        key,
                        counter,
                        retry_ms = ttl_ms,
                        "limit exceeded"
                    );
                }

                Ok(decision)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::MockClient;
    use redis::Value;
    use std::time::Duration;

    fn limits(names: &[&str]) -> Vec<Limit> {
        names
            .iter()
            .map(|name| Limit::new(Duration::from_secs(1), 100).with_name(name))
            .collect()
    }

    #[test]
    fn test_new_requires_limits() {
        let client = Arc::new(MockClient::new(Vec::new()));
        let err = Limiter::new(client, Vec::new()).unwrap_err();
        assert!(matches!(err, FloodgateError::NoLimits));
    }

    #[test]
    fn test_new_validates_every_limit() {
        let client = Arc::new(MockClient::new(Vec::new()));
        let bad = vec![
            Limit::new(Duration::from_secs(1), 100).with_name("x"),
            Limit::new(Duration::from_secs(1), 0).with_name("y"),
        ];
        let err = Limiter::new(client, bad).unwrap_err();
        assert!(matches!(err, FloodgateError::InvalidLimit));
    }

    #[tokio::test]
    async fn test_single_path_prefixes_key_and_applies_rate() {
        let client = Arc::new(MockClient::new(vec![MockClient::pair(2, -1)]));
        let limit = Limit::new(Duration::from_secs(1), 100)
            .with_name("x")
            .with_rate(2);
        let limiter = Limiter::new(client.clone(), vec![limit]).unwrap();

        let decision = limiter.limit("key").await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(decision.counter(), 2);
        assert_eq!(decision.remainder(), 98);

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, vec!["x:key".to_string()]);
        assert_eq!(calls[0].1, vec![2, 1000, 100]);
    }

    #[tokio::test]
    async fn test_batch_path_packs_keys_and_args() {
        let reply = Ok(Value::Array(vec![
            Value::Int(1),
            Value::Int(1),
            Value::Int(-1),
            Value::Int(100),
        ]));
        let client = Arc::new(MockClient::new(vec![reply]));
        let limiter = Limiter::new(client.clone(), limits(&["x", "y"])).unwrap();

        let decision = limiter.limit("1").await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(decision.counter(), 1);
        assert_eq!(decision.limit(), 100);
        assert_eq!(decision.retry_after(), None);

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, vec!["x:1".to_string(), "y:1".to_string()]);
        assert_eq!(calls[0].1, vec![1, 1000, 100, 1, 1, 1000, 100, 1]);
    }

    #[tokio::test]
    async fn test_batch_mixed_algorithms_tagged_in_order() {
        let reply = Ok(Value::Array(vec![
            Value::Int(1),
            Value::Int(1),
            Value::Int(-1),
            Value::Int(5),
        ]));
        let client = Arc::new(MockClient::new(vec![reply]));
        let limiter = Limiter::new(
            client.clone(),
            vec![
                Limit::new(Duration::from_secs(1), 100).with_name("x"),
                Limit::new(Duration::from_secs(2), 5)
                    .with_name("y")
                    .with_sliding_window(),
            ],
        )
        .unwrap();

        limiter.limit("k").await.unwrap();

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls[0].1, vec![1, 1000, 100, 1, 1, 2000, 5, 2]);
    }

    #[tokio::test]
    async fn test_batch_rejection() {
        let reply = Ok(Value::Array(vec![
            Value::Int(0),
            Value::Int(50),
            Value::Int(42),
            Value::Int(100),
        ]));
        let client = Arc::new(MockClient::new(vec![reply]));
        let limiter = Limiter::new(client, limits(&["x", "y"])).unwrap();

        let decision = limiter.limit("1").await.unwrap();
        assert!(!decision.is_allowed());
        assert_eq!(decision.counter(), 50);
        assert_eq!(decision.remainder(), 50);
        assert_eq!(decision.retry_after(), Some(Duration::from_millis(42)));
    }

    #[tokio::test]
    async fn test_batch_transport_error_propagates() {
        let client = Arc::new(MockClient::new(vec![MockClient::io_error()]));
        let limiter = Limiter::new(client, limits(&["x", "y"])).unwrap();

        let err = limiter.limit("1").await.unwrap_err();
        assert!(matches!(err, FloodgateError::Redis(_)));
    }

    #[tokio::test]
    async fn test_batch_unexpected_replies() {
        let replies = vec![
            Ok(Value::Nil),
            Ok(Value::Array(vec![Value::Int(1), Value::Int(-1)])),
            Ok(Value::Array(vec![
                Value::Int(1),
                Value::Int(1),
                Value::Int(-1),
                Value::BulkString(b"100".to_vec()),
            ])),
        ];
        let count = replies.len();
        let client = Arc::new(MockClient::new(replies));
        let limiter = Limiter::new(client, limits(&["x", "y"])).unwrap();

        for _ in 0..count {
            let err = limiter.limit("1").await.unwrap_err();
            assert!(matches!(err, FloodgateError::UnexpectedReply));
        }
    }
}
