//! Floodgate - Distributed Rate Limiting over Redis
//!
//! This crate implements distributed rate limiting against a Redis store.
//! Every counting decision executes as a single atomic Lua script on the
//! store, so it is globally consistent across concurrent callers
//! regardless of which process issued the request. Two windowing
//! algorithms are provided, and several limits can be combined into one
//! atomic decision over their intersection.

pub mod ratelimit;
pub mod config;
pub mod error;
pub mod store;

pub use error::{FloodgateError, Result};
pub use ratelimit::{Algorithm, Counter, Decision, Limit, Limiter};
pub use store::{RedisClient, ScriptClient};
