//! Rate limiting logic: window scripts, counters, and limiters.

mod counter;
mod limit;
mod limiter;
mod script;

pub use counter::{Counter, Decision};
pub use limit::{Algorithm, Limit};
pub use limiter::Limiter;
