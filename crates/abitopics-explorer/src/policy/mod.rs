//! Request policies applied to every explorer call.
//!
//! ```text
//! Request → [RetryPolicy loop → [MinIntervalLimiter] → HTTP]
//! ```
//! Every attempt, retries included, waits for the limiter of its base URL.

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{LimiterRegistry, MinIntervalLimiter};
pub use retry::{RetryConfig, RetryPolicy};
