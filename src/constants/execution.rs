//! Execution engine defaults.
//!
//! These values govern the retry loop in the execution dispatcher and the
//! receipt poller. All of them can be overridden through [`crate::config::ClientConfig`].

use std::time::Duration;

/// Maximum number of submission attempts across all nodes for one execution.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Initial delay before retrying after a transient (`BUSY`-like) response.
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_millis(250);

/// Upper bound for the request-level retry delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Initial cooldown applied to a node the first time it is marked unhealthy.
pub const DEFAULT_MIN_NODE_BACKOFF: Duration = Duration::from_secs(8);

/// Upper bound for the per-node cooldown after repeated failures.
pub const DEFAULT_MAX_NODE_BACKOFF: Duration = Duration::from_secs(60 * 60);

/// Deadline applied to every single call made to a node.
pub const DEFAULT_GRPC_DEADLINE: Duration = Duration::from_secs(10);

/// Wall-clock budget for a complete `execute` call, retries included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout used when waiting for a receipt or a record.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Maximum number of executions allowed in flight on a single client.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 256;

/// Exponent cap used when computing exponential delays.
///
/// Keeps `2^attempt` from overflowing before the delay is clamped to its maximum.
pub const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Lower bound of the random offset subtracted from "now" when generating a
/// transaction valid-start timestamp.
pub const VALID_START_MIN_OFFSET_NANOS: i64 = 5_000_000_000;

/// Upper bound (exclusive) of the random valid-start offset.
pub const VALID_START_MAX_OFFSET_NANOS: i64 = 8_000_000_000;
