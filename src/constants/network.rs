//! Address book and mirror node constants.

use std::time::Duration;

/// Period between two scheduled address book refreshes from the mirror node.
pub const DEFAULT_NETWORK_UPDATE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Delay before the first scheduled address book refresh.
pub const NETWORK_UPDATE_INITIAL_DELAY: Duration = Duration::from_secs(10);

/// Timeout applied to mirror node HTTP requests.
pub const DEFAULT_MIRROR_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Mirror REST path serving the current address book.
pub const MIRROR_NODES_PATH: &str = "/api/v1/network/nodes";

/// Mirror REST path serving transaction results.
pub const MIRROR_TRANSACTIONS_PATH: &str = "/api/v1/transactions";

/// Page size requested when walking the mirror address book.
pub const MIRROR_NODES_PAGE_LIMIT: u32 = 25;

/// Upper bound on followed `links.next` pages, guards against cycles.
pub const MIRROR_MAX_PAGES: usize = 64;

/// Divisor used to derive the default number of candidate nodes per transaction
/// (`ceil(nodes / 3)`).
pub const NODES_PER_TRANSACTION_DIVISOR: usize = 3;
