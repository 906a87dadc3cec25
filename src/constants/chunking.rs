//! Chunked submission defaults.

/// Default maximum size of a single chunk payload in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default maximum number of chunks a payload may be split into.
pub const DEFAULT_MAX_CHUNKS: usize = 20;
