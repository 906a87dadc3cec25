mod config;
pub use config::*;

mod transport;
pub use transport::*;

mod mirror;
pub use mirror::*;

mod signing;
pub use signing::*;

mod transaction;
pub use transaction::*;

mod execution;
pub use execution::*;

mod chunk;
pub use chunk::*;
