mod execution;
pub use execution::*;

mod network;
pub use network::*;

mod chunking;
pub use chunking::*;

mod logging;
pub use logging::*;
