mod ids;
pub use ids::*;

mod status;
pub use status::*;

mod node;
pub use node::*;

mod receipt;
pub use receipt::*;

mod chunk;
pub use chunk::*;

mod error;
pub use error::*;
