mod client_config;
pub use client_config::*;

mod node_config;
pub use node_config::*;
