//! Keys, signers and per-copy signature assembly.

mod keys;
pub use keys::*;

mod assembler;
pub use assembler::*;
