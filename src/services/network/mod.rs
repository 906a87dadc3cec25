//! Address book, node health and node selection.

mod health;
pub use health::*;

mod selector;
pub use selector::*;

mod address_book;
pub use address_book::*;
