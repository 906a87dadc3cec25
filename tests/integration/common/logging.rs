//! Test logging initialization
//!
//! Uses `std::sync::Once` so every test can call [`init_test_logging`].

use std::sync::Once;

use simplelog::{Config, LevelFilter, TestLogger};

static INIT: Once = Once::new();

/// Routes engine logs to the test output at debug level.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = TestLogger::init(LevelFilter::Debug, Config::default());
    });
}
