//! Logging setup

mod logging;

pub use logging::{default_log_dir, init_logging, init_production_logging, init_simple_logging};
