//! Infrastructure layer - external adapters (log files, state file, config).
//!
//! This layer handles all I/O operations.

pub mod config;
pub mod file_identity;
pub mod fsync;
pub mod multi_file_cursor;
pub mod state_store;

pub use config::{ensure_config_exists, load_config};
pub use multi_file_cursor::MultiFileCursor;
pub use state_store::StateStore;
