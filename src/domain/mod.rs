//! Domain layer - core types and error definitions.
//!
//! This layer contains pure domain models without any I/O.

pub mod config;
pub mod error;
pub mod position;
pub mod state;

pub use config::{AppConfig, ClassifierConfig};
pub use error::{AppError, Result};
pub use position::{FileIdentity, PositionToken};
pub use state::{CounterKind, Counters, PersistedState};
