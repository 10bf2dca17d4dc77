pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::{CliConfig, Command};

pub use crate::adapters::storage::{JsonFileStore, MemoryStore};
pub use crate::config::RosterConfig;
pub use crate::core::roster::{Roster, DEFAULT_CAPACITY};
pub use crate::domain::model::{CancelOutcome, CancelTarget, RegisterOutcome, Registration, Status};
pub use crate::utils::error::{Result, RosterError};
