use crate::config::toml_config::RosterConfig;
use crate::core::{CancelTarget, RegistrationId};
use crate::utils::error::{Result, RosterError};
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Parser)]
#[command(name = "rsvp-roster")]
#[command(about = "Event RSVP list with a fixed capacity and an automatic waiting list")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the roster data file
    #[arg(long, global = true)]
    pub data_file: Option<String>,

    /// Override the number of confirmed seats
    #[arg(long, global = true)]
    pub capacity: Option<usize>,

    /// Override the HTTP listen address
    #[arg(long, global = true)]
    pub bind: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        /// Directory of static files served for non-API paths
        #[arg(long)]
        static_dir: Option<String>,
    },
    /// Print confirmed guests and the waiting list
    List,
    /// Register a guest
    Register { name: String },
    /// Cancel a registration by name or id
    Cancel {
        name: Option<String>,
        #[arg(long, conflicts_with = "name")]
        id: Option<Uuid>,
    },
    /// Delete every registration
    Reset {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

impl Command {
    pub fn cancel_target(name: Option<&str>, id: Option<Uuid>) -> Result<CancelTarget> {
        match (id, name) {
            (Some(id), _) => Ok(CancelTarget::Id(RegistrationId::from_uuid(id))),
            (None, Some(name)) => Ok(CancelTarget::Name(name.to_string())),
            (None, None) => Err(RosterError::invalid_input("Name is required")),
        }
    }
}

impl CliConfig {
    /// Loads the configuration file (or defaults) and applies command-line overrides.
    pub fn resolve(&self) -> Result<RosterConfig> {
        let mut config = match &self.config {
            Some(path) => RosterConfig::from_file(path)?,
            None => RosterConfig::default(),
        };

        if let Some(data_file) = &self.data_file {
            config.storage.data_file = data_file.clone();
        }
        if let Some(capacity) = self.capacity {
            config.event.capacity = capacity;
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Command::Serve {
            static_dir: Some(dir),
        } = &self.command
        {
            config.server.static_dir = Some(dir.clone());
        }

        config.validate()?;
        Ok(config)
    }
}
