use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Registration not found: {identifier}")]
    NotFound { identifier: String },

    #[error("Persistence failed during {operation}: {message}")]
    Persistence {
        operation: &'static str,
        message: String,
    },

    #[error("Registration is closed: {reason}")]
    RegistrationClosed { reason: String },

    #[error("Data file {path} is in use by another process")]
    StoreLocked { path: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },
}

/// The failure kinds callers need to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Closed,
    Persistence,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RosterError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }

    pub fn persistence(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Persistence {
            operation,
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::RegistrationClosed { .. } => ErrorKind::Closed,
            Self::Persistence { .. }
            | Self::StoreLocked { .. }
            | Self::IoError(_)
            | Self::SerializationError(_) => ErrorKind::Persistence,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorKind::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.kind() {
            ErrorKind::InvalidInput => ErrorSeverity::Medium,
            ErrorKind::NotFound | ErrorKind::Closed => ErrorSeverity::High,
            ErrorKind::Persistence | ErrorKind::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "Provide a non-empty name",
            Self::NotFound { .. } => "Check the spelling of the name or use the registration id",
            Self::RegistrationClosed { .. } => {
                "The event has ended; registrations are no longer accepted"
            }
            Self::StoreLocked { .. } => {
                "Stop the running server or send the change through its HTTP API"
            }
            Self::Persistence { .. } | Self::IoError(_) => {
                "Check that the data file location exists and is writable"
            }
            Self::SerializationError(_) => "The data file is corrupt; restore it from a backup",
            Self::MissingConfigError { .. } => "Add the missing field to the configuration file",
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. } => "Fix the configuration file and retry",
        }
    }

    /// Message safe to show to a guest. Storage details stay in the logs.
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::InvalidInput { message } => message.clone(),
            Self::NotFound { .. } => "Name not found in RSVP list".to_string(),
            Self::RegistrationClosed { .. } => "Registration for this event is closed".to_string(),
            Self::Persistence { .. } | Self::IoError(_) | Self::SerializationError(_) => {
                "The RSVP list could not be saved or loaded".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;
