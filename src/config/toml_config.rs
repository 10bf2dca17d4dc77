use crate::core::housekeeping::RetentionSchedule;
use crate::core::roster::DEFAULT_CAPACITY;
use crate::utils::error::{Result, RosterError};
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_socket_addr, validate_timestamp, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub event: EventConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    pub name: Option<String>,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_file")]
    pub data_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// RFC 3339 deadlines; either may be left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub data_expires_at: Option<String>,
    pub logs_expire_at: Option<String>,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_data_file() -> String {
    "rsvps.json".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_log_file() -> String {
    "rsvp-logs.txt".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            name: None,
            capacity: default_capacity(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: None,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_file: default_log_file(),
        }
    }
}

impl RosterConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| RosterError::ConfigError {
            message: format!("Cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RosterError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RosterError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn capacity(&self) -> usize {
        self.event.capacity
    }

    pub fn data_file(&self) -> &str {
        &self.storage.data_file
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        validate_socket_addr("server.bind", &self.server.bind)
    }

    pub fn retention_schedule(&self) -> Result<RetentionSchedule> {
        let data_expires_at = self
            .retention
            .data_expires_at
            .as_deref()
            .map(|v| validate_timestamp("retention.data_expires_at", v))
            .transpose()?;
        let logs_expire_at = self
            .retention
            .logs_expire_at
            .as_deref()
            .map(|v| validate_timestamp("retention.logs_expire_at", v))
            .transpose()?;
        Ok(RetentionSchedule {
            data_expires_at,
            logs_expire_at,
        })
    }
}

impl Validate for RosterConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("event.capacity", self.event.capacity, 1)?;
        validate_path("storage.data_file", &self.storage.data_file)?;
        if self.audit.enabled {
            validate_path("audit.log_file", &self.audit.log_file)?;
        }
        if let Some(dir) = &self.server.static_dir {
            validate_path("server.static_dir", dir)?;
        }
        self.bind_addr()?;
        self.retention_schedule()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_original_service() {
        let config = RosterConfig::from_toml_str("").unwrap();
        assert_eq!(config.capacity(), 12);
        assert_eq!(config.data_file(), "rsvps.json");
        assert_eq!(config.audit.log_file, "rsvp-logs.txt");
        assert_eq!(config.bind_addr().unwrap().port(), 3000);
        assert!(config.retention_schedule().unwrap().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[event]
name = "Valentine's dinner"
capacity = 20

[storage]
data_file = "/var/lib/rsvp/rsvps.json"

[server]
bind = "0.0.0.0:8080"
static_dir = "./public"

[audit]
log_file = "/var/log/rsvp.txt"

[retention]
data_expires_at = "2026-02-13T22:00:00+01:00"
logs_expire_at = "2026-04-13T19:00:00+02:00"
"#;

        let config = RosterConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.event.name.as_deref(), Some("Valentine's dinner"));
        assert_eq!(config.capacity(), 20);
        assert_eq!(config.server.static_dir.as_deref(), Some("./public"));

        let schedule = config.retention_schedule().unwrap();
        assert_eq!(
            schedule.data_expires_at.unwrap().to_rfc3339(),
            "2026-02-13T21:00:00+00:00"
        );
        assert!(schedule.logs_expire_at.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("RSVP_TEST_DATA_FILE", "/tmp/from-env.json");

        let toml_content = r#"
[storage]
data_file = "${RSVP_TEST_DATA_FILE}"
"#;

        let config = RosterConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.data_file(), "/tmp/from-env.json");

        std::env::remove_var("RSVP_TEST_DATA_FILE");
    }

    #[test]
    fn test_config_validation() {
        let zero = RosterConfig::from_toml_str("[event]\ncapacity = 0\n").unwrap();
        assert!(zero.validate().is_err());

        let bad_bind = RosterConfig::from_toml_str("[server]\nbind = \"nowhere\"\n").unwrap();
        assert!(bad_bind.validate().is_err());

        let bad_deadline =
            RosterConfig::from_toml_str("[retention]\ndata_expires_at = \"tomorrow\"\n").unwrap();
        assert!(bad_deadline.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[event]\ncapacity = 3\n")
            .unwrap();

        let config = RosterConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.capacity(), 3);
    }

    #[test]
    fn test_malformed_toml_is_reported() {
        assert!(RosterConfig::from_toml_str("[event\ncapacity = ").is_err());
    }
}
