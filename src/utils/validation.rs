use crate::utils::error::{RosterError, Result};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(RosterError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(RosterError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(RosterError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_socket_addr(field_name: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse::<SocketAddr>()
        .map_err(|e| RosterError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Invalid socket address: {}", e),
        })
}

pub fn validate_timestamp(field_name: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RosterError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Expected an RFC 3339 timestamp: {}", e),
        })
}

/// Trims a guest name, rejecting names that are empty once trimmed.
pub fn normalize_name(raw: &str) -> Result<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RosterError::invalid_input("Name is required"));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorKind;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("data_file", "rsvps.json").is_ok());
        assert!(validate_path("data_file", "").is_err());
        assert!(validate_path("data_file", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("capacity", 12, 1).is_ok());
        assert!(validate_positive_number("capacity", 0, 1).is_err());
    }

    #[test]
    fn test_validate_socket_addr() {
        assert!(validate_socket_addr("bind", "127.0.0.1:3000").is_ok());
        assert!(validate_socket_addr("bind", "localhost").is_err());
    }

    #[test]
    fn test_validate_timestamp() {
        let ts = validate_timestamp("data_expires_at", "2026-02-13T22:00:00+00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-02-13T22:00:00+00:00");
        assert!(validate_timestamp("data_expires_at", "next friday").is_err());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Ada Lovelace \n").unwrap(), "Ada Lovelace");
        let err = normalize_name(" \t ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
