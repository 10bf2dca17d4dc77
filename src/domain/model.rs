use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque registration identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(Uuid);

impl RegistrationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Confirmed,
    #[serde(alias = "waitlist")]
    Waitlisted,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed => f.write_str("confirmed"),
            Self::Waitlisted => f.write_str("waitlisted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub id: RegistrationId,
    pub name: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Filled from the holding partition when absent in older files.
    #[serde(default = "default_status")]
    pub status: Status,
}

fn default_status() -> Status {
    Status::Confirmed
}

impl Registration {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>, status: Status) -> Self {
        Self {
            id: RegistrationId::new(),
            name: name.into(),
            created_at,
            status,
        }
    }

    /// Case-insensitive name comparison used for cancel-by-name.
    pub fn name_matches(&self, other: &str) -> bool {
        self.name.to_lowercase() == other.to_lowercase()
    }
}

/// The persisted form of a roster: both partitions in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRoster {
    #[serde(default)]
    pub confirmed: Vec<Registration>,
    #[serde(default, rename = "waitlist")]
    pub waitlisted: Vec<Registration>,
}

impl StoredRoster {
    pub fn len(&self) -> usize {
        self.confirmed.len() + self.waitlisted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty() && self.waitlisted.is_empty()
    }

    /// Makes each entry's status agree with the partition that holds it.
    pub fn normalize_statuses(&mut self) {
        for r in &mut self.confirmed {
            r.status = Status::Confirmed;
        }
        for r in &mut self.waitlisted {
            r.status = Status::Waitlisted;
        }
    }

    pub fn latest_created_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed
            .iter()
            .chain(self.waitlisted.iter())
            .map(|r| r.created_at)
            .max()
    }
}

/// Read-only view returned by `Roster::list_all`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterSnapshot {
    pub confirmed: Vec<Registration>,
    #[serde(rename = "waitlist")]
    pub waitlisted: Vec<Registration>,
    pub capacity: usize,
}

impl RosterSnapshot {
    pub fn spots_left(&self) -> usize {
        self.capacity.saturating_sub(self.confirmed.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOutcome {
    pub registration: Registration,
}

impl RegisterOutcome {
    pub fn status(&self) -> Status {
        self.registration.status
    }
}

/// How a cancellation names its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelTarget {
    Id(RegistrationId),
    Name(String),
}

impl fmt::Display for CancelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {}", id),
            Self::Name(name) => write!(f, "name '{}'", name.trim()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
    pub cancelled: Registration,
    /// Partition the cancelled entry was removed from.
    pub from: Status,
    pub promoted: Option<Registration>,
}

/// Emitted after every committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEvent {
    Registered(Registration),
    Cancelled {
        cancelled: Registration,
        from: Status,
        promoted: Option<Registration>,
    },
    Reset {
        removed: usize,
    },
    /// A waitlisted guest moved into a seat that was already free when the roster was opened.
    Promoted(Registration),
}
