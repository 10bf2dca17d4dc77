//! Append-only action log of roster changes.
//!
//! Lines look like `[2026-02-13T19:04:11.120Z] RSVP_ADDED: Ada added to confirmed list`.

use crate::domain::model::{RosterEvent, Status};
use crate::utils::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Clones share the expired flag, so once any of them removes the file
/// none of them recreates it.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    expires_at: Option<DateTime<Utc>>,
    expired: Arc<AtomicBool>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            expires_at: None,
            expired: Arc::default(),
        }
    }

    /// Stops recording at `deadline`, even before the file has been removed.
    pub fn expiring_at(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.expires_at = deadline;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst) || self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// Appends one line. Failures are logged, never propagated.
    pub async fn record(&self, action: &str, details: &str) {
        if self.is_expired() {
            tracing::debug!(action, "Audit log expired; line not recorded");
            return;
        }
        let line = format!(
            "[{}] {}: {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            action,
            details
        );
        if let Err(e) = self.append(&line).await {
            tracing::error!(path = %self.path.display(), "Error writing to audit log: {}", e);
            return;
        }
        tracing::debug!("{}", line.trim_end());
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    /// Deletes the log file. Returns `false` when there was nothing to delete.
    pub async fn remove(&self) -> Result<bool> {
        self.expired.store(true, Ordering::SeqCst);
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn record_event(&self, event: &RosterEvent) {
        for (action, details) in describe(event) {
            self.record(action, &details).await;
        }
    }
}

fn list_label(status: Status) -> &'static str {
    match status {
        Status::Confirmed => "confirmed list",
        Status::Waitlisted => "waiting list",
    }
}

fn describe(event: &RosterEvent) -> Vec<(&'static str, String)> {
    match event {
        RosterEvent::Registered(r) => vec![(
            "RSVP_ADDED",
            format!("{} added to {}", r.name, list_label(r.status)),
        )],
        RosterEvent::Cancelled {
            cancelled,
            from,
            promoted,
        } => {
            let mut lines = vec![(
                "RSVP_CANCELLED",
                format!("{} removed from {}", cancelled.name, list_label(*from)),
            )];
            if let Some(p) = promoted {
                lines.push((
                    "RSVP_PROMOTED",
                    format!("{} promoted from waiting list to confirmed", p.name),
                ));
            }
            lines
        }
        RosterEvent::Promoted(r) => vec![(
            "RSVP_PROMOTED",
            format!("{} promoted from waiting list to confirmed", r.name),
        )],
        RosterEvent::Reset { removed } => vec![(
            "DATA_DELETED",
            format!("All event data deleted ({} registrations)", removed),
        )],
    }
}

/// Writes every roster event to `log` until the roster is dropped.
pub fn spawn_recorder(
    log: Arc<AuditLog>,
    mut events: broadcast::Receiver<RosterEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log.record_event(&event).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Audit recorder fell behind; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
