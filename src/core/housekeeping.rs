use crate::core::roster::Roster;
use crate::core::RosterStore;
use crate::utils::audit::AuditLog;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Longest single sleep; long waits are split so clock changes are picked up.
const MAX_SLEEP: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionSchedule {
    /// When all registrations are wiped.
    pub data_expires_at: Option<DateTime<Utc>>,
    /// When the audit log file is deleted.
    pub logs_expire_at: Option<DateTime<Utc>>,
}

impl RetentionSchedule {
    pub fn is_empty(&self) -> bool {
        self.data_expires_at.is_none() && self.logs_expire_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    ExpireData,
    ExpireLogs,
}

pub fn spawn_housekeeping<S>(
    roster: Arc<Roster<S>>,
    audit: Arc<AuditLog>,
    schedule: RetentionSchedule,
) -> JoinHandle<()>
where
    S: RosterStore + 'static,
{
    tokio::spawn(async move { run_schedule(&roster, &audit, &schedule).await })
}

/// Runs the jobs whose deadline has already passed, data first.
///
/// Commands call this before touching the roster so a process started after
/// a deadline behaves as if the scheduled job had fired.
pub async fn enforce_elapsed<S: RosterStore>(
    roster: &Roster<S>,
    audit: &AuditLog,
    schedule: &RetentionSchedule,
) -> Result<()> {
    let now = Utc::now();
    if schedule.data_expires_at.is_some_and(|at| at <= now) {
        expire_data(roster).await?;
    }
    if schedule.logs_expire_at.is_some_and(|at| at <= now) {
        expire_logs(audit).await?;
    }
    Ok(())
}

/// Runs each configured job once its deadline has passed, earliest first.
pub async fn run_schedule<S: RosterStore>(
    roster: &Roster<S>,
    audit: &AuditLog,
    schedule: &RetentionSchedule,
) {
    let mut jobs: Vec<(DateTime<Utc>, Job)> = schedule
        .data_expires_at
        .map(|at| (at, Job::ExpireData))
        .into_iter()
        .chain(schedule.logs_expire_at.map(|at| (at, Job::ExpireLogs)))
        .collect();
    jobs.sort_by_key(|(at, _)| *at);

    for (at, job) in jobs {
        if at > Utc::now() {
            tracing::info!(?job, deadline = %at.to_rfc3339(), "Housekeeping scheduled");
        }
        wait_until(at).await;
        let outcome = match job {
            Job::ExpireData => expire_data(roster).await.map(|_| ()),
            Job::ExpireLogs => expire_logs(audit).await.map(|_| ()),
        };
        if let Err(e) = outcome {
            tracing::error!(?job, "Housekeeping failed: {}", e);
        }
    }
}

async fn wait_until(deadline: DateTime<Utc>) {
    loop {
        let remaining = match (deadline - Utc::now()).to_std() {
            Ok(d) if !d.is_zero() => d,
            _ => return,
        };
        tokio::time::sleep(remaining.min(MAX_SLEEP)).await;
    }
}

/// Deletes all registrations and closes the roster for good.
pub async fn expire_data<S: RosterStore>(roster: &Roster<S>) -> Result<usize> {
    let removed = roster.close_registrations().await?;
    if removed > 0 {
        tracing::info!(removed, "Event data deleted after event end");
    }
    Ok(removed)
}

/// Deletes the audit log; it is not written again afterwards.
pub async fn expire_logs(audit: &AuditLog) -> Result<bool> {
    let removed = audit.remove().await?;
    if removed {
        tracing::info!(path = %audit.path().display(), "Audit log deleted");
    }
    Ok(removed)
}
