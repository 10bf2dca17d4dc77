use clap::Parser;
use rsvp_roster::adapters::http;
use rsvp_roster::core::housekeeping::{enforce_elapsed, spawn_housekeeping, RetentionSchedule};
use rsvp_roster::utils::audit::{spawn_recorder, AuditLog};
use rsvp_roster::utils::error::ErrorSeverity;
use rsvp_roster::utils::logger;
use rsvp_roster::{CliConfig, Command, JsonFileStore, Roster, RosterConfig, RosterError, Status};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(cli).await {
        tracing::error!(
            "Command failed: {} (Kind: {:?}, Severity: {:?})",
            e,
            e.kind(),
            e.severity()
        );
        tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 1,
            ErrorSeverity::High => 2,
            ErrorSeverity::Critical => 3,
        };
        std::process::exit(exit_code);
    }
}

async fn run(cli: CliConfig) -> rsvp_roster::Result<()> {
    let config = cli.resolve()?;
    let schedule = config.retention_schedule()?;

    // Holds the data file lock until `roster` is dropped.
    let store = JsonFileStore::new(config.data_file());
    store.init().await?;
    let roster = Arc::new(Roster::open(store, config.capacity()).await?);

    let audit =
        Arc::new(AuditLog::new(&config.audit.log_file).expiring_at(schedule.logs_expire_at));
    let recorder = config
        .audit
        .enabled
        .then(|| spawn_recorder(audit.clone(), roster.subscribe()));
    roster.announce_open_promotions().await;

    let result = match enforce_elapsed(&roster, &audit, &schedule).await {
        Ok(()) => execute(cli.command, roster.clone(), audit, schedule, &config).await,
        Err(e) => Err(e),
    };
    finish_audit(roster, recorder).await;
    result
}

async fn execute(
    command: Command,
    roster: Arc<Roster<JsonFileStore>>,
    audit: Arc<AuditLog>,
    schedule: RetentionSchedule,
    config: &RosterConfig,
) -> rsvp_roster::Result<()> {
    match command {
        Command::Serve { .. } => serve(roster, audit, schedule, config).await,
        Command::List => {
            let snapshot = roster.list_all().await;
            println!(
                "Confirmed ({}/{}):",
                snapshot.confirmed.len(),
                snapshot.capacity
            );
            for (i, r) in snapshot.confirmed.iter().enumerate() {
                println!("  {:>2}. {}  [{}]", i + 1, r.name, r.id);
            }
            println!("Waiting list ({}):", snapshot.waitlisted.len());
            for (i, r) in snapshot.waitlisted.iter().enumerate() {
                println!("  {:>2}. {}  [{}]", i + 1, r.name, r.id);
            }
            Ok(())
        }
        Command::Register { name } => {
            let outcome = roster.register(&name).await?;
            match outcome.status() {
                Status::Confirmed => println!("✅ RSVP confirmed! ({})", outcome.registration.id),
                Status::Waitlisted => {
                    println!("⏳ Added to waiting list ({})", outcome.registration.id)
                }
            }
            Ok(())
        }
        Command::Cancel { name, id } => {
            let target = Command::cancel_target(name.as_deref(), id)?;
            let outcome = roster.cancel(&target).await?;
            match &outcome.promoted {
                Some(p) => println!(
                    "✅ {} has been removed. {} has been moved from waiting list to confirmed.",
                    outcome.cancelled.name, p.name
                ),
                None => println!("✅ {} has been removed.", outcome.cancelled.name),
            }
            Ok(())
        }
        Command::Reset { yes } => {
            if !yes {
                return Err(RosterError::invalid_input(
                    "Refusing to delete all registrations without --yes",
                ));
            }
            let removed = roster.reset_all().await?;
            println!("🗑️  Deleted {} registrations", removed);
            Ok(())
        }
    }
}

async fn serve(
    roster: Arc<Roster<JsonFileStore>>,
    audit: Arc<AuditLog>,
    schedule: RetentionSchedule,
    config: &RosterConfig,
) -> rsvp_roster::Result<()> {
    let addr = config.bind_addr()?;
    let housekeeping =
        (!schedule.is_empty()).then(|| spawn_housekeeping(roster.clone(), audit, schedule));

    tracing::info!(
        event = config.event.name.as_deref().unwrap_or("unnamed event"),
        "Maximum attendees: {}",
        roster.capacity()
    );
    if roster.is_closed().await {
        tracing::warn!("Event data has expired; new registrations will be refused");
    }
    let app = http::router(roster, config.server.static_dir.as_deref().map(Path::new));
    let result = http::serve(addr, app).await;

    // The housekeeping task holds a roster handle; release it before shutdown.
    if let Some(handle) = housekeeping {
        handle.abort();
        let _ = handle.await;
    }
    result
}

/// Drops the roster so the recorder sees the channel close, then waits for it to flush.
async fn finish_audit(roster: Arc<Roster<JsonFileStore>>, audit: Option<tokio::task::JoinHandle<()>>) {
    drop(roster);
    if let Some(handle) = audit {
        if let Err(e) = handle.await {
            tracing::warn!("Audit recorder did not finish: {}", e);
        }
    }
}
