use anyhow::Result;
use rsvp_roster::core::{CancelTarget, RosterSnapshot, Status};
use rsvp_roster::utils::error::ErrorKind;
use rsvp_roster::{JsonFileStore, MemoryStore, Roster};
use std::sync::Arc;
use tempfile::TempDir;

fn names(snapshot: &RosterSnapshot) -> (Vec<String>, Vec<String>) {
    (
        snapshot.confirmed.iter().map(|r| r.name.clone()).collect(),
        snapshot.waitlisted.iter().map(|r| r.name.clone()).collect(),
    )
}

fn assert_invariants(snapshot: &RosterSnapshot) {
    assert!(snapshot.confirmed.len() <= snapshot.capacity);
    if snapshot.confirmed.len() < snapshot.capacity {
        assert!(snapshot.waitlisted.is_empty());
    }
    assert!(snapshot.confirmed.iter().all(|r| r.status == Status::Confirmed));
    assert!(snapshot.waitlisted.iter().all(|r| r.status == Status::Waitlisted));
    assert!(snapshot
        .waitlisted
        .windows(2)
        .all(|w| w[0].created_at <= w[1].created_at));

    let mut ids: Vec<_> = snapshot
        .confirmed
        .iter()
        .chain(snapshot.waitlisted.iter())
        .map(|r| r.id)
        .collect();
    let total = ids.len();
    ids.sort_by_key(|id| *id.as_uuid());
    ids.dedup();
    assert_eq!(ids.len(), total);
}

#[tokio::test]
async fn test_counts_track_min_and_overflow() -> Result<()> {
    let capacity = 3;
    let roster = Roster::open(MemoryStore::new(), capacity).await?;

    for n in 1..=8usize {
        roster.register(&format!("Guest {}", n)).await?;
        let snapshot = roster.list_all().await;
        assert_eq!(snapshot.confirmed.len(), n.min(capacity));
        assert_eq!(snapshot.waitlisted.len(), n.saturating_sub(capacity));
        assert_invariants(&snapshot);
    }
    Ok(())
}

#[tokio::test]
async fn test_promotion_is_fifo() -> Result<()> {
    let roster = Roster::open(MemoryStore::new(), 2).await?;
    for name in ["A", "B", "W1", "W2", "W3"] {
        roster.register(name).await?;
    }

    let mut promoted = Vec::new();
    for name in ["A", "B", "W1"] {
        let outcome = roster.cancel(&CancelTarget::Name(name.to_string())).await?;
        promoted.push(outcome.promoted.map(|r| r.name));
        assert_invariants(&roster.list_all().await);
    }

    assert_eq!(
        promoted,
        vec![
            Some("W1".to_string()),
            Some("W2".to_string()),
            Some("W3".to_string())
        ]
    );
    let (confirmed, waitlisted) = names(&roster.list_all().await);
    assert_eq!(confirmed, vec!["W2", "W3"]);
    assert!(waitlisted.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_list_all_is_idempotent() -> Result<()> {
    let roster = Roster::open(MemoryStore::new(), 1).await?;
    roster.register("A").await?;
    roster.register("B").await?;

    assert_eq!(roster.list_all().await, roster.list_all().await);
    Ok(())
}

#[tokio::test]
async fn test_capacity_two_scenario() -> Result<()> {
    let roster = Roster::open(MemoryStore::new(), 2).await?;

    assert_eq!(roster.register("A").await?.status(), Status::Confirmed);
    assert_eq!(roster.register("B").await?.status(), Status::Confirmed);
    assert_eq!(roster.register("C").await?.status(), Status::Waitlisted);

    let outcome = roster.cancel(&CancelTarget::Name("A".to_string())).await?;
    assert_eq!(outcome.cancelled.name, "A");
    assert_eq!(outcome.promoted.map(|r| r.name).as_deref(), Some("C"));

    let (confirmed, waitlisted) = names(&roster.list_all().await);
    assert_eq!(confirmed, vec!["B", "C"]);
    assert!(waitlisted.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_blank_name_is_rejected_without_change() -> Result<()> {
    let roster = Roster::open(MemoryStore::new(), 2).await?;
    roster.register("A").await?;
    let before = roster.list_all().await;

    for blank in ["", "   ", "\t\n"] {
        let err = roster.register(blank).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
    let err = roster
        .cancel(&CancelTarget::Name(" ".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert_eq!(roster.list_all().await, before);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_never_overbook() -> Result<()> {
    let capacity = 12;
    let roster = Arc::new(Roster::open(MemoryStore::new(), capacity).await?);

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let roster = roster.clone();
            tokio::spawn(async move { roster.register(&format!("Guest {}", i)).await })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }

    let snapshot = roster.list_all().await;
    assert_eq!(snapshot.confirmed.len(), capacity);
    assert_eq!(snapshot.waitlisted.len(), 50 - capacity);
    assert_invariants(&snapshot);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cancels_keep_seats_filled() -> Result<()> {
    let roster = Arc::new(Roster::open(MemoryStore::new(), 5).await?);
    for i in 0..15 {
        roster.register(&format!("Guest {}", i)).await?;
    }

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let roster = roster.clone();
            tokio::spawn(async move {
                roster
                    .cancel(&CancelTarget::Name(format!("Guest {}", i)))
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await??.promoted.is_some());
    }

    let snapshot = roster.list_all().await;
    assert_eq!(snapshot.confirmed.len(), 5);
    assert_eq!(snapshot.waitlisted.len(), 5);
    assert_invariants(&snapshot);
    Ok(())
}

#[tokio::test]
async fn test_json_file_survives_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("rsvps.json");

    let ada_id = {
        let roster = Roster::open(JsonFileStore::new(&path), 1).await?;
        let ada = roster.register("Ada").await?.registration;
        roster.register("Bob").await?;
        ada.id
    };

    let reopened = Roster::open(JsonFileStore::new(&path), 1).await?;
    let (confirmed, waitlisted) = names(&reopened.list_all().await);
    assert_eq!(confirmed, vec!["Ada"]);
    assert_eq!(waitlisted, vec!["Bob"]);

    let outcome = reopened.cancel(&CancelTarget::Id(ada_id)).await?;
    assert_eq!(outcome.promoted.map(|r| r.name).as_deref(), Some("Bob"));

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(raw["confirmed"][0]["name"], "Bob");
    assert_eq!(raw["confirmed"][0]["status"], "confirmed");
    assert_eq!(raw["waitlist"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn test_legacy_file_without_ids_loads() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("rsvps.json");
    std::fs::write(
        &path,
        r#"{
  "confirmed": [
    { "name": "Ada", "timestamp": "2026-02-01T18:00:00.000Z" },
    { "name": "Bob", "timestamp": "2026-02-01T18:01:00.000Z" }
  ],
  "waitlist": [
    { "name": "Cy", "timestamp": "2026-02-01T18:02:00.000Z" }
  ]
}"#,
    )?;

    let roster = Roster::open(JsonFileStore::new(&path), 2).await?;
    let snapshot = roster.list_all().await;
    assert_invariants(&snapshot);
    assert_eq!(snapshot.waitlisted[0].status, Status::Waitlisted);

    let outcome = roster.cancel(&CancelTarget::Name("ada".to_string())).await?;
    assert_eq!(outcome.promoted.map(|r| r.name).as_deref(), Some("Cy"));
    Ok(())
}

#[tokio::test]
async fn test_corrupt_file_refuses_to_open() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("rsvps.json");
    std::fs::write(&path, "[1, 2,")?;

    let err = Roster::open(JsonFileStore::new(&path), 2).await.err();
    assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Persistence));
    // The broken file is left for inspection.
    assert_eq!(std::fs::read_to_string(&path)?, "[1, 2,");
    Ok(())
}

#[tokio::test]
async fn test_second_process_cannot_open_the_same_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("rsvps.json");

    let server = Roster::open(JsonFileStore::new(&path), 2).await?;
    server.register("Ada").await?;

    // A one-shot command against the same file while the server runs.
    let err = Roster::open(JsonFileStore::new(&path), 2).await.err();
    assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Persistence));
    let err = JsonFileStore::new(&path).init().await.err();
    assert!(matches!(err, Some(rsvp_roster::RosterError::StoreLocked { .. })));

    server.register("Bob").await?;
    drop(server);

    let next = Roster::open(JsonFileStore::new(&path), 2).await?;
    let (confirmed, _) = names(&next.list_all().await);
    assert_eq!(confirmed, vec!["Ada", "Bob"]);
    Ok(())
}
