use crate::core::{
    CancelOutcome, CancelTarget, RegisterOutcome, Registration, RosterEvent, RosterSnapshot,
    RosterStore, Status, StoredRoster,
};
use crate::utils::error::{Result, RosterError};
use crate::utils::validation::{normalize_name, validate_positive_number};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::{broadcast, Mutex};

pub const DEFAULT_CAPACITY: usize = 12;

/// Events a subscriber may fall behind by. A receiver that lags further
/// loses the oldest events and gets `RecvError::Lagged` instead.
const EVENT_BUFFER: usize = 1024;

struct RosterState {
    stored: StoredRoster,
    /// Latest timestamp handed out; new registrations never go below it.
    clock_floor: Option<DateTime<Utc>>,
    /// Set once the event's data has expired; `register` is refused afterwards.
    closed: bool,
    /// Promotions made while opening, held until `announce_open_promotions`.
    open_promotions: Vec<Registration>,
}

impl RosterState {
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.clock_floor {
            Some(floor) if floor > now => floor,
            _ => now,
        };
        self.clock_floor = Some(ts);
        ts
    }
}

/// Capacity-bounded RSVP list with a FIFO waitlist.
///
/// Every operation holds one lock across the store round trip. Mutations
/// are applied to a working copy that only replaces the live state once
/// `save_all` succeeds, so a store failure leaves nothing behind.
pub struct Roster<S: RosterStore> {
    store: S,
    capacity: usize,
    state: Mutex<RosterState>,
    events: broadcast::Sender<RosterEvent>,
}

impl<S: RosterStore> Roster<S> {
    pub async fn open(store: S, capacity: usize) -> Result<Self> {
        validate_positive_number("capacity", capacity, 1)?;

        store.acquire().await?;
        let mut stored = store.load_all().await?;
        stored.normalize_statuses();
        let mut dirty = reassign_duplicate_ids(&mut stored);

        let promoted = fill_open_seats(&mut stored, capacity);
        for p in &promoted {
            tracing::info!(id = %p.id, "{} promoted from waiting list to confirmed on load", p.name);
            dirty = true;
        }
        if stored.confirmed.len() > capacity {
            tracing::warn!(
                confirmed = stored.confirmed.len(),
                capacity,
                "Stored roster exceeds capacity; new guests will be waitlisted"
            );
        }
        if dirty {
            store.save_all(&stored).await?;
        }

        tracing::debug!(
            confirmed = stored.confirmed.len(),
            waitlisted = stored.waitlisted.len(),
            capacity,
            "Roster opened"
        );

        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Ok(Self {
            store,
            capacity,
            state: Mutex::new(RosterState {
                clock_floor: stored.latest_created_at(),
                stored,
                closed: false,
                open_promotions: promoted,
            }),
            events,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RosterEvent> {
        self.events.subscribe()
    }

    /// Publishes a `Promoted` event for each guest `open` moved into a free
    /// seat. Subscribers only exist after `open` returns, so callers invoke
    /// this once theirs are attached. Later calls publish nothing.
    pub async fn announce_open_promotions(&self) -> usize {
        let promoted = std::mem::take(&mut self.state.lock().await.open_promotions);
        let count = promoted.len();
        for r in promoted {
            self.publish(RosterEvent::Promoted(r));
        }
        count
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    pub async fn register(&self, name: &str) -> Result<RegisterOutcome> {
        let name = normalize_name(name)?;

        let mut state = self.state.lock().await;
        if state.closed {
            return Err(RosterError::RegistrationClosed {
                reason: "event data has expired".to_string(),
            });
        }
        let mut next = state.stored.clone();
        let created_at = state.next_timestamp();

        let registration = if next.confirmed.len() < self.capacity {
            let r = Registration::new(name, created_at, Status::Confirmed);
            next.confirmed.push(r.clone());
            r
        } else {
            let r = Registration::new(name, created_at, Status::Waitlisted);
            next.waitlisted.push(r.clone());
            r
        };

        self.store.save_all(&next).await?;
        state.stored = next;
        drop(state);

        tracing::info!(
            id = %registration.id,
            status = %registration.status,
            "{} added to {} list",
            registration.name,
            registration.status
        );
        self.publish(RosterEvent::Registered(registration.clone()));

        Ok(RegisterOutcome { registration })
    }

    pub async fn cancel(&self, target: &CancelTarget) -> Result<CancelOutcome> {
        let wanted_name = match target {
            CancelTarget::Name(raw) => Some(normalize_name(raw)?),
            CancelTarget::Id(_) => None,
        };
        let matches = |r: &Registration| match (target, wanted_name) {
            (CancelTarget::Id(id), _) => r.id == *id,
            (CancelTarget::Name(_), Some(name)) => r.name_matches(name),
            (CancelTarget::Name(_), None) => false,
        };

        let mut state = self.state.lock().await;
        let mut next = state.stored.clone();

        let (cancelled, from) = if let Some(pos) = next.confirmed.iter().position(|r| matches(r)) {
            (next.confirmed.remove(pos), Status::Confirmed)
        } else if let Some(pos) = next.waitlisted.iter().position(|r| matches(r)) {
            (next.waitlisted.remove(pos), Status::Waitlisted)
        } else {
            return Err(RosterError::not_found(target.to_string()));
        };

        // Removing a waitlisted entry never frees a seat.
        let promoted = match from {
            Status::Confirmed => fill_open_seats(&mut next, self.capacity).into_iter().next(),
            Status::Waitlisted => None,
        };

        self.store.save_all(&next).await?;
        state.stored = next;
        drop(state);

        tracing::info!(id = %cancelled.id, "{} removed from {} list", cancelled.name, from);
        if let Some(p) = &promoted {
            tracing::info!(id = %p.id, "{} promoted from waiting list to confirmed", p.name);
        }
        self.publish(RosterEvent::Cancelled {
            cancelled: cancelled.clone(),
            from,
            promoted: promoted.clone(),
        });

        Ok(CancelOutcome {
            cancelled,
            from,
            promoted,
        })
    }

    pub async fn list_all(&self) -> RosterSnapshot {
        let state = self.state.lock().await;
        RosterSnapshot {
            confirmed: state.stored.confirmed.clone(),
            waitlisted: state.stored.waitlisted.clone(),
            capacity: self.capacity,
        }
    }

    /// Administrative wipe of both partitions. Returns how many entries were removed.
    pub async fn reset_all(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let removed = state.stored.len();
        let next = StoredRoster::default();

        self.store.save_all(&next).await?;
        state.stored = next;
        drop(state);

        tracing::info!(removed, "All roster data deleted");
        self.publish(RosterEvent::Reset { removed });
        Ok(removed)
    }

    /// Wipes both partitions and refuses every later `register`. Returns how
    /// many entries were removed; repeated calls on an empty roster write nothing.
    pub async fn close_registrations(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let removed = state.stored.len();
        if removed > 0 {
            let next = StoredRoster::default();
            self.store.save_all(&next).await?;
            state.stored = next;
        }
        let newly_closed = !state.closed;
        state.closed = true;
        drop(state);

        if newly_closed {
            tracing::info!(removed, "Registration closed");
        }
        if removed > 0 {
            self.publish(RosterEvent::Reset { removed });
        }
        Ok(removed)
    }

    fn publish(&self, event: RosterEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Moves waitlisted entries, oldest first, into confirmed until it is full.
fn fill_open_seats(stored: &mut StoredRoster, capacity: usize) -> Vec<Registration> {
    let mut promoted = Vec::new();
    while stored.confirmed.len() < capacity && !stored.waitlisted.is_empty() {
        let mut r = stored.waitlisted.remove(0);
        r.status = Status::Confirmed;
        stored.confirmed.push(r.clone());
        promoted.push(r);
    }
    promoted
}

fn reassign_duplicate_ids(stored: &mut StoredRoster) -> bool {
    let mut seen = HashSet::new();
    let mut changed = false;
    for r in stored
        .confirmed
        .iter_mut()
        .chain(stored.waitlisted.iter_mut())
    {
        while !seen.insert(r.id) {
            tracing::warn!(id = %r.id, name = %r.name, "Duplicate registration id; assigning a new one");
            r.id = crate::core::RegistrationId::new();
            changed = true;
        }
    }
    changed
}
