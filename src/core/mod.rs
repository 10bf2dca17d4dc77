pub mod housekeeping;
pub mod roster;

pub use crate::domain::model::{
    CancelOutcome, CancelTarget, RegisterOutcome, Registration, RegistrationId, RosterEvent,
    RosterSnapshot, Status, StoredRoster,
};
pub use crate::domain::ports::RosterStore;
pub use crate::utils::error::Result;
