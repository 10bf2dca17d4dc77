use crate::domain::model::StoredRoster;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Persistence contract consumed by the roster.
///
/// `save_all` must be atomic: after a failed call the previously stored
/// state is still what `load_all` returns.
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// Claims the backing storage for this process. Called once before the
    /// first `load_all`; stores that cannot be shared must fail here.
    async fn acquire(&self) -> Result<()> {
        Ok(())
    }

    async fn load_all(&self) -> Result<StoredRoster>;
    async fn save_all(&self, roster: &StoredRoster) -> Result<()>;
}
