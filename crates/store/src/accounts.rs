use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use broadcast_core::error::CampaignResult;
use broadcast_core::types::{Account, AccountId};

use crate::memory::MemoryStore;

/// Simulated account verification: waits a fixed delay, then flags the
/// account as verified.
#[derive(Clone)]
pub struct AccountVerifier {
    store: Arc<MemoryStore>,
    delay: Duration,
}

impl AccountVerifier {
    pub fn new(store: Arc<MemoryStore>, delay: Duration) -> Self {
        Self { store, delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Fails with `NotFound` if the account was deleted before the delay
    /// elapsed.
    pub async fn verify(&self, id: AccountId) -> CampaignResult<Account> {
        tokio::time::sleep(self.delay).await;
        let account = self.store.mark_verified(&id)?;
        info!(account_id = %id, "Account verified");
        Ok(account)
    }

    /// Runs [`verify`](Self::verify) in the background.
    pub fn spawn_verification(&self, id: AccountId) -> JoinHandle<()> {
        let verifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = verifier.verify(id).await {
                warn!(account_id = %id, error = %e, "Account verification failed");
            }
        })
    }
}
