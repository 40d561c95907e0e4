//! Storage seam between the delivery engine and whatever holds campaigns.

use chrono::{DateTime, Utc};

use crate::error::CampaignResult;
use crate::types::{Account, AccountId, Campaign, CampaignId, CampaignStatus};

/// Keyed access to the campaign collection.
///
/// Every mutation goes through [`CampaignStore::modify_campaign`], which must
/// apply the closure to the currently stored entity under that entity's lock.
/// Callers never write back whole snapshots, so concurrent cycles for
/// different campaigns cannot overwrite each other's progress.
pub trait CampaignStore: Send + Sync {
    fn get_campaign(&self, id: &CampaignId) -> Option<Campaign>;

    fn insert_campaign(&self, campaign: Campaign);

    fn remove_campaign(&self, id: &CampaignId) -> Option<Campaign>;

    /// All campaigns, oldest first.
    fn list_campaigns(&self) -> Vec<Campaign>;

    /// Runs `f` against the stored campaign. Returns `NotFound` if the id is
    /// unknown, otherwise whatever `f` returns.
    fn modify_campaign(
        &self,
        id: &CampaignId,
        f: &mut dyn FnMut(&mut Campaign) -> CampaignResult<()>,
    ) -> CampaignResult<()>;

    fn get_account(&self, id: &AccountId) -> Option<Account>;

    /// Ids and schedule instants of every campaign currently `Scheduled`.
    fn scheduled_campaigns(&self) -> Vec<(CampaignId, DateTime<Utc>)> {
        self.list_campaigns()
            .into_iter()
            .filter(|c| c.status == CampaignStatus::Scheduled)
            .filter_map(|c| c.schedule.map(|at| (c.id, at)))
            .collect()
    }
}
