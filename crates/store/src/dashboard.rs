//! Read-only summaries over the store.

use std::collections::BTreeMap;

use serde::Serialize;

use broadcast_core::store::CampaignStore;
use broadcast_core::types::{Campaign, CampaignId, CampaignStatus};

use crate::memory::MemoryStore;

/// Delivery rates for one campaign, in percent of processed messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignReport {
    pub campaign_id: CampaignId,
    pub name: String,
    pub status: CampaignStatus,
    pub processed: u32,
    pub sent: u32,
    pub failed: u32,
    pub success_rate: f64,
    pub failure_rate: f64,
}

impl CampaignReport {
    pub fn for_campaign(campaign: &Campaign) -> Self {
        let p = campaign.progress;
        let (success_rate, failure_rate) = rates(p.sent, p.failed);
        Self {
            campaign_id: campaign.id,
            name: campaign.name.clone(),
            status: campaign.status,
            processed: p.processed(),
            sent: p.sent,
            failed: p.failed,
            success_rate,
            failure_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub accounts: usize,
    pub verified_accounts: usize,
    pub contacts: usize,
    pub campaigns_by_status: BTreeMap<&'static str, usize>,
    /// Completed campaigns only.
    pub completed: Vec<CampaignReport>,
    pub total_sent: u32,
    pub total_failed: u32,
    pub overall_success_rate: f64,
    pub overall_failure_rate: f64,
}

impl DashboardSummary {
    pub fn collect(store: &MemoryStore) -> Self {
        let campaigns = store.list_campaigns();

        let mut campaigns_by_status = BTreeMap::new();
        for c in &campaigns {
            *campaigns_by_status.entry(c.status.as_str()).or_insert(0) += 1;
        }

        let completed: Vec<CampaignReport> = campaigns
            .iter()
            .filter(|c| c.status == CampaignStatus::Completed)
            .map(CampaignReport::for_campaign)
            .collect();
        let total_sent: u32 = completed.iter().map(|r| r.sent).sum();
        let total_failed: u32 = completed.iter().map(|r| r.failed).sum();
        let (overall_success_rate, overall_failure_rate) = rates(total_sent, total_failed);

        Self {
            accounts: store.list_accounts().len(),
            verified_accounts: store.verified_accounts().len(),
            contacts: store.list_contacts().len(),
            campaigns_by_status,
            completed,
            total_sent,
            total_failed,
            overall_success_rate,
            overall_failure_rate,
        }
    }

    pub fn campaigns_with(&self, status: CampaignStatus) -> usize {
        self.campaigns_by_status
            .get(status.as_str())
            .copied()
            .unwrap_or(0)
    }
}

fn rates(sent: u32, failed: u32) -> (f64, f64) {
    let total = sent + failed;
    if total == 0 {
        return (0.0, 0.0);
    }
    let total = f64::from(total);
    (
        f64::from(sent) / total * 100.0,
        f64::from(failed) / total * 100.0,
    )
}
