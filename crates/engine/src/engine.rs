use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use broadcast_core::clock::{Clock, SystemClock};
use broadcast_core::error::{CampaignError, CampaignResult};
use broadcast_core::event_bus::{make_event, CampaignEventKind, EventSink};
use broadcast_core::store::CampaignStore;
use broadcast_core::types::{
    Campaign, CampaignDraft, CampaignId, CampaignStatus, Contact, DelayBounds,
};

use crate::sampler::{DeliverySampler, RandomDelaySampler};
use crate::spintax::SpintaxExpander;
use crate::state_machine::{build_campaign, CampaignStateMachine};

/// A running delivery cycle. `generation` tells a cycle apart from a later
/// one registered under the same campaign id.
struct Cycle {
    generation: u64,
    handle: JoinHandle<()>,
}

/// What a cycle needs from the campaign, captured when it starts.
struct CyclePlan {
    recipients: Vec<Contact>,
    template: String,
    delay: DelayBounds,
}

/// Drives simulated delivery for every running campaign.
///
/// Each started campaign gets its own tokio task that walks the recipient
/// snapshot in order, sleeping a sampled delay before applying each outcome.
/// The engine owns the registry of those tasks; `cancel` removes an entry
/// under the same lock a cycle takes while applying an update, so nothing is
/// written for a campaign once `cancel` has returned.
#[derive(Clone)]
pub struct DeliveryEngine {
    store: Arc<dyn CampaignStore>,
    sampler: Arc<dyn DeliverySampler>,
    spintax: Arc<SpintaxExpander>,
    clock: Arc<dyn Clock>,
    default_delay: DelayBounds,
    cycles: Arc<DashMap<CampaignId, Cycle>>,
    next_generation: Arc<AtomicU64>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for DeliveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryEngine")
            .field("active_cycles", &self.cycles.len())
            .finish()
    }
}

impl DeliveryEngine {
    /// Creates an engine over `store` with an entropy-seeded sampler.
    pub fn new(store: Arc<dyn CampaignStore>) -> Self {
        Self {
            store,
            sampler: Arc::new(RandomDelaySampler::new()),
            spintax: Arc::new(SpintaxExpander::new()),
            clock: Arc::new(SystemClock),
            default_delay: DelayBounds::default(),
            cycles: Arc::new(DashMap::new()),
            next_generation: Arc::new(AtomicU64::new(0)),
            event_sink: broadcast_core::event_bus::noop_sink(),
        }
    }

    pub fn with_sampler(mut self, sampler: Arc<dyn DeliverySampler>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_spintax(mut self, spintax: Arc<SpintaxExpander>) -> Self {
        self.spintax = spintax;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Delay bounds for drafts that leave them unset.
    pub fn with_default_delay(mut self, delay: DelayBounds) -> Self {
        self.default_delay = delay;
        self
    }

    /// Attach an event sink for lifecycle events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn store(&self) -> &Arc<dyn CampaignStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Validates `draft` against the store's accounts and stores the result.
    /// Nothing is stored when validation fails.
    pub fn create_campaign(&self, draft: CampaignDraft) -> CampaignResult<Campaign> {
        let account = draft
            .account_id
            .and_then(|id| self.store.get_account(&id));
        let campaign = build_campaign(draft, account.as_ref(), self.default_delay, self.clock.now())?;

        info!(
            campaign_id = %campaign.id,
            name = %campaign.name,
            recipients = campaign.progress.total,
            status = %campaign.status,
            "Created campaign"
        );
        self.store.insert_campaign(campaign.clone());
        self.event_sink
            .emit(make_event(CampaignEventKind::Created, campaign.id, None));
        Ok(campaign)
    }

    /// Moves a `Draft` or `Scheduled` campaign to `Sending` and spawns its
    /// delivery cycle. Starting a campaign that is already sending is
    /// rejected and never creates a second cycle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, id: &CampaignId) -> CampaignResult<()> {
        let vacant = match self.cycles.entry(*id) {
            Entry::Occupied(_) => {
                return Err(CampaignError::InvalidTransition {
                    from: CampaignStatus::Sending,
                    to: CampaignStatus::Sending,
                })
            }
            Entry::Vacant(v) => v,
        };

        let mut plan = None;
        self.store.modify_campaign(id, &mut |campaign: &mut Campaign| {
            CampaignStateMachine::apply(campaign, CampaignStatus::Sending)?;
            plan = Some(CyclePlan {
                recipients: campaign.recipients.clone(),
                template: campaign.message.text.clone(),
                delay: campaign.delay,
            });
            Ok(())
        })?;
        let plan = plan.ok_or_else(|| CampaignError::campaign_not_found(*id))?;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let engine = self.clone();
        let campaign_id = *id;
        info!(
            campaign_id = %campaign_id,
            recipients = plan.recipients.len(),
            delay_min = plan.delay.min,
            delay_max = plan.delay.max,
            "Starting delivery cycle"
        );
        let handle = tokio::spawn(async move {
            engine.run_cycle(campaign_id, generation, plan).await;
        });
        vacant.insert(Cycle { generation, handle });

        self.event_sink
            .emit(make_event(CampaignEventKind::Started, campaign_id, None));
        Ok(())
    }

    /// Stops the cycle for `id` if one is running. After this returns no
    /// further progress is written for `id`. Returns whether a cycle was
    /// stopped.
    pub fn cancel(&self, id: &CampaignId) -> bool {
        match self.cycles.remove(id) {
            Some((_, cycle)) => {
                cycle.handle.abort();
                info!(campaign_id = %id, "Cancelled delivery cycle");
                self.event_sink
                    .emit(make_event(CampaignEventKind::Cancelled, *id, None));
                true
            }
            None => false,
        }
    }

    /// Stops a sending campaign and marks it `Paused`. Paused campaigns
    /// cannot be restarted.
    pub fn pause(&self, id: &CampaignId) -> CampaignResult<()> {
        self.cancel(id);
        self.store.modify_campaign(id, &mut |campaign: &mut Campaign| {
            CampaignStateMachine::apply(campaign, CampaignStatus::Paused)
        })?;
        info!(campaign_id = %id, "Paused campaign");
        self.event_sink
            .emit(make_event(CampaignEventKind::Paused, *id, None));
        Ok(())
    }

    /// Cancels any running cycle, then removes the campaign.
    pub fn delete(&self, id: &CampaignId) -> CampaignResult<Campaign> {
        self.cancel(id);
        let removed = self
            .store
            .remove_campaign(id)
            .ok_or_else(|| CampaignError::campaign_not_found(*id))?;
        info!(campaign_id = %id, name = %removed.name, "Deleted campaign");
        self.event_sink
            .emit(make_event(CampaignEventKind::Deleted, *id, None));
        Ok(removed)
    }

    /// Marks campaigns that were left `Sending` without a live cycle (for
    /// example after a restart) as `Paused`. Returns the affected ids.
    pub fn recover_interrupted(&self) -> Vec<CampaignId> {
        let stranded: Vec<CampaignId> = self
            .store
            .list_campaigns()
            .into_iter()
            .filter(|c| c.status == CampaignStatus::Sending && !self.cycles.contains_key(&c.id))
            .map(|c| c.id)
            .collect();

        let mut recovered = Vec::with_capacity(stranded.len());
        for id in stranded {
            match self.store.modify_campaign(&id, &mut |campaign: &mut Campaign| {
                CampaignStateMachine::apply(campaign, CampaignStatus::Paused)
            }) {
                Ok(()) => {
                    warn!(campaign_id = %id, "Interrupted campaign marked paused");
                    self.event_sink
                        .emit(make_event(CampaignEventKind::Paused, id, None));
                    recovered.push(id);
                }
                Err(e) => warn!(campaign_id = %id, error = %e, "Could not recover campaign"),
            }
        }
        recovered
    }

    /// Cancels every running cycle. Returns how many were stopped.
    pub fn shutdown(&self) -> usize {
        let ids: Vec<CampaignId> = self.cycles.iter().map(|e| *e.key()).collect();
        ids.iter().filter(|id| self.cancel(id)).count()
    }

    /// A cycle counts as active while it is registered and its task has not
    /// finished.
    pub fn is_active(&self, id: &CampaignId) -> bool {
        self.cycles
            .get(id)
            .map(|c| !c.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.active_campaigns().len()
    }

    pub fn active_campaigns(&self) -> Vec<CampaignId> {
        self.cycles
            .iter()
            .filter(|c| !c.value().handle.is_finished())
            .map(|c| *c.key())
            .collect()
    }

    async fn run_cycle(&self, id: CampaignId, generation: u64, plan: CyclePlan) {
        for recipient in &plan.recipients {
            let sample = self.sampler.sample(plan.delay.min, plan.delay.max);
            let body = self.spintax.expand(&plan.template);
            debug!(
                campaign_id = %id,
                to = %recipient.phone,
                delay_ms = sample.delay.as_millis() as u64,
                body_len = body.len(),
                "Simulating send"
            );

            tokio::time::sleep(sample.delay).await;

            let mut finished = false;
            let result = {
                // Held while writing so that `cancel` cannot interleave.
                let guard = match self.cycles.get(&id) {
                    Some(cycle) if cycle.generation == generation => cycle,
                    _ => return,
                };
                let result = self.store.modify_campaign(&id, &mut |campaign: &mut Campaign| {
                    if !campaign.progress.record(sample.success) {
                        return Ok(());
                    }
                    if campaign.progress.is_finished() {
                        CampaignStateMachine::apply(campaign, CampaignStatus::Completed)?;
                        finished = true;
                    }
                    Ok(())
                });
                drop(guard);
                result
            };

            if let Err(e) = result {
                warn!(campaign_id = %id, error = %e, "Stopping delivery cycle");
                self.release(&id, generation);
                return;
            }

            let kind = if sample.success {
                metrics::counter!("campaign.messages_sent").increment(1);
                CampaignEventKind::MessageSent
            } else {
                metrics::counter!("campaign.messages_failed").increment(1);
                CampaignEventKind::MessageFailed
            };
            self.event_sink
                .emit(make_event(kind, id, Some(recipient.id)).with_body(body));

            if finished {
                metrics::counter!("campaign.completed").increment(1);
                info!(campaign_id = %id, "Campaign completed");
                self.event_sink
                    .emit(make_event(CampaignEventKind::Completed, id, None));
                break;
            }
        }
        self.release(&id, generation);
    }

    /// Drops the registry entry for `id` if it still belongs to `generation`.
    fn release(&self, id: &CampaignId, generation: u64) {
        self.cycles.remove_if(id, |_, cycle| cycle.generation == generation);
    }
}
