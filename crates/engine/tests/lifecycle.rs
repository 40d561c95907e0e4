use std::sync::Arc;
use std::time::Duration;

use broadcast_core::clock::{Clock, ManualClock};
use broadcast_core::store::CampaignStore;
use broadcast_core::types::{CampaignDraft, CampaignStatus, DelayBounds, Message};
use broadcast_engine::{DeliveryEngine, RandomDelaySampler, ScheduleMonitor, SpintaxExpander};
use broadcast_store::{AccountVerifier, MemoryBackend, MemoryStore};
use chrono::Utc;
use tokio::sync::watch;

async fn verified_store() -> (Arc<MemoryStore>, uuid::Uuid) {
    let store = Arc::new(MemoryStore::new());
    let account = store.add_account("Sales", "+1 555 010 0000").unwrap();
    AccountVerifier::new(store.clone(), Duration::from_secs(3))
        .verify(account.id)
        .await
        .unwrap();
    (store, account.id)
}

fn engine_for(store: &Arc<MemoryStore>, seed: u64) -> DeliveryEngine {
    DeliveryEngine::new(store.clone())
        .with_sampler(Arc::new(RandomDelaySampler::seeded(seed)))
        .with_spintax(Arc::new(SpintaxExpander::seeded(seed)))
}

#[tokio::test(start_paused = true)]
async fn two_recipients_complete_after_two_seconds() {
    let (store, account_id) = verified_store().await;
    store.import_contacts("Ada,111\nBob,222\n");

    let engine = engine_for(&store, 7);
    let campaign = engine
        .create_campaign(CampaignDraft {
            name: "Flash sale".to_string(),
            account_id: Some(account_id),
            recipients: store.list_contacts(),
            message: Message::text("{Hi|Hello} {friend|there}!"),
            schedule: None,
            delay: Some(DelayBounds::new(1, 1)),
        })
        .unwrap();
    assert_eq!(campaign.status, CampaignStatus::Draft);

    engine.start(&campaign.id).unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    let done = store.get_campaign(&campaign.id).unwrap();
    assert_eq!(done.status, CampaignStatus::Completed);
    assert_eq!(done.progress.sent + done.progress.failed, 2);
}

#[tokio::test(start_paused = true)]
async fn progress_never_exceeds_total_across_seeds() {
    let (store, account_id) = verified_store().await;
    store.import_contacts("A,1\nB,2\nC,3\nD,4\nE,5\n");
    let recipients = store.list_contacts();

    for seed in 0..20u64 {
        let engine = engine_for(&store, seed);
        let campaign = engine
            .create_campaign(CampaignDraft {
                name: format!("Run {seed}"),
                account_id: Some(account_id),
                recipients: recipients.clone(),
                message: Message::text("Offer {A|B|C}"),
                schedule: None,
                delay: Some(DelayBounds::new(1, 4)),
            })
            .unwrap();
        engine.start(&campaign.id).unwrap();

        for _ in 0..25 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let p = store.get_campaign(&campaign.id).unwrap().progress;
            assert!(p.processed() <= p.total);
        }

        let done = store.get_campaign(&campaign.id).unwrap();
        assert_eq!(done.status, CampaignStatus::Completed);
        assert_eq!(done.progress.processed(), 5);
    }
}

#[tokio::test(start_paused = true)]
async fn restart_mid_send_recovers_as_paused() {
    let (store, account_id) = verified_store().await;
    store.import_contacts("Ada,111\nBob,222\nCid,333\n");

    let engine = engine_for(&store, 3);
    let campaign = engine
        .create_campaign(CampaignDraft {
            name: "Interrupted".to_string(),
            account_id: Some(account_id),
            recipients: store.list_contacts(),
            message: Message::text("Hello"),
            schedule: None,
            delay: Some(DelayBounds::new(2, 2)),
        })
        .unwrap();
    engine.start(&campaign.id).unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    let backend = MemoryBackend::new();
    store.persist(&backend).unwrap();
    engine.shutdown();

    let reloaded = Arc::new(MemoryStore::load(&backend));
    let saved = reloaded.get_campaign(&campaign.id).unwrap();
    assert_eq!(saved.status, CampaignStatus::Sending);
    assert_eq!(saved.progress.processed(), 1);

    let fresh = engine_for(&reloaded, 3);
    assert_eq!(fresh.recover_interrupted(), vec![campaign.id]);
    let recovered = reloaded.get_campaign(&campaign.id).unwrap();
    assert_eq!(recovered.status, CampaignStatus::Paused);
    assert_eq!(recovered.progress.processed(), 1);
    assert!(fresh.start(&campaign.id).is_err());
}

#[tokio::test(start_paused = true)]
async fn scheduled_campaign_runs_through_monitor() {
    let (store, account_id) = verified_store().await;
    store.import_contacts("Ada,111\n");

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let engine = engine_for(&store, 11).with_clock(clock.clone());
    let campaign = engine
        .create_campaign(CampaignDraft {
            name: "Later".to_string(),
            account_id: Some(account_id),
            recipients: store.list_contacts(),
            message: Message::text("Doors open soon"),
            schedule: Some(clock.now() + chrono::Duration::seconds(61)),
            delay: Some(DelayBounds::new(1, 1)),
        })
        .unwrap();
    assert_eq!(campaign.status, CampaignStatus::Scheduled);

    let (tx, rx) = watch::channel(false);
    let handle = ScheduleMonitor::new(engine.clone(), Duration::from_secs(60)).spawn(clock.clone(), rx);

    tokio::time::sleep(Duration::from_secs(60)).await;
    clock.advance(chrono::Duration::seconds(61));
    tokio::time::sleep(Duration::from_secs(62)).await;

    let done = store.get_campaign(&campaign.id).unwrap();
    assert_eq!(done.status, CampaignStatus::Completed);
    assert_eq!(done.progress.processed(), 1);

    tx.send(true).unwrap();
    handle.await.unwrap();
}
