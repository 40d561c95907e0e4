//! Broadcast Sim: a simulated bulk-messaging campaign runner.
//!
//! Loads persisted state, starts the schedule monitor and a periodic flush,
//! and runs until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use broadcast_assistant::{GeminiGenerator, MessageComposer};
use broadcast_core::clock::{Clock, SystemClock};
use broadcast_core::config::AppConfig;
use broadcast_core::event_bus::TracingSink;
use broadcast_core::types::{CampaignDraft, Message};
use broadcast_engine::{DeliveryEngine, RandomDelaySampler, ScheduleMonitor, SpintaxExpander};
use broadcast_store::{AccountVerifier, DashboardSummary, FileBackend, MemoryStore};
use chrono::NaiveDateTime;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "broadcast-sim")]
#[command(about = "Simulated bulk-messaging campaign runner")]
#[command(version)]
struct Cli {
    /// Directory holding the persisted records (overrides config)
    #[arg(long, env = "BROADCAST_SIM__STORAGE__DATA_DIR")]
    data_dir: Option<String>,

    /// Seconds between schedule scans (overrides config)
    #[arg(long, env = "BROADCAST_SIM__SCHEDULE__CHECK_INTERVAL_SECS")]
    schedule_interval_secs: Option<u64>,

    /// Create a demo account, contacts and campaign on startup
    #[arg(long, default_value_t = false)]
    seed_demo: bool,

    /// Schedule the demo campaign for this wall-clock time
    /// (`YYYY-MM-DDTHH:MM`, in the configured timezone) instead of starting it
    #[arg(long, requires = "seed_demo")]
    demo_at: Option<String>,

    /// Ask the text generator for the demo message instead of using the
    /// built-in template
    #[arg(long, requires = "seed_demo")]
    demo_prompt: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "broadcast_sim=info,broadcast_engine=info,broadcast_store=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Broadcast Sim starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(dir) = cli.data_dir.clone() {
        config.storage.data_dir = dir;
    }
    if let Some(secs) = cli.schedule_interval_secs {
        config.schedule.check_interval_secs = secs;
    }
    config.validate()?;

    info!(
        data_dir = %config.storage.data_dir,
        schedule_interval_secs = config.schedule.check_interval_secs,
        success_rate = config.delivery.success_rate,
        timezone = %String::from(config.schedule.timezone),
        "Configuration loaded"
    );

    // Load persisted state
    let backend = Arc::new(FileBackend::new(&config.storage.data_dir));
    let store = Arc::new(MemoryStore::load(backend.as_ref()));

    let (sampler, spintax) = match config.delivery.seed {
        Some(seed) => (RandomDelaySampler::seeded(seed), SpintaxExpander::seeded(seed.wrapping_add(1))),
        None => (RandomDelaySampler::new(), SpintaxExpander::new()),
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = DeliveryEngine::new(store.clone())
        .with_sampler(Arc::new(sampler.with_success_rate(config.delivery.success_rate)))
        .with_spintax(Arc::new(spintax))
        .with_clock(clock.clone())
        .with_default_delay(config.delivery.default_delay())
        .with_event_sink(Arc::new(TracingSink));

    let recovered = engine.recover_interrupted();
    if !recovered.is_empty() {
        info!(count = recovered.len(), "Marked interrupted campaigns as paused");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Schedule monitor
    let monitor = ScheduleMonitor::new(
        engine.clone(),
        Duration::from_secs(config.schedule.check_interval_secs),
    );
    let monitor_handle = monitor.spawn(clock.clone(), shutdown_rx.clone());

    // Periodic flush
    let flush_store = store.clone();
    let flush_backend = backend.clone();
    let flush_every = Duration::from_secs(config.storage.flush_interval_secs.max(1));
    let mut flush_shutdown = shutdown_rx;
    let flush_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(flush_every);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = flush_store.persist(flush_backend.as_ref()) {
                        error!(error = %e, "Failed to flush state");
                    }
                }
                _ = flush_shutdown.changed() => break,
            }
        }
    });

    if cli.seed_demo {
        if let Err(e) = seed_demo(&cli, &config, &store, &engine).await {
            error!(error = %e, "Failed to seed demo campaign");
        }
    }

    let summary = DashboardSummary::collect(&store);
    info!(
        accounts = summary.accounts,
        verified_accounts = summary.verified_accounts,
        contacts = summary.contacts,
        campaigns = ?summary.campaigns_by_status,
        "Broadcast Sim is running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let _ = shutdown_tx.send(true);
    let stopped = engine.shutdown();
    let _ = monitor_handle.await;
    let _ = flush_handle.await;

    store.persist(backend.as_ref())?;

    let summary = DashboardSummary::collect(&store);
    info!(
        stopped_cycles = stopped,
        total_sent = summary.total_sent,
        total_failed = summary.total_failed,
        overall_success_rate = summary.overall_success_rate,
        "State flushed, exiting"
    );
    Ok(())
}

async fn seed_demo(
    cli: &Cli,
    config: &AppConfig,
    store: &Arc<MemoryStore>,
    engine: &DeliveryEngine,
) -> anyhow::Result<()> {
    let account = store.add_account("Demo Sender", "+1 555 010 0000")?;
    let verifier = AccountVerifier::new(
        store.clone(),
        Duration::from_millis(config.accounts.verification_delay_ms),
    );
    verifier.verify(account.id).await?;

    let summary = store.import_contacts(
        "Ada Lovelace,+44 20 7946 0001\n\
         Grace Hopper,+1 202 555 0102\n\
         Alan Turing,+44 20 7946 0003\n",
    );
    info!(imported = summary.imported, skipped = summary.skipped, "Seeded demo contacts");

    let text = match &cli.demo_prompt {
        Some(prompt) => {
            let generator = GeminiGenerator::from_config(&config.assistant)?;
            let composer = MessageComposer::new(
                generator,
                Duration::from_millis(config.assistant.timeout_ms),
            );
            composer.spawn_compose(prompt.clone()).await?
        }
        None => "{Hi|Hello|Hey} there, our {autumn|seasonal} offer is live!".to_string(),
    };

    let schedule = match &cli.demo_at {
        Some(raw) => {
            let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")?;
            let at = config.schedule.timezone.resolve(naive).ok_or_else(|| {
                anyhow::anyhow!("{} does not exist in the configured timezone", raw)
            })?;
            Some(at)
        }
        None => None,
    };

    let recipients = store.list_contacts();
    let campaign = engine.create_campaign(CampaignDraft {
        name: "Demo campaign".to_string(),
        account_id: Some(account.id),
        recipients,
        message: Message::text(text),
        schedule,
        delay: None,
    })?;

    if schedule.is_none() {
        engine.start(&campaign.id)?;
    }
    info!(
        campaign_id = %campaign.id,
        status = %campaign.status,
        scheduled_for = ?campaign.schedule,
        "Seeded demo campaign"
    );
    Ok(())
}
