//! Durable key/value records for the three collections.
//!
//! Each collection is stored under its own key as a JSON array. A record
//! that is missing or does not parse loads as empty; the other two are
//! unaffected.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use broadcast_core::error::{CampaignError, CampaignResult};
use broadcast_core::types::{Account, Campaign, Contact};

pub const ACCOUNTS_KEY: &str = "wa-accounts";
pub const CONTACTS_KEY: &str = "wa-contacts";
pub const CAMPAIGNS_KEY: &str = "wa-campaigns";

/// Raw string storage keyed by record name.
pub trait StateBackend: Send + Sync {
    fn read(&self, key: &str) -> CampaignResult<Option<String>>;
    fn write(&self, key: &str, value: &str) -> CampaignResult<()>;
}

/// One `<key>.json` file per record inside a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StateBackend for FileBackend {
    fn read(&self, key: &str) -> CampaignResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> CampaignResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = value.len(), "Wrote record");
        Ok(())
    }
}

/// Backend kept entirely in memory. Used by tests and demos.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateBackend for MemoryBackend {
    fn read(&self, key: &str) -> CampaignResult<Option<String>> {
        Ok(self.records.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> CampaignResult<()> {
        self.records.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Everything that survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub accounts: Vec<Account>,
    pub contacts: Vec<Contact>,
    pub campaigns: Vec<Campaign>,
}

impl PersistedState {
    pub fn load(backend: &dyn StateBackend) -> Self {
        Self {
            accounts: load_record(backend, ACCOUNTS_KEY),
            contacts: load_record(backend, CONTACTS_KEY),
            campaigns: load_campaigns(backend),
        }
    }

    pub fn save(&self, backend: &dyn StateBackend) -> CampaignResult<()> {
        save_record(backend, ACCOUNTS_KEY, &self.accounts)?;
        save_record(backend, CONTACTS_KEY, &self.contacts)?;
        save_record(backend, CAMPAIGNS_KEY, &self.campaigns)?;
        Ok(())
    }
}

fn load_record<T: DeserializeOwned>(backend: &dyn StateBackend, key: &str) -> Vec<T> {
    let raw = match backend.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(key, error = %e, "Failed to read record, starting empty");
            return Vec::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(e) => {
            warn!(key, error = %e, "Malformed record, starting empty");
            Vec::new()
        }
    }
}

/// Campaigns whose fields contradict each other are dropped like malformed
/// records; starting one would leave it `Sending` with no cycle.
fn load_campaigns(backend: &dyn StateBackend) -> Vec<Campaign> {
    let mut campaigns: Vec<Campaign> = load_record(backend, CAMPAIGNS_KEY);
    campaigns.retain(|c| {
        let keep = c.is_consistent();
        if !keep {
            warn!(
                campaign_id = %c.id,
                recipients = c.recipients.len(),
                total = c.progress.total,
                processed = c.progress.processed(),
                status = %c.status,
                "Dropping inconsistent campaign record"
            );
        }
        keep
    });
    campaigns
}

fn save_record<T: Serialize>(backend: &dyn StateBackend, key: &str, items: &[T]) -> CampaignResult<()> {
    let raw = serde_json::to_string(items)?;
    backend
        .write(key, &raw)
        .map_err(|e| CampaignError::Persistence(format!("{key}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadcast_core::types::{CampaignStatus, DelayBounds, MediaAttachment, Message, Progress};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_state() -> PersistedState {
        let contact = Contact::new("Ada", "+44 20 7946 0000");
        PersistedState {
            accounts: vec![Account::new("Sales", "15550100")],
            contacts: vec![contact.clone()],
            campaigns: vec![Campaign {
                id: Uuid::new_v4(),
                name: "Launch".to_string(),
                account_id: Uuid::new_v4(),
                recipients: vec![contact],
                message: Message::text("{Hi|Hey} there"),
                status: CampaignStatus::Scheduled,
                schedule: Some(Utc::now()),
                delay: DelayBounds::new(3, 7),
                progress: Progress::new(1),
                created_at: Utc::now(),
            }],
        }
    }

    #[test]
    fn test_file_backend_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let state = sample_state();
        state.save(&FileBackend::new(dir.path())).unwrap();

        assert!(dir.path().join("wa-campaigns.json").exists());
        let reloaded = PersistedState::load(&FileBackend::new(dir.path()));
        assert_eq!(reloaded, state);
    }

    #[test]
    fn test_missing_directory_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("never-created"));
        assert_eq!(PersistedState::load(&backend), PersistedState::default());
    }

    #[test]
    fn test_malformed_record_loads_empty_alone() {
        let backend = MemoryBackend::new();
        let state = sample_state();
        state.save(&backend).unwrap();
        backend.write(CONTACTS_KEY, "{not json").unwrap();

        let reloaded = PersistedState::load(&backend);
        assert!(reloaded.contacts.is_empty());
        assert_eq!(reloaded.accounts, state.accounts);
        assert_eq!(reloaded.campaigns, state.campaigns);
    }

    #[test]
    fn test_inconsistent_campaigns_are_dropped_on_load() {
        let backend = MemoryBackend::new();
        let mut state = sample_state();
        let good = state.campaigns[0].clone();

        let mut hollow = good.clone();
        hollow.id = Uuid::new_v4();
        hollow.status = CampaignStatus::Draft;
        hollow.recipients.clear();
        hollow.progress = Progress::new(3);
        hollow.delay = DelayBounds::new(0, 0);

        let mut overcounted = good.clone();
        overcounted.id = Uuid::new_v4();
        overcounted.status = CampaignStatus::Sending;
        overcounted.progress = Progress { total: 1, sent: 1, failed: 1 };

        state.campaigns.push(hollow);
        state.campaigns.push(overcounted);
        state.save(&backend).unwrap();

        let reloaded = PersistedState::load(&backend);
        assert_eq!(reloaded.campaigns, vec![good]);
        assert_eq!(reloaded.accounts, state.accounts);
        assert_eq!(reloaded.contacts, state.contacts);
    }

    #[test]
    fn test_media_is_dropped_on_save() {
        let backend = MemoryBackend::new();
        let mut state = sample_state();
        state.campaigns[0].message = Message::text("see attached").with_media(MediaAttachment {
            file_name: "flyer.pdf".to_string(),
            path: None,
        });
        state.save(&backend).unwrap();

        let raw = backend.read(CAMPAIGNS_KEY).unwrap().unwrap();
        assert!(!raw.contains("flyer.pdf"));
        let reloaded = PersistedState::load(&backend);
        assert_eq!(reloaded.campaigns[0].message.text, "see attached");
        assert!(reloaded.campaigns[0].message.media.is_none());
    }
}
