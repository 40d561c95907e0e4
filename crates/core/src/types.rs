use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AccountId = Uuid;
pub type ContactId = Uuid;
pub type CampaignId = Uuid;

/// A sender account. Campaigns reference it by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    /// Digits only, see [`normalize_phone`].
    pub phone: String,
    #[serde(default)]
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: impl Into<String>, phone: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: normalize_phone(phone),
            verified: false,
            created_at: Utc::now(),
        }
    }
}

/// A message recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(name: impl Into<String>, phone: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: normalize_phone(phone),
            created_at: Utc::now(),
        }
    }
}

/// A user-selected file attached to a message. Lives only in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    pub file_name: String,
    pub path: Option<PathBuf>,
}

/// Message template owned by a single campaign. The text may contain
/// spintax groups such as `{Hi|Hello}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    #[serde(skip)]
    pub media: Option<MediaAttachment>,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: None,
        }
    }

    pub fn with_media(mut self, media: MediaAttachment) -> Self {
        self.media = Some(media);
        self
    }
}

/// Lifecycle status of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Completed,
    Paused,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Paused => "paused",
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-message wait window, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayBounds {
    pub min: u32,
    pub max: u32,
}

impl DelayBounds {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min > 0 && self.min <= self.max
    }
}

impl Default for DelayBounds {
    fn default() -> Self {
        Self { min: 2, max: 5 }
    }
}

/// Delivery counters. `total` is fixed when the campaign is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: u32,
    pub sent: u32,
    pub failed: u32,
}

impl Progress {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            sent: 0,
            failed: 0,
        }
    }

    pub fn processed(&self) -> u32 {
        self.sent + self.failed
    }

    pub fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.processed())
    }

    pub fn is_finished(&self) -> bool {
        self.processed() >= self.total
    }

    /// Applies one outcome. Returns `false` without touching the counters
    /// when every recipient has already been accounted for.
    pub fn record(&mut self, success: bool) -> bool {
        if self.is_finished() {
            return false;
        }
        if success {
            self.sent += 1;
        } else {
            self.failed += 1;
        }
        true
    }
}

/// A bulk-send job over a frozen recipient snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub account_id: AccountId,
    pub recipients: Vec<Contact>,
    pub message: Message,
    pub status: CampaignStatus,
    #[serde(default)]
    pub schedule: Option<DateTime<Utc>>,
    pub delay: DelayBounds,
    pub progress: Progress,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Whether the stored fields still agree with what construction
    /// guarantees: the recipient snapshot matches `progress.total`, the
    /// counters stay within it, the delay bounds are valid and the status
    /// fits the counters.
    pub fn is_consistent(&self) -> bool {
        let p = &self.progress;
        if self.recipients.is_empty()
            || p.total as usize != self.recipients.len()
            || p.processed() > p.total
            || !self.delay.is_valid()
        {
            return false;
        }
        match self.status {
            CampaignStatus::Draft | CampaignStatus::Scheduled => p.processed() == 0,
            CampaignStatus::Completed => p.is_finished(),
            CampaignStatus::Sending | CampaignStatus::Paused => true,
        }
    }
}

/// Unvalidated campaign input as collected from the user.
#[derive(Debug, Clone, Default)]
pub struct CampaignDraft {
    pub name: String,
    pub account_id: Option<AccountId>,
    pub recipients: Vec<Contact>,
    pub message: Message,
    pub schedule: Option<DateTime<Utc>>,
    /// Falls back to the engine's configured default when unset.
    pub delay: Option<DelayBounds>,
}

/// Strips everything but ASCII digits.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}
