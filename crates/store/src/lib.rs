//! Accounts, contacts and campaigns held in memory and persisted as three
//! independent JSON records.

pub mod accounts;
pub mod contacts;
pub mod dashboard;
pub mod memory;
pub mod persistence;

pub use accounts::AccountVerifier;
pub use contacts::{ContactFilter, FilterKind, ImportSummary};
pub use dashboard::{CampaignReport, DashboardSummary};
pub use memory::MemoryStore;
pub use persistence::{FileBackend, MemoryBackend, PersistedState, StateBackend};
