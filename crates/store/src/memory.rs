//! In-memory store backed by DashMap.
//!
//! Each collection remembers insertion order so that listings and persisted
//! records come out oldest first.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::info;

use broadcast_core::error::{CampaignError, CampaignResult};
use broadcast_core::store::CampaignStore;
use broadcast_core::types::{
    Account, AccountId, Campaign, CampaignId, Contact, ContactId,
};

use crate::contacts::{parse_contacts, ContactFilter, ImportSummary};
use crate::persistence::{PersistedState, StateBackend};

/// Ordered, keyed collection.
struct Collection<K, T> {
    entries: DashMap<K, (u64, T)>,
    next_seq: AtomicU64,
}

impl<K: Eq + Hash + Copy, T: Clone> Collection<K, T> {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Inserts or replaces. A replaced entry keeps its position.
    fn insert(&self, key: K, value: T) {
        if let Some(mut existing) = self.entries.get_mut(&key) {
            existing.1 = value;
            return;
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(key, (seq, value));
    }

    fn get(&self, key: &K) -> Option<T> {
        self.entries.get(key).map(|r| r.value().1.clone())
    }

    fn remove(&self, key: &K) -> Option<T> {
        self.entries.remove(key).map(|(_, (_, v))| v)
    }

    fn list(&self) -> Vec<T> {
        let mut items: Vec<(u64, T)> = self
            .entries
            .iter()
            .map(|r| (r.value().0, r.value().1.clone()))
            .collect();
        items.sort_by_key(|(seq, _)| *seq);
        items.into_iter().map(|(_, v)| v).collect()
    }

    fn modify<R>(&self, key: &K, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.entries.get_mut(key).map(|mut r| f(&mut r.value_mut().1))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

/// Thread-safe in-memory store for accounts, contacts and campaigns.
pub struct MemoryStore {
    accounts: Collection<AccountId, Account>,
    contacts: Collection<ContactId, Contact>,
    campaigns: Collection<CampaignId, Campaign>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: Collection::new(),
            contacts: Collection::new(),
            campaigns: Collection::new(),
        }
    }

    /// Builds a store from whatever `backend` holds. Missing or malformed
    /// records load as empty collections.
    pub fn load(backend: &dyn StateBackend) -> Self {
        let store = Self::new();
        store.restore(PersistedState::load(backend));
        store
    }

    /// Replaces all contents with `state`, preserving its order.
    pub fn restore(&self, state: PersistedState) {
        self.accounts.clear();
        self.contacts.clear();
        self.campaigns.clear();
        for account in state.accounts {
            self.accounts.insert(account.id, account);
        }
        for contact in state.contacts {
            self.contacts.insert(contact.id, contact);
        }
        for campaign in state.campaigns {
            self.campaigns.insert(campaign.id, campaign);
        }
        info!(
            accounts = self.accounts.len(),
            contacts = self.contacts.len(),
            campaigns = self.campaigns.len(),
            "Store restored"
        );
    }

    pub fn snapshot(&self) -> PersistedState {
        PersistedState {
            accounts: self.accounts.list(),
            contacts: self.contacts.list(),
            campaigns: self.campaigns.list(),
        }
    }

    /// Writes all three records to `backend`.
    pub fn persist(&self, backend: &dyn StateBackend) -> CampaignResult<()> {
        self.snapshot().save(backend)
    }

    // ─── Accounts ──────────────────────────────────────────────────────────

    pub fn list_accounts(&self) -> Vec<Account> {
        self.accounts.list()
    }

    pub fn insert_account(&self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    /// Adds an unverified account. Both name and phone are required; the
    /// phone is reduced to digits.
    pub fn add_account(&self, name: &str, phone: &str) -> CampaignResult<Account> {
        let account = Account::new(name.trim(), phone);
        if account.name.is_empty() || account.phone.is_empty() {
            return Err(CampaignError::InvalidInput(
                "account needs a name and a phone number".to_string(),
            ));
        }
        info!(account_id = %account.id, name = %account.name, "Added account");
        self.insert_account(account.clone());
        Ok(account)
    }

    pub fn delete_account(&self, id: &AccountId) -> CampaignResult<Account> {
        let removed = self
            .accounts
            .remove(id)
            .ok_or_else(|| CampaignError::account_not_found(*id))?;
        info!(account_id = %id, "Deleted account");
        Ok(removed)
    }

    pub fn mark_verified(&self, id: &AccountId) -> CampaignResult<Account> {
        self.accounts
            .modify(id, |account| {
                account.verified = true;
                account.clone()
            })
            .ok_or_else(|| CampaignError::account_not_found(*id))
    }

    pub fn verified_accounts(&self) -> Vec<Account> {
        self.accounts
            .list()
            .into_iter()
            .filter(|a| a.verified)
            .collect()
    }

    // ─── Contacts ──────────────────────────────────────────────────────────

    pub fn list_contacts(&self) -> Vec<Contact> {
        self.contacts.list()
    }

    pub fn get_contact(&self, id: &ContactId) -> Option<Contact> {
        self.contacts.get(id)
    }

    pub fn insert_contact(&self, contact: Contact) {
        self.contacts.insert(contact.id, contact);
    }

    pub fn add_contact(&self, name: &str, phone: &str) -> CampaignResult<Contact> {
        let contact = Contact::new(name.trim(), phone);
        if contact.name.is_empty() || contact.phone.is_empty() {
            return Err(CampaignError::InvalidInput(
                "contact needs a name and a phone number".to_string(),
            ));
        }
        self.insert_contact(contact.clone());
        Ok(contact)
    }

    /// Removes every listed contact that exists. Returns how many went.
    pub fn delete_contacts(&self, ids: &[ContactId]) -> usize {
        ids.iter()
            .filter(|id| self.contacts.remove(id).is_some())
            .count()
    }

    /// Parses `name,phone` lines and appends the valid ones.
    pub fn import_contacts(&self, text: &str) -> ImportSummary {
        let (contacts, skipped) = parse_contacts(text);
        let imported = contacts.len();
        for contact in contacts {
            self.insert_contact(contact);
        }
        info!(imported, skipped, "Imported contacts");
        ImportSummary { imported, skipped }
    }

    pub fn search_contacts(&self, filter: &ContactFilter) -> Vec<Contact> {
        self.contacts
            .list()
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect()
    }

    /// Copies the requested contacts, in the order given, for use as a
    /// campaign's recipient snapshot. Unknown ids are skipped.
    pub fn snapshot_contacts(&self, ids: &[ContactId]) -> Vec<Contact> {
        ids.iter().filter_map(|id| self.contacts.get(id)).collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CampaignStore for MemoryStore {
    fn get_campaign(&self, id: &CampaignId) -> Option<Campaign> {
        self.campaigns.get(id)
    }

    fn insert_campaign(&self, campaign: Campaign) {
        self.campaigns.insert(campaign.id, campaign);
    }

    fn remove_campaign(&self, id: &CampaignId) -> Option<Campaign> {
        self.campaigns.remove(id)
    }

    fn list_campaigns(&self) -> Vec<Campaign> {
        self.campaigns.list()
    }

    fn modify_campaign(
        &self,
        id: &CampaignId,
        f: &mut dyn FnMut(&mut Campaign) -> CampaignResult<()>,
    ) -> CampaignResult<()> {
        self.campaigns
            .modify(id, |campaign| f(campaign))
            .unwrap_or_else(|| Err(CampaignError::campaign_not_found(*id)))
    }

    fn get_account(&self, id: &AccountId) -> Option<Account> {
        self.accounts.get(id)
    }
}
