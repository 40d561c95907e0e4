//! Contact import and search.

use serde::{Deserialize, Serialize};

use broadcast_core::types::Contact;

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Parses one contact per `name,phone` line.
///
/// Blank lines are ignored. Lines whose name or normalized phone comes out
/// empty are counted as skipped. Extra columns are ignored.
pub fn parse_contacts(text: &str) -> (Vec<Contact>, usize) {
    let mut contacts = Vec::new();
    let mut skipped = 0;

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let mut fields = line.split(',').map(str::trim);
        let name = fields.next().unwrap_or_default();
        let phone = fields.next().unwrap_or_default();
        let contact = Contact::new(name, phone);
        if contact.name.is_empty() || contact.phone.is_empty() {
            skipped += 1;
            continue;
        }
        contacts.push(contact);
    }

    (contacts, skipped)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Name (case-insensitive) or phone contains the term.
    #[default]
    Contains,
    NamePrefix,
    PhonePrefix,
}

/// Search over the contact list. A blank term matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFilter {
    pub kind: FilterKind,
    pub term: String,
}

impl ContactFilter {
    pub fn new(kind: FilterKind, term: impl Into<String>) -> Self {
        Self {
            kind,
            term: term.into(),
        }
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        let term = self.term.trim();
        if term.is_empty() {
            return true;
        }
        let lowered = term.to_lowercase();
        match self.kind {
            FilterKind::Contains => {
                contact.name.to_lowercase().contains(&lowered) || contact.phone.contains(term)
            }
            FilterKind::NamePrefix => contact.name.to_lowercase().starts_with(&lowered),
            FilterKind::PhonePrefix => contact.phone.starts_with(term),
        }
    }
}
