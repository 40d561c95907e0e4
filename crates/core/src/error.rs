use thiserror::Error;
use uuid::Uuid;

use crate::types::CampaignStatus;

pub type CampaignResult<T> = Result<T, CampaignError>;

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Campaign validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CampaignError {
    pub fn campaign_not_found(id: Uuid) -> Self {
        CampaignError::NotFound {
            kind: "Campaign",
            id,
        }
    }

    pub fn account_not_found(id: Uuid) -> Self {
        CampaignError::NotFound { kind: "Account", id }
    }

    pub fn contact_not_found(id: Uuid) -> Self {
        CampaignError::NotFound { kind: "Contact", id }
    }
}

/// A single rule a campaign draft broke.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("name is empty")]
    EmptyName,

    #[error("no sending account selected")]
    MissingAccount,

    #[error("account {0} does not exist")]
    UnknownAccount(Uuid),

    #[error("account {0} is not verified")]
    UnverifiedAccount(Uuid),

    #[error("no recipients selected")]
    NoRecipients,

    #[error("message text is empty")]
    EmptyMessage,

    #[error("delay bounds {min}..={max} must satisfy 0 < min <= max")]
    InvalidDelayBounds { min: u32, max: u32 },
}

/// Every issue found while validating a campaign draft.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", format_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn contains(&self, issue: &ValidationIssue) -> bool {
        self.issues.contains(issue)
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_all_issues() {
        let err = ValidationError {
            issues: vec![ValidationIssue::EmptyName, ValidationIssue::NoRecipients],
        };
        assert_eq!(err.to_string(), "name is empty; no recipients selected");

        let wrapped: CampaignError = err.into();
        assert!(wrapped.to_string().starts_with("Campaign validation failed"));
    }
}
