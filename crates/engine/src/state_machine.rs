use chrono::{DateTime, Utc};
use uuid::Uuid;

use broadcast_core::error::{CampaignError, CampaignResult, ValidationError, ValidationIssue};
use broadcast_core::types::{
    Account, Campaign, CampaignDraft, CampaignStatus, DelayBounds, Progress,
};

/// Describes a single valid status transition for a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: CampaignStatus,
    pub to: CampaignStatus,
    pub trigger: &'static str,
}

const TRANSITIONS: &[StateTransition] = &[
    // Draft ->
    StateTransition {
        from: CampaignStatus::Draft,
        to: CampaignStatus::Sending,
        trigger: "manual_start",
    },
    // Scheduled ->
    StateTransition {
        from: CampaignStatus::Scheduled,
        to: CampaignStatus::Sending,
        trigger: "schedule_due",
    },
    // Sending ->
    StateTransition {
        from: CampaignStatus::Sending,
        to: CampaignStatus::Completed,
        trigger: "all_recipients_processed",
    },
    StateTransition {
        from: CampaignStatus::Sending,
        to: CampaignStatus::Paused,
        trigger: "pause",
    },
];

/// Guards the campaign lifecycle by enforcing a finite set of valid status
/// transitions. `Completed` is terminal and `Paused` has no way out.
#[derive(Debug, Clone)]
pub struct CampaignStateMachine {
    pub state: CampaignStatus,
}

impl CampaignStateMachine {
    pub fn new(state: CampaignStatus) -> Self {
        Self { state }
    }

    pub fn transitions() -> &'static [StateTransition] {
        TRANSITIONS
    }

    /// Returns `true` if the given transition is allowed.
    pub fn can_transition(from: CampaignStatus, to: CampaignStatus) -> bool {
        TRANSITIONS.iter().any(|t| t.from == from && t.to == to)
    }

    pub fn is_terminal(&self) -> bool {
        !TRANSITIONS.iter().any(|t| t.from == self.state)
    }

    /// Attempts to move the state machine to `to`.
    pub fn transition(&mut self, to: CampaignStatus) -> CampaignResult<()> {
        if Self::can_transition(self.state, to) {
            self.state = to;
            Ok(())
        } else {
            Err(CampaignError::InvalidTransition {
                from: self.state,
                to,
            })
        }
    }

    /// Moves `campaign` to `to`. `Completed` additionally requires every
    /// recipient to have been processed.
    pub fn apply(campaign: &mut Campaign, to: CampaignStatus) -> CampaignResult<()> {
        if to == CampaignStatus::Completed && !campaign.progress.is_finished() {
            return Err(CampaignError::InvalidTransition {
                from: campaign.status,
                to,
            });
        }
        let mut machine = Self::new(campaign.status);
        machine.transition(to)?;
        campaign.status = machine.state;
        Ok(())
    }
}

/// `Scheduled` for a schedule strictly in the future, `Draft` otherwise.
pub fn initial_status(schedule: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CampaignStatus {
    match schedule {
        Some(at) if at > now => CampaignStatus::Scheduled,
        _ => CampaignStatus::Draft,
    }
}

/// Validates a draft and freezes it into a campaign.
///
/// `account` is the looked-up sending account, if one exists under
/// `draft.account_id`. `default_delay` applies when the draft leaves the
/// delay unset. Every violated rule is reported together.
pub fn build_campaign(
    draft: CampaignDraft,
    account: Option<&Account>,
    default_delay: DelayBounds,
    now: DateTime<Utc>,
) -> Result<Campaign, ValidationError> {
    let mut issues = Vec::new();

    if draft.name.trim().is_empty() {
        issues.push(ValidationIssue::EmptyName);
    }

    let account_id = match (draft.account_id, account) {
        (None, _) => {
            issues.push(ValidationIssue::MissingAccount);
            None
        }
        (Some(id), Some(acc)) if acc.id == id => {
            if !acc.verified {
                issues.push(ValidationIssue::UnverifiedAccount(id));
            }
            Some(id)
        }
        (Some(id), _) => {
            issues.push(ValidationIssue::UnknownAccount(id));
            None
        }
    };

    if draft.recipients.is_empty() {
        issues.push(ValidationIssue::NoRecipients);
    }

    if draft.message.text.trim().is_empty() {
        issues.push(ValidationIssue::EmptyMessage);
    }

    let delay = draft.delay.unwrap_or(default_delay);
    if !delay.is_valid() {
        issues.push(ValidationIssue::InvalidDelayBounds {
            min: delay.min,
            max: delay.max,
        });
    }

    let account_id = match account_id {
        Some(id) if issues.is_empty() => id,
        _ => return Err(ValidationError { issues }),
    };

    let total = draft.recipients.len() as u32;
    Ok(Campaign {
        id: Uuid::new_v4(),
        name: draft.name.trim().to_string(),
        account_id,
        recipients: draft.recipients,
        message: draft.message,
        status: initial_status(draft.schedule, now),
        schedule: draft.schedule,
        delay,
        progress: Progress::new(total),
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use broadcast_core::types::{Contact, Message};
    use chrono::Duration;

    fn verified_account() -> Account {
        let mut account = Account::new("Marketing", "+1 555 000 1111");
        account.verified = true;
        account
    }

    fn draft_for(account: &Account) -> CampaignDraft {
        CampaignDraft {
            name: "Spring promo".to_string(),
            account_id: Some(account.id),
            recipients: vec![Contact::new("Ada", "15550001")],
            message: Message::text("{Hi|Hello} there"),
            schedule: None,
            delay: Some(DelayBounds::new(1, 3)),
        }
    }

    #[test]
    fn test_valid_transitions() {
        let mut sm = CampaignStateMachine::new(CampaignStatus::Draft);
        assert!(sm.transition(CampaignStatus::Sending).is_ok());
        assert!(sm.transition(CampaignStatus::Completed).is_ok());
        assert!(sm.is_terminal());

        let mut sm = CampaignStateMachine::new(CampaignStatus::Scheduled);
        assert!(sm.transition(CampaignStatus::Sending).is_ok());
        assert!(sm.transition(CampaignStatus::Paused).is_ok());
        assert!(sm.is_terminal());
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!CampaignStateMachine::can_transition(
            CampaignStatus::Draft,
            CampaignStatus::Completed
        ));
        assert!(!CampaignStateMachine::can_transition(
            CampaignStatus::Sending,
            CampaignStatus::Sending
        ));
        assert!(!CampaignStateMachine::can_transition(
            CampaignStatus::Completed,
            CampaignStatus::Sending
        ));
        assert!(!CampaignStateMachine::can_transition(
            CampaignStatus::Paused,
            CampaignStatus::Sending
        ));

        let mut sm = CampaignStateMachine::new(CampaignStatus::Completed);
        let err = sm.transition(CampaignStatus::Sending).unwrap_err();
        assert!(matches!(
            err,
            CampaignError::InvalidTransition {
                from: CampaignStatus::Completed,
                to: CampaignStatus::Sending
            }
        ));
    }

    #[test]
    fn test_complete_requires_finished_progress() {
        let account = verified_account();
        let mut campaign = build_campaign(draft_for(&account), Some(&account), DelayBounds::default(), Utc::now()).unwrap();
        CampaignStateMachine::apply(&mut campaign, CampaignStatus::Sending).unwrap();
        assert!(CampaignStateMachine::apply(&mut campaign, CampaignStatus::Completed).is_err());

        campaign.progress.record(false);
        CampaignStateMachine::apply(&mut campaign, CampaignStatus::Completed).unwrap();
        assert_eq!(campaign.status, CampaignStatus::Completed);
    }

    #[test]
    fn test_build_with_verified_account() {
        let account = verified_account();
        let campaign = build_campaign(draft_for(&account), Some(&account), DelayBounds::default(), Utc::now()).unwrap();
        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert_eq!(campaign.progress, Progress::new(1));
        assert_eq!(campaign.account_id, account.id);
    }

    #[test]
    fn test_build_rejects_unverified_account() {
        let account = Account::new("Support", "15551112222");
        let err = build_campaign(draft_for(&account), Some(&account), DelayBounds::default(), Utc::now()).unwrap_err();
        assert_eq!(err.issues, vec![ValidationIssue::UnverifiedAccount(account.id)]);
    }

    #[test]
    fn test_build_rejects_unknown_account() {
        let account = verified_account();
        let draft = draft_for(&account);
        let err = build_campaign(draft, None, DelayBounds::default(), Utc::now()).unwrap_err();
        assert!(err.contains(&ValidationIssue::UnknownAccount(account.id)));
    }

    #[test]
    fn test_build_reports_every_issue() {
        let draft = CampaignDraft {
            name: "   ".to_string(),
            account_id: None,
            recipients: vec![],
            message: Message::text(""),
            schedule: None,
            delay: Some(DelayBounds::new(4, 2)),
        };
        let err = build_campaign(draft, None, DelayBounds::default(), Utc::now()).unwrap_err();
        assert_eq!(
            err.issues,
            vec![
                ValidationIssue::EmptyName,
                ValidationIssue::MissingAccount,
                ValidationIssue::NoRecipients,
                ValidationIssue::EmptyMessage,
                ValidationIssue::InvalidDelayBounds { min: 4, max: 2 },
            ]
        );
    }

    #[test]
    fn test_zero_min_delay_rejected() {
        let account = verified_account();
        let mut draft = draft_for(&account);
        draft.delay = Some(DelayBounds::new(0, 0));
        let err = build_campaign(draft, Some(&account), DelayBounds::default(), Utc::now()).unwrap_err();
        assert!(err.contains(&ValidationIssue::InvalidDelayBounds { min: 0, max: 0 }));
    }

    #[test]
    fn test_delay_defaults_when_unset() {
        let account = verified_account();
        let mut draft = draft_for(&account);
        draft.delay = None;
        let campaign = build_campaign(draft, Some(&account), DelayBounds::default(), Utc::now()).unwrap();
        assert_eq!(campaign.delay, DelayBounds::new(2, 5));

        let mut draft = draft_for(&account);
        draft.delay = None;
        let campaign = build_campaign(draft, Some(&account), DelayBounds::new(4, 9), Utc::now()).unwrap();
        assert_eq!(campaign.delay, DelayBounds::new(4, 9));
    }

    #[test]
    fn test_future_schedule_starts_scheduled() {
        let now = Utc::now();
        let account = verified_account();

        let mut draft = draft_for(&account);
        draft.schedule = Some(now + Duration::seconds(61));
        let campaign = build_campaign(draft, Some(&account), DelayBounds::default(), now).unwrap();
        assert_eq!(campaign.status, CampaignStatus::Scheduled);

        let mut draft = draft_for(&account);
        draft.schedule = Some(now - Duration::seconds(5));
        let campaign = build_campaign(draft, Some(&account), DelayBounds::default(), now).unwrap();
        assert_eq!(campaign.status, CampaignStatus::Draft);
    }

    #[test]
    fn test_snapshot_is_independent_of_source_contacts() {
        let account = verified_account();
        let mut contacts = vec![Contact::new("Ada", "1"), Contact::new("Bob", "2")];
        let draft = CampaignDraft {
            recipients: contacts.clone(),
            ..draft_for(&account)
        };
        let campaign = build_campaign(draft, Some(&account), DelayBounds::default(), Utc::now()).unwrap();

        contacts[0].name = "Changed".to_string();
        contacts.pop();

        assert_eq!(campaign.recipients.len(), 2);
        assert_eq!(campaign.recipients[0].name, "Ada");
        assert_eq!(campaign.progress.total, 2);
    }
}
