//! Campaign event bus: a trait for emitting lifecycle events from the
//! delivery engine.
//!
//! Components accept an `Arc<dyn EventSink>`; the host decides where events go.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CampaignId, ContactId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignEventKind {
    Created,
    Started,
    MessageSent,
    MessageFailed,
    Completed,
    Paused,
    Cancelled,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignEvent {
    pub event_id: Uuid,
    pub kind: CampaignEventKind,
    pub campaign_id: CampaignId,
    pub recipient_id: Option<ContactId>,
    /// Rendered message text, set on per-recipient events.
    #[serde(default)]
    pub body: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CampaignEvent {
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Trait for emitting campaign events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CampaignEvent);
}

/// No-op sink for tests and components that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: CampaignEvent) {}
}

/// Forwards every event to `tracing` at debug level.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: CampaignEvent) {
        tracing::debug!(
            kind = ?event.kind,
            campaign_id = %event.campaign_id,
            recipient_id = ?event.recipient_id,
            "Campaign event"
        );
    }
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<CampaignEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<CampaignEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn count_kind(&self, kind: CampaignEventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: CampaignEvent) {
        self.events.lock().push(event);
    }
}

/// Convenience builder for creating a `CampaignEvent` stamped with the current time.
pub fn make_event(
    kind: CampaignEventKind,
    campaign_id: CampaignId,
    recipient_id: Option<ContactId>,
) -> CampaignEvent {
    CampaignEvent {
        event_id: Uuid::new_v4(),
        kind,
        campaign_id,
        recipient_id,
        body: None,
        timestamp: Utc::now(),
    }
}

pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink() {
        let sink = capture_sink();
        assert_eq!(sink.count(), 0);

        let campaign_id = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        sink.emit(make_event(CampaignEventKind::Started, campaign_id, None));
        sink.emit(
            make_event(CampaignEventKind::MessageSent, campaign_id, Some(recipient))
                .with_body("Hi there!"),
        );

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.count_kind(CampaignEventKind::Started), 1);
        assert_eq!(sink.count_kind(CampaignEventKind::MessageFailed), 0);

        let events = sink.events();
        assert_eq!(events[1].recipient_id, Some(recipient));
        assert_eq!(events[1].body.as_deref(), Some("Hi there!"));

        sink.clear();
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_noop_sink() {
        let sink = noop_sink();
        // Should not panic
        sink.emit(make_event(
            CampaignEventKind::Deleted,
            Uuid::new_v4(),
            None,
        ));
    }
}
