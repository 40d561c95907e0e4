pub mod clock;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, ScheduleTimezone, SystemClock};
pub use config::AppConfig;
pub use error::{CampaignError, CampaignResult, ValidationError, ValidationIssue};
pub use store::CampaignStore;
