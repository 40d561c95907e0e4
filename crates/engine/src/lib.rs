//! Campaign lifecycle and simulated delivery. Validates campaigns, drives
//! them through their status machine, and produces per-recipient outcomes
//! over simulated time.

pub mod engine;
pub mod monitor;
pub mod sampler;
pub mod spintax;
pub mod state_machine;

pub use engine::DeliveryEngine;
pub use monitor::ScheduleMonitor;
pub use sampler::{DeliverySampler, RandomDelaySampler, SendSample};
pub use spintax::SpintaxExpander;
pub use state_machine::CampaignStateMachine;
