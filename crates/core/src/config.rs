use serde::Deserialize;

use crate::clock::ScheduleTimezone;

/// Root application configuration. Loaded from environment variables
/// with the prefix `BROADCAST_SIM__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Probability that a single simulated send succeeds.
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
    #[serde(default = "default_delay_min_secs")]
    pub default_delay_min_secs: u32,
    #[serde(default = "default_delay_max_secs")]
    pub default_delay_max_secs: u32,
    /// Fixed RNG seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default)]
    pub timezone: ScheduleTimezone,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    #[serde(default = "default_verification_delay_ms")]
    pub verification_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_model")]
    pub model: String,
    #[serde(default = "default_assistant_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

// Default functions
fn default_success_rate() -> f64 {
    0.9
}
fn default_delay_min_secs() -> u32 {
    2
}
fn default_delay_max_secs() -> u32 {
    5
}
fn default_check_interval_secs() -> u64 {
    60
}
fn default_data_dir() -> String {
    "./data".to_string()
}
fn default_flush_interval_secs() -> u64 {
    5
}
fn default_verification_delay_ms() -> u64 {
    3000
}
fn default_assistant_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_assistant_timeout_ms() -> u64 {
    15_000
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            success_rate: default_success_rate(),
            default_delay_min_secs: default_delay_min_secs(),
            default_delay_max_secs: default_delay_max_secs(),
            seed: None,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            timezone: ScheduleTimezone::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            verification_delay_ms: default_verification_delay_ms(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: default_assistant_model(),
            timeout_ms: default_assistant_timeout_ms(),
            api_key: None,
        }
    }
}

impl DeliveryConfig {
    pub fn default_delay(&self) -> crate::types::DelayBounds {
        crate::types::DelayBounds::new(self.default_delay_min_secs, self.default_delay_max_secs)
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("BROADCAST_SIM")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Rejects values the simulator cannot run with.
    pub fn validate(&self) -> crate::CampaignResult<()> {
        if !(0.0..=1.0).contains(&self.delivery.success_rate) {
            return Err(crate::CampaignError::Config(format!(
                "delivery.success_rate {} is outside [0, 1]",
                self.delivery.success_rate
            )));
        }
        if !self.delivery.default_delay().is_valid() {
            return Err(crate::CampaignError::Config(format!(
                "default delay {}..={} must satisfy 0 < min <= max",
                self.delivery.default_delay_min_secs, self.delivery.default_delay_max_secs
            )));
        }
        if self.schedule.check_interval_secs == 0 {
            return Err(crate::CampaignError::Config(
                "schedule.check_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
