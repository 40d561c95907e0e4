//! Per-send delay and outcome sampling.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Success probability used when none is configured.
pub const DEFAULT_SUCCESS_RATE: f64 = 0.9;

/// Outcome of one simulated send: how long to wait, then whether it landed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SendSample {
    pub delay: Duration,
    pub success: bool,
}

/// Source of per-send samples for the delivery engine.
pub trait DeliverySampler: Send + Sync {
    /// Draws a delay uniformly from `[min_secs, max_secs]` and a Bernoulli
    /// success outcome.
    fn sample(&self, min_secs: u32, max_secs: u32) -> SendSample;
}

/// Uniform-delay, Bernoulli-outcome sampler over an injected RNG.
pub struct RandomDelaySampler {
    rng: Mutex<StdRng>,
    success_rate: f64,
}

impl RandomDelaySampler {
    /// Entropy-seeded sampler with the default 90% success rate.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy(), DEFAULT_SUCCESS_RATE)
    }

    /// Reproducible sampler for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed), DEFAULT_SUCCESS_RATE)
    }

    pub fn from_rng(rng: StdRng, success_rate: f64) -> Self {
        Self {
            rng: Mutex::new(rng),
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }

    pub fn with_success_rate(mut self, success_rate: f64) -> Self {
        self.success_rate = success_rate.clamp(0.0, 1.0);
        self
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }
}

impl Default for RandomDelaySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliverySampler for RandomDelaySampler {
    fn sample(&self, min_secs: u32, max_secs: u32) -> SendSample {
        let (lo, hi) = if min_secs <= max_secs {
            (min_secs, max_secs)
        } else {
            (max_secs, min_secs)
        };
        let mut rng = self.rng.lock();
        let secs = if lo == hi {
            lo as f64
        } else {
            rng.gen_range(lo as f64..=hi as f64)
        };
        SendSample {
            delay: Duration::from_secs_f64(secs),
            success: rng.gen_bool(self.success_rate),
        }
    }
}

/// Replays a fixed list of outcomes with the lower delay bound, then
/// reports success once the script runs out.
#[derive(Default)]
pub struct ScriptedSampler {
    outcomes: Mutex<VecDeque<bool>>,
}

impl ScriptedSampler {
    pub fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
        }
    }
}

impl DeliverySampler for ScriptedSampler {
    fn sample(&self, min_secs: u32, _max_secs: u32) -> SendSample {
        SendSample {
            delay: Duration::from_secs(min_secs as u64),
            success: self.outcomes.lock().pop_front().unwrap_or(true),
        }
    }
}
