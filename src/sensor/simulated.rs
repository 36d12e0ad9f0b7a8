use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use super::{SensorSource, SourceEvent, SourceKind};
use crate::Reading;

/// Synthetic readings on a fixed interval
///
/// The first reading is produced one full period after construction, matching
/// how a physical board reports after its first measurement cycle.
pub struct SimulatedSource {
    ticker: Interval,
    rng: StdRng,
}

impl SimulatedSource {
    pub fn new(period: Duration) -> Self {
        Self::with_rng(period, StdRng::from_os_rng())
    }

    /// Deterministic source for tests
    pub fn with_seed(period: Duration, seed: u64) -> Self {
        Self::with_rng(period, StdRng::seed_from_u64(seed))
    }

    fn with_rng(period: Duration, rng: StdRng) -> Self {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { ticker, rng }
    }

    /// One reading with every field drawn independently
    pub fn generate(&mut self) -> Reading {
        Reading {
            timestamp: Utc::now(),
            temperature: round_to(self.rng.random_range(20.0..=28.0), 1),
            humidity: round_to(self.rng.random_range(55.0..=90.0), 1),
            soil_moisture: round_to(self.rng.random_range(0.5..=0.9), 2),
            co2_level: self.rng.random_range(400..=1000),
            light_level: Some(round_to(self.rng.random_range(300.0..=500.0), 0)),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[async_trait]
impl SensorSource for SimulatedSource {
    async fn next_event(&mut self) -> Option<SourceEvent> {
        self.ticker.tick().await;
        Some(SourceEvent::Reading(self.generate()))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Simulated
    }
}
