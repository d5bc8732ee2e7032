use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Accumulated timing metrics for a win-rate simulation.
#[derive(Default, Clone, Debug, Serialize, Deserialize)]
pub struct SimulationMetrics {
    pub battles: u64,
    pub rounds: u64,
    pub chunks: u64,
    /// Time spent resolving battles, excluding yields between chunks.
    pub battle_time: Duration,
    /// Wall clock time from first chunk to last
    pub wall_time: Duration,
}

impl SimulationMetrics {
    pub fn battles_per_second(&self) -> f64 {
        if self.battle_time.as_secs_f64() == 0.0 {
            0.0
        } else {
            self.battles as f64 / self.battle_time.as_secs_f64()
        }
    }

    pub fn round_avg_us(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            self.battle_time.as_secs_f64() * 1_000_000.0 / self.rounds as f64
        }
    }
}
