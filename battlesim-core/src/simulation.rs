//! Monte-Carlo win rates: the same battle run many times with different seeds.
//!
//! Battles run in chunks of `chunk_size`. Between chunks the simulator reports
//! progress, yields the thread and checks the interrupt flag, so a run stopped
//! after N battles has exactly the aggregates of a full run of N battles.

use crate::battle::{Battle, BattleOutcome};
use crate::config::{ConfigError, SimulationConfig};
use crate::metrics::SimulationMetrics;
use crate::profiling;
use crate::state::{Round, Side};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Buckets for remaining-fraction distributions: 0%, 1%, …, 100%.
const DISTRIBUTION_BUCKETS: usize = 101;

/// Histogram of a `[0, 1]` fraction at whole-percent resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    buckets: Vec<u32>,
    total: u32,
}

impl Default for Distribution {
    fn default() -> Self {
        Self {
            buckets: vec![0; DISTRIBUTION_BUCKETS],
            total: 0,
        }
    }
}

impl Distribution {
    pub fn record(&mut self, fraction: f64) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let bucket = (fraction * 100.0).round() as usize;
        if let Some(count) = self.buckets.get_mut(bucket) {
            *count += 1;
            self.total += 1;
        }
    }

    pub fn count(&self) -> u32 {
        self.total
    }

    /// Counts per whole percent.
    pub fn buckets(&self) -> &[u32] {
        &self.buckets
    }

    /// Smallest recorded fraction with at least `p` of the samples at or below it.
    pub fn percentile(&self, p: f64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let wanted = (p.clamp(0.0, 1.0) * self.total as f64).ceil().max(1.0) as u32;
        let mut seen = 0;
        for (bucket, &count) in self.buckets.iter().enumerate() {
            seen += count;
            if seen >= wanted {
                return bucket as f64 / 100.0;
            }
        }
        1.0
    }
}

/// Unit cost lost by one side, summed over battles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLosses {
    /// Cost of destroyed cohorts that were not captured.
    pub destroyed: f64,
    /// Expected cost of captured cohorts (cost × capture chance).
    pub captured: f64,
    /// Cost of restoring surviving cohorts to full strength.
    pub repaired: f64,
}

impl ResourceLosses {
    pub fn total(&self) -> f64 {
        self.destroyed + self.captured + self.repaired
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            destroyed: self.destroyed * factor,
            captured: self.captured * factor,
            repaired: self.repaired * factor,
        }
    }
}

/// Per-side aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideStats {
    pub morale_remaining: f64,
    pub strength_remaining: f64,
    pub morale_distribution: Distribution,
    pub strength_distribution: Distribution,
    pub losses: ResourceLosses,
    /// Battles in which this side was stack wiped.
    pub stack_wiped: u32,
}

/// Raw sums over completed battles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub completed: u32,
    pub attacker_wins: u32,
    pub defender_wins: u32,
    pub draws: u32,
    pub incomplete: u32,
    pub total_rounds: u64,
    /// Battles by final round number.
    pub round_histogram: BTreeMap<i32, u32>,
    pub sides: [SideStats; 2],
}

impl SimulationStats {
    fn record(&mut self, battle: &Battle) {
        let round = battle.current();
        self.completed += 1;
        match battle.outcome() {
            BattleOutcome::AttackerWin => self.attacker_wins += 1,
            BattleOutcome::DefenderWin => self.defender_wins += 1,
            BattleOutcome::Draw => self.draws += 1,
            BattleOutcome::Incomplete | BattleOutcome::Ongoing => self.incomplete += 1,
        }
        let rounds = round.number.max(0);
        self.total_rounds += rounds as u64;
        *self.round_histogram.entry(rounds).or_default() += 1;
        if let Some(side) = round.stack_wiped {
            self.sides[side.index()].stack_wiped += 1;
        }
        for side in Side::BOTH {
            record_side(&mut self.sides[side.index()], battle, round, side);
        }
    }
}

fn record_side(stats: &mut SideStats, battle: &Battle, round: &Round, side: Side) {
    let prepared = battle.prepared();
    let mut morale = (0.0, 0.0);
    let mut strength = (0.0, 0.0);
    for &ix in &prepared.side(side).cohorts {
        let (Some(cohort), Some(state)) = (prepared.cohort(ix), round.cohort(ix)) else {
            continue;
        };
        let definition = &cohort.definition;
        morale.0 += state.morale.max(0.0);
        morale.1 += definition.max_morale;
        strength.0 += state.strength.max(0.0);
        strength.1 += definition.max_strength;

        if state.is_destroyed {
            let captured = state.capture_chance.unwrap_or(0.0);
            stats.losses.captured += definition.cost * captured;
            stats.losses.destroyed += definition.cost * (1.0 - captured);
        } else if definition.max_strength > 0.0 {
            let missing = 1.0 - state.strength.max(0.0) / definition.max_strength;
            stats.losses.repaired += definition.cost * missing.clamp(0.0, 1.0);
        }
    }
    let fraction = |(left, max): (f64, f64)| if max > 0.0 { left / max } else { 0.0 };
    let (morale, strength) = (fraction(morale), fraction(strength));
    stats.morale_remaining += morale;
    stats.strength_remaining += strength;
    stats.morale_distribution.record(morale);
    stats.strength_distribution.record(strength);
}

/// Per-side averages reported with progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CasualtyStats {
    pub average_morale_remaining: f64,
    pub average_strength_remaining: f64,
}

/// Snapshot handed to the progress callback. Rates are over completed battles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationProgress {
    pub attacker_win_rate: f64,
    pub defender_win_rate: f64,
    pub draw_rate: f64,
    pub incomplete_rate: f64,
    pub average_rounds: f64,
    pub stack_wipes: u32,
    pub completed: u32,
    pub requested: u32,
    /// `completed / requested`.
    pub progress: f64,
    pub is_running: bool,
    pub casualties: [CasualtyStats; 2],
    /// Average losses per battle.
    pub losses: [ResourceLosses; 2],
}

impl SimulationProgress {
    fn from_stats(stats: &SimulationStats, requested: u32, is_running: bool) -> Self {
        let completed = stats.completed;
        let per_battle = if completed == 0 {
            0.0
        } else {
            1.0 / completed as f64
        };
        let rate = |count: u32| count as f64 * per_battle;
        Self {
            attacker_win_rate: rate(stats.attacker_wins),
            defender_win_rate: rate(stats.defender_wins),
            draw_rate: rate(stats.draws),
            incomplete_rate: rate(stats.incomplete),
            average_rounds: stats.total_rounds as f64 * per_battle,
            stack_wipes: stats.sides.iter().map(|s| s.stack_wiped).sum(),
            completed,
            requested,
            progress: if requested == 0 {
                1.0
            } else {
                completed as f64 / requested as f64
            },
            is_running,
            casualties: stats.sides.each_ref().map(|side| CasualtyStats {
                average_morale_remaining: side.morale_remaining * per_battle,
                average_strength_remaining: side.strength_remaining * per_battle,
            }),
            losses: stats.sides.each_ref().map(|side| side.losses.scaled(per_battle)),
        }
    }
}

pub struct WinRateSimulator {
    prototype: Battle,
    config: SimulationConfig,
    base_seed: u64,
    interrupt: Arc<AtomicBool>,
    stats: SimulationStats,
    metrics: SimulationMetrics,
}

impl WinRateSimulator {
    /// Every battle starts from `battle` reset to deployment.
    pub fn new(battle: &Battle, config: SimulationConfig) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        let mut prototype = battle.clone();
        prototype.reset();
        let base_seed = config.base_seed.unwrap_or_else(rand::random);
        Ok(Self {
            prototype,
            config,
            base_seed,
            interrupt: Arc::new(AtomicBool::new(false)),
            stats: SimulationStats::default(),
            metrics: SimulationMetrics::default(),
        })
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Seed for battle `index`. Zero means fresh entropy to a battle, so it
    /// is skipped.
    pub fn battle_seed(&self, index: u32) -> u64 {
        self.base_seed.wrapping_add(index as u64).max(1)
    }

    /// Shared flag; storing `true` stops the run at the next chunk boundary.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.stats.completed >= self.config.battles
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn metrics(&self) -> &SimulationMetrics {
        &self.metrics
    }

    pub fn progress(&self) -> SimulationProgress {
        SimulationProgress::from_stats(
            &self.stats,
            self.config.battles,
            !self.is_finished() && !self.is_interrupted(),
        )
    }

    /// Runs the next `chunk_size` battles. Returns how many completed.
    #[instrument(skip_all, name = "sim_chunk")]
    pub fn run_chunk(&mut self) -> u32 {
        let start = self.stats.completed;
        let end = start
            .saturating_add(self.config.chunk_size)
            .min(self.config.battles);
        let timer = Instant::now();
        for index in start..end {
            let mut battle = self.prototype.clone();
            battle.set_seed(self.battle_seed(index));
            battle.run_to_end();
            log::trace!(
                "Battle {} (seed {}): {:?} after {} rounds",
                index,
                battle.seed(),
                battle.outcome(),
                battle.round_number()
            );
            self.metrics.rounds += battle.round_number().max(0) as u64;
            self.stats.record(&battle);
        }
        self.metrics.battle_time += timer.elapsed();
        self.metrics.battles += u64::from(end - start);
        self.metrics.chunks += 1;
        profiling::frame_mark_chunk();
        end - start
    }

    /// Runs chunks until done or interrupted, reporting after each chunk and
    /// once more at the end with `is_running == false`.
    pub fn run(&mut self, mut on_progress: impl FnMut(&SimulationProgress)) -> SimulationProgress {
        let wall = Instant::now();
        while !self.is_finished() && !self.is_interrupted() {
            self.run_chunk();
            on_progress(&self.progress());
            std::thread::yield_now();
        }
        self.metrics.wall_time += wall.elapsed();

        let mut last = self.progress();
        last.is_running = false;
        on_progress(&last);
        log::info!(
            "Simulated {}/{} battles: attacker {:.1}%, defender {:.1}%, draw {:.1}%, incomplete {:.1}% ({:.0} battles/s)",
            last.completed,
            last.requested,
            last.attacker_win_rate * 100.0,
            last.defender_win_rate * 100.0,
            last.draw_rate * 100.0,
            last.incomplete_rate * 100.0,
            self.metrics.battles_per_second()
        );
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::testing::{infantry, ArmyBuilder, BattleBuilder};

    fn battle() -> Battle {
        BattleBuilder::new(Settings::eu4())
            .attacker(
                ArmyBuilder::new()
                    .cohorts((1..=4).map(infantry))
                    .martial(6.0)
                    .build(),
            )
            .defender(ArmyBuilder::new().cohorts((5..=8).map(infantry)).build())
            .build()
            .unwrap()
    }

    fn config(battles: u32) -> SimulationConfig {
        SimulationConfig {
            battles,
            chunk_size: 10,
            base_seed: Some(2024),
        }
    }

    #[test]
    fn test_counts_add_up_at_every_callback() {
        let mut simulator = WinRateSimulator::new(&battle(), config(45)).unwrap();
        let mut calls = 0;
        let last = simulator.run(|progress| {
            calls += 1;
            let stats_total = progress.attacker_win_rate
                + progress.defender_win_rate
                + progress.draw_rate
                + progress.incomplete_rate;
            assert!((stats_total - 1.0).abs() < 1e-9);
        });
        let stats = simulator.stats();
        assert_eq!(
            stats.attacker_wins + stats.defender_wins + stats.draws + stats.incomplete,
            stats.completed
        );
        assert_eq!(stats.completed, 45);
        assert_eq!(stats.round_histogram.values().sum::<u32>(), 45);
        // Five chunks plus the final report.
        assert_eq!(calls, 6);
        assert!(!last.is_running);
        assert_eq!(last.progress, 1.0);
    }

    #[test]
    fn test_interrupt_matches_shorter_run() {
        let mut interrupted = WinRateSimulator::new(&battle(), config(100)).unwrap();
        let handle = interrupted.interrupt_handle();
        let last = interrupted.run(|progress| {
            if progress.completed >= 30 {
                handle.store(true, Ordering::Relaxed);
            }
        });
        assert_eq!(last.completed, 30);
        assert!((last.progress - 0.3).abs() < 1e-12);

        let mut short = WinRateSimulator::new(&battle(), config(30)).unwrap();
        short.run(|_| {});
        assert_eq!(interrupted.stats(), short.stats());
    }

    #[test]
    fn test_same_base_seed_same_results() {
        let mut a = WinRateSimulator::new(&battle(), config(20)).unwrap();
        let mut b = WinRateSimulator::new(&battle(), config(20)).unwrap();
        assert_eq!(a.run(|_| {}), b.run(|_| {}));
    }

    #[test]
    fn test_general_advantage_wins_more() {
        let mut simulator = WinRateSimulator::new(&battle(), config(50)).unwrap();
        let progress = simulator.run(|_| {});
        assert!(progress.attacker_win_rate > progress.defender_win_rate);
    }

    #[test]
    fn test_no_battles_reports_zeroes() {
        let mut simulator = WinRateSimulator::new(&battle(), config(0)).unwrap();
        let progress = simulator.run(|_| {});
        assert_eq!(progress.completed, 0);
        assert_eq!(progress.attacker_win_rate, 0.0);
        assert_eq!(progress.progress, 1.0);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = SimulationConfig {
            chunk_size: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            WinRateSimulator::new(&battle(), config),
            Err(ConfigError::ZeroChunkSize)
        ));
    }

    #[test]
    fn test_battle_seed_skips_zero() {
        let config = SimulationConfig {
            base_seed: Some(u64::MAX),
            ..config(10)
        };
        let simulator = WinRateSimulator::new(&battle(), config).unwrap();
        assert_eq!(simulator.battle_seed(0), u64::MAX);
        assert_eq!(simulator.battle_seed(1), 1);
    }

    #[test]
    fn test_distribution_percentiles() {
        let mut distribution = Distribution::default();
        for fraction in [0.1, 0.2, 0.3, 0.4] {
            distribution.record(fraction);
        }
        distribution.record(f64::NAN);
        assert_eq!(distribution.count(), 5);
        assert_eq!(distribution.percentile(0.0), 0.0);
        assert_eq!(distribution.percentile(0.5), 0.2);
        assert_eq!(distribution.percentile(1.0), 0.4);
        assert_eq!(Distribution::default().percentile(0.5), 0.0);
    }

    #[test]
    fn test_losses_cover_both_sides() {
        let mut simulator = WinRateSimulator::new(&battle(), config(10)).unwrap();
        let progress = simulator.run(|_| {});
        let total: f64 = progress.losses.iter().map(ResourceLosses::total).sum();
        assert!(total > 0.0);
        for casualties in progress.casualties {
            assert!((0.0..=1.0).contains(&casualties.average_strength_remaining));
        }
    }
}
