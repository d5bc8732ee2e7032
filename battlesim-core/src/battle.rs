//! Battle driver: sequences rounds for one battle.
//!
//! Every resolved round is frozen into an `Arc<Round>` and appended to an
//! `im::Vector`, so undo is a pop and clones of a battle share history.
//!
//! Dice are drawn from `StdRng::seed_from_u64(seed)`, two draws (attacker,
//! then defender) at every phase boundary. Resuming mid-battle discards
//! the draws already consumed, so a stored seed always replays the same
//! dice sequence.

use crate::army::{prepare_battle, PreparedBattle};
use crate::config::{ConfigError, Settings};
use crate::defines::dice::DRAWS_PER_PHASE;
use crate::definitions::{ArmyDefinition, DiceMode, TerrainDefinition, UnitType};
use crate::profiling;
use crate::state::{Round, Side};
use crate::systems::combat::resolve_round;
use crate::systems::deployment::{deploy, initial_round};
use crate::systems::precalc::ConversionContext;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of a battle as of its latest round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleOutcome {
    /// Still running.
    Ongoing,
    AttackerWin,
    DefenderWin,
    /// Both sides lost their last viable cohort in the same round.
    Draw,
    /// Hit the round limit.
    Incomplete,
}

#[derive(Debug, Clone)]
pub struct Battle {
    settings: Settings,
    terrains: Vec<TerrainDefinition>,
    unit_types: Vec<UnitType>,
    armies: [ArmyDefinition; 2],
    prepared: PreparedBattle,
    /// Rounds before `current`, oldest first.
    history: im::Vector<Arc<Round>>,
    current: Arc<Round>,
    seed: u64,
    custom_seed: Option<u64>,
    rng: Option<StdRng>,
    outdated: bool,
}

impl Battle {
    /// Validates `settings` and prepares round −1.
    pub fn new(
        settings: Settings,
        terrains: Vec<TerrainDefinition>,
        unit_types: Vec<UnitType>,
        attacker: ArmyDefinition,
        defender: ArmyDefinition,
    ) -> Result<Self, ConfigError> {
        let settings = settings.validate()?;
        let armies = [attacker, defender];
        let prepared = Self::prepare(&settings, &terrains, &unit_types, &armies);
        let current = Arc::new(initial_round(&prepared, &settings));
        Ok(Self {
            settings,
            terrains,
            unit_types,
            armies,
            prepared,
            history: im::Vector::new(),
            current,
            seed: 0,
            custom_seed: None,
            rng: None,
            outdated: false,
        })
    }

    fn prepare(
        settings: &Settings,
        terrains: &[TerrainDefinition],
        unit_types: &[UnitType],
        armies: &[ArmyDefinition; 2],
    ) -> PreparedBattle {
        let ctx = ConversionContext::new(settings, terrains, unit_types);
        prepare_battle(&ctx, &armies[0], &armies[1])
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prepared(&self) -> &PreparedBattle {
        &self.prepared
    }

    pub fn army(&self, side: Side) -> &ArmyDefinition {
        &self.armies[side.index()]
    }

    /// The latest frozen round.
    pub fn current(&self) -> &Arc<Round> {
        &self.current
    }

    /// All frozen rounds from −1 to the current one.
    pub fn rounds(&self) -> impl Iterator<Item = &Arc<Round>> {
        self.history.iter().chain(std::iter::once(&self.current))
    }

    pub fn round_number(&self) -> i32 {
        self.current.number
    }

    pub fn is_fight_over(&self) -> bool {
        self.current.fight_over
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn custom_seed(&self) -> Option<u64> {
        self.custom_seed
    }

    /// Inputs changed since the rounds were resolved; see [`Battle::refresh`].
    pub fn is_outdated(&self) -> bool {
        self.outdated
    }

    /// Fixes the seed for this and every later replay.
    pub fn set_seed(&mut self, seed: u64) {
        self.custom_seed = Some(seed);
        self.seed = seed;
        self.rng = None;
    }

    pub fn clear_seed(&mut self) {
        self.custom_seed = None;
    }

    pub fn set_dice(&mut self, side: Side, dice: DiceMode) {
        self.armies[side.index()].dice = dice;
        self.outdated = true;
    }

    pub fn set_army(&mut self, side: Side, army: ArmyDefinition) {
        self.armies[side.index()] = army;
        self.outdated = true;
    }

    pub fn set_terrains(&mut self, terrains: Vec<TerrainDefinition>) {
        self.terrains = terrains;
        self.outdated = true;
    }

    /// Back to round −1. A custom seed is kept, otherwise the next step
    /// draws fresh entropy.
    pub fn reset(&mut self) {
        if self.outdated {
            self.prepared = Self::prepare(
                &self.settings,
                &self.terrains,
                &self.unit_types,
                &self.armies,
            );
            self.outdated = false;
        }
        self.history = im::Vector::new();
        self.current = Arc::new(initial_round(&self.prepared, &self.settings));
        self.seed = self.custom_seed.unwrap_or(0);
        self.rng = None;
    }

    /// Rebuilds from the current inputs and replays to the same round with
    /// the same seed.
    pub fn refresh(&mut self) {
        let target = self.current.number;
        let seed = self.seed;
        self.outdated = true;
        self.reset();
        self.seed = seed;
        if target >= 0 && self.deploy_if_needed() {
            self.step(target as u32);
        }
    }

    /// Pops up to `steps` rounds. Going below round 2 drops the seed back to
    /// the custom seed (or zero, meaning fresh entropy).
    pub fn undo(&mut self, steps: u32) {
        for _ in 0..steps {
            match self.history.pop_back() {
                Some(previous) => self.current = previous,
                None => break,
            }
        }
        self.rng = None;
        if self.current.number < 2 {
            self.seed = self.custom_seed.unwrap_or(0);
        }
    }

    /// Advances up to `steps` rounds and returns how many were resolved.
    ///
    /// From round −1 the first call deploys (round 0) without using a step.
    /// A battle where either army is empty is over without deploying.
    pub fn step(&mut self, steps: u32) -> u32 {
        if steps == 0 || !self.deploy_if_needed() {
            return 0;
        }

        let mut resolved = 0;
        while resolved < steps && !self.current.fight_over && !self.at_round_limit() {
            let number = self.current.number + 1;
            let dice = self.dice_for(number);
            let next = resolve_round(&self.current, &self.prepared, &self.settings, dice);
            self.push(next);
            profiling::frame_mark_round();
            resolved += 1;
        }

        match self.outcome() {
            BattleOutcome::Ongoing => {}
            outcome => log::debug!(
                "Battle ended after {} rounds: {:?}",
                self.current.number,
                outcome
            ),
        }
        resolved
    }

    /// Steps until the fight is over or the round limit is hit.
    pub fn run_to_end(&mut self) -> BattleOutcome {
        while self.outcome() == BattleOutcome::Ongoing {
            let remaining =
                i64::from(self.settings.max_rounds) - i64::from(self.current.number);
            self.step(u32::try_from(remaining).unwrap_or(u32::MAX).max(1));
        }
        self.outcome()
    }

    pub fn outcome(&self) -> BattleOutcome {
        let round = &self.current;
        if !round.fight_over {
            if self.at_round_limit() {
                return BattleOutcome::Incomplete;
            }
            return BattleOutcome::Ongoing;
        }
        match (
            round.is_viable(Side::Attacker),
            round.is_viable(Side::Defender),
        ) {
            (true, false) => BattleOutcome::AttackerWin,
            (false, true) => BattleOutcome::DefenderWin,
            _ => BattleOutcome::Draw,
        }
    }

    /// Deploys from round −1 if needed. False when the fight is already over.
    fn deploy_if_needed(&mut self) -> bool {
        if self.current.fight_over {
            return false;
        }
        if self.current.number >= 0 {
            return true;
        }
        if self.armies.iter().any(ArmyDefinition::is_empty) {
            let mut over = (*self.current).clone();
            over.fight_over = true;
            self.current = Arc::new(over);
            log::debug!("Battle over before deployment: an army is empty");
            return false;
        }
        let deployed = deploy(&self.current, &self.settings);
        self.push(deployed);
        !self.current.fight_over
    }

    fn at_round_limit(&self) -> bool {
        i64::from(self.current.number) >= i64::from(self.settings.max_rounds)
    }

    fn push(&mut self, round: Round) {
        let previous = std::mem::replace(&mut self.current, Arc::new(round));
        self.history.push_back(previous);
    }

    fn dice_range(&self) -> (u8, u8) {
        (self.settings.dice_minimum, self.settings.dice_maximum)
    }

    /// Dice rolled from the seed, fast-forwarded past the current round.
    fn rng(&mut self) -> &mut StdRng {
        if self.seed == 0 {
            self.seed = self.custom_seed.unwrap_or(0);
        }
        while self.seed == 0 {
            self.seed = rand::random();
        }
        let seed = self.seed;
        let (min, max) = self.dice_range();
        let boundaries = phase_boundaries(self.current.number, self.settings.phase_length);
        self.rng.get_or_insert_with(|| {
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..boundaries * DRAWS_PER_PHASE {
                rng.gen_range(min..=max);
            }
            rng
        })
    }

    /// Dice for round `number`: re-rolled at phase boundaries, else carried.
    fn dice_for(&mut self, number: i32) -> [u8; 2] {
        let previous = [
            self.current.side(Side::Attacker).dice,
            self.current.side(Side::Defender).dice,
        ];
        let length = self.settings.phase_length.max(1) as i32;
        if (number - 1) % length != 0 {
            return previous;
        }
        let (min, max) = self.dice_range();
        let mut dice = [0; 2];
        for side in Side::BOTH {
            // Manual dice still consume the draw.
            let drawn = self.rng().gen_range(min..=max);
            dice[side.index()] = match self.armies[side.index()].dice {
                DiceMode::Random => drawn,
                DiceMode::Fixed(value) => value,
            };
        }
        dice
    }
}

/// Phase boundaries passed by the end of `round`: `ceil(round / length)`.
fn phase_boundaries(round: i32, phase_length: u32) -> u64 {
    if round <= 0 {
        return 0;
    }
    let length = phase_length.max(1) as u64;
    (round as u64).div_ceil(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defines::combat::FRONT_ROW;
    use crate::testing::{infantry, ArmyBuilder, BattleBuilder, CohortBuilder};

    fn duel_settings() -> Settings {
        Settings {
            combat_width: 1,
            stackwipe: false,
            morale_lost_multiplier: 0.0,
            ..Settings::imperator()
        }
    }

    fn duel(attacker_dice: u8, defender_dice: u8) -> Battle {
        BattleBuilder::new(duel_settings())
            .attacker(
                ArmyBuilder::new()
                    .cohort(CohortBuilder::new(1, "infantry").morale(1000.0).build())
                    .dice(DiceMode::Fixed(attacker_dice))
                    .build(),
            )
            .defender(
                ArmyBuilder::new()
                    .cohort(CohortBuilder::new(2, "infantry").morale(1000.0).build())
                    .dice(DiceMode::Fixed(defender_dice))
                    .build(),
            )
            .seed(7)
            .build()
            .expect("valid settings")
    }

    fn serialized_rounds(battle: &Battle) -> Vec<String> {
        battle
            .rounds()
            .map(|round| serde_json::to_string(&**round).expect("serializable"))
            .collect()
    }

    #[test]
    fn test_end_to_end_duel() {
        let mut battle = duel(6, 2);
        let outcome = battle.run_to_end();
        assert_eq!(outcome, BattleOutcome::AttackerWin);

        let last = battle.current();
        let (winner, loser) = (&last.cohorts[0], &last.cohorts[1]);
        assert!(loser.strength <= 0.0);
        assert!(loser.is_destroyed && loser.is_defeated);
        assert!(winner.strength > 0.0);
        assert!(winner.strength_dealt >= 1000.0);

        // Same inputs, same number of rounds.
        let mut again = duel(6, 2);
        again.run_to_end();
        assert_eq!(again.round_number(), battle.round_number());
        assert!(battle.round_number() > 1);
    }

    #[test]
    fn test_replay_is_bit_identical() {
        let build = || {
            BattleBuilder::new(Settings::eu4())
                .attacker(ArmyBuilder::new().cohorts((1..=4).map(infantry)).build())
                .defender(ArmyBuilder::new().cohorts((5..=7).map(infantry)).build())
                .seed(1234)
                .build()
                .expect("valid settings")
        };
        let mut first = build();
        let mut second = build();
        first.run_to_end();
        second.run_to_end();
        assert_eq!(serialized_rounds(&first), serialized_rounds(&second));
    }

    #[test]
    fn test_undo_and_resume_matches_straight_run() {
        let build = || {
            BattleBuilder::new(Settings::eu4())
                .attacker(ArmyBuilder::new().cohorts((1..=3).map(infantry)).build())
                .defender(ArmyBuilder::new().cohorts((4..=6).map(infantry)).build())
                .seed(99)
                .build()
                .expect("valid settings")
        };
        let mut straight = build();
        straight.step(6);

        let mut resumed = build();
        resumed.step(4);
        resumed.undo(2);
        assert_eq!(resumed.round_number(), 2);
        resumed.step(4);
        assert_eq!(resumed.round_number(), straight.round_number());
        assert_eq!(serialized_rounds(&resumed), serialized_rounds(&straight));
    }

    #[test]
    fn test_undo_below_round_two_resets_seed() {
        let mut battle = BattleBuilder::new(Settings::imperator())
            .attacker(ArmyBuilder::new().cohort(infantry(1)).build())
            .defender(ArmyBuilder::new().cohort(infantry(2)).build())
            .build()
            .expect("valid settings");
        battle.step(3);
        assert_ne!(battle.seed(), 0);
        battle.undo(2);
        assert_eq!(battle.round_number(), 1);
        assert_eq!(battle.seed(), 0);

        battle.set_seed(5);
        battle.step(2);
        battle.undo(10);
        assert_eq!(battle.round_number(), -1);
        assert_eq!(battle.seed(), 5);
    }

    #[test]
    fn test_deploy_does_not_consume_a_step() {
        let mut battle = duel(3, 3);
        assert_eq!(battle.round_number(), -1);
        assert_eq!(battle.step(1), 1);
        assert_eq!(battle.round_number(), 1);
        assert_eq!(battle.rounds().count(), 3);
    }

    #[test]
    fn test_empty_army_is_over_at_deployment() {
        let mut battle = BattleBuilder::new(Settings::imperator())
            .attacker(ArmyBuilder::new().cohort(infantry(1)).build())
            .defender(ArmyBuilder::new().build())
            .build()
            .expect("valid settings");
        assert_eq!(battle.step(5), 0);
        assert!(battle.is_fight_over());
        assert_eq!(battle.round_number(), -1);
        assert_eq!(battle.outcome(), BattleOutcome::AttackerWin);
    }

    #[test]
    fn test_zero_width_is_draw() {
        let settings = Settings {
            combat_width: 0,
            ..Settings::imperator()
        };
        let mut battle = BattleBuilder::new(settings)
            .attacker(ArmyBuilder::new().cohort(infantry(1)).build())
            .defender(ArmyBuilder::new().cohort(infantry(2)).build())
            .build()
            .expect("valid settings");
        battle.step(1);
        assert!(battle.is_fight_over());
        assert_eq!(battle.outcome(), BattleOutcome::Draw);
    }

    #[test]
    fn test_round_limit_is_incomplete() {
        let settings = Settings {
            max_rounds: 3,
            ..duel_settings()
        };
        let mut battle = BattleBuilder::new(settings)
            .attacker(ArmyBuilder::new().cohort(infantry(1)).build())
            .defender(ArmyBuilder::new().cohort(infantry(2)).build())
            .seed(3)
            .build()
            .expect("valid settings");
        assert_eq!(battle.run_to_end(), BattleOutcome::Incomplete);
        assert_eq!(battle.round_number(), 3);
    }

    #[test]
    fn test_manual_dice_override_but_consume_draws() {
        let settings = Settings::eu4();
        let build = |dice: DiceMode| {
            BattleBuilder::new(settings.clone())
                .attacker(ArmyBuilder::new().cohort(infantry(1)).dice(dice).build())
                .defender(ArmyBuilder::new().cohort(infantry(2)).build())
                .seed(42)
                .build()
                .expect("valid settings")
        };
        let mut random = build(DiceMode::Random);
        let mut fixed = build(DiceMode::Fixed(9));
        random.step(7);
        fixed.step(7);
        for (a, b) in random.rounds().zip(fixed.rounds()).skip(2) {
            assert_eq!(b.side(Side::Attacker).dice, 9);
            // Defender dice are unaffected by the attacker's override.
            assert_eq!(a.side(Side::Defender).dice, b.side(Side::Defender).dice);
        }
    }

    #[test]
    fn test_dice_reroll_on_phase_boundaries() {
        let mut battle = BattleBuilder::new(Settings::eu4())
            .attacker(ArmyBuilder::new().cohorts((1..=5).map(infantry)).build())
            .defender(ArmyBuilder::new().cohorts((6..=10).map(infantry)).build())
            .seed(11)
            .build()
            .expect("valid settings");
        battle.step(6);
        let dice: Vec<u8> = battle
            .rounds()
            .skip(2)
            .map(|r| r.side(Side::Attacker).dice)
            .collect();
        assert_eq!(dice.len(), 6);
        // Phase length 3: rounds 1..=3 share a roll, as do 4..=6.
        assert!(dice[0] == dice[1] && dice[1] == dice[2]);
        assert!(dice[3] == dice[4] && dice[4] == dice[5]);
    }

    #[test]
    fn test_refresh_replays_with_new_dice() {
        let mut battle = duel(3, 3);
        battle.step(4);
        let before = battle.current().cohorts[1].strength;
        battle.set_dice(Side::Attacker, DiceMode::Fixed(6));
        assert!(battle.is_outdated());
        battle.refresh();
        assert!(!battle.is_outdated());
        assert_eq!(battle.round_number(), 4);
        assert!(battle.current().cohorts[1].strength < before);
    }

    #[test]
    fn test_refresh_at_deployment_stays_deployed() {
        let mut battle = duel(3, 3);
        battle.step(1);
        battle.undo(1);
        assert_eq!(battle.round_number(), 0);
        battle.refresh();
        assert_eq!(battle.round_number(), 0);
        assert!(!battle.is_fight_over());
        let deployed = battle.current();
        assert_eq!(deployed.side(Side::Attacker).frontline.get(FRONT_ROW, 0), Some(0));
        assert_eq!(deployed.side(Side::Defender).frontline.get(FRONT_ROW, 0), Some(1));
    }

    #[test]
    fn test_unbounded_round_limits() {
        let settings = Settings {
            max_rounds: u32::MAX,
            stackwipe_rounds: u32::MAX,
            ..duel_settings()
        };
        let mut battle = BattleBuilder::new(settings)
            .attacker(
                ArmyBuilder::new()
                    .cohort(infantry(1))
                    .dice(DiceMode::Fixed(6))
                    .build(),
            )
            .defender(
                ArmyBuilder::new()
                    .cohort(infantry(2))
                    .dice(DiceMode::Fixed(1))
                    .build(),
            )
            .seed(3)
            .build()
            .expect("valid settings");
        assert_eq!(battle.outcome(), BattleOutcome::Ongoing);
        assert_eq!(battle.step(1), 1);
        assert_eq!(battle.run_to_end(), BattleOutcome::AttackerWin);
        assert!(battle.round_number() > 1);
    }

    #[test]
    fn test_defeated_cohorts_stay_placed_for_whole_battle() {
        let settings = Settings {
            combat_width: 1,
            stackwipe: false,
            ..Settings::imperator()
        };
        let mut battle = BattleBuilder::new(settings)
            .attacker(
                ArmyBuilder::new()
                    .cohort(CohortBuilder::new(1, "infantry").morale(1000.0).build())
                    .build(),
            )
            .defender(ArmyBuilder::new().cohorts((2..=5).map(infantry)).build())
            .seed(21)
            .build()
            .expect("valid settings");
        assert_eq!(battle.run_to_end(), BattleOutcome::AttackerWin);
        assert!(battle.round_number() >= 4);
        for round in battle.rounds() {
            assert!(round.every_cohort_placed_once(), "round {}", round.number);
        }
        assert_eq!(
            battle.current().side(Side::Defender).defeated,
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_phase_boundaries() {
        assert_eq!(phase_boundaries(0, 3), 0);
        assert_eq!(phase_boundaries(1, 3), 1);
        assert_eq!(phase_boundaries(3, 3), 1);
        assert_eq!(phase_boundaries(4, 3), 2);
        assert_eq!(phase_boundaries(-1, 3), 0);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = Settings {
            phase_length: 0,
            ..Settings::default()
        };
        let result = BattleBuilder::new(settings)
            .attacker(ArmyBuilder::new().cohort(infantry(1)).build())
            .build();
        assert!(matches!(result, Err(ConfigError::ZeroPhaseLength)));
    }
}
