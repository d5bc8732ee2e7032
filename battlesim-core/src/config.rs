use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which game's combat rules the presets follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameEngine {
    #[default]
    Imperator,
    Eu4,
}

/// How discipline participates in damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisciplineMode {
    Off,
    /// Increases damage done only.
    #[default]
    Damage,
    /// Increases damage done and reduces damage taken.
    Both,
}

/// Errors from validating [`Settings`] or [`SimulationConfig`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("dice minimum {min} is above dice maximum {max}")]
    DiceBounds { min: u8, max: u8 },
    #[error("phase length must be at least 1")]
    ZeroPhaseLength,
    #[error("max rounds must be at least 1")]
    ZeroMaxRounds,
    #[error("setting {name} must be finite and non-negative, got {value}")]
    InvalidMultiplier { name: &'static str, value: f64 },
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,
}

/// Combat rule configuration.
///
/// Every recognised option is an explicit field; use [`Settings::imperator`]
/// or [`Settings::eu4`] as a starting point and [`Settings::validate`] before
/// handing it to a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub engine: GameEngine,

    // Phases and rounds
    /// Alternate Fire and Shock phases instead of a single Default phase.
    pub fire_and_shock: bool,
    /// Rounds per phase; dice are re-rolled when a phase starts.
    pub phase_length: u32,
    /// Hard cap on rounds per battle. Battles hitting it are incomplete.
    pub max_rounds: u32,
    pub combat_width: u32,
    /// Deploy support cohorts to a second row.
    pub backrow: bool,

    // Dice and pips
    pub dice_minimum: u8,
    pub dice_maximum: u8,
    /// Cap on the non-dice pip sum.
    pub max_pips: i32,
    /// Share of a support cohort's defensive pips given to the cohort in front.
    pub defensive_support_ratio: f64,
    /// Damage multiplier for cohorts attacking from the back row.
    pub backrow_damage_ratio: f64,

    // Damage
    pub precision: f64,
    pub base_damage: f64,
    pub roll_damage: f64,
    pub strength_lost_multiplier: f64,
    pub morale_lost_multiplier: f64,
    /// Damage grows by this fraction every round.
    pub daily_damage_increase: f64,
    /// Fraction of max morale every frontline cohort loses each round.
    pub daily_morale_loss: f64,
    pub experience_damage_reduction: f64,
    /// When false, experience reduction is scaled by morale/strength damage
    /// taken, matching the original game behaviour.
    pub fix_experience: bool,

    // Defeat thresholds
    pub minimum_morale: f64,
    pub minimum_strength: f64,
    /// Cohorts below this share of max morale are flagged weak.
    pub weak_morale_ratio: f64,

    // Attribute gating
    pub discipline: DisciplineMode,
    pub attribute_combat_ability: bool,
    pub attribute_damage: bool,
    pub attribute_phase_damage: bool,
    pub attribute_terrain_type: bool,
    pub attribute_unit_type: bool,
    pub attribute_loyal: bool,
    pub attribute_experience: bool,
    pub attribute_military_tactics: bool,
    pub attribute_strength_damage: bool,
    pub attribute_morale_damage: bool,

    // Stack wipe and capture
    pub stackwipe: bool,
    pub stackwipe_rounds: u32,
    pub hard_stackwipe_requirement: f64,
    pub soft_stackwipe_requirement: f64,
    pub base_capture_chance: f64,

    // Army composition
    /// Flank units above this share of the army trigger a morale penalty.
    pub flank_ratio: f64,
    pub flank_ratio_penalty: f64,
}

impl Settings {
    /// Single Default phase, dice 1-6, growing daily damage.
    pub fn imperator() -> Self {
        Self {
            engine: GameEngine::Imperator,
            fire_and_shock: false,
            phase_length: 5,
            max_rounds: 1000,
            combat_width: 30,
            backrow: false,
            dice_minimum: 1,
            dice_maximum: 6,
            max_pips: 10,
            defensive_support_ratio: 0.5,
            backrow_damage_ratio: 0.5,
            precision: 1000.0,
            base_damage: 0.02,
            roll_damage: 0.005,
            strength_lost_multiplier: 1.0,
            morale_lost_multiplier: 2.0,
            daily_damage_increase: 0.01,
            daily_morale_loss: 0.0,
            experience_damage_reduction: 0.3,
            fix_experience: false,
            minimum_morale: 0.25,
            minimum_strength: 0.0,
            weak_morale_ratio: 0.5,
            discipline: DisciplineMode::Both,
            attribute_combat_ability: true,
            attribute_damage: true,
            attribute_phase_damage: false,
            attribute_terrain_type: true,
            attribute_unit_type: true,
            attribute_loyal: true,
            attribute_experience: true,
            attribute_military_tactics: false,
            attribute_strength_damage: true,
            attribute_morale_damage: true,
            stackwipe: true,
            stackwipe_rounds: 5,
            hard_stackwipe_requirement: 10.0,
            soft_stackwipe_requirement: 2.0,
            base_capture_chance: 1.0,
            flank_ratio: 0.5,
            flank_ratio_penalty: 0.5,
        }
    }

    /// Alternating Fire/Shock phases of three days, dice 0-9, back row.
    pub fn eu4() -> Self {
        Self {
            engine: GameEngine::Eu4,
            fire_and_shock: true,
            phase_length: 3,
            combat_width: 20,
            backrow: true,
            dice_minimum: 0,
            dice_maximum: 9,
            base_damage: 0.015,
            roll_damage: 0.005,
            morale_lost_multiplier: 2.5,
            daily_damage_increase: 0.0,
            daily_morale_loss: 0.01,
            experience_damage_reduction: 0.1,
            minimum_morale: 0.0,
            discipline: DisciplineMode::Damage,
            attribute_phase_damage: true,
            attribute_loyal: false,
            attribute_military_tactics: true,
            stackwipe_rounds: 12,
            flank_ratio_penalty: 0.0,
            ..Self::imperator()
        }
    }

    pub fn for_engine(engine: GameEngine) -> Self {
        match engine {
            GameEngine::Imperator => Self::imperator(),
            GameEngine::Eu4 => Self::eu4(),
        }
    }

    /// Checks cross-field consistency.
    ///
    /// Zero combat width and empty armies are valid here; battles treat them
    /// as immediately over.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.dice_minimum > self.dice_maximum {
            return Err(ConfigError::DiceBounds {
                min: self.dice_minimum,
                max: self.dice_maximum,
            });
        }
        if self.phase_length == 0 {
            return Err(ConfigError::ZeroPhaseLength);
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::ZeroMaxRounds);
        }
        let multipliers = [
            ("precision", self.precision),
            ("base_damage", self.base_damage),
            ("roll_damage", self.roll_damage),
            ("strength_lost_multiplier", self.strength_lost_multiplier),
            ("morale_lost_multiplier", self.morale_lost_multiplier),
            ("daily_damage_increase", self.daily_damage_increase),
            ("daily_morale_loss", self.daily_morale_loss),
            ("experience_damage_reduction", self.experience_damage_reduction),
            ("defensive_support_ratio", self.defensive_support_ratio),
            ("backrow_damage_ratio", self.backrow_damage_ratio),
            ("weak_morale_ratio", self.weak_morale_ratio),
            ("hard_stackwipe_requirement", self.hard_stackwipe_requirement),
            ("soft_stackwipe_requirement", self.soft_stackwipe_requirement),
            ("base_capture_chance", self.base_capture_chance),
            ("flank_ratio", self.flank_ratio),
            ("flank_ratio_penalty", self.flank_ratio_penalty),
        ];
        for (name, value) in multipliers {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidMultiplier { name, value });
            }
        }
        if !self.minimum_morale.is_finite() {
            return Err(ConfigError::InvalidMultiplier {
                name: "minimum_morale",
                value: self.minimum_morale,
            });
        }
        if !self.minimum_strength.is_finite() {
            return Err(ConfigError::InvalidMultiplier {
                name: "minimum_strength",
                value: self.minimum_strength,
            });
        }
        Ok(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::imperator()
    }
}

/// Monte-Carlo run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Battles to run in total.
    pub battles: u32,
    /// Battles per scheduling slice. Interrupts are checked between slices.
    pub chunk_size: u32,
    /// Battle `i` is seeded with `base_seed + i`. `None` draws fresh entropy.
    pub base_seed: Option<u64>,
}

impl SimulationConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        Ok(self)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            battles: 1000,
            chunk_size: 100,
            base_seed: None,
        }
    }
}
