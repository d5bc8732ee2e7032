//! # Battle Simulation Core
//!
//! Deterministic round-based land combat for Imperator and EU4 rule sets,
//! plus a Monte-Carlo win-rate simulator on top of it.
//!
//! Every round is a pure function of the previous round, the prepared
//! battle data, the settings and that round's dice. Rounds are frozen into
//! `Arc`s so undo, replay and read-only inspection never copy history.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Definitions    │────▶│ prepare_     │────▶│ PreparedBattle│
//! │ (attribute     │     │ battle       │     │ (cohort arena)│
//! │  containers)   │     │ (precalc)    │     └───────┬───────┘
//! └────────────────┘     └──────────────┘             │
//!                                                     ▼
//! ┌────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ WinRate        │────▶│ Battle       │────▶│ resolve_round │
//! │ Simulator      │     │ (dice, undo) │     │ (pure fn)     │
//! └────────────────┘     └──────────────┘     └───────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`AttributeContainer`] | Layered named contributions (Base, Modifier, Loss, LossModifier) |
//! | [`Settings`] | Every rule toggle, with Imperator and EU4 presets |
//! | [`PreparedBattle`] | Immutable cohort arena and per-side derived stats |
//! | [`Round`] | Frozen snapshot: cohort states, frontline grid, reserves |
//! | [`Battle`] | Sequences rounds, rolls dice, supports undo |
//! | [`WinRateSimulator`] | Repeats a battle with fresh seeds and aggregates results |

pub mod army;
pub mod battle;
pub mod config;
pub mod defines;
pub mod definitions;
pub mod metrics;
pub mod profiling;
pub mod simulation;
pub mod state;
pub mod systems;
pub mod testing;
pub mod values;

pub use army::{prepare_battle, GeneralStats, PreparedArmy, PreparedBattle};
pub use battle::{Battle, BattleOutcome};
pub use config::{ConfigError, DisciplineMode, GameEngine, Settings, SimulationConfig};
pub use definitions::{
    ArmyDefinition, CohortDefinition, CohortId, DiceMode, GeneralAttribute, GeneralDefinition,
    TacticAttribute, TacticDefinition, TerrainAttribute, TerrainDefinition, TerrainLocation,
    UnitAttribute, UnitRole, UnitType, UnitTypeId,
};
pub use metrics::SimulationMetrics;
pub use simulation::{
    CasualtyStats, Distribution, ResourceLosses, SimulationProgress, SimulationStats,
    WinRateSimulator,
};
pub use state::{CohortState, CombatCohort, Phase, Round, Side};
pub use systems::ConversionContext;
pub use values::{AttributeContainer, Bucket, HasValues};
