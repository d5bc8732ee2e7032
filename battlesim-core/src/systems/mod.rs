//! Battle systems, leaf to root: pips, precalculation, deployment, combat.

pub mod combat;
pub mod deployment;
pub mod pips;
pub mod precalc;

pub use combat::{resolve_round, stack_wipe, Hit};
pub use deployment::{center_out, deploy, initial_round, reinforce};
pub use precalc::{convert_cohort, ConversionContext};
