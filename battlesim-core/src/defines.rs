//! Engine constants (defines).
//!
//! Tunable rules live in [`crate::config::Settings`]; these are the fixed
//! values both supported rule sets share.

/// Combat constants
pub mod combat {
    /// Men in a full-strength cohort. Strength is tracked in men.
    pub const STRENGTH_SCALE: f64 = 1000.0;

    /// Lower bound for divisors built from attributes (military tactics).
    pub const MIN_MULTIPLIER: f64 = 0.001;

    /// Damage bonus for loyal cohorts when loyalty is enabled.
    pub const LOYAL_BONUS: f64 = 1.1;

    /// Frontline row index of the fighting row.
    pub const FRONT_ROW: usize = 0;

    /// Frontline row index of the support (back) row.
    pub const BACK_ROW: usize = 1;
}

/// Dice constants
pub mod dice {
    /// Draws consumed per phase boundary (attacker, then defender).
    pub const DRAWS_PER_PHASE: u64 = 2;
}

/// Army composition constants
pub mod army {
    /// Contribution key for the morale penalty from too many flank units.
    pub const FLANK_RATIO_KEY: &str = "flank_ratio";
}

/// Capture constants
pub mod capture {
    /// Capture probability is clamped into this range.
    pub const MIN_CHANCE: f64 = 0.0;
    pub const MAX_CHANCE: f64 = 1.0;
}
