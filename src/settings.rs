//! Runtime-tunable engine settings.
//!
//! Every decision point reads these on each tick, so a change made through
//! the control surface takes effect on the next tick. Writes go through the
//! enumerated whitelist in [`EngineSettings::set`]; there is no free-form
//! path mutation.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Names accepted by [`EngineSettings::set`].
pub const SETTING_NAMES: &[&str] = &[
    "check_rate_period_secs",
    "retention_period_secs",
    "explosion_threshold",
    "rising_count_threshold",
    "sell_growth_threshold_1",
    "sell_growth_threshold_2",
    "sell_growth_2_minutes",
    "sell_growth_threshold_3",
    "sell_growth_3_minutes",
    "sell_fall_threshold",
    "order_budget",
];

/// Configuration read by every decision point in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Width of the trailing sub-window the detector evaluates, in seconds.
    pub check_rate_period_secs: u64,

    /// How long ticks are retained, in seconds. Always >= the check period.
    pub retention_period_secs: u64,

    /// Minimum `max/min - 1` growth over the check window to flag an
    /// explosion.
    pub explosion_threshold: f64,

    /// Number of spaced re-observations required before acting.
    pub rising_count_threshold: u32,

    /// Immediate take-profit growth, no time gate.
    pub sell_growth_threshold_1: f64,

    /// Smaller take-profit growth, gated by `sell_growth_2_minutes`.
    pub sell_growth_threshold_2: f64,

    /// Minimum order age in minutes before rule 2 applies.
    pub sell_growth_2_minutes: f64,

    /// Marginal take-profit growth, gated by `sell_growth_3_minutes`.
    pub sell_growth_threshold_3: f64,

    /// Minimum order age in minutes before rule 3 applies.
    pub sell_growth_3_minutes: f64,

    /// Stop-loss growth (negative), no time gate.
    pub sell_fall_threshold: f64,

    /// Base-currency notional per order; position size is budget / rate.
    pub order_budget: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            check_rate_period_secs: 180,
            retention_period_secs: 600,
            explosion_threshold: 0.05,
            rising_count_threshold: 3,
            sell_growth_threshold_1: 0.09,
            sell_growth_threshold_2: 0.04,
            sell_growth_2_minutes: 20.0,
            sell_growth_threshold_3: 0.0075,
            sell_growth_3_minutes: 60.0,
            sell_fall_threshold: -0.05,
            order_budget: 0.01,
        }
    }
}

impl EngineSettings {
    /// Set a single named setting to a numeric value.
    ///
    /// Unknown names and values that would break an invariant are rejected;
    /// the previous value stays in place.
    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            bail!("setting '{}' rejects non-finite value", name);
        }

        match name {
            "check_rate_period_secs" => {
                let secs = as_secs(name, value)?;
                if secs > self.retention_period_secs {
                    bail!(
                        "check_rate_period_secs ({}) must not exceed retention_period_secs ({})",
                        secs,
                        self.retention_period_secs
                    );
                }
                self.check_rate_period_secs = secs;
            }
            "retention_period_secs" => {
                let secs = as_secs(name, value)?;
                if secs < self.check_rate_period_secs {
                    bail!(
                        "retention_period_secs ({}) must be at least check_rate_period_secs ({})",
                        secs,
                        self.check_rate_period_secs
                    );
                }
                self.retention_period_secs = secs;
            }
            "explosion_threshold" => {
                if value <= 0.0 {
                    bail!("explosion_threshold must be positive");
                }
                self.explosion_threshold = value;
            }
            "rising_count_threshold" => {
                if value < 1.0 || value.fract() != 0.0 {
                    bail!("rising_count_threshold must be a positive integer");
                }
                self.rising_count_threshold = value as u32;
            }
            "sell_growth_threshold_1" => self.sell_growth_threshold_1 = non_negative(name, value)?,
            "sell_growth_threshold_2" => self.sell_growth_threshold_2 = non_negative(name, value)?,
            "sell_growth_2_minutes" => self.sell_growth_2_minutes = non_negative(name, value)?,
            "sell_growth_threshold_3" => self.sell_growth_threshold_3 = non_negative(name, value)?,
            "sell_growth_3_minutes" => self.sell_growth_3_minutes = non_negative(name, value)?,
            "sell_fall_threshold" => {
                if value >= 0.0 {
                    bail!("sell_fall_threshold must be negative");
                }
                self.sell_fall_threshold = value;
            }
            "order_budget" => {
                if value <= 0.0 {
                    bail!("order_budget must be positive");
                }
                self.order_budget = value;
            }
            other => bail!(
                "unknown setting '{}' (valid: {})",
                other,
                SETTING_NAMES.join(", ")
            ),
        }

        Ok(())
    }
}

fn as_secs(name: &str, value: f64) -> Result<u64> {
    if value < 1.0 || value.fract() != 0.0 {
        bail!("setting '{}' must be a positive whole number of seconds", name);
    }
    Ok(value as u64)
}

fn non_negative(name: &str, value: f64) -> Result<f64> {
    if value < 0.0 {
        bail!("setting '{}' must not be negative", name);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_whitelisted_field() {
        let mut settings = EngineSettings::default();
        settings.set("explosion_threshold", 0.08).unwrap();
        assert_eq!(settings.explosion_threshold, 0.08);

        settings.set("rising_count_threshold", 2.0).unwrap();
        assert_eq!(settings.rising_count_threshold, 2);
    }

    #[test]
    fn test_unknown_name_rejected() {
        let mut settings = EngineSettings::default();
        let err = settings.set("made_up_knob", 1.0).unwrap_err();
        assert!(err.to_string().contains("unknown setting"));
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn test_retention_must_cover_check_period() {
        let mut settings = EngineSettings::default();

        // Shrinking retention below the check period is rejected
        assert!(settings.set("retention_period_secs", 60.0).is_err());
        assert_eq!(settings.retention_period_secs, 600);

        // Growing the check period past retention is rejected
        assert!(settings.set("check_rate_period_secs", 900.0).is_err());
        assert_eq!(settings.check_rate_period_secs, 180);

        // Equal is fine
        settings.set("check_rate_period_secs", 600.0).unwrap();
        assert_eq!(settings.check_rate_period_secs, 600);
    }

    #[test]
    fn test_sign_validation() {
        let mut settings = EngineSettings::default();
        assert!(settings.set("sell_fall_threshold", 0.05).is_err());
        assert!(settings.set("sell_fall_threshold", -0.08).is_ok());
        assert!(settings.set("explosion_threshold", -1.0).is_err());
        assert!(settings.set("order_budget", 0.0).is_err());
        assert!(settings.set("sell_growth_2_minutes", f64::NAN).is_err());
    }
}
