//! Per-human immune system: antibody strength against an immunity threshold.

use serde::{Deserialize, Serialize};

use super::Pathogen;
use crate::error::{require_non_negative, require_positive, ConfigError};

/// Immune parameters shared by the whole population
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImmuneConfig {
    /// Strength at or above which the host is immune
    pub threshold: f64,
    /// Resting strength that waning decays toward
    pub baseline: f64,
    /// Fraction of the gap to baseline lost per second outside an infection.
    /// Zero means acquired immunity is permanent.
    pub waning_rate: f64,
}

impl Default for ImmuneConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            baseline: 0.0,
            waning_rate: 0.0,
        }
    }
}

impl ImmuneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("immunity.threshold", self.threshold)?;
        require_non_negative("immunity.baseline", self.baseline)?;
        require_non_negative("immunity.waning_rate", self.waning_rate)?;
        if self.baseline >= self.threshold {
            return Err(ConfigError::invalid(
                "immunity.baseline",
                self.baseline,
                "must be below the immunity threshold",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImmuneSystem {
    strength: f64,
    threshold: f64,
    baseline: f64,
    waning_rate: f64,
    /// An infection episode is in progress; strength cannot drop until it ends
    engaged: bool,
}

impl ImmuneSystem {
    /// A naive immune system resting at baseline
    pub fn new(config: &ImmuneConfig) -> Self {
        Self {
            strength: config.baseline,
            threshold: config.threshold,
            baseline: config.baseline,
            waning_rate: config.waning_rate,
            engaged: false,
        }
    }

    /// An immune system that already cleared a past infection
    pub fn immune(config: &ImmuneConfig) -> Self {
        Self {
            strength: config.threshold,
            ..Self::new(config)
        }
    }

    /// Background dynamics: waning toward baseline while no episode is active
    pub fn live(&mut self, elapsed_seconds: f64) {
        if self.engaged || self.waning_rate == 0.0 {
            return;
        }
        let fraction = (self.waning_rate * elapsed_seconds).min(1.0);
        self.strength += (self.baseline - self.strength) * fraction;
    }

    /// Respond to an attached pathogen.
    ///
    /// Growth is proportional to the time the pathogen spent infectious during
    /// the last step, at a rate that reaches the threshold from baseline within
    /// `infectious_duration / (1 + severity)` seconds.
    pub fn defend(&mut self, pathogen: &Pathogen) {
        self.engaged = true;
        let rate = self.threshold * (1.0 + pathogen.severity()) / pathogen.infectious_duration();
        let before = self.strength;
        self.strength += rate * pathogen.last_infectious_span();
        debug_assert!(self.strength >= before);
    }

    /// The infection episode is over (pathogen discarded)
    pub fn end_episode(&mut self) {
        self.engaged = false;
    }

    /// Re-check state that bypassed the constructors, e.g. deserialized state
    pub fn validate(&self) -> Result<(), ConfigError> {
        ImmuneConfig {
            threshold: self.threshold,
            baseline: self.baseline,
            waning_rate: self.waning_rate,
        }
        .validate()?;
        require_non_negative("immunity.strength", self.strength)?;
        Ok(())
    }

    pub fn is_immune(&self) -> bool {
        self.strength >= self.threshold
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}
