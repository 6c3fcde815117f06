//! Pathogen prototype and per-host infection progress.

use serde::{Deserialize, Serialize};

use crate::error::{require_non_negative, require_positive, require_unit, ConfigError};

/// Progression phase of an attached pathogen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathogenPhase {
    /// Latent; the host cannot transmit yet
    Incubating,
    /// Capable of transmitting on contact
    Infectious,
    /// Infectious period is over; the clone is removed at the next status update
    Spent,
}

/// Disease parameters plus the progress of one infection.
///
/// The simulator holds one prototype (elapsed time zero, never advanced);
/// every infected host carries its own clone obtained from [`Pathogen::infect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pathogen {
    incubation: f64,
    transmission_probability: f64,
    severity: f64,
    mortality: f64,
    infectious_duration: f64,

    /// Seconds since the host was infected
    elapsed: f64,
    /// Seconds of the most recent step spent in the infectious window
    last_infectious_span: f64,
}

impl Pathogen {
    /// Build a prototype. Durations are in simulated seconds, the transmission
    /// probability is per contact per second.
    pub fn new(
        incubation: f64,
        transmission_probability: f64,
        severity: f64,
        mortality: f64,
        infectious_duration: f64,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            incubation: require_positive("incubation", incubation)?,
            transmission_probability: require_unit(
                "transmission_probability",
                transmission_probability,
            )?,
            severity: require_unit("severity", severity)?,
            mortality: require_unit("mortality", mortality)?,
            infectious_duration: require_positive("infectious_duration", infectious_duration)?,
            elapsed: 0.0,
            last_infectious_span: 0.0,
        })
    }

    /// Re-check parameters that bypassed [`Pathogen::new`], e.g. deserialized ones
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::new(
            self.incubation,
            self.transmission_probability,
            self.severity,
            self.mortality,
            self.infectious_duration,
        )?;
        require_non_negative("pathogen.elapsed", self.elapsed)?;
        require_non_negative("pathogen.last_infectious_span", self.last_infectious_span)?;
        Ok(())
    }

    /// A fresh clone for a newly infected host
    pub fn infect(&self) -> Self {
        Self {
            elapsed: 0.0,
            last_infectious_span: 0.0,
            ..self.clone()
        }
    }

    /// Advance the infection clock by `elapsed_seconds`
    pub fn live(&mut self, elapsed_seconds: f64) {
        debug_assert!(elapsed_seconds >= 0.0);
        let window_start = self.incubation;
        let window_end = self.incubation + self.infectious_duration;

        let from = self.elapsed;
        let to = self.elapsed + elapsed_seconds;
        self.elapsed = to;

        // Overlap of [from, to] with the infectious window
        self.last_infectious_span = (to.min(window_end) - from.max(window_start)).max(0.0);
    }

    pub fn phase(&self) -> PathogenPhase {
        if self.elapsed <= self.incubation {
            PathogenPhase::Incubating
        } else if self.infectious_time() <= self.infectious_duration {
            PathogenPhase::Infectious
        } else {
            PathogenPhase::Spent
        }
    }

    pub fn is_infectious(&self) -> bool {
        self.phase() == PathogenPhase::Infectious
    }

    pub fn is_spent(&self) -> bool {
        self.phase() == PathogenPhase::Spent
    }

    /// Seconds of the coming `elapsed_seconds` that fall inside the infectious
    /// window. A host turning infectious mid-step transmits for the rest of it.
    pub fn infectious_overlap(&self, elapsed_seconds: f64) -> f64 {
        let window_end = self.incubation + self.infectious_duration;
        let from = self.elapsed.max(self.incubation);
        let to = (self.elapsed + elapsed_seconds).min(window_end);
        (to - from).max(0.0)
    }

    /// Seconds spent past incubation
    pub fn infectious_time(&self) -> f64 {
        (self.elapsed - self.incubation).max(0.0)
    }

    pub fn last_infectious_span(&self) -> f64 {
        self.last_infectious_span
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn incubation(&self) -> f64 {
        self.incubation
    }

    pub fn transmission_probability(&self) -> f64 {
        self.transmission_probability
    }

    pub fn severity(&self) -> f64 {
        self.severity
    }

    pub fn mortality(&self) -> f64 {
        self.mortality
    }

    pub fn infectious_duration(&self) -> f64 {
        self.infectious_duration
    }

    /// Probability that a susceptible host catches this pathogen during
    /// `elapsed_seconds` of exposure with total contact weight `weight`.
    ///
    /// `1 - (1 - p)^(w * dt)` composes exactly over sub-steps, so halving the
    /// tick does not change the per-second hazard.
    pub fn exposure_probability(&self, weight: f64, elapsed_seconds: f64) -> f64 {
        if weight <= 0.0 || elapsed_seconds <= 0.0 {
            return 0.0;
        }
        1.0 - (1.0 - self.transmission_probability).powf(weight * elapsed_seconds)
    }

    /// Log of the probability of escaping infection from this source; logs of
    /// several sources add up to the log of escaping all of them.
    pub fn log_escape(&self, weight: f64, elapsed_seconds: f64) -> f64 {
        if weight <= 0.0 || elapsed_seconds <= 0.0 {
            return 0.0;
        }
        (1.0 - self.transmission_probability).ln() * weight * elapsed_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prototype() -> Pathogen {
        Pathogen::new(5.0, 0.05, 0.5, 0.8, 12.0).unwrap()
    }

    #[test]
    fn test_construction_exposes_parameters() {
        let p = prototype();
        assert_eq!(p.incubation(), 5.0);
        assert_eq!(p.transmission_probability(), 0.05);
        assert_eq!(p.severity(), 0.5);
        assert_eq!(p.mortality(), 0.8);
        assert_eq!(p.infectious_duration(), 12.0);
        assert_eq!(p.elapsed(), 0.0);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(Pathogen::new(-1.0, 0.05, 0.5, 0.8, 12.0).is_err());
        assert!(Pathogen::new(5.0, 1.5, 0.5, 0.8, 12.0).is_err());
        assert!(Pathogen::new(5.0, 0.05, -0.1, 0.8, 12.0).is_err());
        assert!(Pathogen::new(5.0, 0.05, 0.5, 0.8, 0.0).is_err());
        assert!(Pathogen::new(f64::NAN, 0.05, 0.5, 0.8, 12.0).is_err());
    }

    #[test]
    fn test_phase_progression() {
        let mut p = prototype().infect();
        assert_eq!(p.phase(), PathogenPhase::Incubating);

        p.live(5.0);
        assert_eq!(p.phase(), PathogenPhase::Incubating);
        assert_eq!(p.last_infectious_span(), 0.0);

        p.live(1.0);
        assert_eq!(p.phase(), PathogenPhase::Infectious);
        assert!((p.last_infectious_span() - 1.0).abs() < 1e-12);

        p.live(11.0);
        assert_eq!(p.phase(), PathogenPhase::Infectious);

        p.live(1.0);
        assert_eq!(p.phase(), PathogenPhase::Spent);
    }

    #[test]
    fn test_infectious_span_straddles_window() {
        let mut p = prototype().infect();
        p.live(4.0);
        // 4..8 overlaps the window starting at 5 by 3 seconds
        p.live(4.0);
        assert!((p.last_infectious_span() - 3.0).abs() < 1e-12);

        // 8..30 overlaps the window ending at 17 by 9 seconds
        p.live(22.0);
        assert!((p.last_infectious_span() - 9.0).abs() < 1e-12);
        assert!(p.is_spent());
    }

    #[test]
    fn test_infect_resets_clock() {
        let mut p = prototype().infect();
        p.live(7.0);
        let fresh = p.infect();
        assert_eq!(fresh.elapsed(), 0.0);
        assert_eq!(fresh.severity(), p.severity());
    }

    #[test]
    fn test_infectious_overlap() {
        let mut p = prototype().infect();
        assert_eq!(p.infectious_overlap(1.0), 0.0);
        p.live(4.5);
        assert_eq!(p.infectious_overlap(1.0), 0.5);
        p.live(1.5);
        assert_eq!(p.infectious_overlap(1.0), 1.0);
        p.live(10.5);
        // Window closes at 17s
        assert_eq!(p.infectious_overlap(1.0), 0.5);
        p.live(1.0);
        assert_eq!(p.infectious_overlap(1.0), 0.0);
    }

    #[test]
    fn test_exposure_probability_composes() {
        let p = prototype();
        let whole = p.exposure_probability(2.0, 1.0);
        let half = p.exposure_probability(2.0, 0.5);
        let composed = 1.0 - (1.0 - half) * (1.0 - half);
        assert!((whole - composed).abs() < 1e-12);
        assert_eq!(p.exposure_probability(0.0, 1.0), 0.0);

        let via_log = 1.0 - p.log_escape(2.0, 1.0).exp();
        assert!((whole - via_log).abs() < 1e-12);
    }
}
