//! Behaviour archetype sampling

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::Behaviour;
use crate::error::{require_non_negative, ConfigError};

/// Normalized weights over [`Behaviour`] archetypes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehaviourDistribution {
    normal: f64,
    cautious: f64,
    reckless: f64,
}

impl BehaviourDistribution {
    /// Weights may be any non-negative scale (fractions, head counts); they are
    /// normalized to sum to one.
    pub fn new(normal: f64, cautious: f64, reckless: f64) -> Result<Self, ConfigError> {
        require_non_negative("behaviour.normal", normal)?;
        require_non_negative("behaviour.cautious", cautious)?;
        require_non_negative("behaviour.reckless", reckless)?;

        let total = normal + cautious + reckless;
        if !total.is_finite() || total <= 0.0 {
            return Err(ConfigError::invalid(
                "behaviour weights",
                total,
                "must sum to a finite positive value",
            ));
        }
        Ok(Self {
            normal: normal / total,
            cautious: cautious / total,
            reckless: reckless / total,
        })
    }

    pub fn weight(&self, behaviour: Behaviour) -> f64 {
        match behaviour {
            Behaviour::Normal => self.normal,
            Behaviour::Cautious => self.cautious,
            Behaviour::Reckless => self.reckless,
        }
    }

    pub fn sample(&self, rng: &mut impl Rng) -> Behaviour {
        let roll = rng.gen::<f64>();
        if roll < self.normal {
            Behaviour::Normal
        } else if roll < self.normal + self.cautious {
            Behaviour::Cautious
        } else if self.reckless > 0.0 {
            Behaviour::Reckless
        } else {
            // Rounding left a sliver above normal + cautious
            if self.cautious > 0.0 {
                Behaviour::Cautious
            } else {
                Behaviour::Normal
            }
        }
    }
}

impl Default for BehaviourDistribution {
    fn default() -> Self {
        Self {
            normal: 1.0,
            cautious: 0.0,
            reckless: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_weights_normalized() {
        let dist = BehaviourDistribution::new(300.0, 150.0, 50.0).unwrap();
        assert!((dist.weight(Behaviour::Normal) - 0.6).abs() < 1e-12);
        assert!((dist.weight(Behaviour::Cautious) - 0.3).abs() < 1e-12);
        assert!((dist.weight(Behaviour::Reckless) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_weights() {
        assert!(BehaviourDistribution::new(0.0, 0.0, 0.0).is_err());
        assert!(BehaviourDistribution::new(-1.0, 1.0, 1.0).is_err());
        assert!(BehaviourDistribution::new(f64::NAN, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_sample_matches_weights() {
        let dist = BehaviourDistribution::new(0.5, 0.5, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut cautious = 0;
        for _ in 0..10_000 {
            match dist.sample(&mut rng) {
                Behaviour::Cautious => cautious += 1,
                Behaviour::Reckless => panic!("zero-weight archetype sampled"),
                Behaviour::Normal => {}
            }
        }
        assert!((4_500..5_500).contains(&cautious));
    }
}
