//! The spatial index for gravity-model mixing: positions on the unit square
//! and a precomputed, weighted distribution over close agent pairs.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use crate::agent::AgentId;
use crate::error::MiasmaError;

/// Coincident agents would give an infinite `distance^-exponent` weight;
/// they are weighted as if this far apart instead.
const MIN_DISTANCE: f64 = 1e-6;

/// Samples one position per agent, uniformly over the unit square.
pub fn uniform_positions(n: usize, rng: &mut impl Rng) -> Vec<(f64, f64)> {
    (0..n)
        .map(|_| (rng.random::<f64>(), rng.random::<f64>()))
        .collect()
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// The precomputed gravity-model candidate set: every agent pair within the
/// distance threshold, weighted by `distance^-exponent` and normalized into
/// one probability distribution over pairs.
///
/// Built once per run from the immutable position array and never
/// recomputed.
pub struct ProximityPairs {
    pairs: Vec<(AgentId, AgentId)>,
    distribution: WeightedIndex<f64>,
}

impl ProximityPairs {
    /// Scans all position pairs and builds the weighted pair distribution.
    ///
    /// # Errors
    ///
    /// Returns a `MiasmaError::ConfigError` if no pair lies within the
    /// threshold; an empty candidate set cannot be normalized and would
    /// otherwise only surface mid-run.
    pub fn build(
        positions: &[(f64, f64)],
        distance_threshold: f64,
        exponent: f64,
    ) -> Result<ProximityPairs, MiasmaError> {
        let mut pairs = Vec::new();
        let mut weights = Vec::new();
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let d = distance(positions[i], positions[j]);
                if d < distance_threshold {
                    pairs.push((AgentId(i), AgentId(j)));
                    weights.push(d.max(MIN_DISTANCE).powf(-exponent));
                }
            }
        }
        if pairs.is_empty() {
            return Err(MiasmaError::ConfigError(format!(
                "no agent pairs within distance threshold {distance_threshold}; \
                 the gravity model has no contacts to draw"
            )));
        }
        let distribution = WeightedIndex::new(&weights).map_err(|e| {
            MiasmaError::ConfigError(format!("invalid proximity pair weights: {e}"))
        })?;
        Ok(ProximityPairs {
            pairs,
            distribution,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Draws one pair from the weighted distribution.
    pub fn draw(&self, rng: &mut impl Rng) -> (AgentId, AgentId) {
        self.pairs[self.distribution.sample(rng)]
    }

    /// Draws a batch of pairs with replacement from the weighted
    /// distribution.
    pub fn draw_batch(&self, rng: &mut impl Rng, batch_size: usize) -> Vec<(AgentId, AgentId)> {
        (0..batch_size).map(|_| self.draw(rng)).collect()
    }
}
