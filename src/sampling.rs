//! Weighted index sampling.

use rand::Rng;

/// Draws an index with probability proportional to its weight.
///
/// Weights are non-negative and need not sum to 1; they are normalized at
/// draw time. The cumulative walk visits weights in insertion order, so
/// tie-break behavior is deterministic under a seeded generator.
#[derive(Debug, Clone, Default)]
pub struct WeightedSampler {
    weights: Vec<f64>,
    total: f64,
}

impl WeightedSampler {
    /// Create an empty sampler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one weight. Its index is the current length.
    pub fn add(&mut self, weight: f64) {
        debug_assert!(weight >= 0.0, "weights must be non-negative");
        self.weights.push(weight);
        self.total += weight;
    }

    /// Append every weight from an iterator.
    pub fn add_all(&mut self, weights: impl IntoIterator<Item = f64>) {
        for weight in weights {
            self.add(weight);
        }
    }

    /// Number of weights added so far.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether no weights have been added.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Draw one index.
    ///
    /// Draws a uniform value in `[0, 1)`, walks the cumulative distribution
    /// in insertion order and returns the first index whose cumulative weight
    /// meets or exceeds the draw. Callers must not invoke this on an empty
    /// sampler; with all-zero weights the first index is returned.
    pub fn next_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        debug_assert!(!self.is_empty(), "next_index on an empty sampler");
        if self.weights.len() <= 1 || self.total <= 0.0 {
            return 0;
        }
        let draw: f64 = rng.gen();
        let mut cumulative = 0.0;
        for (index, weight) in self.weights.iter().enumerate() {
            cumulative += weight / self.total;
            if cumulative >= draw {
                return index;
            }
        }
        // Floating-point drift can leave the final cumulative just below 1.
        self.weights.len() - 1
    }
}
