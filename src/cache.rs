//! Transition cache with weighted resampling.
//!
//! A nondeterministic environment can report several different outcomes for
//! the same (state, action) pair. The cache keeps every reported sample and,
//! on demand, collapses the population into one statistically faithful choice
//! by drawing weighted on the reported probabilities.

use std::collections::HashMap;

use rand::Rng;

use crate::error::{Error, Result};
use crate::sampling::WeightedSampler;

/// Dense (state index, action index) pair under which transitions accumulate.
///
/// Compared by value: a tuple key in a `HashMap` hashes and compares its
/// components, so a fresh tuple per lookup always finds existing entries.
pub type TransitionKey = (usize, usize);

/// One observed excursion outcome. Never mutated after insertion.
///
/// States and actions are tuples of enumeration ordinals, resolvable to dense
/// IDs and numeric values through the state-space manager.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State the excursion started from.
    pub old_state: Vec<usize>,
    /// Actions taken.
    pub action: Vec<usize>,
    /// State the excursion ended in.
    pub new_state: Vec<usize>,
    /// Reported probability of this outcome, in (0, 1].
    pub probability: f64,
    /// Reported score/reward of this outcome.
    pub score: f64,
}

/// Stores every observed outcome per key; draws one weighted by probability.
///
/// Unbounded for the lifetime of one training run; there is no eviction.
/// Reset discards the whole cache at once.
#[derive(Debug, Default)]
pub struct TransitionCache {
    entries: HashMap<TransitionKey, Vec<Transition>>,
}

impl TransitionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transition under its key.
    ///
    /// Never overwrites or deduplicates: repeated calls with the same key
    /// accumulate a sample population.
    pub fn add(&mut self, state: usize, action: usize, transition: Transition) {
        self.entries
            .entry((state, action))
            .or_default()
            .push(transition);
    }

    /// Whether at least one transition has been recorded for the key.
    pub fn has(&self, state: usize, action: usize) -> bool {
        self.entries.contains_key(&(state, action))
    }

    /// Number of transitions recorded under the key.
    pub fn samples(&self, state: usize, action: usize) -> usize {
        self.entries
            .get(&(state, action))
            .map_or(0, |transitions| transitions.len())
    }

    /// Draw one transition for the key, weighted by reported probability.
    ///
    /// Callers must check [`TransitionCache::has`] first: a key with zero
    /// transitions is a contract violation and fails with
    /// [`Error::EmptyCacheKey`] rather than returning a default.
    pub fn choose_one<R: Rng + ?Sized>(
        &self,
        state: usize,
        action: usize,
        rng: &mut R,
    ) -> Result<&Transition> {
        let transitions = self
            .entries
            .get(&(state, action))
            .filter(|transitions| !transitions.is_empty())
            .ok_or(Error::EmptyCacheKey { state, action })?;

        let mut sampler = WeightedSampler::new();
        sampler.add_all(transitions.iter().map(|t| t.probability));
        Ok(&transitions[sampler.next_index(rng)])
    }

    /// Discard every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
