//! Value table, run history and visit counting.
//!
//! The CSV exports are the run's durable artifacts: the value table as a
//! state-by-action grid and the history as one row per consumed transition.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::cache::TransitionKey;
use crate::error::Result;
use crate::space::StateSpace;

/// Dense `num_states x num_actions` value table, zero-initialized.
#[derive(Debug, Clone)]
pub struct QTable {
    cells: Vec<Vec<f64>>,
    num_actions: usize,
}

impl QTable {
    pub fn new(num_states: usize, num_actions: usize) -> Self {
        Self {
            cells: vec![vec![0.0; num_actions]; num_states],
            num_actions,
        }
    }

    pub fn num_states(&self) -> usize {
        self.cells.len()
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn set(&mut self, state: usize, action: usize, value: f64) {
        self.cells[state][action] = value;
    }

    pub fn get(&self, state: usize, action: usize) -> f64 {
        self.cells[state][action]
    }

    /// Best action for one state with its value. Ties go to the lowest index.
    pub fn best_action(&self, state: usize) -> (usize, f64) {
        let row = &self.cells[state];
        let mut best = (0, row[0]);
        for (action, &value) in row.iter().enumerate().skip(1) {
            if value > best.1 {
                best = (action, value);
            }
        }
        best
    }

    /// Best action and value for every state, keyed by state index.
    pub fn optimal_policy(&self) -> BTreeMap<usize, (usize, f64)> {
        (0..self.num_states())
            .map(|state| (state, self.best_action(state)))
            .collect()
    }

    /// Export the grid: header `State/Action,<action labels>`, one row per
    /// state in dense-ID order.
    pub fn write_csv(&self, path: impl AsRef<Path>, space: &StateSpace) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        write!(writer, "State/Action")?;
        for action in 0..self.num_actions {
            let label = space.action_label(action).unwrap_or_default();
            write!(writer, ",{label}")?;
        }
        writeln!(writer)?;
        for (state, row) in self.cells.iter().enumerate() {
            let label = space.state_label(state).unwrap_or_default();
            write!(writer, "{label}")?;
            for value in row {
                write!(writer, ",{value:.6}")?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Append-only log of the transitions the training loop consumed.
#[derive(Debug, Default)]
pub struct HistoryTable {
    rows: Vec<HistoryRow>,
}

#[derive(Debug, Clone)]
struct HistoryRow {
    state: usize,
    action: usize,
    new_state: usize,
    probability: f64,
    score: f64,
}

impl HistoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        state: usize,
        action: usize,
        new_state: usize,
        probability: f64,
        score: f64,
    ) {
        self.rows.push(HistoryRow {
            state,
            action,
            new_state,
            probability,
            score,
        });
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn write_csv(&self, path: impl AsRef<Path>, space: &StateSpace) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "State,Action,New State,Probability,Reward")?;
        for row in &self.rows {
            writeln!(
                writer,
                "{},{},{},{},{}",
                space.state_label(row.state).unwrap_or_default(),
                space.action_label(row.action).unwrap_or_default(),
                space.state_label(row.new_state).unwrap_or_default(),
                row.probability,
                row.score,
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Counts how often each (state, action) key has been consumed.
///
/// Counts only increase; `reset` clears the whole counter at once.
#[derive(Debug)]
pub struct VisitCounter {
    counts: HashMap<TransitionKey, u32>,
    max_visits: u32,
}

impl VisitCounter {
    pub fn new(max_visits: u32) -> Self {
        Self {
            counts: HashMap::new(),
            max_visits,
        }
    }

    /// Increment the key's count and return the new value.
    pub fn record(&mut self, key: TransitionKey) -> u32 {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    pub fn count(&self, key: TransitionKey) -> u32 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    /// Whether the key has been visited at least the configured maximum.
    pub fn reached_max(&self, key: TransitionKey) -> bool {
        self.count(key) >= self.max_visits
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }
}
