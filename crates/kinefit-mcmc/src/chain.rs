use serde::{Deserialize, Serialize};

use kinefit_core::{GalaxyParameters, ParameterName};

/// One sampler iteration: the state after the accept/reject decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainRow {
    /// Current state of the chain.
    pub parameters: GalaxyParameters,
    /// Reduced chi-square of the current state.
    pub reduced_chi: f64,
    /// Whether this iteration's proposal was accepted.
    pub accepted: bool,
}

/// Append-only record of the states visited by the sampler.
///
/// A rejected proposal repeats the previous state, so the chain has exactly
/// one row per iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    start: GalaxyParameters,
    rows: Vec<ChainRow>,
}

impl Chain {
    /// Empty chain leaving from `start`.
    pub fn starting_at(start: GalaxyParameters) -> Self {
        Self {
            start,
            rows: Vec::new(),
        }
    }

    /// Chain made of already recorded rows.
    pub fn from_rows(start: GalaxyParameters, rows: Vec<ChainRow>) -> Self {
        Self { start, rows }
    }

    pub(crate) fn with_capacity(start: GalaxyParameters, capacity: usize) -> Self {
        Self {
            start,
            rows: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, row: ChainRow) {
        self.rows.push(row);
    }

    /// State the sampler started from.
    pub fn start(&self) -> &GalaxyParameters {
        &self.start
    }

    /// All rows in iteration order.
    pub fn rows(&self) -> &[ChainRow] {
        &self.rows
    }

    /// Number of rows (iterations).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true before the first iteration.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of accepted proposals.
    pub fn accepted(&self) -> usize {
        self.rows.iter().filter(|row| row.accepted).count()
    }

    /// Accepted proposals per iteration, in percent.
    pub fn acceptance_rate(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.accepted() as f64 * 100.0 / self.rows.len() as f64
    }

    /// Number of rows whose state differs from the one before.
    pub fn transitions(&self) -> usize {
        let mut previous = &self.start;
        let mut count = 0;
        for row in &self.rows {
            if !row.parameters.bitwise_eq(previous) {
                count += 1;
            }
            previous = &row.parameters;
        }
        count
    }

    /// Values of one parameter along the chain.
    pub fn column(&self, name: ParameterName) -> Vec<f64> {
        self.rows.iter().map(|row| row.parameters[name]).collect()
    }

    /// Reduced chi-square along the chain.
    pub fn reduced_chi(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.reduced_chi).collect()
    }

    /// Index of the row with the lowest reduced chi-square.
    pub fn argmin_chi(&self) -> Option<usize> {
        self.rows
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.reduced_chi.total_cmp(&b.1.reduced_chi))
            .map(|(idx, _)| idx)
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> &[ChainRow] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }

    /// Copy of the chain with `f` applied to every state.
    pub fn sanitized(&self, f: impl Fn(&mut GalaxyParameters)) -> Self {
        let mut start = self.start;
        f(&mut start);
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = *row;
                f(&mut row.parameters);
                row
            })
            .collect();
        Self { start, rows }
    }
}
