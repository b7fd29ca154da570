//! Operation selection strategies.
//!
//! Each step of the generation loop starts by drawing one operation from the
//! live universe. [`UniformOperationSelector`] draws uniformly; [`Bloodhound`]
//! implements coverage-guided weighting: operations with many uncovered
//! branches or few successful invocations are favored, and repeatedly
//! selected operations decay.

use std::collections::HashMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::executor::CoverageOracle;
use crate::operation::Operation;
use crate::randomness::weighted_choice;
use crate::sequence::Sequence;

/// Picks the operation to try next. `notify_regression_test` is invoked with
/// every sequence accepted as a regression test, so selectors can track
/// which operations keep succeeding.
pub trait OperationSelector {
    fn select(&mut self, operations: &[Operation], rng: &mut ChaCha8Rng) -> Option<Operation>;

    fn notify_regression_test(&mut self, _sequence: &Sequence) {}
}

#[derive(Debug, Default)]
pub struct UniformOperationSelector;

impl OperationSelector for UniformOperationSelector {
    fn select(&mut self, operations: &[Operation], rng: &mut ChaCha8Rng) -> Option<Operation> {
        if operations.is_empty() {
            return None;
        }
        Some(operations[rng.gen_range(0..operations.len())].clone())
    }
}

const BLOODHOUND_ALPHA: f64 = 0.7;
const BLOODHOUND_DECAY_P: f64 = 0.5;
const COVERAGE_UPDATE_INTERVAL: u32 = 100;

/// Coverage-guided operation weighting.
///
/// With a coverage oracle, operation m is weighted
///   w(m) = alpha * uncovered_ratio(m)
///        + (1 - alpha) * (1 - invocations(m) / max_invocations)
/// and without one, w(m) = 1 / |universe|. An operation selected k > 0
/// times since the last coverage refresh is additionally scaled by
///   max( (-3 / ln(1 - p)) * p^k / k , 1 / ln(|universe| + 3) ).
/// The coverage snapshot is refreshed (and the selection counts reset)
/// every 100 successful invocations across the whole universe.
pub struct Bloodhound {
    oracle: Option<Box<dyn CoverageOracle>>,
    weights: HashMap<Operation, f64>,
    selection_counts: HashMap<Operation, u32>,
    invocations: HashMap<Operation, u32>,
    max_invocations: u32,
    successes_since_update: u32,
}

impl Bloodhound {
    pub fn new(oracle: Option<Box<dyn CoverageOracle>>) -> Bloodhound {
        Bloodhound {
            oracle,
            weights: HashMap::new(),
            selection_counts: HashMap::new(),
            invocations: HashMap::new(),
            // Starts at 1 so the invocation ratio is defined before any
            // invocation succeeds.
            max_invocations: 1,
            successes_since_update: 0,
        }
    }

    fn compute_weight(&mut self, operation: &Operation, universe_size: usize) -> f64 {
        let invocations = self.invocations.get(operation).copied().unwrap_or(0) as f64;
        let max_invocations = self.max_invocations as f64;
        let mut weight = match self.oracle.as_mut() {
            Some(oracle) => {
                let uncovered = oracle.uncovered_ratio(operation);
                BLOODHOUND_ALPHA * uncovered
                    + (1.0 - BLOODHOUND_ALPHA) * (1.0 - invocations / max_invocations)
            }
            None => 1.0 / universe_size as f64,
        };
        let k = self.selection_counts.get(operation).copied().unwrap_or(0);
        if k > 0 {
            let decay = (-3.0 / (1.0 - BLOODHOUND_DECAY_P).ln())
                * (BLOODHOUND_DECAY_P.powi(k as i32) / k as f64);
            let floor = 1.0 / ((universe_size + 3) as f64).ln();
            weight *= decay.max(floor);
        }
        weight
    }

    fn refresh(&mut self, operations: &[Operation]) {
        if let Some(oracle) = self.oracle.as_mut() {
            oracle.update();
        }
        self.successes_since_update = 0;
        self.selection_counts.clear();
        debug!("refreshed coverage snapshot");
        for operation in operations {
            let weight = self.compute_weight(operation, operations.len());
            self.weights.insert(operation.clone(), weight);
        }
    }
}

impl OperationSelector for Bloodhound {
    fn select(&mut self, operations: &[Operation], rng: &mut ChaCha8Rng) -> Option<Operation> {
        if operations.is_empty() {
            return None;
        }
        if self.successes_since_update >= COVERAGE_UPDATE_INTERVAL {
            self.refresh(operations);
        } else {
            for operation in operations {
                if !self.weights.contains_key(operation) {
                    let weight = self.compute_weight(operation, operations.len());
                    self.weights.insert(operation.clone(), weight);
                }
            }
        }
        let weights: Vec<f64> = operations
            .iter()
            .map(|op| self.weights.get(op).copied().unwrap_or(0.0))
            .collect();
        let index = weighted_choice(&weights, rng)?;
        let chosen = operations[index].clone();
        *self.selection_counts.entry(chosen.clone()).or_insert(0) += 1;
        let weight = self.compute_weight(&chosen, operations.len());
        self.weights.insert(chosen.clone(), weight);
        Some(chosen)
    }

    /// The accepted sequence's final statement holds the operation chosen
    /// for the step that built it, whatever its kind.
    fn notify_regression_test(&mut self, sequence: &Sequence) {
        let Some(statement) = sequence.last_statement() else {
            return;
        };
        let count = self
            .invocations
            .entry(statement.operation.clone())
            .or_insert(0);
        *count += 1;
        if *count > self.max_invocations {
            self.max_invocations = *count;
        }
        self.successes_since_update += 1;
    }
}
