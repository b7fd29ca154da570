//! The execution boundary.
//!
//! The engine never invokes code under test itself; it hands a [`Sequence`]
//! to a [`SequenceExecutor`] and reasons only about the per-statement
//! [`ExecutionOutcome`]s that come back. Classification, coverage, and
//! external stop requests cross the same boundary as trait objects.

use std::time::Duration;

use crate::operation::Operation;
use crate::sequence::Sequence;
use crate::types::TypeUniverse;
use crate::value::RuntimeValue;

/// What happened at one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Normal {
        value: RuntimeValue,
        duration: Duration,
    },
    Exceptional {
        message: String,
        duration: Duration,
    },
    /// Execution stopped before reaching this statement.
    NotExecuted,
}

impl ExecutionOutcome {
    pub fn duration(&self) -> Duration {
        match self {
            ExecutionOutcome::Normal { duration, .. }
            | ExecutionOutcome::Exceptional { duration, .. } => *duration,
            ExecutionOutcome::NotExecuted => Duration::ZERO,
        }
    }
}

/// A sequence together with its execution record.
#[derive(Debug, Clone)]
pub struct ExecutedSequence {
    pub sequence: Sequence,
    outcomes: Vec<ExecutionOutcome>,
    total_duration: Duration,
}

impl ExecutedSequence {
    /// Missing trailing outcomes are padded with `NotExecuted`; surplus ones
    /// are dropped.
    pub fn new(sequence: Sequence, mut outcomes: Vec<ExecutionOutcome>) -> ExecutedSequence {
        outcomes.truncate(sequence.len());
        while outcomes.len() < sequence.len() {
            outcomes.push(ExecutionOutcome::NotExecuted);
        }
        let total_duration = outcomes.iter().map(ExecutionOutcome::duration).sum();
        ExecutedSequence {
            sequence,
            outcomes,
            total_duration,
        }
    }

    pub fn outcome(&self, index: usize) -> &ExecutionOutcome {
        &self.outcomes[index]
    }

    pub fn outcomes(&self) -> &[ExecutionOutcome] {
        &self.outcomes
    }

    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    /// Every statement ran and returned normally.
    pub fn all_normal(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o, ExecutionOutcome::Normal { .. }))
    }

    pub fn value_at(&self, index: usize) -> Option<&RuntimeValue> {
        match &self.outcomes[index] {
            ExecutionOutcome::Normal { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Runs a sequence against the system under test.
pub trait SequenceExecutor {
    fn execute(&mut self, sequence: &Sequence, universe: &TypeUniverse) -> ExecutedSequence;
}

/// The classifier's verdict on an executed sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Expected behavior; the sequence becomes a regression test.
    Regression,
    /// Violates a precondition of the test scenario; discarded.
    Invalid,
    /// Revealed a failure in the code under test.
    Error,
}

pub trait SequenceClassifier {
    fn classify(&mut self, executed: &ExecutedSequence) -> Classification;
}

/// Baseline classifier: a fully normal run becomes a regression test,
/// anything else is reported as an error.
#[derive(Debug, Default)]
pub struct OutcomeClassifier;

impl SequenceClassifier for OutcomeClassifier {
    fn classify(&mut self, executed: &ExecutedSequence) -> Classification {
        if executed.all_normal() {
            Classification::Regression
        } else {
            Classification::Error
        }
    }
}

/// Numeric coverage summary consumed by coverage-guided operation selection.
pub trait CoverageOracle {
    /// Refreshes the underlying coverage snapshot.
    fn update(&mut self);

    /// Fraction of uncovered branches in [0, 1]; 0 when unknown or the
    /// operation has no branches.
    fn uncovered_ratio(&mut self, operation: &Operation) -> f64;
}

/// Observer hooks around the generation loop. All methods default to no-ops
/// so implementations override only what they watch.
pub trait GenerationListener {
    fn explore_start(&mut self) {}
    fn explore_end(&mut self) {}
    fn step_pre(&mut self) {}
    fn step_post(&mut self, _executed: Option<&ExecutedSequence>) {}
    fn should_stop(&mut self) -> bool {
        false
    }
}

/// External stop request, polled once per step.
pub trait Stopper {
    fn should_stop(&mut self) -> bool;
}

/// Fans generator events out to registered listeners.
#[derive(Default)]
pub struct ListenerManager {
    listeners: Vec<Box<dyn GenerationListener>>,
}

impl ListenerManager {
    pub fn new() -> ListenerManager {
        ListenerManager::default()
    }

    pub fn register(&mut self, listener: Box<dyn GenerationListener>) {
        self.listeners.push(listener);
    }

    pub fn explore_start(&mut self) {
        for listener in &mut self.listeners {
            listener.explore_start();
        }
    }

    pub fn explore_end(&mut self) {
        for listener in &mut self.listeners {
            listener.explore_end();
        }
    }

    pub fn step_pre(&mut self) {
        for listener in &mut self.listeners {
            listener.step_pre();
        }
    }

    pub fn step_post(&mut self, executed: Option<&ExecutedSequence>) {
        for listener in &mut self.listeners {
            listener.step_post(executed);
        }
    }

    pub fn should_stop(&mut self) -> bool {
        self.listeners.iter_mut().any(|l| l.should_stop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;

    #[test]
    fn outcomes_are_padded_to_sequence_length() {
        let universe = TypeUniverse::new();
        let lit = Operation::literal(RuntimeValue::Int(1), &universe);
        let seq = Sequence::nullary(lit.clone()).extend(
            Operation::add_const(RuntimeValue::Int(1), &universe),
            &[0],
        );
        let executed = ExecutedSequence::new(
            seq,
            vec![ExecutionOutcome::Normal {
                value: RuntimeValue::Int(1),
                duration: Duration::from_nanos(10),
            }],
        );
        assert_eq!(executed.outcomes().len(), 2);
        assert_eq!(*executed.outcome(1), ExecutionOutcome::NotExecuted);
        assert!(!executed.all_normal());
        assert_eq!(executed.total_duration(), Duration::from_nanos(10));
    }

    struct CountingListener {
        steps: usize,
        stop_after: usize,
    }

    impl GenerationListener for CountingListener {
        fn step_pre(&mut self) {
            self.steps += 1;
        }
        fn should_stop(&mut self) -> bool {
            self.steps >= self.stop_after
        }
    }

    #[test]
    fn listener_manager_polls_all_listeners() {
        let mut manager = ListenerManager::new();
        manager.register(Box::new(CountingListener {
            steps: 0,
            stop_after: 2,
        }));
        assert!(!manager.should_stop());
        manager.step_pre();
        manager.step_pre();
        assert!(manager.should_stop());
    }
}
