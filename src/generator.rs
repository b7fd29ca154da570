//! The feedback-directed generation loop.
//!
//! [`ForwardGenerator`] owns the component pool, the selection strategies,
//! and the execution boundary, and drives the step loop: pick an operation,
//! resolve its inputs from the pool, extend a candidate sequence,
//! deduplicate, execute, prune active indices, and fold the result back into
//! the pool. Every stochastic choice flows through one seeded RNG, so a run
//! is reproducible from its seed.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::executor::{
    Classification, CoverageOracle, ExecutedSequence, ExecutionOutcome, GenerationListener,
    ListenerManager, SequenceClassifier, SequenceExecutor, Stopper,
};
use crate::fuzz::Fuzzer;
use crate::helpers::helper_sequence;
use crate::input_selectors::{
    ConstantMiningSelection, InputSequenceSelector, OrienteeringSelection,
    SmallTestsInputSelector, UniformInputSelector,
};
use crate::op_selectors::{Bloodhound, OperationSelector, UniformOperationSelector};
use crate::operation::{instantiate_operation, Operation};
use crate::pool::{CandidateList, ComponentManager};
use crate::randomness::coin_flip;
use crate::sequence::Sequence;
use crate::types::{TypeId, TypeKind, TypeUniverse};
use crate::value::{looks_like_default_display, string_length_ok, RuntimeValue};

const REPEAT_PROBABILITY: f64 = 0.1;
const MAX_REPEATS: u32 = 100;
const INPUT_VARIABLE_RETRIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStrategy {
    Uniform,
    Bloodhound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputStrategy {
    Uniform,
    SmallTests,
    Orienteering,
    ConstantMining,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub time_limit: Option<Duration>,
    pub max_attempted: Option<u64>,
    pub max_generated: Option<u64>,
    pub max_outputs: Option<u64>,
    pub max_sequence_size: usize,
    /// Generated components between pool clears; `None` disables clearing.
    pub clear_interval: Option<u64>,
    pub alias_ratio: f64,
    pub null_ratio: f64,
    pub forbid_null: bool,
    pub operation_strategy: OperationStrategy,
    pub input_strategy: InputStrategy,
    pub fuzzing: bool,
    pub gaussian_sigma: f64,
    pub repeat_heuristic: bool,
    pub stop_on_error: bool,
    pub fail_on_generation_error: bool,
    pub max_string_length: usize,
    pub seed: u64,
}

impl Default for GenerationConfig {
    fn default() -> GenerationConfig {
        GenerationConfig {
            time_limit: None,
            max_attempted: None,
            max_generated: None,
            max_outputs: None,
            max_sequence_size: 100,
            clear_interval: None,
            alias_ratio: 0.0,
            null_ratio: 0.0,
            forbid_null: false,
            operation_strategy: OperationStrategy::Uniform,
            input_strategy: InputStrategy::Uniform,
            fuzzing: false,
            gaussian_sigma: crate::fuzz::DEFAULT_GAUSSIAN_SIGMA,
            repeat_heuristic: false,
            stop_on_error: false,
            fail_on_generation_error: false,
            max_string_length: 1000,
            seed: 0,
        }
    }
}

/// Counters accumulated over one exploration run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub steps: u64,
    pub generated: u64,
    pub regression: u64,
    pub errors: u64,
    pub invalid: u64,
    pub duplicate_discards: u64,
    pub size_discards: u64,
    pub no_input_discards: u64,
    pub instantiation_discards: u64,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation failed for operation `{operation}`: {reason}")]
    OperationFailed { operation: String, reason: String },
    #[error("no sequence classifier was configured before exploration")]
    ClassifierMissing,
}

struct ResolvedInputs {
    parts: Vec<Sequence>,
    /// Absolute statement indices into the concatenation of `parts`.
    indices: Vec<usize>,
}

pub struct ForwardGenerator {
    universe: TypeUniverse,
    operations: Vec<Operation>,
    components: ComponentManager,
    op_selector: Box<dyn OperationSelector>,
    input_selector: Option<Box<dyn InputSequenceSelector>>,
    executor: Box<dyn SequenceExecutor>,
    classifier: Option<Box<dyn SequenceClassifier>>,
    observers: Vec<Operation>,
    listeners: ListenerManager,
    stopper: Option<Box<dyn Stopper>>,
    fuzzer: Fuzzer,
    config: GenerationConfig,
    stats: GenerationStats,
    rng: ChaCha8Rng,
    all_sequences: HashSet<Sequence>,
    primitives_seen: HashSet<RuntimeValue>,
    regression_outputs: Vec<ExecutedSequence>,
    error_outputs: Vec<ExecutedSequence>,
    subsumed: HashSet<Sequence>,
    generated_since_clear: u64,
    started: Option<Instant>,
}

impl ForwardGenerator {
    pub fn new(
        universe: TypeUniverse,
        operations: Vec<Operation>,
        seeds: Vec<Sequence>,
        config: GenerationConfig,
        executor: Box<dyn SequenceExecutor>,
        coverage_oracle: Option<Box<dyn CoverageOracle>>,
    ) -> ForwardGenerator {
        let components = ComponentManager::new(seeds, &universe);
        let op_selector: Box<dyn OperationSelector> = match config.operation_strategy {
            OperationStrategy::Uniform => Box::new(UniformOperationSelector),
            OperationStrategy::Bloodhound => Box::new(Bloodhound::new(coverage_oracle)),
        };
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let fuzzer = Fuzzer::new(config.gaussian_sigma);
        ForwardGenerator {
            universe,
            operations,
            components,
            op_selector,
            input_selector: None,
            executor,
            classifier: None,
            observers: Vec::new(),
            listeners: ListenerManager::new(),
            stopper: None,
            fuzzer,
            config,
            stats: GenerationStats::default(),
            rng,
            all_sequences: HashSet::new(),
            primitives_seen: HashSet::new(),
            regression_outputs: Vec::new(),
            error_outputs: Vec::new(),
            subsumed: HashSet::new(),
            generated_since_clear: 0,
            started: None,
        }
    }

    pub fn set_classifier(&mut self, classifier: Box<dyn SequenceClassifier>) {
        self.classifier = Some(classifier);
    }

    /// Marks `operation` as side-effect-free; the active-index analysis
    /// deactivates the receiver and arguments of observer calls. A generic
    /// observer covers every instantiation of the operation.
    pub fn add_observer(&mut self, operation: Operation) {
        if !self.is_observer(&operation) {
            self.observers.push(operation);
        }
    }

    /// Matches on name and declaring type, so instantiated generics still
    /// find the observer they were registered as.
    fn is_observer(&self, operation: &Operation) -> bool {
        self.observers.iter().any(|o| {
            o.name() == operation.name() && o.declaring_type() == operation.declaring_type()
        })
    }

    pub fn add_listener(&mut self, listener: Box<dyn GenerationListener>) {
        self.listeners.register(listener);
    }

    pub fn set_stopper(&mut self, stopper: Box<dyn Stopper>) {
        self.stopper = Some(stopper);
    }

    pub fn add_class_literal(&mut self, class: TypeId, value: RuntimeValue, occurrences: usize) {
        self.components
            .add_class_literal(class, value, occurrences, &self.universe);
    }

    pub fn add_package_literal(
        &mut self,
        package: &str,
        value: RuntimeValue,
        occurrences: usize,
        scanned_class: TypeId,
    ) {
        self.components
            .add_package_literal(package, value, occurrences, scanned_class, &self.universe);
    }

    pub fn stats(&self) -> &GenerationStats {
        &self.stats
    }

    pub fn components(&self) -> &ComponentManager {
        &self.components
    }

    pub fn universe(&self) -> &TypeUniverse {
        &self.universe
    }

    pub fn error_sequences(&self) -> &[ExecutedSequence] {
        &self.error_outputs
    }

    /// Accepted regression outputs, excluding sequences later subsumed as
    /// inputs of other outputs.
    pub fn regression_sequences(&self) -> Vec<&ExecutedSequence> {
        self.regression_outputs
            .iter()
            .filter(|e| !self.subsumed.contains(&e.sequence))
            .collect()
    }

    /// Runs the generation loop until a stop condition fires. Fails up
    /// front when no classifier was configured.
    pub fn explore(&mut self) -> Result<(), GenerationError> {
        if self.classifier.is_none() {
            return Err(GenerationError::ClassifierMissing);
        }
        self.started = Some(Instant::now());
        self.seed_primitives_seen();
        if self.input_selector.is_none() {
            self.input_selector = Some(self.build_input_selector());
        }
        self.listeners.explore_start();
        loop {
            if self.should_stop() {
                break;
            }
            if self.operations.is_empty() {
                debug!("operation universe exhausted");
                break;
            }
            self.listeners.step_pre();
            self.stats.steps += 1;
            let executed = self.step()?;
            self.listeners.step_post(executed.as_ref());
        }
        self.listeners.explore_end();
        debug!(
            steps = self.stats.steps,
            generated = self.stats.generated,
            regression = self.stats.regression,
            errors = self.stats.errors,
            "exploration finished"
        );
        Ok(())
    }

    fn build_input_selector(&self) -> Box<dyn InputSequenceSelector> {
        match self.config.input_strategy {
            InputStrategy::Uniform => Box::new(UniformInputSelector),
            InputStrategy::SmallTests => Box::new(SmallTestsInputSelector),
            InputStrategy::Orienteering => Box::new(OrienteeringSelection::new()),
            InputStrategy::ConstantMining => {
                Box::new(ConstantMiningSelection::new(self.components.literal_stats()))
            }
        }
    }

    /// Seed literals are already in the pool; harvesting them again would
    /// only add duplicates.
    fn seed_primitives_seen(&mut self) {
        for sequence in self.components.all_sequences() {
            for statement in sequence.statements() {
                if let Some(value) = statement.operation.literal_value() {
                    self.primitives_seen.insert(value.clone().canonicalized());
                }
            }
        }
    }

    fn should_stop(&mut self) -> bool {
        if let (Some(limit), Some(started)) = (self.config.time_limit, self.started) {
            if started.elapsed() >= limit {
                return true;
            }
        }
        if let Some(max) = self.config.max_attempted {
            if self.stats.steps >= max {
                return true;
            }
        }
        if let Some(max) = self.config.max_generated {
            if self.stats.generated >= max {
                return true;
            }
        }
        if let Some(max) = self.config.max_outputs {
            if self.stats.regression + self.stats.errors >= max {
                return true;
            }
        }
        if self.config.stop_on_error && !self.error_outputs.is_empty() {
            return true;
        }
        if let Some(stopper) = self.stopper.as_mut() {
            if stopper.should_stop() {
                return true;
            }
        }
        self.listeners.should_stop()
    }

    /// One iteration of the loop; `Ok(None)` means the step produced no
    /// sequence (a local discard, retried on the next step).
    fn step(&mut self) -> Result<Option<ExecutedSequence>, GenerationError> {
        self.maybe_clear_pool();

        let Some(mut operation) = self.op_selector.select(&self.operations, &mut self.rng)
        else {
            return Ok(None);
        };

        if operation.is_generic(&self.universe) {
            let witnesses = self.components.witness_types();
            match instantiate_operation(&operation, &witnesses, &mut self.universe, &mut self.rng)
            {
                Some(instantiated) => operation = instantiated,
                None => {
                    self.stats.instantiation_discards += 1;
                    if self.config.fail_on_generation_error {
                        warn!(op = %operation, "no witness types for generic operation");
                        return Err(GenerationError::OperationFailed {
                            operation: operation.name().to_string(),
                            reason: "no witness types satisfy its bounds".to_string(),
                        });
                    }
                    debug!(op = %operation, "generic instantiation failed, discarding step");
                    return Ok(None);
                }
            }
        }

        // A missing input is always a local discard; the pool may simply
        // not have produced the type yet.
        let Some(resolved) = self.select_inputs(&operation) else {
            self.stats.no_input_discards += 1;
            return Ok(None);
        };

        let base = Sequence::concatenate(&resolved.parts);
        let mut candidate = base.extend(operation.clone(), &resolved.indices);
        candidate = self.maybe_repeat(candidate, &operation, &resolved.indices);

        if candidate.len() > self.config.max_sequence_size {
            debug!(size = candidate.len(), "discarding oversized sequence");
            self.stats.size_discards += 1;
            return Ok(None);
        }
        if !self.all_sequences.insert(candidate.clone()) {
            self.stats.duplicate_discards += 1;
            return Ok(None);
        }

        let executed = self.executor.execute(&candidate, &self.universe);
        self.stats.generated += 1;
        self.generated_since_clear += 1;
        if let Some(selector) = self.input_selector.as_mut() {
            selector.notify_executed(&resolved.parts, &executed);
        }

        let classification = match self.classifier.as_mut() {
            Some(classifier) => classifier.classify(&executed),
            None => return Err(GenerationError::ClassifierMissing),
        };

        self.analyze_active_indices(&executed, classification);

        if operation.input_types().is_empty() && executed.all_normal() {
            // Deterministic zero-input operations cannot produce anything
            // new on a second call.
            self.operations.retain(|op| *op != operation);
        }

        if (0..candidate.len()).any(|i| candidate.is_active(i)) {
            self.components.add_generated(&candidate, &self.universe);
        }

        match classification {
            Classification::Invalid => {
                self.stats.invalid += 1;
            }
            Classification::Error => {
                self.stats.errors += 1;
                self.error_outputs.push(executed.clone());
            }
            Classification::Regression => {
                self.stats.regression += 1;
                for part in &resolved.parts {
                    if self.all_sequences.contains(part) {
                        self.subsumed.insert(part.clone());
                    }
                }
                self.op_selector.notify_regression_test(&candidate);
                self.regression_outputs.push(executed.clone());
            }
        }
        Ok(Some(executed))
    }

    fn maybe_clear_pool(&mut self) {
        if let Some(interval) = self.config.clear_interval {
            if interval > 0 && self.generated_since_clear >= interval {
                self.components.clear_generated(&self.universe);
                self.generated_since_clear = 0;
            }
        }
    }

    /// Resolves one input sequence (and producing statement) per input
    /// position, per the alias / null / pool-query cascade.
    fn select_inputs(&mut self, operation: &Operation) -> Option<ResolvedInputs> {
        let mut parts: Vec<Sequence> = Vec::new();
        let mut indices: Vec<usize> = Vec::new();
        let mut total_len = 0usize;
        for (i, &needed) in operation.input_types().iter().enumerate() {
            let is_receiver = i == 0 && operation.requires_receiver();

            if coin_flip(self.config.alias_ratio, &mut self.rng) {
                if let Some(alias) = self.find_alias(&parts, needed, is_receiver) {
                    indices.push(alias);
                    continue;
                }
            }

            if !is_receiver
                && !self.config.forbid_null
                && coin_flip(self.config.null_ratio, &mut self.rng)
            {
                let null_seq =
                    Sequence::nullary(Operation::null_or_zero(needed, &self.universe));
                indices.push(total_len);
                total_len += null_seq.len();
                parts.push(null_seq);
                continue;
            }

            let mut candidates =
                self.components
                    .sequences_for_input(operation, i, is_receiver, &self.universe);
            if matches!(
                self.universe.kind(needed),
                TypeKind::Array(_) | TypeKind::Collection(_)
            ) {
                if let Some(helper) = helper_sequence(
                    needed,
                    &self.components,
                    &mut self.universe,
                    &mut self.rng,
                ) {
                    candidates.push_owned(vec![helper]);
                }
            }

            if candidates.is_empty() {
                if is_receiver || self.config.forbid_null {
                    debug!(op = %operation, position = i, "no candidates, giving up on step");
                    return None;
                }
                let null_seq =
                    Sequence::nullary(Operation::null_or_zero(needed, &self.universe));
                indices.push(total_len);
                total_len += null_seq.len();
                parts.push(null_seq);
                continue;
            }

            let (sequence, var) =
                self.pick_variable(&candidates, needed, is_receiver)?;
            let (sequence, var) = if self.config.fuzzing && var + 1 == sequence.len() {
                let fuzzed = self.fuzzer.fuzz(&sequence, &self.universe, &mut self.rng);
                let at = fuzzed.len() - 1;
                (fuzzed, at)
            } else {
                (sequence, var)
            };
            indices.push(total_len + var);
            total_len += sequence.len();
            parts.push(sequence);
        }
        Some(ResolvedInputs { parts, indices })
    }

    /// A variable already placed in the candidate under construction whose
    /// type fits `needed`. Literal and null statements are skipped; their
    /// values are better sourced from their original producers.
    fn find_alias(&mut self, parts: &[Sequence], needed: TypeId, is_receiver: bool) -> Option<usize> {
        let mut usable: Vec<usize> = Vec::new();
        let mut offset = 0;
        for part in parts {
            for at in part.indices_with_type(needed, &self.universe) {
                let op = &part.statement(at).operation;
                if op.is_literal() || op.is_null_or_zero() {
                    continue;
                }
                if is_receiver && !Self::usable_as_receiver(part, at) {
                    continue;
                }
                usable.push(offset + at);
            }
            offset += part.len();
        }
        if usable.is_empty() {
            None
        } else {
            Some(usable[self.rng.gen_range(0..usable.len())])
        }
    }

    fn usable_as_receiver(sequence: &Sequence, at: usize) -> bool {
        let op = &sequence.statement(at).operation;
        !op.is_null_or_zero() && !op.is_literal()
    }

    /// Draws a candidate sequence via the input strategy, then a producing
    /// statement uniformly among its matching active statements. Bounded
    /// retries handle draws with no usable variable; receiver positions fall
    /// back to a deterministic scan of every candidate.
    fn pick_variable(
        &mut self,
        candidates: &CandidateList,
        needed: TypeId,
        is_receiver: bool,
    ) -> Option<(Sequence, usize)> {
        let selector = self.input_selector.as_mut()?;
        for _ in 0..INPUT_VARIABLE_RETRIES {
            let Some(sequence) = selector.select(candidates, &mut self.rng) else {
                break;
            };
            let vars = sequence.active_indices_with_type(needed, &self.universe);
            if vars.is_empty() {
                continue;
            }
            let var = vars[self.rng.gen_range(0..vars.len())];
            if is_receiver && !Self::usable_as_receiver(&sequence, var) {
                continue;
            }
            return Some((sequence, var));
        }
        if !is_receiver {
            return None;
        }
        // Receiver rescue: scan all candidates for any valid receiver.
        let mut valid: Vec<(Sequence, usize)> = Vec::new();
        for sequence in candidates.to_vec() {
            for var in sequence.active_indices_with_type(needed, &self.universe) {
                if Self::usable_as_receiver(&sequence, var) {
                    valid.push((sequence.clone(), var));
                }
            }
        }
        if valid.is_empty() {
            debug!("no usable receiver among candidates");
            return None;
        }
        let at = self.rng.gen_range(0..valid.len());
        Some(valid.swap_remove(at))
    }

    /// Low-probability repetition of the freshly appended operation, with
    /// fresh random int literals for int-typed parameters each round.
    fn maybe_repeat(
        &mut self,
        sequence: Sequence,
        operation: &Operation,
        indices: &[usize],
    ) -> Sequence {
        if !self.config.repeat_heuristic
            || !coin_flip(REPEAT_PROBABILITY, &mut self.rng)
        {
            return sequence;
        }
        let repeats = self.rng.gen_range(0..MAX_REPEATS);
        debug!(op = %operation, repeats, "applying repeat heuristic");
        let int_ty = self.universe.int_type();
        let mut current = sequence;
        for _ in 0..repeats {
            let mut inputs: Vec<usize> = Vec::with_capacity(indices.len());
            for (j, &ty) in operation.input_types().iter().enumerate() {
                if ty == int_ty {
                    let fresh: i32 = self.rng.gen();
                    current = current.extend(
                        Operation::literal(RuntimeValue::Int(fresh), &self.universe),
                        &[],
                    );
                    inputs.push(current.len() - 1);
                } else {
                    inputs.push(indices[j]);
                }
            }
            current = current.extend(operation.clone(), &inputs);
        }
        current
    }

    /// Decides which statements of an executed sequence may feed future
    /// steps, and harvests newly seen primitive values into the pool.
    fn analyze_active_indices(
        &mut self,
        executed: &ExecutedSequence,
        classification: Classification,
    ) {
        let sequence = &executed.sequence;
        let fully_executed = executed
            .outcomes()
            .iter()
            .all(|o| !matches!(o, ExecutionOutcome::NotExecuted));
        if !fully_executed
            || classification != Classification::Regression
            || !executed.all_normal()
        {
            sequence.set_all_active(false);
            return;
        }
        for i in 0..sequence.len() {
            let statement = sequence.statement(i);
            if self.is_observer(&statement.operation) {
                for j in 0..statement.inputs.len() {
                    sequence.set_active(sequence.input_index(i, j), false);
                }
            }
            let Some(value) = executed.value_at(i) else {
                continue;
            };
            if value.is_null() {
                sequence.set_active(i, false);
                continue;
            }
            if value.is_primitive_like() {
                sequence.set_active(i, false);
                let value = value.clone().canonicalized();
                if self.acceptable_literal(&value) && self.primitives_seen.insert(value.clone())
                {
                    let literal =
                        Sequence::nullary(Operation::literal(value, &self.universe));
                    self.all_sequences.insert(literal.clone());
                    self.components.add_generated(&literal, &self.universe);
                }
            }
        }
    }

    fn acceptable_literal(&self, value: &RuntimeValue) -> bool {
        match value {
            RuntimeValue::Str(s) => {
                !looks_like_default_display(s) && string_length_ok(s, self.config.max_string_length)
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::OutcomeClassifier;

    struct NormalExecutor;

    impl SequenceExecutor for NormalExecutor {
        fn execute(&mut self, sequence: &Sequence, _universe: &TypeUniverse) -> ExecutedSequence {
            let outcomes = sequence
                .statements()
                .iter()
                .map(|s| ExecutionOutcome::Normal {
                    value: match s.operation.kind() {
                        crate::operation::OperationKind::Literal(v) => v.clone(),
                        _ => RuntimeValue::Object(s.operation.output_type()),
                    },
                    duration: Duration::from_nanos(10),
                })
                .collect();
            ExecutedSequence::new(sequence.clone(), outcomes)
        }
    }

    /// Flags everything longer than one statement as invalid.
    struct LengthClassifier;

    impl SequenceClassifier for LengthClassifier {
        fn classify(&mut self, executed: &ExecutedSequence) -> Classification {
            if executed.sequence.len() > 1 {
                Classification::Invalid
            } else {
                Classification::Regression
            }
        }
    }

    fn account_universe() -> (TypeUniverse, Operation, Sequence) {
        let mut universe = TypeUniverse::new();
        let acct = universe.register("Account", &[]);
        let ctor = Operation::constructor("Account::new", acct, &[]);
        let touch = Operation::instance_method("Account::touch", acct, &[], universe.void_type());
        let seed = Sequence::nullary(ctor);
        (universe, touch, seed)
    }

    #[test]
    fn rebuilt_sequences_are_discarded_as_duplicates() {
        let (universe, touch, seed) = account_universe();
        let config = GenerationConfig {
            max_attempted: Some(10),
            ..GenerationConfig::default()
        };
        let mut generator = ForwardGenerator::new(
            universe,
            vec![touch],
            vec![seed],
            config,
            Box::new(NormalExecutor),
            None,
        );
        // Invalid classification keeps every built sequence out of the
        // pool, so each step rebuilds the identical candidate.
        generator.set_classifier(Box::new(LengthClassifier));
        generator.explore().unwrap();
        let stats = generator.stats();
        assert_eq!(stats.steps, 10);
        assert_eq!(stats.generated, 1);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.duplicate_discards, 9);
        // The invalid sequence never reached the pool.
        assert_eq!(generator.components().size(), 1);
    }

    struct ImmediateStopper;

    impl Stopper for ImmediateStopper {
        fn should_stop(&mut self) -> bool {
            true
        }
    }

    #[test]
    fn stopper_halts_before_the_first_step() {
        let (universe, touch, seed) = account_universe();
        let mut generator = ForwardGenerator::new(
            universe,
            vec![touch],
            vec![seed],
            GenerationConfig::default(),
            Box::new(NormalExecutor),
            None,
        );
        generator.set_classifier(Box::new(OutcomeClassifier));
        generator.set_stopper(Box::new(ImmediateStopper));
        generator.explore().unwrap();
        assert_eq!(generator.stats().steps, 0);
    }

    #[test]
    fn empty_universe_terminates_without_steps() {
        let (universe, _, seed) = account_universe();
        let mut generator = ForwardGenerator::new(
            universe,
            vec![],
            vec![seed],
            GenerationConfig::default(),
            Box::new(NormalExecutor),
            None,
        );
        generator.set_classifier(Box::new(OutcomeClassifier));
        generator.explore().unwrap();
        assert_eq!(generator.stats().steps, 0);
    }

    #[test]
    fn exploring_without_a_classifier_is_an_error() {
        let (universe, touch, seed) = account_universe();
        let mut generator = ForwardGenerator::new(
            universe,
            vec![touch],
            vec![seed],
            GenerationConfig::default(),
            Box::new(NormalExecutor),
            None,
        );
        let err = generator.explore().unwrap_err();
        assert!(matches!(err, GenerationError::ClassifierMissing));
        assert_eq!(generator.stats().steps, 0);
    }

    #[test]
    fn missing_inputs_discard_locally_even_when_errors_are_fatal() {
        let mut universe = TypeUniverse::new();
        let acct = universe.register("Account", &[]);
        let audit =
            Operation::static_method("Audit::run", acct, &[acct], universe.void_type());
        let config = GenerationConfig {
            max_attempted: Some(5),
            forbid_null: true,
            fail_on_generation_error: true,
            ..GenerationConfig::default()
        };
        let mut generator = ForwardGenerator::new(
            universe,
            vec![audit],
            vec![],
            config,
            Box::new(NormalExecutor),
            None,
        );
        generator.set_classifier(Box::new(OutcomeClassifier));
        generator.explore().unwrap();
        assert_eq!(generator.stats().no_input_discards, 5);
        assert_eq!(generator.stats().generated, 0);
    }

    #[test]
    fn fail_on_generation_error_surfaces_failed_instantiation() {
        let mut universe = TypeUniverse::new();
        let base = universe.register("Base", &[]);
        let var = universe.type_var("T", 0, base);
        let pick = Operation::static_method("Registry::pick", base, &[var], var);
        let config = GenerationConfig {
            max_attempted: Some(5),
            fail_on_generation_error: true,
            ..GenerationConfig::default()
        };
        // Empty pool: no witness type can satisfy the bound.
        let mut generator = ForwardGenerator::new(
            universe,
            vec![pick],
            vec![],
            config,
            Box::new(NormalExecutor),
            None,
        );
        generator.set_classifier(Box::new(OutcomeClassifier));
        let err = generator.explore().unwrap_err();
        assert!(matches!(err, GenerationError::OperationFailed { .. }));
    }

    #[test]
    fn instantiated_generics_still_match_their_observer() {
        let mut universe = TypeUniverse::new();
        let base = universe.register("Base", &[]);
        let derived = universe.register("Derived", &[base]);
        let var = universe.type_var("T", 0, base);
        let peek =
            Operation::instance_method("Base::peek", base, &[var], universe.bool_type());
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let instantiated =
            instantiate_operation(&peek, &[derived], &mut universe, &mut rng).unwrap();
        assert_ne!(peek, instantiated);

        let mut generator = ForwardGenerator::new(
            universe,
            vec![],
            vec![],
            GenerationConfig::default(),
            Box::new(NormalExecutor),
            None,
        );
        generator.add_observer(peek.clone());
        assert!(generator.is_observer(&instantiated));
        let other = Operation::constructor("Base::new", base, &[]);
        assert!(!generator.is_observer(&other));
    }
}
