//! Input-sequence selection strategies.
//!
//! Once an operation is chosen, each of its input positions is filled by
//! drawing one sequence from the pool's candidate view. The strategies here
//! decide how that draw is biased: uniformly, toward short sequences, toward
//! cheap-to-execute sequences (Orienteering), or toward mined constants
//! (TF-IDF).

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::executor::{ExecutedSequence, ExecutionOutcome};
use crate::pool::{CandidateList, LiteralStatistics};
use crate::randomness::weighted_choice;
use crate::sequence::Sequence;
use crate::value::RuntimeValue;

/// Draws one sequence from a candidate view. `notify_executed` is called
/// after every execution so cost-tracking strategies can observe timings.
pub trait InputSequenceSelector {
    fn select(&mut self, candidates: &CandidateList, rng: &mut ChaCha8Rng) -> Option<Sequence>;

    fn notify_executed(&mut self, _inputs: &[Sequence], _executed: &ExecutedSequence) {}
}

#[derive(Debug, Default)]
pub struct UniformInputSelector;

impl InputSequenceSelector for UniformInputSelector {
    fn select(&mut self, candidates: &CandidateList, rng: &mut ChaCha8Rng) -> Option<Sequence> {
        let len = candidates.len();
        if len == 0 {
            return None;
        }
        candidates.get(rng.gen_range(0..len))
    }
}

/// Favors short sequences: weight = 1 / size.
#[derive(Debug, Default)]
pub struct SmallTestsInputSelector;

impl InputSequenceSelector for SmallTestsInputSelector {
    fn select(&mut self, candidates: &CandidateList, rng: &mut ChaCha8Rng) -> Option<Sequence> {
        let all = candidates.to_vec();
        if all.is_empty() {
            return None;
        }
        let weights: Vec<f64> = all.iter().map(Sequence::size_weight).collect();
        let index = weighted_choice(&weights, rng)?;
        Some(all[index].clone())
    }
}

/// Orienteering: weight a candidate by the inverse of its cumulative
/// execution cost. Each time a sequence is actually executed, on its own or
/// as part of a composite run, its cost grows by
/// `exec_time_nanos * sqrt(method_calls)` (both factors floored at 1), so
/// sequences that are slow or often reused fade out of selection.
#[derive(Debug, Default)]
pub struct OrienteeringSelection {
    cumulative_cost: HashMap<Sequence, f64>,
}

impl OrienteeringSelection {
    pub fn new() -> OrienteeringSelection {
        OrienteeringSelection::default()
    }

    fn weight(&self, sequence: &Sequence) -> f64 {
        1.0 / self
            .cumulative_cost
            .get(sequence)
            .copied()
            .unwrap_or(1.0)
            .max(1.0)
    }

    fn charge(&mut self, sequence: &Sequence, duration: Duration) {
        let nanos = duration.max(Duration::from_nanos(1)).as_nanos() as f64;
        let calls = (sequence.num_method_calls() as f64).sqrt().max(1.0);
        *self
            .cumulative_cost
            .entry(sequence.clone())
            .or_insert(0.0) += nanos * calls;
    }
}

impl InputSequenceSelector for OrienteeringSelection {
    fn select(&mut self, candidates: &CandidateList, rng: &mut ChaCha8Rng) -> Option<Sequence> {
        let all = candidates.to_vec();
        if all.is_empty() {
            return None;
        }
        let weights: Vec<f64> = all.iter().map(|s| self.weight(s)).collect();
        let index = weighted_choice(&weights, rng)?;
        Some(all[index].clone())
    }

    /// Charges the composite for the whole run and each input sequence for
    /// the statements it contributed. Inputs occupy the front of the
    /// composite in order, so per-input time is read off the outcome slices.
    fn notify_executed(&mut self, inputs: &[Sequence], executed: &ExecutedSequence) {
        self.charge(&executed.sequence, executed.total_duration());
        let mut offset = 0;
        for input in inputs {
            let end = offset + input.len();
            if end > executed.outcomes().len() {
                break;
            }
            let duration = executed.outcomes()[offset..end]
                .iter()
                .map(ExecutionOutcome::duration)
                .sum();
            self.charge(input, duration);
            offset = end;
        }
    }
}

/// Constant-mining selection: candidates ending in a mined literal are drawn
/// proportionally to the literal's TF-IDF weight. Weights are frozen at
/// construction; non-literal candidates keep a neutral weight of 1.
#[derive(Debug)]
pub struct ConstantMiningSelection {
    weights: HashMap<RuntimeValue, f64>,
}

impl ConstantMiningSelection {
    pub fn new(stats: &LiteralStatistics) -> ConstantMiningSelection {
        ConstantMiningSelection {
            weights: stats.snapshot_weights(),
        }
    }

    fn weight(&self, sequence: &Sequence) -> f64 {
        let literal = sequence
            .last_statement()
            .and_then(|s| s.operation.literal_value());
        match literal {
            Some(value) => self.weights.get(value).copied().unwrap_or(1.0),
            None => 1.0,
        }
    }
}

impl InputSequenceSelector for ConstantMiningSelection {
    fn select(&mut self, candidates: &CandidateList, rng: &mut ChaCha8Rng) -> Option<Sequence> {
        let all = candidates.to_vec();
        if all.is_empty() {
            return None;
        }
        let weights: Vec<f64> = all.iter().map(|s| self.weight(s)).collect();
        let index = weighted_choice(&weights, rng)?;
        Some(all[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionOutcome;
    use crate::operation::Operation;
    use crate::types::TypeUniverse;
    use rand::SeedableRng;

    fn candidates_of(sequences: Vec<Sequence>) -> CandidateList {
        let mut list = CandidateList::new();
        list.push_owned(sequences);
        list
    }

    #[test]
    fn empty_candidates_select_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        assert!(UniformInputSelector
            .select(&CandidateList::new(), &mut rng)
            .is_none());
        assert!(SmallTestsInputSelector
            .select(&CandidateList::new(), &mut rng)
            .is_none());
        assert!(OrienteeringSelection::new()
            .select(&CandidateList::new(), &mut rng)
            .is_none());
    }

    #[test]
    fn small_tests_prefers_the_short_sequence() {
        let mut universe = TypeUniverse::new();
        let acct = universe.register("Account", &[]);
        let ctor = Operation::constructor("Account::new", acct, &[]);
        let touch = Operation::instance_method("Account::touch", acct, &[], acct);
        let short = Sequence::nullary(ctor.clone());
        let mut long = Sequence::nullary(ctor);
        for _ in 0..9 {
            let at = long.len() - 1;
            long = long.extend(touch.clone(), &[at]);
        }
        let candidates = candidates_of(vec![short.clone(), long]);
        let mut selector = SmallTestsInputSelector;
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let mut short_hits = 0;
        for _ in 0..200 {
            if selector.select(&candidates, &mut rng) == Some(short.clone()) {
                short_hits += 1;
            }
        }
        // 1 vs 1/10 weight: expect roughly 10:1.
        assert!(short_hits > 150, "short_hits = {short_hits}");
    }

    #[test]
    fn orienteering_penalizes_expensive_sequences() {
        let mut universe = TypeUniverse::new();
        let acct = universe.register("Account", &[]);
        let cheap = Sequence::nullary(Operation::constructor("Account::new", acct, &[]));
        let other = universe.register("Ledger", &[]);
        let costly = Sequence::nullary(Operation::constructor("Ledger::new", other, &[]));

        let mut selector = OrienteeringSelection::new();
        selector.notify_executed(
            &[],
            &ExecutedSequence::new(
                cheap.clone(),
                vec![ExecutionOutcome::Normal {
                    value: RuntimeValue::Object(acct),
                    duration: Duration::from_nanos(10),
                }],
            ),
        );
        selector.notify_executed(
            &[],
            &ExecutedSequence::new(
                costly.clone(),
                vec![ExecutionOutcome::Normal {
                    value: RuntimeValue::Object(other),
                    duration: Duration::from_nanos(10_000),
                }],
            ),
        );

        let candidates = candidates_of(vec![cheap.clone(), costly]);
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let mut cheap_hits = 0;
        for _ in 0..200 {
            if selector.select(&candidates, &mut rng) == Some(cheap.clone()) {
                cheap_hits += 1;
            }
        }
        assert!(cheap_hits > 150, "cheap_hits = {cheap_hits}");
    }

    #[test]
    fn orienteering_accumulates_cost_per_execution() {
        let universe = TypeUniverse::new();
        let lit = Sequence::nullary(Operation::literal(RuntimeValue::Int(3), &universe));
        let mut selector = OrienteeringSelection::new();
        let run = ExecutedSequence::new(
            lit.clone(),
            vec![ExecutionOutcome::Normal {
                value: RuntimeValue::Int(3),
                duration: Duration::from_nanos(100),
            }],
        );
        selector.notify_executed(&[], &run);
        selector.notify_executed(&[], &run);
        // No method calls, so the sqrt factor floors at 1.
        assert_eq!(selector.cumulative_cost[&lit], 200.0);
    }

    #[test]
    fn input_sequences_accrue_cost_from_composite_runs() {
        let mut universe = TypeUniverse::new();
        let acct = universe.register("Account", &[]);
        let ctor = Operation::constructor("Account::new", acct, &[]);
        let touch = Operation::instance_method("Account::touch", acct, &[], universe.void_type());
        let input = Sequence::nullary(ctor);
        let composite = input.extend(touch, &[0]);
        let run = ExecutedSequence::new(
            composite.clone(),
            vec![
                ExecutionOutcome::Normal {
                    value: RuntimeValue::Object(acct),
                    duration: Duration::from_nanos(100),
                },
                ExecutionOutcome::Normal {
                    value: RuntimeValue::Null,
                    duration: Duration::from_nanos(300),
                },
            ],
        );

        let mut selector = OrienteeringSelection::new();
        selector.notify_executed(std::slice::from_ref(&input), &run);
        selector.notify_executed(std::slice::from_ref(&input), &run);
        // The input contributed its own statement (100ns, one call) to each
        // of the two runs.
        assert_eq!(selector.cumulative_cost[&input], 200.0);
        // The composite is charged for the full 400ns and both calls.
        let expected = 2.0 * 400.0 * 2.0_f64.sqrt();
        assert!((selector.cumulative_cost[&composite] - expected).abs() < 1e-9);
    }

    #[test]
    fn constant_mining_prefers_high_tfidf_literals() {
        let mut universe = TypeUniverse::new();
        let a = universe.register("A", &[]);
        let b = universe.register("B", &[]);
        let mut stats = LiteralStatistics::default();
        stats.record(&RuntimeValue::Int(7), a, 50);
        stats.record(&RuntimeValue::Int(7), b, 50);
        stats.record(&RuntimeValue::Int(9), a, 1);

        let seven = Sequence::nullary(Operation::literal(RuntimeValue::Int(7), &universe));
        let nine = Sequence::nullary(Operation::literal(RuntimeValue::Int(9), &universe));
        let candidates = candidates_of(vec![seven.clone(), nine]);

        let mut selector = ConstantMiningSelection::new(&stats);
        let mut rng = ChaCha8Rng::seed_from_u64(24);
        let mut seven_hits = 0;
        for _ in 0..200 {
            if selector.select(&candidates, &mut rng) == Some(seven.clone()) {
                seven_hits += 1;
            }
        }
        assert!(seven_hits > 150, "seven_hits = {seven_hits}");
    }
}
