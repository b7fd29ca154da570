//! The component pool: every sequence available as an input to new
//! statements, indexed by the types it produces.
//!
//! [`SequenceCollection`] keeps one bucket per produced type and answers
//! "give me everything usable as T" with a lazy [`CandidateList`] union over
//! the compatible buckets, so a query never copies sequences.
//! [`ComponentManager`] layers seed bookkeeping and class-/package-scoped
//! literal sub-indices on top.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use crate::operation::Operation;
use crate::sequence::Sequence;
use crate::types::{SubTypeSet, TypeId, TypeUniverse};
use crate::value::RuntimeValue;

type Bucket = Rc<RefCell<Vec<Sequence>>>;

/// A lazy union over shared buckets. Indexing walks the buckets without
/// flattening them; the underlying storage is shared with the pool.
#[derive(Debug, Clone, Default)]
pub struct CandidateList {
    buckets: Vec<Bucket>,
}

impl CandidateList {
    pub fn new() -> CandidateList {
        CandidateList::default()
    }

    pub fn push_bucket(&mut self, bucket: Bucket) {
        self.buckets.push(bucket);
    }

    pub fn push_owned(&mut self, sequences: Vec<Sequence>) {
        if !sequences.is_empty() {
            self.buckets.push(Rc::new(RefCell::new(sequences)));
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.borrow().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.borrow().is_empty())
    }

    /// Clones out the sequence handle at flat position `index`.
    pub fn get(&self, index: usize) -> Option<Sequence> {
        let mut remaining = index;
        for bucket in &self.buckets {
            let bucket = bucket.borrow();
            if remaining < bucket.len() {
                return Some(bucket[remaining].clone());
            }
            remaining -= bucket.len();
        }
        None
    }

    pub fn to_vec(&self) -> Vec<Sequence> {
        let mut out = Vec::with_capacity(self.len());
        for bucket in &self.buckets {
            out.extend(bucket.borrow().iter().cloned());
        }
        out
    }
}

/// Type-indexed sequence store. A sequence is indexed under the output type
/// of each statement whose active flag is set at insertion time, so values
/// pruned by the active-index analysis are never offered to queries.
#[derive(Debug, Default)]
pub struct SequenceCollection {
    buckets: HashMap<TypeId, Bucket>,
    produced: SubTypeSet,
    size: usize,
}

impl SequenceCollection {
    pub fn new() -> SequenceCollection {
        SequenceCollection::default()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn add(&mut self, sequence: &Sequence, universe: &TypeUniverse) {
        let mut indexed: HashSet<TypeId> = HashSet::new();
        for i in 0..sequence.len() {
            if !sequence.is_active(i) {
                continue;
            }
            let ty = sequence.output_type(i);
            if ty == universe.void_type() || !indexed.insert(ty) {
                continue;
            }
            self.buckets
                .entry(ty)
                .or_insert_with(|| Rc::new(RefCell::new(Vec::new())))
                .borrow_mut()
                .push(sequence.clone());
            self.produced.add(ty);
        }
        if !indexed.is_empty() {
            self.size += 1;
        }
    }

    /// Every sequence usable as `target`. With `exact_match`, only the
    /// bucket for `target` itself; `only_receivers` drops buckets of
    /// non-receiver types.
    pub fn sequences_for_type(
        &self,
        target: TypeId,
        exact_match: bool,
        only_receivers: bool,
        universe: &TypeUniverse,
    ) -> CandidateList {
        let mut out = CandidateList::new();
        if exact_match {
            if let Some(bucket) = self.buckets.get(&target) {
                if !(only_receivers && universe.is_non_receiver(target)) {
                    out.push_bucket(Rc::clone(bucket));
                }
            }
            return out;
        }
        for produced in self.produced.matches(target, universe) {
            if only_receivers && universe.is_non_receiver(produced) {
                continue;
            }
            if let Some(bucket) = self.buckets.get(&produced) {
                out.push_bucket(Rc::clone(bucket));
            }
        }
        out
    }

    /// Types with at least one indexed producer, usable as generic-
    /// instantiation witnesses.
    pub fn produced_types(&self) -> &[TypeId] {
        self.produced.members()
    }

    pub fn all_sequences(&self) -> Vec<Sequence> {
        let mut seen: HashSet<Sequence> = HashSet::new();
        let mut out = Vec::new();
        for bucket in self.buckets.values() {
            for sequence in bucket.borrow().iter() {
                if seen.insert(sequence.clone()) {
                    out.push(sequence.clone());
                }
            }
        }
        out
    }
}

/// Per-constant occurrence statistics backing TF-IDF literal weighting.
/// `tf` counts occurrences of a constant across all scanned classes, `df`
/// the number of distinct classes it appears in, `n` the classes scanned.
#[derive(Debug, Default)]
pub struct LiteralStatistics {
    occurrences: HashMap<RuntimeValue, usize>,
    class_sets: HashMap<RuntimeValue, HashSet<TypeId>>,
    classes: HashSet<TypeId>,
}

impl LiteralStatistics {
    pub fn record(&mut self, value: &RuntimeValue, class: TypeId, count: usize) {
        *self.occurrences.entry(value.clone()).or_insert(0) += count;
        self.class_sets
            .entry(value.clone())
            .or_default()
            .insert(class);
        self.classes.insert(class);
    }

    /// TF-IDF weight per known constant, computed once for selectors that
    /// freeze their weights at construction.
    pub fn snapshot_weights(&self) -> HashMap<RuntimeValue, f64> {
        self.occurrences
            .keys()
            .map(|value| (value.clone(), self.tf_idf(value)))
            .collect()
    }

    /// `tf * ln((n + 1) / (n + 1 - df))`. A constant in every class scores
    /// higher than one in a single class with the same occurrence count.
    pub fn tf_idf(&self, value: &RuntimeValue) -> f64 {
        let tf = self.occurrences.get(value).copied().unwrap_or(0) as f64;
        if tf == 0.0 {
            return 0.0;
        }
        let n = self.classes.len() as f64;
        let df = self
            .class_sets
            .get(value)
            .map(|s| s.len())
            .unwrap_or(0) as f64;
        tf * ((n + 1.0) / (n + 1.0 - df)).ln()
    }
}

/// Seeds plus generated components plus scoped literal sub-indices.
///
/// `clear_generated` drops everything built during the run and restores
/// exactly the seed set; literal sub-indices survive, since they were mined
/// before generation started.
#[derive(Debug, Default)]
pub struct ComponentManager {
    seeds: Vec<Sequence>,
    components: SequenceCollection,
    class_literals: HashMap<TypeId, Vec<Sequence>>,
    package_literals: HashMap<String, Vec<Sequence>>,
    literal_stats: LiteralStatistics,
    // Merged literal candidates per (declaring scope, needed type).
    literal_cache: HashMap<(Option<TypeId>, TypeId), Bucket>,
}

impl ComponentManager {
    pub fn new(seeds: Vec<Sequence>, universe: &TypeUniverse) -> ComponentManager {
        let mut manager = ComponentManager {
            seeds,
            ..ComponentManager::default()
        };
        for seed in manager.seeds.clone() {
            manager.components.add(&seed, universe);
        }
        manager
    }

    pub fn size(&self) -> usize {
        self.components.size()
    }

    pub fn seeds(&self) -> &[Sequence] {
        &self.seeds
    }

    pub fn add_generated(&mut self, sequence: &Sequence, universe: &TypeUniverse) {
        self.components.add(sequence, universe);
    }

    /// Drops generated components, keeping the seed set intact.
    pub fn clear_generated(&mut self, universe: &TypeUniverse) {
        debug!(
            components = self.components.size(),
            seeds = self.seeds.len(),
            "clearing generated components"
        );
        self.components = SequenceCollection::new();
        for seed in self.seeds.clone() {
            self.components.add(&seed, universe);
        }
    }

    /// Registers a mined literal scoped to one class.
    pub fn add_class_literal(
        &mut self,
        class: TypeId,
        value: RuntimeValue,
        occurrences: usize,
        universe: &TypeUniverse,
    ) {
        self.literal_stats.record(&value, class, occurrences);
        let sequence = Sequence::nullary(Operation::literal(value, universe));
        self.class_literals.entry(class).or_default().push(sequence);
        self.literal_cache.clear();
    }

    /// Registers a mined literal scoped to every class in a package.
    pub fn add_package_literal(
        &mut self,
        package: &str,
        value: RuntimeValue,
        occurrences: usize,
        scanned_class: TypeId,
        universe: &TypeUniverse,
    ) {
        self.literal_stats.record(&value, scanned_class, occurrences);
        let sequence = Sequence::nullary(Operation::literal(value, universe));
        self.package_literals
            .entry(package.to_string())
            .or_default()
            .push(sequence);
        self.literal_cache.clear();
    }

    pub fn literal_stats(&self) -> &LiteralStatistics {
        &self.literal_stats
    }

    /// Plain pool query, without literal sub-indices.
    pub fn sequences_for_type(
        &self,
        target: TypeId,
        exact_match: bool,
        only_receivers: bool,
        universe: &TypeUniverse,
    ) -> CandidateList {
        self.components
            .sequences_for_type(target, exact_match, only_receivers, universe)
    }

    /// Candidate sequences for input position `index` of `operation`: the
    /// pool union for the needed type, plus scoped literals when the
    /// position is a non-receiver one and the operation's declaring scope
    /// has mined literals.
    pub fn sequences_for_input(
        &mut self,
        operation: &Operation,
        index: usize,
        only_receivers: bool,
        universe: &TypeUniverse,
    ) -> CandidateList {
        let needed = operation.input_types()[index];
        let mut candidates =
            self.components
                .sequences_for_type(needed, false, only_receivers, universe);
        if only_receivers || !universe.is_non_receiver(needed) {
            return candidates;
        }
        let scope = operation.declaring_type();
        if let Some(bucket) = self.scoped_literals(scope, needed, universe) {
            candidates.push_bucket(bucket);
        }
        candidates
    }

    fn scoped_literals(
        &mut self,
        scope: Option<TypeId>,
        needed: TypeId,
        universe: &TypeUniverse,
    ) -> Option<Bucket> {
        if let Some(bucket) = self.literal_cache.get(&(scope, needed)) {
            return if bucket.borrow().is_empty() {
                None
            } else {
                Some(Rc::clone(bucket))
            };
        }
        let mut merged: Vec<Sequence> = Vec::new();
        if let Some(class) = scope {
            if let Some(literals) = self.class_literals.get(&class) {
                merged.extend(
                    literals
                        .iter()
                        .filter(|s| s.last_output_type() == Some(needed))
                        .cloned(),
                );
            }
            if let Some(package) = universe.package(class) {
                if let Some(literals) = self.package_literals.get(package) {
                    merged.extend(
                        literals
                            .iter()
                            .filter(|s| s.last_output_type() == Some(needed))
                            .cloned(),
                    );
                }
            }
        }
        let bucket = Rc::new(RefCell::new(merged));
        self.literal_cache.insert((scope, needed), Rc::clone(&bucket));
        if bucket.borrow().is_empty() {
            None
        } else {
            Some(bucket)
        }
    }

    /// Witness types for generic instantiation.
    pub fn witness_types(&self) -> Vec<TypeId> {
        self.components.produced_types().to_vec()
    }

    pub fn all_sequences(&self) -> Vec<Sequence> {
        self.components.all_sequences()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeUniverse;

    fn literal_seq(value: RuntimeValue, universe: &TypeUniverse) -> Sequence {
        Sequence::nullary(Operation::literal(value, universe))
    }

    #[test]
    fn queries_union_subtype_buckets_lazily() {
        let mut universe = TypeUniverse::new();
        let base = universe.register("Base", &[]);
        let derived = universe.register("Derived", &[base]);
        let mut collection = SequenceCollection::new();
        collection.add(
            &Sequence::nullary(Operation::constructor("Base::new", base, &[])),
            &universe,
        );
        collection.add(
            &Sequence::nullary(Operation::constructor("Derived::new", derived, &[])),
            &universe,
        );

        let for_base = collection.sequences_for_type(base, false, false, &universe);
        assert_eq!(for_base.len(), 2);
        let exact = collection.sequences_for_type(base, true, false, &universe);
        assert_eq!(exact.len(), 1);
        let for_derived = collection.sequences_for_type(derived, false, false, &universe);
        assert_eq!(for_derived.len(), 1);
    }

    #[test]
    fn inactive_statements_are_not_indexed() {
        let universe = TypeUniverse::new();
        let seq = literal_seq(RuntimeValue::Int(7), &universe);
        seq.set_active(0, false);
        let mut collection = SequenceCollection::new();
        collection.add(&seq, &universe);
        assert_eq!(collection.size(), 0);
        assert!(collection
            .sequences_for_type(universe.int_type(), false, false, &universe)
            .is_empty());
    }

    #[test]
    fn only_receivers_drops_primitive_buckets() {
        let mut universe = TypeUniverse::new();
        let acct = universe.register("Account", &[]);
        let mut collection = SequenceCollection::new();
        collection.add(&literal_seq(RuntimeValue::Int(7), &universe), &universe);
        collection.add(
            &Sequence::nullary(Operation::constructor("Account::new", acct, &[])),
            &universe,
        );
        let root = universe.object_root();
        let receivers = collection.sequences_for_type(root, false, true, &universe);
        assert_eq!(receivers.len(), 1);
    }

    #[test]
    fn clear_generated_restores_exactly_the_seeds() {
        let universe = TypeUniverse::new();
        let seed = literal_seq(RuntimeValue::Int(0), &universe);
        let mut manager = ComponentManager::new(vec![seed.clone()], &universe);
        manager.add_generated(&literal_seq(RuntimeValue::Int(42), &universe), &universe);
        assert_eq!(manager.size(), 2);
        manager.clear_generated(&universe);
        assert_eq!(manager.size(), 1);
        let remaining = manager.all_sequences();
        assert_eq!(remaining, vec![seed]);
    }

    #[test]
    fn scoped_literals_join_pool_candidates() {
        let mut universe = TypeUniverse::new();
        let acct = universe.register_in_package("Account", "bank", &[]);
        let mut manager = ComponentManager::new(vec![], &universe);
        manager.add_class_literal(acct, RuntimeValue::Int(100), 3, &universe);
        manager.add_package_literal("bank", RuntimeValue::Int(-1), 1, acct, &universe);

        let deposit =
            Operation::instance_method("Account::deposit", acct, &[universe.int_type()], acct);
        let candidates = manager.sequences_for_input(&deposit, 1, false, &universe);
        assert_eq!(candidates.len(), 2);
        // Receiver positions never get literal candidates.
        let receiver = manager.sequences_for_input(&deposit, 0, true, &universe);
        assert!(receiver.is_empty());
    }

    #[test]
    fn tf_idf_rewards_cross_class_constants() {
        let mut universe = TypeUniverse::new();
        let a = universe.register("A", &[]);
        let b = universe.register("B", &[]);
        let mut stats = LiteralStatistics::default();
        stats.record(&RuntimeValue::Int(7), a, 2);
        stats.record(&RuntimeValue::Int(7), b, 1);
        stats.record(&RuntimeValue::Int(9), a, 3);
        // n = 2; Int(7): tf 3, df 2; Int(9): tf 3, df 1.
        assert!(stats.tf_idf(&RuntimeValue::Int(7)) > stats.tf_idf(&RuntimeValue::Int(9)));
        assert_eq!(stats.tf_idf(&RuntimeValue::Int(0)), 0.0);
    }
}
