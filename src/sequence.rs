//! Immutable statement sequences.
//!
//! A [`Sequence`] is a list of statements where each statement applies one
//! operation to values produced by earlier statements. Sequences are shared
//! by handle: cloning a `Sequence` clones an `Rc`, so the pool, the
//! generator, and composed descendants all see one copy of the statement
//! list. The only mutable part is the per-statement active flags, which are
//! deliberately excluded from equality and hashing.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::operation::Operation;
use crate::types::{TypeId, TypeUniverse};

/// One operation application. Inputs are stored as backward distances: input
/// `j` of the statement at index `i` names the value produced at index
/// `i - inputs[j]`. Distances stay valid when sequences are concatenated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    pub operation: Operation,
    pub inputs: Vec<usize>,
}

#[derive(Debug)]
struct SequenceInner {
    statements: Vec<Statement>,
    hash: u64,
    active: RefCell<Vec<bool>>,
}

/// A cheaply clonable handle to an immutable statement list.
#[derive(Debug, Clone)]
pub struct Sequence {
    inner: Rc<SequenceInner>,
}

fn structural_hash(statements: &[Statement]) -> u64 {
    let mut hasher = DefaultHasher::new();
    statements.hash(&mut hasher);
    hasher.finish()
}

impl Sequence {
    fn from_statements(statements: Vec<Statement>) -> Sequence {
        let hash = structural_hash(&statements);
        let active = RefCell::new(vec![true; statements.len()]);
        Sequence {
            inner: Rc::new(SequenceInner {
                statements,
                hash,
                active,
            }),
        }
    }

    /// A one-statement sequence for a zero-input operation.
    pub fn nullary(operation: Operation) -> Sequence {
        Sequence::from_statements(vec![Statement {
            operation,
            inputs: vec![],
        }])
    }

    /// Joins the statement lists of `parts` in order. Backward-distance
    /// inputs need no adjustment.
    pub fn concatenate(parts: &[Sequence]) -> Sequence {
        let total = parts.iter().map(|s| s.len()).sum();
        let mut statements = Vec::with_capacity(total);
        for part in parts {
            statements.extend_from_slice(&part.inner.statements);
        }
        Sequence::from_statements(statements)
    }

    /// Appends one statement applying `operation` to the values at the given
    /// absolute statement indices.
    pub fn extend(&self, operation: Operation, input_indices: &[usize]) -> Sequence {
        let here = self.len();
        debug_assert!(input_indices.iter().all(|&i| i < here));
        let mut statements = self.inner.statements.clone();
        statements.push(Statement {
            operation,
            inputs: input_indices.iter().map(|&i| here - i).collect(),
        });
        Sequence::from_statements(statements)
    }

    pub fn len(&self) -> usize {
        self.inner.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.statements.is_empty()
    }

    pub fn statement(&self, index: usize) -> &Statement {
        &self.inner.statements[index]
    }

    pub fn statements(&self) -> &[Statement] {
        &self.inner.statements
    }

    pub fn last_statement(&self) -> Option<&Statement> {
        self.inner.statements.last()
    }

    /// Absolute index of the value consumed by input `j` of statement `i`.
    pub fn input_index(&self, i: usize, j: usize) -> usize {
        i - self.inner.statements[i].inputs[j]
    }

    pub fn output_type(&self, index: usize) -> TypeId {
        self.inner.statements[index].operation.output_type()
    }

    /// Type of the value produced by the final statement.
    pub fn last_output_type(&self) -> Option<TypeId> {
        self.last_statement().map(|s| s.operation.output_type())
    }

    pub fn structural_hash(&self) -> u64 {
        self.inner.hash
    }

    /// Statement count of method-call statements, used for execution cost
    /// normalization.
    pub fn num_method_calls(&self) -> usize {
        self.inner
            .statements
            .iter()
            .filter(|s| s.operation.is_method_call())
            .count()
    }

    /// Weight favoring short sequences.
    pub fn size_weight(&self) -> f64 {
        1.0 / self.len().max(1) as f64
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.inner.active.borrow()[index]
    }

    pub fn set_active(&self, index: usize, active: bool) {
        self.inner.active.borrow_mut()[index] = active;
    }

    pub fn set_all_active(&self, active: bool) {
        for flag in self.inner.active.borrow_mut().iter_mut() {
            *flag = active;
        }
    }

    /// Indices of active statements whose output is usable where `target` is
    /// expected. Void outputs never match.
    pub fn active_indices_with_type(
        &self,
        target: TypeId,
        universe: &TypeUniverse,
    ) -> Vec<usize> {
        let active = self.inner.active.borrow();
        self.inner
            .statements
            .iter()
            .enumerate()
            .filter(|&(i, s)| {
                active[i]
                    && s.operation.output_type() != universe.void_type()
                    && universe.is_subtype(s.operation.output_type(), target)
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// All indices (active or not) whose output is usable as `target`.
    pub fn indices_with_type(&self, target: TypeId, universe: &TypeUniverse) -> Vec<usize> {
        self.inner
            .statements
            .iter()
            .enumerate()
            .filter(|&(_, s)| {
                s.operation.output_type() != universe.void_type()
                    && universe.is_subtype(s.operation.output_type(), target)
            })
            .map(|(i, _)| i)
            .collect()
    }

}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.hash == other.inner.hash
                && self.inner.statements == other.inner.statements)
    }
}

impl Eq for Sequence {}

impl Hash for Sequence {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.inner.hash);
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, statement) in self.inner.statements.iter().enumerate() {
            let args: Vec<String> = statement
                .inputs
                .iter()
                .map(|d| format!("v{}", i - d))
                .collect();
            writeln!(f, "v{} = {}({})", i, statement.operation, args.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RuntimeValue;

    fn universe_with_account() -> (TypeUniverse, TypeId) {
        let mut universe = TypeUniverse::new();
        let acct = universe.register("Account", &[]);
        (universe, acct)
    }

    #[test]
    fn extend_records_backward_distances() {
        let (universe, acct) = universe_with_account();
        let lit = Operation::literal(RuntimeValue::Int(5), &universe);
        let ctor = Operation::constructor("Account::new", acct, &[universe.int_type()]);
        let seq = Sequence::nullary(lit).extend(ctor, &[0]);
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.statement(1).inputs, vec![1]);
        assert_eq!(seq.input_index(1, 0), 0);
    }

    #[test]
    fn concatenation_preserves_inputs_across_parts() {
        let (universe, acct) = universe_with_account();
        let lit = Operation::literal(RuntimeValue::Int(5), &universe);
        let ctor = Operation::constructor("Account::new", acct, &[universe.int_type()]);
        let part = Sequence::nullary(lit).extend(ctor, &[0]);
        let joined = Sequence::concatenate(&[part.clone(), part.clone()]);
        assert_eq!(joined.len(), 4);
        // Second copy's constructor still reaches its own literal.
        assert_eq!(joined.input_index(3, 0), 2);
    }

    #[test]
    fn structural_equality_ignores_active_flags() {
        let (universe, acct) = universe_with_account();
        let ctor = Operation::constructor("Account::new", acct, &[]);
        let a = Sequence::nullary(ctor.clone());
        let b = Sequence::nullary(ctor);
        a.set_active(0, false);
        assert_eq!(a, b);
        assert_eq!(a.structural_hash(), b.structural_hash());
    }

    #[test]
    fn type_queries_respect_active_flags_and_void() {
        let (mut universe, acct) = universe_with_account();
        let savings = universe.register("Savings", &[acct]);
        let ctor = Operation::constructor("Savings::new", savings, &[]);
        let close = Operation::instance_method("Savings::close", savings, &[], universe.void_type());
        let seq = Sequence::nullary(ctor).extend(close, &[0]);

        assert_eq!(seq.active_indices_with_type(acct, &universe), vec![0]);
        seq.set_active(0, false);
        assert!(seq.active_indices_with_type(acct, &universe).is_empty());
        assert_eq!(seq.indices_with_type(acct, &universe), vec![0]);
    }
}
