//! Helper-sequence synthesis for composite parameter types.
//!
//! Pools rarely contain ready-made arrays or collections, so when an input
//! position needs one, a helper sequence is synthesized on the fly: element
//! producers are drawn from the pool and packed with a `NewArray` or
//! `NewCollection` builtin. The result is unioned into the regular pool
//! candidates, never inserted into the pool itself.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::operation::Operation;
use crate::pool::ComponentManager;
use crate::sequence::Sequence;
use crate::types::{TypeId, TypeKind, TypeUniverse};

const MAX_ARRAY_LENGTH: usize = 1;
const MAX_COLLECTION_SIZE: usize = 2;

/// Synthesizes one candidate sequence producing `needed`, or `None` when
/// `needed` is not a composite type.
pub fn helper_sequence(
    needed: TypeId,
    components: &ComponentManager,
    universe: &mut TypeUniverse,
    rng: &mut ChaCha8Rng,
) -> Option<Sequence> {
    match *universe.kind(needed) {
        TypeKind::Array(elem) => {
            let arity = pick_arity(elem, MAX_ARRAY_LENGTH, components, universe, rng);
            let op = Operation::new_array(needed, elem, arity, universe);
            pack(elem, arity, op, components, universe, rng)
        }
        TypeKind::Collection(elem) => {
            let arity = pick_arity(elem, MAX_COLLECTION_SIZE, components, universe, rng);
            let op = Operation::new_collection(needed, elem, arity, universe);
            pack(elem, arity, op, components, universe, rng)
        }
        _ => None,
    }
}

fn pick_arity(
    elem: TypeId,
    max: usize,
    components: &ComponentManager,
    universe: &TypeUniverse,
    rng: &mut ChaCha8Rng,
) -> usize {
    let available = components.sequences_for_type(elem, false, false, universe);
    if available.is_empty() {
        0
    } else {
        rng.gen_range(0..=max)
    }
}

fn pack(
    elem: TypeId,
    arity: usize,
    operation: Operation,
    components: &ComponentManager,
    universe: &TypeUniverse,
    rng: &mut ChaCha8Rng,
) -> Option<Sequence> {
    if arity == 0 {
        return Some(Sequence::nullary(operation));
    }
    let candidates = components.sequences_for_type(elem, false, false, universe);
    let len = candidates.len();
    let mut parts: Vec<Sequence> = Vec::with_capacity(arity);
    let mut element_indices: Vec<usize> = Vec::with_capacity(arity);
    let mut offset = 0;
    for _ in 0..arity {
        let part = candidates.get(rng.gen_range(0..len))?;
        let produced = part.active_indices_with_type(elem, universe);
        let &at = produced.last()?;
        element_indices.push(offset + at);
        offset += part.len();
        parts.push(part);
    }
    debug!(arity, op = %operation, "synthesized helper sequence");
    Some(Sequence::concatenate(&parts).extend(operation, &element_indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{BuiltinOp, OperationKind};
    use crate::value::RuntimeValue;
    use rand::SeedableRng;

    #[test]
    fn non_composite_types_get_no_helper() {
        let mut universe = TypeUniverse::new();
        let components = ComponentManager::new(vec![], &universe);
        let mut rng = ChaCha8Rng::seed_from_u64(41);
        let int = universe.int_type();
        assert!(helper_sequence(int, &components, &mut universe, &mut rng).is_none());
    }

    #[test]
    fn empty_pool_yields_an_empty_array() {
        let mut universe = TypeUniverse::new();
        let acct = universe.register("Account", &[]);
        let arr = universe.array_of(acct);
        let components = ComponentManager::new(vec![], &universe);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let helper = helper_sequence(arr, &components, &mut universe, &mut rng).unwrap();
        assert_eq!(helper.len(), 1);
        let op = &helper.last_statement().unwrap().operation;
        assert_eq!(*op.kind(), OperationKind::Builtin(BuiltinOp::NewArray));
        assert!(op.input_types().is_empty());
        assert_eq!(op.output_type(), arr);
    }

    #[test]
    fn collection_helpers_wire_pool_elements() {
        let mut universe = TypeUniverse::new();
        let int = universe.int_type();
        let coll = universe.collection_of(int);
        let seed = Sequence::nullary(Operation::literal(RuntimeValue::Int(4), &universe));
        let components = ComponentManager::new(vec![seed], &universe);
        let mut rng = ChaCha8Rng::seed_from_u64(43);
        let mut saw_nonempty = false;
        for _ in 0..20 {
            let helper = helper_sequence(coll, &components, &mut universe, &mut rng).unwrap();
            let last = helper.last_statement().unwrap();
            assert_eq!(
                *last.operation.kind(),
                OperationKind::Builtin(BuiltinOp::NewCollection)
            );
            assert_eq!(helper.last_output_type(), Some(coll));
            if !last.inputs.is_empty() {
                saw_nonempty = true;
                // Each element argument resolves to an int producer.
                for j in 0..last.inputs.len() {
                    let at = helper.input_index(helper.len() - 1, j);
                    assert_eq!(helper.output_type(at), int);
                }
            }
        }
        assert!(saw_nonempty);
    }
}
