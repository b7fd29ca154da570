//! Operation descriptors: the immutable universe of callable units.
//!
//! An [`Operation`] records a name, an input type tuple, an output type, and
//! a kind discriminator. Operations are supplied once at startup and never
//! mutated. Builtin kinds exist so the engine can synthesize helper and
//! fuzzing statements (array/collection construction, numeric deltas, string
//! edits) without depending on any concrete invocation mechanism; the
//! execution boundary interprets them like every other kind.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::types::{NumericKind, TypeId, TypeKind, TypeUniverse};
use crate::value::RuntimeValue;

/// String perturbations applied by the fuzzing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringEditKind {
    /// Inputs: string, index, char.
    Insert,
    /// Inputs: string, index.
    Remove,
    /// Inputs: string, start, end, replacement.
    Replace,
    /// Inputs: string, start, end.
    Substring,
}

/// Operations the engine synthesizes itself rather than receiving up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuiltinOp {
    /// Adds the carried constant to a single numeric input of the same kind.
    AddConst(RuntimeValue),
    /// Applies a string edit to its inputs.
    StringEdit(StringEditKind),
    /// Packs its inputs into a new array of the output's element type.
    NewArray,
    /// Packs its inputs into a new collection of the output's element type.
    NewCollection,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Constructor,
    StaticMethod,
    InstanceMethod,
    FieldAccess,
    /// Declares the carried primitive or string value.
    Literal(RuntimeValue),
    /// Declares null (or the zero value, for primitive output types).
    NullOrZero,
    Builtin(BuiltinOp),
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct OperationInner {
    name: String,
    kind: OperationKind,
    inputs: Vec<TypeId>,
    output: TypeId,
    declaring_type: Option<TypeId>,
}

/// An immutable, cheaply clonable descriptor of one callable unit.
///
/// Equality and hashing are structural, so operations can key the selectors'
/// weight maps.
#[derive(Debug, Clone)]
pub struct Operation {
    inner: Rc<OperationInner>,
}

impl Operation {
    fn build(
        name: String,
        kind: OperationKind,
        inputs: Vec<TypeId>,
        output: TypeId,
        declaring_type: Option<TypeId>,
    ) -> Operation {
        Operation {
            inner: Rc::new(OperationInner {
                name,
                kind,
                inputs,
                output,
                declaring_type,
            }),
        }
    }

    pub fn constructor(name: &str, declaring: TypeId, params: &[TypeId]) -> Operation {
        Operation::build(
            name.to_string(),
            OperationKind::Constructor,
            params.to_vec(),
            declaring,
            Some(declaring),
        )
    }

    /// An instance method; the receiver occupies input position 0.
    pub fn instance_method(
        name: &str,
        declaring: TypeId,
        params: &[TypeId],
        output: TypeId,
    ) -> Operation {
        let mut inputs = Vec::with_capacity(params.len() + 1);
        inputs.push(declaring);
        inputs.extend_from_slice(params);
        Operation::build(
            name.to_string(),
            OperationKind::InstanceMethod,
            inputs,
            output,
            Some(declaring),
        )
    }

    pub fn static_method(
        name: &str,
        declaring: TypeId,
        params: &[TypeId],
        output: TypeId,
    ) -> Operation {
        Operation::build(
            name.to_string(),
            OperationKind::StaticMethod,
            params.to_vec(),
            output,
            Some(declaring),
        )
    }

    /// A field read. Instance fields take the owning object as sole input;
    /// static fields take none.
    pub fn field_access(
        name: &str,
        declaring: TypeId,
        receiver: bool,
        output: TypeId,
    ) -> Operation {
        let inputs = if receiver { vec![declaring] } else { vec![] };
        Operation::build(
            name.to_string(),
            OperationKind::FieldAccess,
            inputs,
            output,
            Some(declaring),
        )
    }

    pub fn literal(value: RuntimeValue, universe: &TypeUniverse) -> Operation {
        let output = value.type_id(universe);
        Operation::build(
            format!("lit:{value}"),
            OperationKind::Literal(value),
            vec![],
            output,
            None,
        )
    }

    pub fn null_or_zero(ty: TypeId, universe: &TypeUniverse) -> Operation {
        Operation::build(
            format!("null:{}", universe.name(ty)),
            OperationKind::NullOrZero,
            vec![],
            ty,
            None,
        )
    }

    /// `input + delta` for the numeric kind of `delta`.
    pub fn add_const(delta: RuntimeValue, universe: &TypeUniverse) -> Operation {
        let ty = delta.type_id(universe);
        Operation::build(
            format!("add:{delta}"),
            OperationKind::Builtin(BuiltinOp::AddConst(delta)),
            vec![ty],
            ty,
            None,
        )
    }

    pub fn string_edit(kind: StringEditKind, universe: &TypeUniverse) -> Operation {
        let s = universe.string_type();
        let i = universe.int_type();
        let c = universe.numeric_type(NumericKind::Char);
        let inputs = match kind {
            StringEditKind::Insert => vec![s, i, c],
            StringEditKind::Remove => vec![s, i],
            StringEditKind::Replace => vec![s, i, i, s],
            StringEditKind::Substring => vec![s, i, i],
        };
        Operation::build(
            format!("str:{kind:?}"),
            OperationKind::Builtin(BuiltinOp::StringEdit(kind)),
            inputs,
            s,
            None,
        )
    }

    pub fn new_array(array_ty: TypeId, elem_ty: TypeId, arity: usize, universe: &TypeUniverse) -> Operation {
        Operation::build(
            format!("array:{}[{arity}]", universe.name(elem_ty)),
            OperationKind::Builtin(BuiltinOp::NewArray),
            vec![elem_ty; arity],
            array_ty,
            None,
        )
    }

    pub fn new_collection(
        collection_ty: TypeId,
        elem_ty: TypeId,
        arity: usize,
        universe: &TypeUniverse,
    ) -> Operation {
        Operation::build(
            format!("collection:{}[{arity}]", universe.name(elem_ty)),
            OperationKind::Builtin(BuiltinOp::NewCollection),
            vec![elem_ty; arity],
            collection_ty,
            None,
        )
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> &OperationKind {
        &self.inner.kind
    }

    pub fn input_types(&self) -> &[TypeId] {
        &self.inner.inputs
    }

    pub fn output_type(&self) -> TypeId {
        self.inner.output
    }

    pub fn declaring_type(&self) -> Option<TypeId> {
        self.inner.declaring_type
    }

    /// Whether input position 0 is a method receiver.
    pub fn requires_receiver(&self) -> bool {
        match self.inner.kind {
            OperationKind::InstanceMethod => true,
            OperationKind::FieldAccess => !self.inner.inputs.is_empty(),
            _ => false,
        }
    }

    pub fn is_method_call(&self) -> bool {
        matches!(
            self.inner.kind,
            OperationKind::Constructor
                | OperationKind::StaticMethod
                | OperationKind::InstanceMethod
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.inner.kind, OperationKind::Literal(_))
    }

    pub fn literal_value(&self) -> Option<&RuntimeValue> {
        match &self.inner.kind {
            OperationKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null_or_zero(&self) -> bool {
        matches!(self.inner.kind, OperationKind::NullOrZero)
    }

    /// Whether the signature still mentions unresolved type variables.
    pub fn is_generic(&self, universe: &TypeUniverse) -> bool {
        self.inner
            .inputs
            .iter()
            .chain(std::iter::once(&self.inner.output))
            .any(|&ty| universe.is_generic(ty))
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

impl Eq for Operation {}

impl Hash for Operation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.name)
    }
}

/// Instantiates a generic operation against concrete witness types.
///
/// Every type variable in the signature is bound to a random witness that
/// satisfies the variable's declared bounds; the signature is then rewritten
/// with the bindings. Returns `None` when some variable has no usable
/// witness, which callers treat as a local discard.
pub fn instantiate_operation(
    operation: &Operation,
    witnesses: &[TypeId],
    universe: &mut TypeUniverse,
    rng: &mut ChaCha8Rng,
) -> Option<Operation> {
    let mut bindings: Vec<(TypeId, TypeId)> = Vec::new();
    let signature: Vec<TypeId> = operation
        .input_types()
        .iter()
        .copied()
        .chain(std::iter::once(operation.output_type()))
        .collect();
    for ty in &signature {
        collect_var_bindings(*ty, witnesses, universe, rng, &mut bindings)?;
    }

    let inputs: Vec<TypeId> = operation
        .input_types()
        .iter()
        .map(|&ty| substitute(ty, &bindings, universe))
        .collect();
    let output = substitute(operation.output_type(), &bindings, universe);
    Some(Operation::build(
        operation.name().to_string(),
        operation.kind().clone(),
        inputs,
        output,
        operation.declaring_type(),
    ))
}

fn collect_var_bindings(
    ty: TypeId,
    witnesses: &[TypeId],
    universe: &mut TypeUniverse,
    rng: &mut ChaCha8Rng,
    bindings: &mut Vec<(TypeId, TypeId)>,
) -> Option<()> {
    match universe.kind(ty).clone() {
        TypeKind::Var(_) => {
            if bindings.iter().any(|(var, _)| *var == ty) {
                return Some(());
            }
            let bounds: Vec<TypeId> = universe.supertypes(ty).to_vec();
            let candidates: Vec<TypeId> = witnesses
                .iter()
                .copied()
                .filter(|&w| {
                    !universe.is_generic(w) && bounds.iter().all(|&b| universe.is_subtype(w, b))
                })
                .collect();
            if candidates.is_empty() {
                return None;
            }
            let chosen = candidates[rng.gen_range(0..candidates.len())];
            bindings.push((ty, chosen));
            Some(())
        }
        TypeKind::Array(elem) | TypeKind::Collection(elem) => {
            collect_var_bindings(elem, witnesses, universe, rng, bindings)
        }
        _ => Some(()),
    }
}

fn substitute(ty: TypeId, bindings: &[(TypeId, TypeId)], universe: &mut TypeUniverse) -> TypeId {
    if let Some((_, concrete)) = bindings.iter().find(|(var, _)| *var == ty) {
        return *concrete;
    }
    match universe.kind(ty).clone() {
        TypeKind::Array(elem) => {
            let sub = substitute(elem, bindings, universe);
            if sub == elem {
                ty
            } else {
                universe.array_of(sub)
            }
        }
        TypeKind::Collection(elem) => {
            let sub = substitute(elem, bindings, universe);
            if sub == elem {
                ty
            } else {
                universe.collection_of(sub)
            }
        }
        _ => ty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn structural_equality_across_clones() {
        let mut universe = TypeUniverse::new();
        let acct = universe.register("Account", &[]);
        let a = Operation::constructor("Account::new", acct, &[]);
        let b = Operation::constructor("Account::new", acct, &[]);
        assert_eq!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn receiver_only_for_instance_operations() {
        let mut universe = TypeUniverse::new();
        let acct = universe.register("Account", &[]);
        let int = universe.int_type();
        let m = Operation::instance_method("Account::deposit", acct, &[int], universe.void_type());
        assert!(m.requires_receiver());
        assert_eq!(m.input_types()[0], acct);
        let s = Operation::static_method("Account::open", acct, &[], acct);
        assert!(!s.requires_receiver());
    }

    #[test]
    fn instantiation_binds_vars_to_witnesses() {
        let mut universe = TypeUniverse::new();
        let base = universe.register("Base", &[]);
        let derived = universe.register("Derived", &[base]);
        let var = universe.type_var("T", 0, base);
        let op = Operation::static_method("pick", base, &[var], var);
        assert!(op.is_generic(&universe));

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let instantiated =
            instantiate_operation(&op, &[derived], &mut universe, &mut rng).unwrap();
        assert!(!instantiated.is_generic(&universe));
        assert_eq!(instantiated.output_type(), derived);
        assert_eq!(instantiated.input_types(), &[derived]);
    }

    #[test]
    fn instantiation_fails_without_witness() {
        let mut universe = TypeUniverse::new();
        let base = universe.register("Base", &[]);
        let unrelated = universe.register("Unrelated", &[]);
        let var = universe.type_var("T", 0, base);
        let op = Operation::static_method("pick", base, &[var], var);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!(instantiate_operation(&op, &[unrelated], &mut universe, &mut rng).is_none());
    }
}
