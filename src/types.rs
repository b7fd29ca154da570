//! Interned type universe for the generation engine.
//!
//! The engine never inspects real runtime types; it works against an explicit
//! registry of the types under test. Types are interned once, up front, and
//! referenced everywhere by cheap `TypeId` handles. Subtype queries walk the
//! declared supertype edges with an explicit worklist so cyclic declarations
//! terminate.

use std::collections::{HashMap, HashSet};

/// Handle into a [`TypeUniverse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The numeric primitive kinds, excluding `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

/// What sort of value a registered type describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// Uninhabited output of statements executed for effect only.
    Void,
    Bool,
    Numeric(NumericKind),
    /// Strings are value-like: usable as inputs, never as receivers.
    Str,
    /// An ordinary object type; usable as a method receiver.
    Object,
    /// Array with the given element type.
    Array(TypeId),
    /// Collection-like parameterized type with the given element type.
    Collection(TypeId),
    /// Unresolved type parameter of a generic operation. The variable's
    /// upper bound is expressed through the entry's supertype edges.
    Var(u8),
}

#[derive(Debug, Clone)]
struct TypeEntry {
    name: String,
    kind: TypeKind,
    supertypes: Vec<TypeId>,
    /// Package of the declaring scope, for package-scoped literal lookup.
    package: Option<String>,
}

/// Registry of every type the operations under test mention.
///
/// Well-known value types (void, bool, the numerics, string, and the object
/// root) are interned at construction; everything else is registered through
/// [`TypeUniverse::register`] or the array/collection interners.
#[derive(Debug, Clone)]
pub struct TypeUniverse {
    entries: Vec<TypeEntry>,
    by_name: HashMap<String, TypeId>,
    void_ty: TypeId,
    bool_ty: TypeId,
    numeric: [TypeId; 7],
    string_ty: TypeId,
    object_root: TypeId,
}

impl TypeUniverse {
    pub fn new() -> Self {
        let mut universe = TypeUniverse {
            entries: Vec::new(),
            by_name: HashMap::new(),
            void_ty: TypeId(0),
            bool_ty: TypeId(0),
            numeric: [TypeId(0); 7],
            string_ty: TypeId(0),
            object_root: TypeId(0),
        };
        universe.object_root = universe.intern("object", TypeKind::Object, vec![], None);
        universe.void_ty = universe.intern("void", TypeKind::Void, vec![], None);
        universe.bool_ty = universe.intern("bool", TypeKind::Bool, vec![], None);
        for (i, (name, kind)) in [
            ("byte", NumericKind::Byte),
            ("short", NumericKind::Short),
            ("char", NumericKind::Char),
            ("int", NumericKind::Int),
            ("long", NumericKind::Long),
            ("float", NumericKind::Float),
            ("double", NumericKind::Double),
        ]
        .into_iter()
        .enumerate()
        {
            universe.numeric[i] = universe.intern(name, TypeKind::Numeric(kind), vec![], None);
        }
        universe.string_ty = universe.intern("string", TypeKind::Str, vec![], None);
        universe
    }

    fn intern(
        &mut self,
        name: &str,
        kind: TypeKind,
        supertypes: Vec<TypeId>,
        package: Option<String>,
    ) -> TypeId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = TypeId(self.entries.len() as u32);
        self.entries.push(TypeEntry {
            name: name.to_string(),
            kind,
            supertypes,
            package,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Registers an object type with the given declared supertypes. Object
    /// types always have the object root as an implicit supertype.
    pub fn register(&mut self, name: &str, supertypes: &[TypeId]) -> TypeId {
        let mut supers: Vec<TypeId> = supertypes.to_vec();
        let root = self.object_root;
        if !supers.contains(&root) {
            supers.push(root);
        }
        self.intern(name, TypeKind::Object, supers, None)
    }

    /// Registers an object type that belongs to a named package.
    pub fn register_in_package(
        &mut self,
        name: &str,
        package: &str,
        supertypes: &[TypeId],
    ) -> TypeId {
        let id = self.register(name, supertypes);
        self.entries[id.index()].package = Some(package.to_string());
        id
    }

    /// Registers a fresh type variable with the given upper bound.
    pub fn type_var(&mut self, label: &str, index: u8, bound: TypeId) -> TypeId {
        self.intern(label, TypeKind::Var(index), vec![bound], None)
    }

    /// Interns the array type over the given element type.
    pub fn array_of(&mut self, elem: TypeId) -> TypeId {
        let name = format!("{}[]", self.name(elem));
        let root = self.object_root;
        self.intern(&name, TypeKind::Array(elem), vec![root], None)
    }

    /// Interns the collection type over the given element type.
    pub fn collection_of(&mut self, elem: TypeId) -> TypeId {
        let name = format!("collection<{}>", self.name(elem));
        let root = self.object_root;
        self.intern(&name, TypeKind::Collection(elem), vec![root], None)
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.entries[id.index()].name
    }

    /// Declared supertypes; for a type variable, its upper bounds.
    pub fn supertypes(&self, id: TypeId) -> &[TypeId] {
        &self.entries[id.index()].supertypes
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.entries[id.index()].kind
    }

    pub fn package(&self, id: TypeId) -> Option<&str> {
        self.entries[id.index()].package.as_deref()
    }

    pub fn void_type(&self) -> TypeId {
        self.void_ty
    }

    pub fn bool_type(&self) -> TypeId {
        self.bool_ty
    }

    pub fn numeric_type(&self, kind: NumericKind) -> TypeId {
        let idx = match kind {
            NumericKind::Byte => 0,
            NumericKind::Short => 1,
            NumericKind::Char => 2,
            NumericKind::Int => 3,
            NumericKind::Long => 4,
            NumericKind::Float => 5,
            NumericKind::Double => 6,
        };
        self.numeric[idx]
    }

    pub fn int_type(&self) -> TypeId {
        self.numeric_type(NumericKind::Int)
    }

    pub fn string_type(&self) -> TypeId {
        self.string_ty
    }

    pub fn object_root(&self) -> TypeId {
        self.object_root
    }

    /// True for types whose values cannot serve as a method receiver:
    /// void, primitives, strings, and unresolved type variables.
    pub fn is_non_receiver(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Void | TypeKind::Bool | TypeKind::Numeric(_) | TypeKind::Str | TypeKind::Var(_)
        )
    }

    /// True for primitive-ish value types: bool, numerics, and strings.
    pub fn is_primitive_like(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Bool | TypeKind::Numeric(_) | TypeKind::Str
        )
    }

    pub fn is_generic(&self, id: TypeId) -> bool {
        match self.kind(id) {
            TypeKind::Var(_) => true,
            TypeKind::Array(elem) | TypeKind::Collection(elem) => self.is_generic(*elem),
            _ => false,
        }
    }

    /// Whether `sub` can be used where a value of `sup` is expected.
    ///
    /// Walks declared supertype edges with a worklist and visited set; cyclic
    /// declarations visit each type at most once.
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        let mut worklist = vec![sub];
        let mut visited: HashSet<TypeId> = HashSet::new();
        visited.insert(sub);
        while let Some(current) = worklist.pop() {
            for &parent in &self.entries[current.index()].supertypes {
                if parent == sup {
                    return true;
                }
                if visited.insert(parent) {
                    worklist.push(parent);
                }
            }
        }
        false
    }
}

impl Default for TypeUniverse {
    fn default() -> Self {
        TypeUniverse::new()
    }
}

/// A set of types supporting "which members are usable as T" queries.
///
/// Kept alongside the pool's per-type buckets so a query for T does not scan
/// every bucket, only the member types compatible with T.
#[derive(Debug, Clone, Default)]
pub struct SubTypeSet {
    members: Vec<TypeId>,
    seen: HashSet<TypeId>,
}

impl SubTypeSet {
    pub fn new() -> Self {
        SubTypeSet::default()
    }

    pub fn add(&mut self, id: TypeId) {
        if self.seen.insert(id) {
            self.members.push(id);
        }
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.seen.contains(&id)
    }

    pub fn members(&self) -> &[TypeId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member types that are subtypes of (usable as) `target`.
    pub fn matches(&self, target: TypeId, universe: &TypeUniverse) -> Vec<TypeId> {
        self.members
            .iter()
            .copied()
            .filter(|&m| universe.is_subtype(m, target))
            .collect()
    }
}
