//! Runtime values exchanged with the execution boundary.
//!
//! The engine only ever looks inside primitive and string values (to harvest
//! new literals and to fuzz); object values stay opaque behind their runtime
//! type. Floats are compared and hashed by bit pattern so values can live in
//! hash sets, with NaN canonicalized on harvest.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::types::{NumericKind, TypeId, TypeUniverse};

/// A value produced by executing one statement.
#[derive(Debug, Clone)]
pub enum RuntimeValue {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    /// An opaque object value, identified only by its runtime type.
    Object(TypeId),
}

impl RuntimeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RuntimeValue::Null)
    }

    /// True for values the pool treats as literals rather than objects.
    pub fn is_primitive_like(&self) -> bool {
        !matches!(self, RuntimeValue::Null | RuntimeValue::Object(_))
    }

    pub fn numeric_kind(&self) -> Option<NumericKind> {
        match self {
            RuntimeValue::Byte(_) => Some(NumericKind::Byte),
            RuntimeValue::Short(_) => Some(NumericKind::Short),
            RuntimeValue::Char(_) => Some(NumericKind::Char),
            RuntimeValue::Int(_) => Some(NumericKind::Int),
            RuntimeValue::Long(_) => Some(NumericKind::Long),
            RuntimeValue::Float(_) => Some(NumericKind::Float),
            RuntimeValue::Double(_) => Some(NumericKind::Double),
            _ => None,
        }
    }

    /// The interned type of this value.
    pub fn type_id(&self, universe: &TypeUniverse) -> TypeId {
        match self {
            RuntimeValue::Null => universe.object_root(),
            RuntimeValue::Bool(_) => universe.bool_type(),
            RuntimeValue::Str(_) => universe.string_type(),
            RuntimeValue::Object(ty) => *ty,
            other => match other.numeric_kind() {
                Some(kind) => universe.numeric_type(kind),
                None => universe.void_type(),
            },
        }
    }

    /// Replaces any NaN payload with the canonical NaN so all NaNs compare
    /// and hash identically.
    pub fn canonicalized(self) -> Self {
        match self {
            RuntimeValue::Float(f) if f.is_nan() => RuntimeValue::Float(f32::NAN),
            RuntimeValue::Double(d) if d.is_nan() => RuntimeValue::Double(f64::NAN),
            other => other,
        }
    }
}

impl PartialEq for RuntimeValue {
    fn eq(&self, other: &Self) -> bool {
        use RuntimeValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Byte(a), Byte(b)) => a == b,
            (Short(a), Short(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (Str(a), Str(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for RuntimeValue {}

impl Hash for RuntimeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use RuntimeValue::*;
        std::mem::discriminant(self).hash(state);
        match self {
            Null => {}
            Bool(v) => v.hash(state),
            Byte(v) => v.hash(state),
            Short(v) => v.hash(state),
            Char(v) => v.hash(state),
            Int(v) => v.hash(state),
            Long(v) => v.hash(state),
            Float(v) => v.to_bits().hash(state),
            Double(v) => v.to_bits().hash(state),
            Str(v) => v.hash(state),
            Object(v) => v.hash(state),
        }
    }
}

impl fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RuntimeValue::*;
        match self {
            Null => write!(f, "null"),
            Bool(v) => write!(f, "{v}"),
            Byte(v) => write!(f, "{v}"),
            Short(v) => write!(f, "{v}"),
            Char(v) => write!(f, "{v:?}"),
            Int(v) => write!(f, "{v}"),
            Long(v) => write!(f, "{v}"),
            Float(v) => write!(f, "{v}"),
            Double(v) => write!(f, "{v}"),
            Str(v) => write!(f, "{v:?}"),
            Object(ty) => write!(f, "<object #{}>", ty.index()),
        }
    }
}

/// Heuristic check for strings that look like a default identity rendering
/// (`TypeName@1a2b3c`). Such strings are run-dependent and useless as
/// literals.
pub fn looks_like_default_display(s: &str) -> bool {
    let Some(at) = s.rfind('@') else {
        return false;
    };
    let (prefix, suffix) = (&s[..at], &s[at + 1..]);
    if prefix.is_empty() || suffix.is_empty() {
        return false;
    }
    let prefix_ok = prefix
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '_' || c == '$');
    prefix_ok && suffix.chars().all(|c| c.is_ascii_hexdigit())
}

/// Whether a harvested string is short enough to keep as a literal.
pub fn string_length_ok(s: &str, cap: usize) -> bool {
    s.len() <= cap
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn nan_values_canonicalize_and_dedupe() {
        let a = RuntimeValue::Double(f64::from_bits(0x7ff8_0000_0000_0001)).canonicalized();
        let b = RuntimeValue::Double(f64::NAN).canonicalized();
        assert_eq!(a, b);
        let mut seen = HashSet::new();
        assert!(seen.insert(a));
        assert!(!seen.insert(b));
    }

    #[test]
    fn float_zero_signs_are_distinct() {
        assert_ne!(RuntimeValue::Double(0.0), RuntimeValue::Double(-0.0));
    }

    #[test]
    fn default_display_detection() {
        assert!(looks_like_default_display("com.example.Account@3f8e1a"));
        assert!(looks_like_default_display("Account@ff"));
        assert!(!looks_like_default_display("user@example.com "));
        assert!(!looks_like_default_display("no at sign"));
        assert!(!looks_like_default_display("@abc"));
    }

    #[test]
    fn value_types_resolve_through_the_universe() {
        let universe = TypeUniverse::new();
        assert_eq!(
            RuntimeValue::Int(3).type_id(&universe),
            universe.int_type()
        );
        assert_eq!(
            RuntimeValue::Str("x".into()).type_id(&universe),
            universe.string_type()
        );
    }
}
