//! Post-selection value fuzzing.
//!
//! Before a selected input sequence is wired into a new statement, its last
//! value may be perturbed by appending extra statements, so the original
//! producer stays intact and the perturbed value becomes the new last value.
//! Numeric values get a Gaussian delta folded into a single add-constant
//! builtin; string literals get one random edit. Anything else passes
//! through untouched.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::operation::{Operation, StringEditKind};
use crate::sequence::Sequence;
use crate::types::{NumericKind, TypeKind, TypeUniverse};
use crate::value::RuntimeValue;

pub const DEFAULT_GAUSSIAN_SIGMA: f64 = 30.0;

#[derive(Debug, Clone, Copy)]
pub struct Fuzzer {
    sigma: f64,
}

impl Fuzzer {
    pub fn new(sigma: f64) -> Fuzzer {
        Fuzzer { sigma }
    }

    /// Returns `sequence` extended with perturbation statements, or the
    /// sequence unchanged when its last value is not fuzzable.
    pub fn fuzz(
        &self,
        sequence: &Sequence,
        universe: &TypeUniverse,
        rng: &mut ChaCha8Rng,
    ) -> Sequence {
        let Some(last_ty) = sequence.last_output_type() else {
            return sequence.clone();
        };
        match universe.kind(last_ty) {
            TypeKind::Numeric(kind) => self.fuzz_numeric(sequence, *kind, universe, rng),
            TypeKind::Str => self.fuzz_string(sequence, universe, rng),
            _ => sequence.clone(),
        }
    }

    fn gaussian(&self, rng: &mut ChaCha8Rng) -> f64 {
        match Normal::new(0.0, self.sigma) {
            Ok(dist) => dist.sample(rng),
            Err(_) => 0.0,
        }
    }

    fn fuzz_numeric(
        &self,
        sequence: &Sequence,
        kind: NumericKind,
        universe: &TypeUniverse,
        rng: &mut ChaCha8Rng,
    ) -> Sequence {
        let g = self.gaussian(rng);
        let delta = match kind {
            NumericKind::Byte => RuntimeValue::Byte(g.round() as i8),
            NumericKind::Short => RuntimeValue::Short(g.round() as i16),
            NumericKind::Char => {
                let shift = (g.abs().round() as u32) % 0x80;
                RuntimeValue::Char(char::from_u32(shift).unwrap_or('\0'))
            }
            NumericKind::Int => RuntimeValue::Int(g.round() as i32),
            NumericKind::Long => RuntimeValue::Long(g.round() as i64),
            NumericKind::Float => RuntimeValue::Float(g as f32),
            NumericKind::Double => RuntimeValue::Double(g),
        };
        debug!(delta = %delta, "fuzzing numeric value");
        let last = sequence.len() - 1;
        sequence.extend(Operation::add_const(delta, universe), &[last])
    }

    /// String fuzzing needs the current value to pick valid edit positions,
    /// so only sequences ending in a string literal are perturbed.
    fn fuzz_string(
        &self,
        sequence: &Sequence,
        universe: &TypeUniverse,
        rng: &mut ChaCha8Rng,
    ) -> Sequence {
        let Some(current) = sequence
            .last_statement()
            .and_then(|s| s.operation.literal_value())
        else {
            return sequence.clone();
        };
        let RuntimeValue::Str(current) = current.clone() else {
            return sequence.clone();
        };
        let len = current.chars().count();
        let edit = if len == 0 {
            StringEditKind::Insert
        } else {
            [
                StringEditKind::Insert,
                StringEditKind::Remove,
                StringEditKind::Replace,
                StringEditKind::Substring,
            ][rng.gen_range(0..4)]
        };
        debug!(?edit, len, "fuzzing string value");
        let string_at = sequence.len() - 1;
        let int_lit = |v: i32| Operation::literal(RuntimeValue::Int(v), universe);
        match edit {
            StringEditKind::Insert => {
                let index = rng.gen_range(0..=len) as i32;
                let ch = rng.gen_range(0x20u8..0x7F) as char;
                let with_index = sequence.extend(int_lit(index), &[]);
                let with_char = with_index
                    .extend(Operation::literal(RuntimeValue::Char(ch), universe), &[]);
                with_char.extend(
                    Operation::string_edit(StringEditKind::Insert, universe),
                    &[string_at, string_at + 1, string_at + 2],
                )
            }
            StringEditKind::Remove => {
                let index = rng.gen_range(0..len) as i32;
                let with_index = sequence.extend(int_lit(index), &[]);
                with_index.extend(
                    Operation::string_edit(StringEditKind::Remove, universe),
                    &[string_at, string_at + 1],
                )
            }
            StringEditKind::Replace => {
                let start = rng.gen_range(0..len);
                let end = rng.gen_range(start..=len) as i32;
                let replacement = (rng.gen_range(0x20u8..0x7F) as char).to_string();
                let with_start = sequence.extend(int_lit(start as i32), &[]);
                let with_end = with_start.extend(int_lit(end), &[]);
                let with_repl = with_end.extend(
                    Operation::literal(RuntimeValue::Str(replacement), universe),
                    &[],
                );
                with_repl.extend(
                    Operation::string_edit(StringEditKind::Replace, universe),
                    &[string_at, string_at + 1, string_at + 2, string_at + 3],
                )
            }
            StringEditKind::Substring => {
                let start = rng.gen_range(0..len);
                let end = rng.gen_range(start..=len) as i32;
                let with_start = sequence.extend(int_lit(start as i32), &[]);
                let with_end = with_start.extend(int_lit(end), &[]);
                with_end.extend(
                    Operation::string_edit(StringEditKind::Substring, universe),
                    &[string_at, string_at + 1, string_at + 2],
                )
            }
        }
    }
}

impl Default for Fuzzer {
    fn default() -> Fuzzer {
        Fuzzer::new(DEFAULT_GAUSSIAN_SIGMA)
    }
}
