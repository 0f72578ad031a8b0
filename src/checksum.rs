//! Checksum oracle computation (§4.7, §6.1's `hash.cpp`).
//!
//! Restores the original's standalone `hash.h`/`hash.cpp` as a first-class
//! module: the generator runs the identical 64-bit mixing function at
//! generation time (over every extern-mixed and extern-output variable,
//! in symbol-table order) to produce the oracle embedded in the emitted
//! program; `emit.rs` renders the same formula as C++ source.

use crate::symtab::{VarArena, VarId, Variable};
use crate::value::EvalResult;

/// `seed ^= v + 0x9e3779b9 + (seed << 6) + (seed >> 2)`, matching
/// `original_source/src/hash.cpp` exactly (wrapping on every operation,
/// as the C++ `uint64_t` arithmetic does).
pub fn mix(seed: u64, v: u64) -> u64 {
    let mixed = v
        .wrapping_add(0x9e3779b9)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2);
    seed ^ mixed
}

/// Running accumulator over a sequence of variables/values.
#[derive(Debug, Default, Clone, Copy)]
pub struct Checksum {
    seed: u64,
}

impl Checksum {
    pub fn new() -> Self {
        Checksum { seed: 0 }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Folds one scalar value in, widening it to `u64` the way the
    /// emitted C++ does: unsigned zero-extension, signed
    /// sign-extension-then-bitcast.
    pub fn update_value(&mut self, value: EvalResult) {
        let widened = widen_to_u64(value);
        self.seed = mix(self.seed, widened);
    }

    /// Folds a variable in, recursing member-by-member in declaration
    /// order for `Struct`s.
    pub fn update_var(&mut self, arena: &VarArena, id: VarId) {
        update_variable(self, arena.get(id));
    }
}

fn update_variable(acc: &mut Checksum, var: &Variable) {
    match var {
        Variable::Scalar(s) => acc.update_value(s.current),
        Variable::Struct(s) => {
            for member in &s.members {
                update_variable(acc, member);
            }
        }
    }
}

fn widen_to_u64(value: EvalResult) -> u64 {
    match value {
        EvalResult::Concrete { ty, raw } => {
            if ty.is_signed() {
                raw.as_signed() as u64
            } else {
                raw.as_unsigned()
            }
        }
        EvalResult::Undef { .. } => {
            unreachable!("checksum only ever runs over UB-free, fully propagated variables")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntTypeId;

    #[test]
    fn mix_matches_hand_computed_value() {
        let seed = mix(0, 5);
        assert_eq!(seed, 5u64.wrapping_add(0x9e3779b9));
    }

    #[test]
    fn signed_negative_value_sign_extends() {
        let mut acc = Checksum::new();
        acc.update_value(EvalResult::concrete(IntTypeId::Long, -101));
        assert_eq!(acc.seed(), mix(0, (-101i64) as u64));
    }

    #[test]
    fn accumulation_is_order_sensitive() {
        let mut a = Checksum::new();
        a.update_value(EvalResult::concrete(IntTypeId::Int, 1));
        a.update_value(EvalResult::concrete(IntTypeId::Int, 2));

        let mut b = Checksum::new();
        b.update_value(EvalResult::concrete(IntTypeId::Int, 2));
        b.update_value(EvalResult::concrete(IntTypeId::Int, 1));

        assert_ne!(a.seed(), b.seed());
    }
}
