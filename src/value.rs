//! Typed values and the UB-tagged evaluation result (C1).
//!
//! Grounded on `original_source/src/ir_value.h`/`.cpp`: every scalar value
//! in the IR is either a concrete bit pattern of a known integer type, or a
//! value that would be undefined behavior to compute, tagged with *why*.
//! Per the Design Notes ("UB tags via sum type") this is a single sum type
//! rather than a value-plus-separate-UB-flag pair.

use crate::types::{AbsValue, IntTypeId, TargetConfig};
use std::fmt;

/// Why a value is undefined, per §3.2 and the operator table in §4.1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UbKind {
    SignOvf,
    SignOvfMin,
    ZeroDiv,
    ShiftRhsNeg,
    ShiftRhsLarge,
    NegShift,
    Uninit,
}

impl fmt::Display for UbKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UbKind::SignOvf => "signed overflow",
            UbKind::SignOvfMin => "signed overflow (MIN * -1)",
            UbKind::ZeroDiv => "division by zero",
            UbKind::ShiftRhsNeg => "negative shift amount",
            UbKind::ShiftRhsLarge => "shift amount too large",
            UbKind::NegShift => "shift of negative value",
            UbKind::Uninit => "use of uninitialized value",
        };
        write!(f, "{}", s)
    }
}

/// A scalar typed value (§3.2): a type plus a 64-bit-wide raw payload, or a
/// UB tag. `EvalResult::Concrete.raw`'s sign is intepreted via the type's
/// `is_signed`; storage is always in a `i64`/`u64` union substitute
/// (`RawBits`), matching the IRValue union in the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBits(pub u64);

impl RawBits {
    pub fn from_signed(v: i64) -> Self {
        RawBits(v as u64)
    }

    pub fn as_signed(self) -> i64 {
        self.0 as i64
    }

    pub fn as_unsigned(self) -> u64 {
        self.0
    }
}

/// A typed value, carrying a type handle id and either a concrete payload
/// or a UB tag (§3.2). Equality (`PartialEq`) compares `(type, raw)` only —
/// per §3.2, the UB tag is not part of value equality, only of IR-node
/// identity, so we derive equality on `Concrete` and compare `Undef`
/// variants only by type, matching "a UB value still has a type... but its
/// raw payload is unspecified".
#[derive(Debug, Clone, Copy)]
pub enum EvalResult {
    Concrete { ty: IntTypeId, raw: RawBits },
    Undef { ty: IntTypeId, reason: UbKind },
}

impl PartialEq for EvalResult {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EvalResult::Concrete { ty: t1, raw: r1 }, EvalResult::Concrete { ty: t2, raw: r2 }) => {
                t1 == t2 && r1 == r2
            }
            (EvalResult::Undef { ty: t1, .. }, EvalResult::Undef { ty: t2, .. }) => t1 == t2,
            _ => false,
        }
    }
}

impl EvalResult {
    pub fn ty(&self) -> IntTypeId {
        match self {
            EvalResult::Concrete { ty, .. } => *ty,
            EvalResult::Undef { ty, .. } => *ty,
        }
    }

    pub fn is_ub(&self) -> bool {
        matches!(self, EvalResult::Undef { .. })
    }

    pub fn ub_kind(&self) -> Option<UbKind> {
        match self {
            EvalResult::Undef { reason, .. } => Some(*reason),
            EvalResult::Concrete { .. } => None,
        }
    }

    pub fn concrete(ty: IntTypeId, raw: i64) -> Self {
        EvalResult::Concrete { ty, raw: RawBits::from_signed(raw) }
    }

    pub fn concrete_unsigned(ty: IntTypeId, raw: u64) -> Self {
        EvalResult::Concrete { ty, raw: RawBits(raw) }
    }

    pub fn undef(ty: IntTypeId, reason: UbKind) -> Self {
        EvalResult::Undef { ty, reason }
    }

    /// Truncate/wrap the raw payload into `ty`'s bit width, the way storing
    /// a wider computation (we keep everything in 64 bits) into a narrower
    /// destination does. Unsigned destinations wrap modulo 2^bits (§4.1.6);
    /// signed destinations reinterpret two's complement.
    pub fn wrapped(ty: IntTypeId, raw: i128, target: &TargetConfig) -> Self {
        let bits = ty.bit_size(target);
        let mask: u128 = if bits >= 128 { u128::MAX } else { (1u128 << bits) - 1 };
        let wrapped = (raw as u128) & mask;
        if ty.is_signed() {
            let sign_bit = 1u128 << (bits - 1);
            let signed = if wrapped & sign_bit != 0 {
                (wrapped as i128) - (mask as i128 + 1)
            } else {
                wrapped as i128
            };
            EvalResult::concrete(ty, signed as i64)
        } else {
            EvalResult::concrete_unsigned(ty, wrapped as u64)
        }
    }

    /// Absolute-value-plus-sign view used by the generator to synthesize
    /// constants in a type's representable range (§3.1's `AbsValue`).
    pub fn as_abs(&self, is_signed: bool) -> Option<AbsValue> {
        match self {
            EvalResult::Concrete { raw, .. } => {
                if is_signed {
                    let v = raw.as_signed();
                    Some(AbsValue { negative: v < 0, value: v.unsigned_abs() })
                } else {
                    Some(AbsValue { negative: false, value: raw.as_unsigned() })
                }
            }
            EvalResult::Undef { .. } => None,
        }
    }

    /// The most significant set bit, 1-based, 0 for zero, `bitwidth` for a
    /// negative signed value (§4.1.1's `msb` helper).
    pub fn msb(&self, target: &TargetConfig) -> u32 {
        let bits = self.ty().bit_size(target);
        match self {
            EvalResult::Undef { .. } => 0,
            EvalResult::Concrete { ty, raw } => {
                if ty.is_signed() && raw.as_signed() < 0 {
                    return bits;
                }
                let v = raw.as_unsigned();
                if v == 0 {
                    0
                } else {
                    64 - v.leading_zeros()
                }
            }
        }
    }
}

impl fmt::Display for EvalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalResult::Concrete { ty, raw } => {
                if ty.is_signed() {
                    write!(f, "{}", raw.as_signed())
                } else {
                    write!(f, "{}", raw.as_unsigned())
                }
            }
            EvalResult::Undef { reason, .. } => write!(f, "<UB: {}>", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ub_tag_is_excluded_from_equality_but_not_identity() {
        let a = EvalResult::undef(IntTypeId::Int, UbKind::ZeroDiv);
        let b = EvalResult::undef(IntTypeId::Int, UbKind::SignOvf);
        assert_eq!(a, b, "UB tag must not participate in value equality");
    }

    #[test]
    fn concrete_equality_is_type_and_raw() {
        let a = EvalResult::concrete(IntTypeId::Int, 5);
        let b = EvalResult::concrete(IntTypeId::Int, 5);
        let c = EvalResult::concrete(IntTypeId::Int, 6);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn wrapped_reinterprets_twos_complement() {
        let target = TargetConfig::default();
        let v = EvalResult::wrapped(IntTypeId::SChar, -156, &target);
        // -156 mod 256 = 100, which as i8 is 100 (still positive).
        assert_eq!(v, EvalResult::concrete(IntTypeId::SChar, 100));
    }

    #[test]
    fn msb_of_zero_is_zero() {
        let target = TargetConfig::default();
        let v = EvalResult::concrete(IntTypeId::Int, 0);
        assert_eq!(v.msb(&target), 0);
    }

    #[test]
    fn msb_of_negative_signed_is_bitwidth() {
        let target = TargetConfig::default();
        let v = EvalResult::concrete(IntTypeId::Int, -1);
        assert_eq!(v.msb(&target), 32);
    }
}
