//! Backend integer type model (C1).
//!
//! Mirrors C/C++'s eleven-member integer type lattice: bit size,
//! signedness, representable range, CV qualification and the literal
//! suffix a cast or constant needs when printed. Types are flyweights,
//! interned once per `(id, is_static, cv)` triple and referenced by a
//! cheap `Copy` handle (`TypeHandle`) rather than a shared pointer.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The eleven backend integer type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntTypeId {
    Bool,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LLong,
    ULLong,
}

impl IntTypeId {
    pub const ALL: [IntTypeId; 11] = [
        IntTypeId::Bool,
        IntTypeId::SChar,
        IntTypeId::UChar,
        IntTypeId::Short,
        IntTypeId::UShort,
        IntTypeId::Int,
        IntTypeId::UInt,
        IntTypeId::Long,
        IntTypeId::ULong,
        IntTypeId::LLong,
        IntTypeId::ULLong,
    ];

    pub fn is_signed(self) -> bool {
        !matches!(
            self,
            IntTypeId::Bool
                | IntTypeId::UChar
                | IntTypeId::UShort
                | IntTypeId::UInt
                | IntTypeId::ULong
                | IntTypeId::ULLong
        )
    }

    /// Conversion rank used by promotion (§4.1.2) and usual arithmetic
    /// conversions (§4.1.5). `target` resolves the `long`/`long long` tie.
    pub fn rank(self, target: &TargetConfig) -> u8 {
        match self {
            IntTypeId::Bool => 0,
            IntTypeId::SChar | IntTypeId::UChar => 1,
            IntTypeId::Short | IntTypeId::UShort => 2,
            IntTypeId::Int | IntTypeId::UInt => 3,
            IntTypeId::Long | IntTypeId::ULong => 4,
            IntTypeId::LLong | IntTypeId::ULLong => {
                if target.long_eq_llong {
                    4
                } else {
                    5
                }
            }
        }
    }

    pub fn bit_size(self, target: &TargetConfig) -> u32 {
        match self {
            IntTypeId::Bool => 8,
            IntTypeId::SChar | IntTypeId::UChar => 8,
            IntTypeId::Short | IntTypeId::UShort => 16,
            IntTypeId::Int | IntTypeId::UInt => 32,
            IntTypeId::Long | IntTypeId::ULong => {
                if target.long_eq_llong {
                    64
                } else {
                    32
                }
            }
            IntTypeId::LLong | IntTypeId::ULLong => 64,
        }
    }

    /// The unsigned counterpart of a (possibly already unsigned) type.
    pub fn to_unsigned(self) -> IntTypeId {
        match self {
            IntTypeId::Bool => IntTypeId::Bool,
            IntTypeId::SChar | IntTypeId::UChar => IntTypeId::UChar,
            IntTypeId::Short | IntTypeId::UShort => IntTypeId::UShort,
            IntTypeId::Int | IntTypeId::UInt => IntTypeId::UInt,
            IntTypeId::Long | IntTypeId::ULong => IntTypeId::ULong,
            IntTypeId::LLong | IntTypeId::ULLong => IntTypeId::ULLong,
        }
    }

    pub fn literal_suffix(self) -> &'static str {
        match self {
            IntTypeId::Bool
            | IntTypeId::SChar
            | IntTypeId::UChar
            | IntTypeId::Short
            | IntTypeId::UShort
            | IntTypeId::Int => "",
            IntTypeId::UInt => "U",
            IntTypeId::Long => "L",
            IntTypeId::ULong => "UL",
            IntTypeId::LLong => "LL",
            IntTypeId::ULLong => "ULL",
        }
    }

    pub fn c_name(self) -> &'static str {
        match self {
            IntTypeId::Bool => "bool",
            IntTypeId::SChar => "signed char",
            IntTypeId::UChar => "unsigned char",
            IntTypeId::Short => "short",
            IntTypeId::UShort => "unsigned short",
            IntTypeId::Int => "int",
            IntTypeId::UInt => "unsigned int",
            IntTypeId::Long => "long",
            IntTypeId::ULong => "unsigned long",
            IntTypeId::LLong => "long long",
            IntTypeId::ULLong => "unsigned long long",
        }
    }

    /// `int`-and-above promotion (§4.1.2): rank below `int` is promoted to
    /// `int` (unsigned char/short with bit size equal to int would in
    /// principle promote to unsigned int, but none of our widths reach
    /// that case, matching `original_source/src/type.cpp`'s target ABI).
    pub fn promote(self) -> IntTypeId {
        match self {
            IntTypeId::Bool
            | IntTypeId::SChar
            | IntTypeId::UChar
            | IntTypeId::Short
            | IntTypeId::UShort => IntTypeId::Int,
            other => other,
        }
    }

    /// `min`/`max` as an absolute-value-plus-sign pair (§3.1), independent
    /// of storage width so it composes with `AbsValue` in `value.rs`.
    pub fn min_max(self, target: &TargetConfig) -> (AbsValue, AbsValue) {
        let bits = self.bit_size(target);
        if self.is_signed() {
            let max = (1u64 << (bits - 1)) - 1;
            let min = 1u64 << (bits - 1);
            (
                AbsValue { negative: true, value: min },
                AbsValue { negative: false, value: max },
            )
        } else {
            let max = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
            (
                AbsValue { negative: false, value: 0 },
                AbsValue { negative: false, value: max },
            )
        }
    }
}

impl fmt::Display for IntTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.c_name())
    }
}

/// An absolute-value + sign pair, wide enough for any of the eleven types
/// (§3.2's "raw" requirement: at least 64 signed and 64 unsigned bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsValue {
    pub negative: bool,
    pub value: u64,
}

/// CV qualification, part of a type's flyweight key (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CvQualifier {
    None,
    Const,
    Volatile,
    ConstVolatile,
}

impl CvQualifier {
    pub fn as_c_prefix(self) -> &'static str {
        match self {
            CvQualifier::None => "",
            CvQualifier::Const => "const ",
            CvQualifier::Volatile => "volatile ",
            CvQualifier::ConstVolatile => "const volatile ",
        }
    }
}

/// Target-parameterization (supplemental, §3.1 of SPEC_FULL.md): resolves
/// the open question of `long`/`long long` identity as a recorded policy
/// value instead of a host `sizeof` query, and records the UB dialect
/// (§4.1 shift rules differ between C and C++ for left-shift of a
/// non-negative signed LHS).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetConfig {
    pub long_eq_llong: bool,
    pub dialect: Dialect,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig { long_eq_llong: true, dialect: Dialect::Cxx }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    C,
    Cxx,
}

/// Flyweight key identifying one interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TypeKey {
    id: IntTypeId,
    is_static: bool,
    cv: CvQualifier,
}

/// A cheap, `Copy` handle into the process-wide type pool. Two handles
/// compare equal (via the pool) iff their `(id, is_static, cv)` triples are
/// equal; we additionally store the key inline so comparisons and
/// `propagate_type` don't need pool access on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle {
    key: TypeKey,
}

impl TypeHandle {
    pub fn id(&self) -> IntTypeId {
        self.key.id
    }

    pub fn is_static(&self) -> bool {
        self.key.is_static
    }

    pub fn cv(&self) -> CvQualifier {
        self.key.cv
    }

    pub fn is_signed(&self) -> bool {
        self.key.id.is_signed()
    }

    pub fn bit_size(&self, target: &TargetConfig) -> u32 {
        self.key.id.bit_size(target)
    }

    pub fn rank(&self, target: &TargetConfig) -> u8 {
        self.key.id.rank(target)
    }

    pub fn min_max(&self, target: &TargetConfig) -> (AbsValue, AbsValue) {
        self.key.id.min_max(target)
    }

    pub fn literal_suffix(&self) -> &'static str {
        self.key.id.literal_suffix()
    }

    /// Render the C declarator prefix: cv-qualifiers, static, base name.
    pub fn emit_prefix(&self) -> String {
        let mut s = String::new();
        if self.key.is_static {
            s.push_str("static ");
        }
        s.push_str(self.key.cv.as_c_prefix());
        s.push_str(self.key.id.c_name());
        s
    }
}

/// Process-wide intern table of type flyweights (§3.1, §9 "Shared type
/// flyweights"). Construction is idempotent: interning the same triple
/// twice returns handles with identical keys.
#[derive(Debug, Default)]
pub struct TypePool {
    seen: HashMap<TypeKey, ()>,
}

impl TypePool {
    pub fn new() -> Self {
        TypePool { seen: HashMap::new() }
    }

    pub fn intern(&mut self, id: IntTypeId, is_static: bool, cv: CvQualifier) -> TypeHandle {
        let key = TypeKey { id, is_static, cv };
        self.seen.entry(key).or_insert(());
        TypeHandle { key }
    }

    pub fn plain(&mut self, id: IntTypeId) -> TypeHandle {
        self.intern(id, false, CvQualifier::None)
    }
}

/// Representability test (§4.1.4): does every value of `from` fit in `to`?
pub fn can_represent(to: IntTypeId, from: IntTypeId, target: &TargetConfig) -> bool {
    if to == from {
        return true;
    }
    let (to_min, to_max) = to.min_max(target);
    let (from_min, from_max) = from.min_max(target);
    abs_le(to_min, from_min) && abs_ge(to_max, from_max)
}

/// `a <= b` for two `AbsValue`s, interpreted as signed magnitudes.
fn abs_le(a: AbsValue, b: AbsValue) -> bool {
    to_i128(a) <= to_i128(b)
}

fn abs_ge(a: AbsValue, b: AbsValue) -> bool {
    to_i128(a) >= to_i128(b)
}

fn to_i128(v: AbsValue) -> i128 {
    if v.negative {
        -(v.value as i128)
    } else {
        v.value as i128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_raises_subint_ranks() {
        assert_eq!(IntTypeId::SChar.promote(), IntTypeId::Int);
        assert_eq!(IntTypeId::Bool.promote(), IntTypeId::Int);
        assert_eq!(IntTypeId::Int.promote(), IntTypeId::Int);
        assert_eq!(IntTypeId::ULLong.promote(), IntTypeId::ULLong);
    }

    #[test]
    fn int_min_max_matches_c() {
        let target = TargetConfig::default();
        let (min, max) = IntTypeId::Int.min_max(&target);
        assert_eq!(min, AbsValue { negative: true, value: 1 << 31 });
        assert_eq!(max, AbsValue { negative: false, value: (1u64 << 31) - 1 });
    }

    #[test]
    fn uchar_max_is_255() {
        let target = TargetConfig::default();
        let (min, max) = IntTypeId::UChar.min_max(&target);
        assert_eq!(min.value, 0);
        assert_eq!(max.value, 255);
    }

    #[test]
    fn long_eq_llong_ties_rank() {
        let lp64 = TargetConfig { long_eq_llong: true, dialect: Dialect::Cxx };
        assert_eq!(IntTypeId::Long.rank(&lp64), IntTypeId::LLong.rank(&lp64));
        let llp64 = TargetConfig { long_eq_llong: false, dialect: Dialect::Cxx };
        assert!(IntTypeId::Long.rank(&llp64) < IntTypeId::LLong.rank(&llp64));
    }

    #[test]
    fn flyweight_handles_with_equal_key_are_equal() {
        let mut pool = TypePool::new();
        let a = pool.intern(IntTypeId::Int, false, CvQualifier::Const);
        let b = pool.intern(IntTypeId::Int, false, CvQualifier::Const);
        assert_eq!(a, b);
        let c = pool.intern(IntTypeId::Int, false, CvQualifier::None);
        assert_ne!(a, c);
    }

    #[test]
    fn can_represent_widening() {
        let target = TargetConfig::default();
        assert!(can_represent(IntTypeId::Long, IntTypeId::Int, &target));
        assert!(!can_represent(IntTypeId::Int, IntTypeId::Long, &target));
        assert!(!can_represent(IntTypeId::Int, IntTypeId::UInt, &target));
    }
}
