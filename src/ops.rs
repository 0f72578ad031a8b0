//! Operator evaluation (§4.1.1, §4.1.5, §4.1.6) and usual arithmetic
//! conversions. Every function here is a pure `EvalResult, EvalResult ->
//! EvalResult` (or unary) map; UB detection follows
//! `original_source/src/ir_value.cpp` operator-by-operator, but uses
//! checked arithmetic on the `i64`/`u64`/`i128` storage instead of the
//! half-word decomposition the C++ uses for multiplication overflow.

use crate::types::{IntTypeId, TargetConfig};
use crate::value::{EvalResult, UbKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Negate,
    LogicalNot,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    LogAnd,
    LogOr,
}

impl BinaryOp {
    pub fn is_relational_or_equality(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogAnd | BinaryOp::LogOr)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::LogAnd => "&&",
            BinaryOp::LogOr => "||",
        }
    }
}

impl UnaryOp {
    pub fn is_postfix(self) -> bool {
        matches!(self, UnaryOp::PostInc | UnaryOp::PostDec)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Negate => "-",
            UnaryOp::LogicalNot => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::PreInc | UnaryOp::PostInc => "++",
            UnaryOp::PreDec | UnaryOp::PostDec => "--",
        }
    }
}

fn signed_range(ty: IntTypeId, target: &TargetConfig) -> (i128, i128) {
    let (min, max) = ty.min_max(target);
    let to_i128 = |a: crate::types::AbsValue| {
        if a.negative {
            -(a.value as i128)
        } else {
            a.value as i128
        }
    };
    (to_i128(min), to_i128(max))
}

fn in_range(ty: IntTypeId, v: i128, target: &TargetConfig) -> bool {
    let (min, max) = signed_range(ty, target);
    v >= min && v <= max
}

/// Apply a unary operator. Arithmetic promotion must already have been
/// performed by `propagate_type`; `arg`'s type is the operator's type.
pub fn eval_unary(op: UnaryOp, arg: EvalResult, target: &TargetConfig) -> EvalResult {
    let ty = arg.ty();
    if arg.is_ub() {
        return EvalResult::undef(ty, arg.ub_kind().unwrap());
    }
    match op {
        UnaryOp::Plus => arg,
        UnaryOp::Negate => {
            let v = wide_signed(arg);
            let neg = -v;
            if ty.is_signed() && !in_range(ty, neg, target) {
                EvalResult::undef(ty, UbKind::SignOvf)
            } else {
                EvalResult::wrapped(ty, neg, target)
            }
        }
        UnaryOp::BitNot => {
            let bits = ty.bit_size(target);
            let mask: u128 = if bits >= 128 { u128::MAX } else { (1u128 << bits) - 1 };
            let v = wide_unsigned(arg) as u128 & mask;
            let flipped = (!v) & mask;
            EvalResult::wrapped(ty, flipped as i128, target)
        }
        UnaryOp::LogicalNot => {
            assert_eq!(ty, IntTypeId::Bool, "! is only defined on bool operands");
            let v = wide_unsigned(arg) != 0;
            EvalResult::concrete(IntTypeId::Bool, (!v) as i64)
        }
        // Both directions compute the incremented/decremented value to
        // detect overflow, but C's postfix forms yield the operand's *old*
        // value as the expression result — only the (unmodeled, lvalue-only)
        // write-back happens with the new one.
        UnaryOp::PreInc => {
            let v = wide_signed(arg) + 1;
            if ty.is_signed() && !in_range(ty, v, target) {
                EvalResult::undef(ty, UbKind::SignOvf)
            } else {
                EvalResult::wrapped(ty, v, target)
            }
        }
        UnaryOp::PostInc => {
            let v = wide_signed(arg) + 1;
            if ty.is_signed() && !in_range(ty, v, target) {
                EvalResult::undef(ty, UbKind::SignOvf)
            } else {
                arg
            }
        }
        UnaryOp::PreDec => {
            let v = wide_signed(arg) - 1;
            if ty.is_signed() && !in_range(ty, v, target) {
                EvalResult::undef(ty, UbKind::SignOvf)
            } else {
                EvalResult::wrapped(ty, v, target)
            }
        }
        UnaryOp::PostDec => {
            let v = wide_signed(arg) - 1;
            if ty.is_signed() && !in_range(ty, v, target) {
                EvalResult::undef(ty, UbKind::SignOvf)
            } else {
                arg
            }
        }
    }
}

fn wide_signed(v: EvalResult) -> i128 {
    match v {
        EvalResult::Concrete { ty, raw } => {
            if ty.is_signed() {
                raw.as_signed() as i128
            } else {
                raw.as_unsigned() as i128
            }
        }
        EvalResult::Undef { .. } => 0,
    }
}

fn wide_unsigned(v: EvalResult) -> u128 {
    match v {
        EvalResult::Concrete { raw, .. } => raw.as_unsigned() as u128,
        EvalResult::Undef { .. } => 0,
    }
}

/// Apply a binary arithmetic/bitwise/relational operator. `lhs`/`rhs` must
/// already share a type for arithmetic/bitwise ops, per usual arithmetic
/// conversions having run in `propagate_type` (the caller's responsibility,
/// §4.1.1: "the caller is responsible for conversions").
pub fn eval_binary(
    op: BinaryOp,
    lhs: EvalResult,
    rhs: EvalResult,
    target: &TargetConfig,
) -> EvalResult {
    if op.is_shift() {
        return eval_shift(op, lhs, rhs, target);
    }

    let result_ty = if op.is_relational_or_equality() || op.is_logical() {
        IntTypeId::Bool
    } else {
        lhs.ty()
    };

    if lhs.is_ub() || rhs.is_ub() {
        return EvalResult::undef(result_ty, lhs.ub_kind().or(rhs.ub_kind()).unwrap());
    }

    if !op.is_relational_or_equality() && !op.is_logical() {
        assert_eq!(lhs.ty(), rhs.ty(), "binary arithmetic requires matching operand types");
    }

    match op {
        BinaryOp::Add => checked_arith(lhs, rhs, target, |a, b| a.checked_add(b)),
        BinaryOp::Sub => checked_arith(lhs, rhs, target, |a, b| a.checked_sub(b)),
        BinaryOp::Mul => eval_mul(lhs, rhs, target),
        BinaryOp::Div => eval_div_mod(lhs, rhs, target, true),
        BinaryOp::Mod => eval_div_mod(lhs, rhs, target, false),
        BinaryOp::BitAnd => bitwise(lhs, rhs, target, |a, b| a & b),
        BinaryOp::BitOr => bitwise(lhs, rhs, target, |a, b| a | b),
        BinaryOp::BitXor => bitwise(lhs, rhs, target, |a, b| a ^ b),
        BinaryOp::Lt => cmp(lhs, rhs, |a, b| a < b),
        BinaryOp::Gt => cmp(lhs, rhs, |a, b| a > b),
        BinaryOp::Le => cmp(lhs, rhs, |a, b| a <= b),
        BinaryOp::Ge => cmp(lhs, rhs, |a, b| a >= b),
        BinaryOp::Eq => cmp(lhs, rhs, |a, b| a == b),
        BinaryOp::Ne => cmp(lhs, rhs, |a, b| a != b),
        BinaryOp::LogAnd => logical(lhs, rhs, |a, b| a && b),
        BinaryOp::LogOr => logical(lhs, rhs, |a, b| a || b),
        BinaryOp::Shl | BinaryOp::Shr => unreachable!("handled by eval_shift"),
    }
}

fn checked_arith(
    lhs: EvalResult,
    rhs: EvalResult,
    target: &TargetConfig,
    op: impl Fn(i128, i128) -> Option<i128>,
) -> EvalResult {
    let ty = lhs.ty();
    let a = wide_signed(lhs);
    let b = wide_signed(rhs);
    match op(a, b) {
        Some(v) if !ty.is_signed() || in_range(ty, v, target) => EvalResult::wrapped(ty, v, target),
        Some(_) | None => EvalResult::undef(ty, UbKind::SignOvf),
    }
}

fn eval_mul(lhs: EvalResult, rhs: EvalResult, target: &TargetConfig) -> EvalResult {
    let ty = lhs.ty();
    if !ty.is_signed() {
        // Two near-u64::MAX operands multiply to near 2^128, which still
        // fits u128 but would overflow the i128 path below — unsigned
        // multiplication only ever wraps, never overflows into UB.
        let a = wide_unsigned(lhs);
        let b = wide_unsigned(rhs);
        let product = a.wrapping_mul(b);
        return EvalResult::wrapped(ty, product as i128, target);
    }
    let a = wide_signed(lhs);
    let b = wide_signed(rhs);
    let (min, _) = signed_range(ty, target);
    if a == min && b == -1 || b == min && a == -1 {
        return EvalResult::undef(ty, UbKind::SignOvfMin);
    }
    match a.checked_mul(b) {
        Some(product) if in_range(ty, product, target) => EvalResult::wrapped(ty, product, target),
        _ => EvalResult::undef(ty, UbKind::SignOvf),
    }
}

fn eval_div_mod(lhs: EvalResult, rhs: EvalResult, target: &TargetConfig, is_div: bool) -> EvalResult {
    let ty = lhs.ty();
    let a = wide_signed(lhs);
    let b = wide_signed(rhs);
    if b == 0 {
        return EvalResult::undef(ty, UbKind::ZeroDiv);
    }
    let (min, _) = signed_range(ty, target);
    if ty.is_signed() && a == min && b == -1 {
        return EvalResult::undef(ty, UbKind::SignOvf);
    }
    let v = if is_div { a / b } else { a % b };
    EvalResult::wrapped(ty, v, target)
}

fn bitwise(
    lhs: EvalResult,
    rhs: EvalResult,
    target: &TargetConfig,
    op: impl Fn(u128, u128) -> u128,
) -> EvalResult {
    let ty = lhs.ty();
    let v = op(wide_unsigned(lhs), wide_unsigned(rhs));
    EvalResult::wrapped(ty, v as i128, target)
}

fn cmp(lhs: EvalResult, rhs: EvalResult, op: impl Fn(i128, i128) -> bool) -> EvalResult {
    let signed = lhs.ty().is_signed();
    let a = if signed { wide_signed(lhs) } else { wide_unsigned(lhs) as i128 };
    let b = if signed { wide_signed(rhs) } else { wide_unsigned(rhs) as i128 };
    EvalResult::concrete(IntTypeId::Bool, op(a, b) as i64)
}

fn logical(lhs: EvalResult, rhs: EvalResult, op: impl Fn(bool, bool) -> bool) -> EvalResult {
    assert_eq!(lhs.ty(), IntTypeId::Bool, "logical operators require bool operands");
    assert_eq!(rhs.ty(), IntTypeId::Bool, "logical operators require bool operands");
    let a = wide_unsigned(lhs) != 0;
    let b = wide_unsigned(rhs) != 0;
    EvalResult::concrete(IntTypeId::Bool, op(a, b) as i64)
}

/// Shift operators (§4.1.1): lhs and rhs are independently promoted and
/// keep their own (possibly different) types; the result type is the
/// promoted lhs type (§4.1.5: "Shifts do not perform step >= 2").
fn eval_shift(op: BinaryOp, lhs: EvalResult, rhs: EvalResult, target: &TargetConfig) -> EvalResult {
    let ty = lhs.ty();
    if lhs.is_ub() || rhs.is_ub() {
        return EvalResult::undef(ty, lhs.ub_kind().or(rhs.ub_kind()).unwrap());
    }

    let rhs_signed_val = if rhs.ty().is_signed() { Some(wide_signed(rhs)) } else { None };
    if let Some(v) = rhs_signed_val {
        if v < 0 {
            return EvalResult::undef(ty, UbKind::ShiftRhsNeg);
        }
    }
    let lhs_bits = ty.bit_size(target) as i128;
    let rhs_val = wide_unsigned(rhs) as i128;
    if rhs_val >= lhs_bits {
        return EvalResult::undef(ty, UbKind::ShiftRhsLarge);
    }

    let lhs_signed_val = wide_signed(lhs);
    if ty.is_signed() && lhs_signed_val < 0 {
        return EvalResult::undef(ty, UbKind::NegShift);
    }

    if op == BinaryOp::Shl && ty.is_signed() {
        let msb = lhs.msb(target) as i128;
        let max_avail_shift = lhs_bits - msb;
        let too_large = match target.dialect {
            crate::types::Dialect::C => rhs_val >= max_avail_shift,
            crate::types::Dialect::Cxx => rhs_val > max_avail_shift,
        };
        if too_large {
            return EvalResult::undef(ty, UbKind::ShiftRhsLarge);
        }
    }

    let shifted = match op {
        BinaryOp::Shl => (wide_unsigned(lhs) << rhs_val) as i128,
        BinaryOp::Shr => {
            if ty.is_signed() {
                lhs_signed_val >> rhs_val
            } else {
                (wide_unsigned(lhs) >> rhs_val) as i128
            }
        }
        _ => unreachable!(),
    };
    EvalResult::wrapped(ty, shifted, target)
}

/// Cast evaluation (§4.1.6). UB propagates; a NoUB value reinterprets its
/// bits in the destination's width/signedness.
pub fn eval_cast(from: EvalResult, to: IntTypeId, target: &TargetConfig) -> EvalResult {
    match from {
        EvalResult::Undef { .. } => EvalResult::undef(to, from.ub_kind().unwrap()),
        EvalResult::Concrete { .. } => {
            let v = wide_signed(from);
            EvalResult::wrapped(to, v, target)
        }
    }
}

/// Bool-conversion (§4.1.3): nonzero raw -> true, never UB (UB in `from`
/// still propagates as a bool-typed UB value so callers keep typing
/// consistent).
pub fn eval_to_bool(from: EvalResult) -> EvalResult {
    match from {
        EvalResult::Undef { reason, .. } => EvalResult::undef(IntTypeId::Bool, reason),
        EvalResult::Concrete { .. } => {
            let nonzero = wide_unsigned(from) != 0;
            EvalResult::concrete(IntTypeId::Bool, nonzero as i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TargetConfig;

    fn t() -> TargetConfig {
        TargetConfig::default()
    }

    #[test]
    fn int_min_div_minus_one_is_ub() {
        let target = t();
        let (min, _) = IntTypeId::Int.min_max(&target);
        let lhs = EvalResult::concrete(IntTypeId::Int, -(min.value as i64));
        let rhs = EvalResult::concrete(IntTypeId::Int, -1);
        let r = eval_binary(BinaryOp::Div, lhs, rhs, &target);
        assert_eq!(r.ub_kind(), Some(UbKind::SignOvf));
    }

    #[test]
    fn div_by_zero_is_ub() {
        let target = t();
        let lhs = EvalResult::concrete(IntTypeId::Int, 7);
        let rhs = EvalResult::concrete(IntTypeId::Int, 0);
        let r = eval_binary(BinaryOp::Div, lhs, rhs, &target);
        assert_eq!(r.ub_kind(), Some(UbKind::ZeroDiv));
        let m = eval_binary(BinaryOp::Mod, lhs, rhs, &target);
        assert_eq!(m.ub_kind(), Some(UbKind::ZeroDiv));
    }

    #[test]
    fn signed_add_overflow_is_ub() {
        let target = t();
        let (_, max) = IntTypeId::Int.min_max(&target);
        let lhs = EvalResult::concrete(IntTypeId::Int, max.value as i64);
        let rhs = EvalResult::concrete(IntTypeId::Int, 1);
        let r = eval_binary(BinaryOp::Add, lhs, rhs, &target);
        assert_eq!(r.ub_kind(), Some(UbKind::SignOvf));
    }

    #[test]
    fn unsigned_add_wraps_without_ub() {
        let target = t();
        let lhs = EvalResult::concrete_unsigned(IntTypeId::UInt, u32::MAX as u64);
        let rhs = EvalResult::concrete_unsigned(IntTypeId::UInt, 1);
        let r = eval_binary(BinaryOp::Add, lhs, rhs, &target);
        assert_eq!(r, EvalResult::concrete_unsigned(IntTypeId::UInt, 0));
    }

    #[test]
    fn mul_min_by_minus_one_is_sign_ovf_min() {
        let target = t();
        let (min, _) = IntTypeId::Int.min_max(&target);
        let lhs = EvalResult::concrete(IntTypeId::Int, -(min.value as i64));
        let rhs = EvalResult::concrete(IntTypeId::Int, -1);
        let r = eval_binary(BinaryOp::Mul, lhs, rhs, &target);
        assert_eq!(r.ub_kind(), Some(UbKind::SignOvfMin));
    }

    #[test]
    fn shift_by_bitwidth_or_more_is_ub() {
        let target = t();
        let lhs = EvalResult::concrete(IntTypeId::Int, 1);
        let rhs = EvalResult::concrete(IntTypeId::Int, 64);
        let r = eval_binary(BinaryOp::Shl, lhs, rhs, &target);
        assert_eq!(r.ub_kind(), Some(UbKind::ShiftRhsLarge));
    }

    #[test]
    fn shift_negative_rhs_is_ub() {
        let target = t();
        let lhs = EvalResult::concrete(IntTypeId::Int, 1);
        let rhs = EvalResult::concrete(IntTypeId::Int, -3);
        let r = eval_binary(BinaryOp::Shl, lhs, rhs, &target);
        assert_eq!(r.ub_kind(), Some(UbKind::ShiftRhsNeg));
    }

    #[test]
    fn left_shift_of_negative_lhs_is_ub() {
        let target = t();
        let lhs = EvalResult::concrete(IntTypeId::Int, -1);
        let rhs = EvalResult::concrete(IntTypeId::Int, 1);
        let r = eval_binary(BinaryOp::Shl, lhs, rhs, &target);
        assert_eq!(r.ub_kind(), Some(UbKind::NegShift));
    }

    #[test]
    fn postfix_inc_at_max_is_ub() {
        let target = t();
        let (_, max) = IntTypeId::SChar.min_max(&target);
        let v = EvalResult::concrete(IntTypeId::SChar, max.value as i64);
        let r = eval_unary(UnaryOp::PostInc, v, &target);
        assert_eq!(r.ub_kind(), Some(UbKind::SignOvf));
    }

    #[test]
    fn cast_round_trip_identity() {
        let target = t();
        let v = EvalResult::concrete(IntTypeId::Int, -42);
        let casted = eval_cast(v, IntTypeId::Int, &target);
        assert_eq!(v, casted);
    }

    #[test]
    fn widening_cast_round_trip() {
        let target = t();
        let v = EvalResult::concrete(IntTypeId::Int, -42);
        let widened = eval_cast(v, IntTypeId::Long, &target);
        let back = eval_cast(widened, IntTypeId::Int, &target);
        assert_eq!(v, back);
    }
}
