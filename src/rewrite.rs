//! UB-elimination rewriter (C5, §4.3).
//!
//! Mirrors the original `yarpgen`'s local repair pass: on detecting UB at
//! a node's evaluated value, swap the operator and/or perturb an operand
//! rather than discard the whole subtree. Per the Design Notes'
//! "Operator rewriting" entry this is modeled as `ExprNode -> ExprNode`
//! (owns its input, produces a fresh node) rather than in-place mutation,
//! preserving the single-owner tree invariant of §3.7.

use tracing::trace;

use crate::context::RunState;
use crate::expr::ExprNode;
use crate::ops::{BinaryOp, UnaryOp};
use crate::types::{Dialect, TargetConfig};
use crate::value::{EvalResult, UbKind};

/// Repeatedly rewrites `node` until its cached value is UB-free. Only
/// `Unary`/`Binary` nodes can carry UB from their own operator (§4.1.1);
/// any other shape reaching here with a UB value indicates UB propagated
/// from a child, which the caller must not have passed in (the generator
/// only invokes this immediately after building a fresh operator node).
pub fn rewrite_until_no_ub(state: &mut RunState, mut node: ExprNode) -> ExprNode {
    loop {
        if !node.value.is_ub() {
            return node;
        }
        let ub_kind = node.value.ub_kind().expect("checked is_ub above");
        trace!(?ub_kind, "rewriting UB-valued node");
        node = match node.kind {
            crate::expr::ExprKind::Unary(op, arg) => {
                let new_op = rewrite_unary_op(op);
                ExprNode::unary(new_op, *arg, &mut state.types, &state.target)
            }
            crate::expr::ExprKind::Binary(op, lhs, rhs) => {
                rewrite_binary(state, op, *lhs, *rhs, ub_kind)
            }
            _ => unreachable!("only an operator node's own evaluation can yield fresh UB here"),
        };
    }
}

fn rewrite_unary_op(op: UnaryOp) -> UnaryOp {
    match op {
        UnaryOp::PreInc => UnaryOp::PreDec,
        UnaryOp::PreDec => UnaryOp::PreInc,
        UnaryOp::PostInc => UnaryOp::PostDec,
        UnaryOp::PostDec => UnaryOp::PostInc,
        UnaryOp::Negate => UnaryOp::Plus,
        UnaryOp::Plus | UnaryOp::BitNot | UnaryOp::LogicalNot => {
            unreachable!("{:?} never evaluates to UB", op)
        }
    }
}

fn rewrite_binary(
    state: &mut RunState,
    op: BinaryOp,
    lhs: ExprNode,
    rhs: ExprNode,
    ub_kind: UbKind,
) -> ExprNode {
    match op {
        BinaryOp::Add => ExprNode::binary(BinaryOp::Sub, lhs, rhs, &mut state.types, &state.target),
        BinaryOp::Sub => ExprNode::binary(BinaryOp::Add, lhs, rhs, &mut state.types, &state.target),
        BinaryOp::Mul => {
            let repl = if ub_kind == UbKind::SignOvfMin { BinaryOp::Sub } else { BinaryOp::Div };
            ExprNode::binary(repl, lhs, rhs, &mut state.types, &state.target)
        }
        BinaryOp::Div | BinaryOp::Mod => {
            let repl = if ub_kind == UbKind::ZeroDiv { BinaryOp::Mul } else { BinaryOp::Sub };
            ExprNode::binary(repl, lhs, rhs, &mut state.types, &state.target)
        }
        BinaryOp::Shl | BinaryOp::Shr => rewrite_shift(state, op, lhs, rhs, ub_kind),
        _ => unreachable!("{:?} never evaluates to UB", op),
    }
}

/// Exclusive upper bound on a non-negative rhs that keeps `op` on a
/// non-negative `lhs` UB-free (§4.1.1's shift table, dialect-sensitive
/// for `Shl` on a signed lhs).
fn shift_rhs_limit(op: BinaryOp, lhs: &EvalResult, target: &TargetConfig) -> i64 {
    let ty = lhs.ty();
    let bits = ty.bit_size(target) as i64;
    if op == BinaryOp::Shl && ty.is_signed() {
        let msb = lhs.msb(target) as i64;
        let avail = bits - msb;
        match target.dialect {
            Dialect::C => avail,
            Dialect::Cxx => avail + 1,
        }
    } else {
        bits
    }
}

/// Reads an operand's raw payload as a signed/unsigned-aware `i128`, the
/// way `ops.rs`'s `wide_signed` does, for the arithmetic below that has to
/// reason about the rhs's *current* value rather than just its type.
fn operand_value(v: &EvalResult) -> i128 {
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

fn rewrite_shift(
    state: &mut RunState,
    op: BinaryOp,
    lhs: ExprNode,
    rhs: ExprNode,
    ub_kind: UbKind,
) -> ExprNode {
    match ub_kind {
        UbKind::ShiftRhsNeg | UbKind::ShiftRhsLarge => {
            let limit = shift_rhs_limit(op, &lhs.value, &state.target).max(1);
            let target_val = state.rng.uniform(0, limit - 1) as i128;
            let rhs_ty_id = rhs.ty.id();
            let rhs_val = operand_value(&rhs.value);
            // Keep rhs itself as an operand: wrap it in `rhs + k` (negative
            // rhs) or `rhs - k` (too-large rhs) so the rewritten amount
            // lands on `target_val` without discarding the original node.
            let (wrap_op, k) = if ub_kind == UbKind::ShiftRhsNeg {
                (BinaryOp::Add, target_val - rhs_val)
            } else {
                (BinaryOp::Sub, rhs_val - target_val)
            };
            let k_value = EvalResult::wrapped(rhs_ty_id, k, &state.target);
            let k_node = ExprNode::constant(k_value, rhs.ty);
            let new_rhs = ExprNode::binary(wrap_op, rhs, k_node, &mut state.types, &state.target);
            ExprNode::binary(op, lhs, new_rhs, &mut state.types, &state.target)
        }
        UbKind::NegShift => {
            let (_, max) = lhs.ty.min_max(&state.target);
            let c_raw = if max.negative { -(max.value as i128) } else { max.value as i128 };
            let c_value = EvalResult::wrapped(lhs.ty.id(), c_raw, &state.target);
            let c_node = ExprNode::constant(c_value, lhs.ty);
            let new_lhs = ExprNode::binary(BinaryOp::Add, lhs, c_node, &mut state.types, &state.target);
            ExprNode::binary(op, new_lhs, rhs, &mut state.types, &state.target)
        }
        other => unreachable!("shift operators cannot raise {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunState;
    use crate::expr::ExprNode;
    use crate::policy::GenPolicy;
    use crate::types::{IntTypeId, TargetConfig, TypeHandle};

    fn state() -> RunState {
        RunState::new(1, GenPolicy::default(), TargetConfig::default())
    }

    fn int_ty(state: &mut RunState) -> TypeHandle {
        state.types.plain(IntTypeId::Int)
    }

    #[test]
    fn div_by_zero_is_rewritten_to_mul() {
        let mut st = state();
        let ty = int_ty(&mut st);
        let lhs = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, 7), ty);
        let rhs = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, 0), ty);
        let node = ExprNode::binary(BinaryOp::Div, lhs, rhs, &mut st.types, &st.target);
        assert!(node.value.is_ub());
        let fixed = rewrite_until_no_ub(&mut st, node);
        assert!(!fixed.value.is_ub());
        match fixed.kind {
            crate::expr::ExprKind::Binary(op, ..) => assert_eq!(op, BinaryOp::Mul),
            _ => panic!("expected a Binary node"),
        }
    }

    #[test]
    fn int_min_div_minus_one_is_rewritten_to_sub() {
        let mut st = state();
        let ty = int_ty(&mut st);
        let (min, _) = IntTypeId::Int.min_max(&st.target);
        let lhs = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, -(min.value as i64)), ty);
        let rhs = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, -1), ty);
        let node = ExprNode::binary(BinaryOp::Div, lhs, rhs, &mut st.types, &st.target);
        assert!(node.value.is_ub());
        let fixed = rewrite_until_no_ub(&mut st, node);
        assert!(!fixed.value.is_ub());
        match fixed.kind {
            crate::expr::ExprKind::Binary(op, ..) => assert_eq!(op, BinaryOp::Sub),
            _ => panic!("expected a Binary node"),
        }
    }

    #[test]
    fn shift_by_too_large_constant_is_rewritten_in_range() {
        let mut st = state();
        let ty = int_ty(&mut st);
        let lhs = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, 1), ty);
        let rhs = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, 64), ty);
        let node = ExprNode::binary(BinaryOp::Shl, lhs, rhs, &mut st.types, &st.target);
        assert!(node.value.is_ub());
        let fixed = rewrite_until_no_ub(&mut st, node);
        assert!(!fixed.value.is_ub());
    }

    #[test]
    fn negative_lhs_left_shift_is_rewritten() {
        let mut st = state();
        let ty = int_ty(&mut st);
        let lhs = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, -1), ty);
        let rhs = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, 1), ty);
        let node = ExprNode::binary(BinaryOp::Shl, lhs, rhs, &mut st.types, &st.target);
        assert!(node.value.is_ub());
        let fixed = rewrite_until_no_ub(&mut st, node);
        assert!(!fixed.value.is_ub());
    }
}
