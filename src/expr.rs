//! Expression IR and its recursive generator (C4, §3.5, §4.2, §4.5, §4.6).
//!
//! `ExprNode` is the sealed sum type the Design Notes call for ("Variants
//! vs inheritance"): one struct carrying a `kind` tag, a cached result
//! *type* and a cached *value* (possibly UB), rather than a class
//! hierarchy with virtual `propagate_type`/`propagate_value`. Every smart
//! constructor below performs both propagation passes (§4.2) as part of
//! construction: by the time an `ExprNode` exists, its `ty`/`value` are
//! already final for that shape. UB elimination (§4.3) is the caller's
//! job — `gen_expr` and `rewrite.rs` own it — because only a generator
//! holds the `Rng` needed to synthesize a replacement.

use crate::context::{Context, RunState};
use crate::ops::{eval_binary, eval_cast, eval_to_bool, eval_unary, BinaryOp, UnaryOp};
use crate::symtab::VarId;
use crate::types::{can_represent, IntTypeId, TargetConfig, TypeHandle, TypePool};
use crate::value::EvalResult;

#[derive(Debug, Clone)]
pub enum ExprKind {
    Const,
    VarUse(VarId),
    MemberUse(VarId, Vec<usize>),
    TypeCast(Box<ExprNode>, bool),
    Unary(UnaryOp, Box<ExprNode>),
    Binary(BinaryOp, Box<ExprNode>, Box<ExprNode>),
    Assign(Box<ExprNode>, Box<ExprNode>, bool),
}

/// One IR expression node: shape (`kind`) plus its propagated type and
/// value, per §3.5.
#[derive(Debug, Clone)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub ty: TypeHandle,
    pub value: EvalResult,
}

impl ExprNode {
    pub fn constant(value: EvalResult, ty: TypeHandle) -> Self {
        ExprNode { kind: ExprKind::Const, ty, value }
    }

    pub fn var_use(var: VarId, ty: TypeHandle, value: EvalResult) -> Self {
        ExprNode { kind: ExprKind::VarUse(var), ty, value }
    }

    pub fn member_use(var: VarId, path: Vec<usize>, ty: TypeHandle, value: EvalResult) -> Self {
        ExprNode { kind: ExprKind::MemberUse(var, path), ty, value }
    }

    pub fn cast(inner: ExprNode, to: TypeHandle, implicit: bool, target: &TargetConfig) -> Self {
        let value = eval_cast(inner.value, to.id(), target);
        ExprNode { kind: ExprKind::TypeCast(Box::new(inner), implicit), ty: to, value }
    }

    /// Coerces `inner` to `bool` (§4.1.3), used directly by the statement
    /// generator for `If` conditions and loop comparators.
    pub(crate) fn to_bool(inner: ExprNode, pool: &mut TypePool) -> Self {
        if inner.ty.id() == IntTypeId::Bool {
            return inner;
        }
        let bool_ty = pool.plain(IntTypeId::Bool);
        let value = eval_to_bool(inner.value);
        ExprNode { kind: ExprKind::TypeCast(Box::new(inner), true), ty: bool_ty, value }
    }

    fn promoted(operand: ExprNode, pool: &mut TypePool, target: &TargetConfig) -> Self {
        let promoted_id = operand.ty.id().promote();
        if promoted_id == operand.ty.id() {
            return operand;
        }
        let to = pool.plain(promoted_id);
        ExprNode::cast(operand, to, true, target)
    }

    /// Builds a unary expression, applying promotion/bool-conversion per
    /// §4.1.2/§4.1.3 before evaluating (§4.1.1). Never itself rewritten by
    /// the UB-eliminator (the caller decides whether to do that).
    pub fn unary(op: UnaryOp, arg: ExprNode, pool: &mut TypePool, target: &TargetConfig) -> Self {
        let arg = if op == UnaryOp::LogicalNot {
            ExprNode::to_bool(arg, pool)
        } else {
            ExprNode::promoted(arg, pool, target)
        };
        let value = eval_unary(op, arg.value, target);
        let ty = arg.ty;
        ExprNode { kind: ExprKind::Unary(op, Box::new(arg)), ty, value }
    }

    /// Builds a binary expression per §4.1.5's usual arithmetic
    /// conversions (shifts excepted: "do not perform step >= 2").
    pub fn binary(
        op: BinaryOp,
        lhs: ExprNode,
        rhs: ExprNode,
        pool: &mut TypePool,
        target: &TargetConfig,
    ) -> Self {
        if op.is_shift() {
            let l = ExprNode::promoted(lhs, pool, target);
            let r = ExprNode::promoted(rhs, pool, target);
            let value = eval_binary(op, l.value, r.value, target);
            let ty = l.ty;
            return ExprNode { kind: ExprKind::Binary(op, Box::new(l), Box::new(r)), ty, value };
        }
        if op.is_logical() {
            let l = ExprNode::to_bool(lhs, pool);
            let r = ExprNode::to_bool(rhs, pool);
            let value = eval_binary(op, l.value, r.value, target);
            let ty = pool.plain(IntTypeId::Bool);
            return ExprNode { kind: ExprKind::Binary(op, Box::new(l), Box::new(r)), ty, value };
        }

        let l = ExprNode::promoted(lhs, pool, target);
        let r = ExprNode::promoted(rhs, pool, target);
        let common = usual_arithmetic_conversion(l.ty.id(), r.ty.id(), target);
        let common_ty = pool.plain(common);
        let l = if l.ty.id() != common { ExprNode::cast(l, common_ty, true, target) } else { l };
        let r = if r.ty.id() != common { ExprNode::cast(r, common_ty, true, target) } else { r };
        let value = eval_binary(op, l.value, r.value, target);
        let ty = if op.is_relational_or_equality() { pool.plain(IntTypeId::Bool) } else { common_ty };
        ExprNode { kind: ExprKind::Binary(op, Box::new(l), Box::new(r)), ty, value }
    }

    /// Builds `target = source` (§3.5's `Assign`), inserting an implicit
    /// cast of `source` to `target`'s type. `taken` records whether the
    /// enclosing statement's effects are dynamically live; it does not
    /// gate type/value propagation, only whether the caller commits the
    /// written value back into the variable (§4.2).
    pub fn assign(
        target_expr: ExprNode,
        source: ExprNode,
        taken: bool,
        target_cfg: &TargetConfig,
    ) -> Self {
        let ty = target_expr.ty;
        let source = if source.ty.id() != ty.id() {
            ExprNode::cast(source, ty, true, target_cfg)
        } else {
            source
        };
        let value = source.value;
        ExprNode { kind: ExprKind::Assign(Box::new(target_expr), Box::new(source), taken), ty, value }
    }

    pub fn is_unary_or_binary(&self) -> bool {
        matches!(self.kind, ExprKind::Unary(..) | ExprKind::Binary(..))
    }
}

/// §4.1.5 usual arithmetic conversions, applied to two already-promoted
/// operand types.
pub fn usual_arithmetic_conversion(a: IntTypeId, b: IntTypeId, target: &TargetConfig) -> IntTypeId {
    if a == b {
        return a;
    }
    let (ra, rb) = (a.rank(target), b.rank(target));
    if a.is_signed() == b.is_signed() {
        return if ra >= rb { a } else { b };
    }
    let (signed, unsigned) = if a.is_signed() { (a, b) } else { (b, a) };
    if unsigned.rank(target) >= signed.rank(target) {
        return unsigned;
    }
    if can_represent(signed, unsigned, target) {
        return signed;
    }
    signed.to_unsigned()
}

/// Recursive expression generator (§4.5): `gen_expr(ctx, available, depth)`.
/// `available` is the pool of `(VarId, member path)` leaves the current
/// scope may read; every constructed `Unary`/`Binary` node is immediately
/// handed to the rewriter if it evaluates to UB.
pub fn gen_expr(
    state: &mut RunState,
    ctx: &Context,
    available: &[(VarId, Vec<usize>)],
    depth: u32,
) -> ExprNode {
    let at_max_depth = depth >= state.policy.max_arith_depth;
    let leaf_bias = (depth * state.policy.leaf_prob_bump_per_depth).min(80);

    let node_kind = if at_max_depth {
        crate::policy::ExprNodeKind::ConstLeaf
    } else if state.rng.flip(leaf_bias) {
        if state.rng.flip(state.policy.const_leaf_probability_pct) {
            crate::policy::ExprNodeKind::ConstLeaf
        } else {
            crate::policy::ExprNodeKind::VarLeaf
        }
    } else {
        *state.rng.pick(&state.policy.arith_node_distr)
    };

    match node_kind {
        crate::policy::ExprNodeKind::ConstLeaf => gen_const_leaf(state),
        crate::policy::ExprNodeKind::VarLeaf => gen_var_leaf(state, available),
        crate::policy::ExprNodeKind::Unary => {
            let arg = gen_expr(state, ctx, available, depth + 1);
            let op = *state.rng.pick(&state.policy.unary_op_distr);
            let node = ExprNode::unary(op, arg, &mut state.types, &state.target);
            crate::rewrite::rewrite_until_no_ub(state, node)
        }
        crate::policy::ExprNodeKind::Binary => {
            let lhs = gen_expr(state, ctx, available, depth + 1);
            let rhs = gen_expr(state, ctx, available, depth + 1);
            let op = *state.rng.pick(&state.policy.binary_op_distr);
            let node = ExprNode::binary(op, lhs, rhs, &mut state.types, &state.target);
            crate::rewrite::rewrite_until_no_ub(state, node)
        }
        crate::policy::ExprNodeKind::TypeCast => {
            let inner = gen_expr(state, ctx, available, depth + 1);
            let to_id = *state.rng.pick(&state.policy.int_type_distr);
            let to = state.types.plain(to_id);
            ExprNode::cast(inner, to, false, &state.target)
        }
    }
}

fn gen_const_leaf(state: &mut RunState) -> ExprNode {
    let ty_id = *state.rng.pick(&state.policy.int_type_distr);
    let ty = state.types.plain(ty_id);
    let value = crate::context::random_in_range(&mut state.rng, ty_id, &state.target);
    ExprNode::constant(value, ty)
}

fn gen_var_leaf(state: &mut RunState, available: &[(VarId, Vec<usize>)]) -> ExprNode {
    if available.is_empty() {
        return gen_const_leaf(state);
    }
    let idx = state.rng.uniform_u64(0, available.len() as u64 - 1) as usize;
    let (root, path) = available[idx].clone();
    leaf_for(state, root, path)
}

fn leaf_for(state: &RunState, root: VarId, path: Vec<usize>) -> ExprNode {
    let var = state.arena.get(root);
    let scalar = if path.is_empty() {
        var.as_scalar().expect("root leaf without path must be a Scalar")
    } else {
        var.resolve_member(&path).expect("leaf path must resolve to a Scalar member")
    };
    let ty = scalar.ty;
    let value = scalar.current;
    if path.is_empty() {
        ExprNode::var_use(root, ty, value)
    } else {
        ExprNode::member_use(root, path, ty, value)
    }
}

/// `RInit(out_var, inputs)` (§4.6): builds an expression guaranteed to
/// evaluate to `out_var`'s pre-chosen current value while still depending
/// on at least one input. Regenerates (not rewrites) the arithmetic
/// subtree until both the subtraction and the addition are UB-free.
pub fn gen_r_init(
    state: &mut RunState,
    ctx: &Context,
    available: &[(VarId, Vec<usize>)],
    out_ty: TypeHandle,
    out_value: EvalResult,
) -> ExprNode {
    if available.is_empty() {
        return ExprNode::constant(out_value, out_ty);
    }
    loop {
        let subtree = gen_expr(state, ctx, available, 0);
        let subtree = ExprNode::cast(subtree, out_ty, true, &state.target);
        let t_value = ExprNode::constant(subtree.value, out_ty);
        let diff =
            ExprNode::binary(BinaryOp::Sub, subtree, t_value, &mut state.types, &state.target);
        if diff.value.is_ub() {
            continue;
        }
        let out_const = ExprNode::constant(out_value, out_ty);
        let result =
            ExprNode::binary(BinaryOp::Add, diff, out_const, &mut state.types, &state.target);
        if result.value.is_ub() {
            continue;
        }
        debug_assert_eq!(result.value, out_value);
        return result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TargetConfig;

    #[test]
    fn uac_same_signedness_picks_higher_rank() {
        let target = TargetConfig::default();
        assert_eq!(
            usual_arithmetic_conversion(IntTypeId::Int, IntTypeId::Long, &target),
            IntTypeId::Long
        );
    }

    #[test]
    fn uac_unsigned_rank_ge_signed_wins() {
        let target = TargetConfig::default();
        assert_eq!(
            usual_arithmetic_conversion(IntTypeId::UInt, IntTypeId::Int, &target),
            IntTypeId::UInt
        );
    }

    #[test]
    fn uac_signed_can_represent_unsigned() {
        let target = TargetConfig::default();
        assert_eq!(
            usual_arithmetic_conversion(IntTypeId::Long, IntTypeId::UInt, &target),
            IntTypeId::Long
        );
    }

    #[test]
    fn assign_inserts_implicit_cast() {
        let mut pool = TypePool::new();
        let target = TargetConfig::default();
        let int_ty = pool.plain(IntTypeId::Int);
        let long_ty = pool.plain(IntTypeId::Long);
        let target_expr = ExprNode::constant(EvalResult::concrete(IntTypeId::Long, 0), long_ty);
        let source = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, 7), int_ty);
        let assign = ExprNode::assign(target_expr, source, true, &target);
        assert_eq!(assign.ty.id(), IntTypeId::Long);
        assert_eq!(assign.value, EvalResult::concrete(IntTypeId::Long, 7));
    }
}
