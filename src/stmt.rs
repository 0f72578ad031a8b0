//! Statement IR and the statement-level structural generator (C6,
//! §3.6, §4.4).

use tracing::trace;

use crate::context::{Context, RunState, ScalarTableKind};
use crate::expr::{gen_expr, ExprNode};
use crate::ops::BinaryOp;
use crate::policy::{AssignTargetKind, StmtKind, Weighted};
use crate::symtab::{ScalarVar, VarArena, VarId, Variable};
use crate::value::EvalResult;

/// A fixed small bound loop starting offsets are drawn from. The
/// distilled policy's `min_extern_array_size` concept has no counterpart
/// here: this data model has no `Array` variable kind (§3.3 only defines
/// `Scalar`/`Struct`), so loop starts are drawn from a small constant
/// range instead of an array-size-derived one (recorded as an Open
/// Question resolution).
const LOOP_START_BOUND: i64 = 8;

#[derive(Debug, Clone)]
pub enum Stmt {
    Decl { var: VarId, init: Option<ExprNode> },
    ExprStmt(ExprNode),
    Scope(Vec<Stmt>),
    If { cond: ExprNode, then_scope: Box<Stmt>, else_scope: Option<Box<Stmt>> },
    Loop { iter_var: VarId, start: ExprNode, end: ExprNode, step: i64, cmp: BinaryOp, body: Box<Stmt> },
}

fn scalar_at_mut<'a>(arena: &'a mut VarArena, id: VarId, path: &[usize]) -> &'a mut ScalarVar {
    let var = arena.get_mut(id);
    if path.is_empty() {
        var.as_scalar_mut().expect("assignment target must be a Scalar when path is empty")
    } else {
        var.resolve_member_mut(path).expect("member path must resolve to a Scalar")
    }
}

fn leaf_expr(state: &RunState, id: VarId, path: &[usize]) -> ExprNode {
    let var = state.arena.get(id);
    let scalar = if path.is_empty() {
        var.as_scalar().expect("leaf root must be a Scalar when path is empty")
    } else {
        var.resolve_member(path).expect("member path must resolve to a Scalar")
    };
    if path.is_empty() {
        ExprNode::var_use(id, scalar.ty, scalar.current)
    } else {
        ExprNode::member_use(id, path.to_vec(), scalar.ty, scalar.current)
    }
}

/// Generates the top-level function body: one fresh scope directly under
/// the empty top-level context (§2's "invokes C6 to generate a scope of
/// statements").
pub fn gen_top_level(state: &mut RunState) -> Vec<Stmt> {
    let mut ctx = Context::top_level().enter_scope();
    gen_block(state, &mut ctx)
}

/// Fills `ctx`'s already-entered scope with a policy-chosen number of
/// statements (§4.4: "For each slot in a scope ... pick a kind ...").
fn gen_block(state: &mut RunState, ctx: &mut Context) -> Vec<Stmt> {
    let count = state
        .rng
        .uniform(state.policy.scope_stmt_min as i64, state.policy.scope_stmt_max as i64)
        as usize;
    let mut stmts = Vec::with_capacity(count);
    for _ in 0..count {
        let allowed: Vec<Weighted<StmtKind>> = state
            .policy
            .stmt_kind_distr
            .iter()
            .filter(|w| match w.value {
                StmtKind::If => ctx.if_depth < state.policy.if_depth_limit,
                StmtKind::Loop => ctx.loop_depth < state.policy.loop_depth_limit,
                StmtKind::Decl | StmtKind::ExprStmt => true,
            })
            .cloned()
            .collect();
        let kind = if allowed.is_empty() {
            StmtKind::ExprStmt
        } else {
            *state.rng.pick(&allowed)
        };
        let stmt = match kind {
            StmtKind::Decl => gen_decl(state, ctx),
            StmtKind::ExprStmt => gen_expr_stmt(state, ctx),
            StmtKind::If => gen_if(state, ctx),
            StmtKind::Loop => gen_loop(state, ctx),
        };
        stmts.push(stmt);
    }
    trace!(count, if_depth = ctx.if_depth, loop_depth = ctx.loop_depth, "filled scope");
    stmts
}

/// `Decl`: a new local Scalar, initialized from an expression built over
/// the currently visible pool (§3.6, §4.4).
fn gen_decl(state: &mut RunState, ctx: &mut Context) -> Stmt {
    let int_ty = *state.rng.pick(&state.policy.int_type_distr);
    let ty = state.types.plain(int_ty);
    let available = state.visible_leaves(ctx);
    let init = gen_expr(state, ctx, &available, 0);
    let init = ExprNode::cast(init, ty, true, &state.target);
    let name = state.names.fresh_var();
    let id = state.arena.push(Variable::Scalar(ScalarVar::new(name.clone(), ty, init.value)));
    ctx.declare_local(id, &name);
    Stmt::Decl { var: id, init: Some(init) }
}

/// `ExprStmt`: assigns a generated RHS into either a fresh extern-output
/// variable or an existing extern-mixed one (§4.4).
fn gen_expr_stmt(state: &mut RunState, ctx: &Context) -> Stmt {
    let kind = *state.rng.pick(&state.policy.assign_target_distr);
    let mixed = state.mixed_var_ids();
    let target_id = match kind {
        AssignTargetKind::NewOutput => state.new_scalar(ScalarTableKind::Output),
        AssignTargetKind::ExistingMixed if !mixed.is_empty() => {
            let idx = state.rng.uniform_u64(0, mixed.len() as u64 - 1) as usize;
            mixed[idx]
        }
        AssignTargetKind::ExistingMixed => state.new_scalar(ScalarTableKind::Mixed),
    };

    let available = state.visible_leaves(ctx);
    let target_expr = leaf_expr(state, target_id, &[]);
    let rhs = gen_expr(state, ctx, &available, 0);
    let assign = ExprNode::assign(target_expr, rhs, ctx.taken, &state.target);

    if ctx.taken {
        scalar_at_mut(&mut state.arena, target_id, &[]).set_current(assign.value);
    }
    scalar_at_mut(&mut state.arena, target_id, &[]).written = true;

    Stmt::ExprStmt(assign)
}

/// `If`: condition is coerced to bool and evaluated at generation time;
/// both branches' `taken` flags fold in the evaluated condition (§4.4).
fn gen_if(state: &mut RunState, ctx: &Context) -> Stmt {
    let available = state.visible_leaves(ctx);
    let cond = gen_expr(state, ctx, &available, 0);
    let cond = ExprNode::to_bool(cond, &mut state.types);
    let cond_true = match cond.value {
        EvalResult::Concrete { raw, .. } => raw.as_unsigned() != 0,
        EvalResult::Undef { .. } => {
            unreachable!("condition expressions are always UB-free by construction")
        }
    };

    let mut then_ctx = ctx.enter_scope();
    then_ctx.if_depth += 1;
    then_ctx.taken = ctx.taken && cond_true;
    let then_stmts = gen_block(state, &mut then_ctx);

    let else_scope = if state.rng.flip(state.policy.else_branch_probability_pct) {
        let mut else_ctx = ctx.enter_scope();
        else_ctx.if_depth += 1;
        else_ctx.taken = ctx.taken && !cond_true;
        let else_stmts = gen_block(state, &mut else_ctx);
        Some(Box::new(Stmt::Scope(else_stmts)))
    } else {
        None
    };

    Stmt::If { cond, then_scope: Box::new(Stmt::Scope(then_stmts)), else_scope }
}

/// `Loop`: a counted loop whose iterator is bound to `start` for exactly
/// one representative generation-time iteration (§4.4). When `start ==
/// end` (zero logical iterations, §8.4 scenario S6) the body's `taken` is
/// forced false: its effects must not reach generation-time state.
fn gen_loop(state: &mut RunState, ctx: &Context) -> Stmt {
    let int_ty = *state.rng.pick(&state.policy.int_type_distr);
    let ty = state.types.plain(int_ty);

    let start_val = state.rng.uniform(0, LOOP_START_BOUND - 1);
    let mag_idx = state.rng.uniform_u64(0, state.policy.loop_step_magnitudes.len() as u64 - 1);
    let magnitude = state.policy.loop_step_magnitudes[mag_idx as usize];
    let step = if state.rng.flip(50) { magnitude } else { -magnitude };

    let n = state.rng.uniform(0, 3);
    let end_val = start_val + n * step;

    let cmp = if step > 0 {
        *state.rng.pick(&[
            Weighted::new(BinaryOp::Lt, 3),
            Weighted::new(BinaryOp::Le, 2),
            Weighted::new(BinaryOp::Ne, 1),
        ])
    } else {
        *state.rng.pick(&[
            Weighted::new(BinaryOp::Gt, 3),
            Weighted::new(BinaryOp::Ge, 2),
            Weighted::new(BinaryOp::Ne, 1),
        ])
    };

    let start_value = EvalResult::wrapped(int_ty, start_val as i128, &state.target);
    let end_value = EvalResult::wrapped(int_ty, end_val as i128, &state.target);
    let start_expr = ExprNode::constant(start_value, ty);
    let end_expr = ExprNode::constant(end_value, ty);

    let mut body_ctx = ctx.enter_scope();
    body_ctx.loop_depth += 1;
    body_ctx.taken = ctx.taken && n > 0;

    let iter_name = state.names.fresh_var();
    let iter_id = state.arena.push(Variable::Scalar(ScalarVar::new(iter_name.clone(), ty, start_value)));
    body_ctx.declare_local(iter_id, &iter_name);

    let body_stmts = gen_block(state, &mut body_ctx);

    Stmt::Loop {
        iter_var: iter_id,
        start: start_expr,
        end: end_expr,
        step,
        cmp,
        body: Box::new(Stmt::Scope(body_stmts)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::GenPolicy;
    use crate::types::TargetConfig;

    #[test]
    fn top_level_generation_terminates_and_populates_outputs() {
        let mut state = RunState::new(42, GenPolicy::default(), TargetConfig::default());
        for _ in 0..3 {
            state.new_scalar(ScalarTableKind::Input);
        }
        for _ in 0..2 {
            state.new_scalar(ScalarTableKind::Mixed);
        }
        let stmts = gen_top_level(&mut state);
        assert!(!stmts.is_empty());
    }

    #[test]
    fn not_taken_expr_stmt_leaves_current_value_unchanged() {
        let mut state = RunState::new(7, GenPolicy::default(), TargetConfig::default());
        let mixed = state.new_scalar(ScalarTableKind::Mixed);
        let before = state.arena.get(mixed).as_scalar().unwrap().current;
        let mut ctx = Context::top_level().enter_scope();
        ctx.taken = false;
        let _ = gen_expr_stmt(&mut state, &ctx);
        let after = state.arena.get(mixed).as_scalar().unwrap().current;
        assert_eq!(before, after, "an untaken assignment must not update current value");
    }

    #[test]
    fn decl_registers_the_new_variable_in_the_local_scope() {
        let mut state = RunState::new(3, GenPolicy::default(), TargetConfig::default());
        let mut ctx = Context::top_level().enter_scope();
        let before = ctx.locals.last().unwrap().len();
        let _ = gen_decl(&mut state, &mut ctx);
        let after = ctx.locals.last().unwrap().len();
        assert_eq!(after, before + 1);
    }
}
