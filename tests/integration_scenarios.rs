//! End-to-end scenario tests (C12), hand-constructing the IR shapes named
//! in the concrete scenarios rather than searching for seeds that happen
//! to reach them — the generator's RNG sequence is this crate's own, not
//! the original `yarpgen`'s, so only the *shape* of each scenario, not a
//! specific seed, is portable across implementations.

use ubgen::checksum::Checksum;
use ubgen::context::{RunState, ScalarTableKind};
use ubgen::expr::{ExprKind, ExprNode};
use ubgen::ops::{BinaryOp, UnaryOp};
use ubgen::policy::GenPolicy;
use ubgen::rewrite::rewrite_until_no_ub;
use ubgen::stmt::Stmt;
use ubgen::symtab::{ScalarVar, StructVar, Variable};
use ubgen::types::{IntTypeId, TargetConfig};
use ubgen::value::EvalResult;
use ubgen::{emit, generate};

fn fresh_state() -> RunState {
    RunState::new(1, GenPolicy::default(), TargetConfig::default())
}

/// S1: a single `out_0 = const;` statement; the checksum over the extern
/// output pool must equal hashing that constant directly.
#[test]
fn scenario_zero_inputs_checksum_matches_the_constant() {
    let mut state = fresh_state();
    let out_id = state.new_scalar(ScalarTableKind::Output);
    let int_ty = state.types.plain(IntTypeId::Int);
    let const_value = EvalResult::concrete(IntTypeId::Int, 42);
    let constant = ExprNode::constant(const_value, int_ty);

    let out_scalar = state.arena.get(out_id).as_scalar().unwrap();
    let target_expr = ExprNode::var_use(out_id, out_scalar.ty, out_scalar.current);
    let assign = ExprNode::assign(target_expr, constant, true, &state.target);
    state.arena.get_mut(out_id).as_scalar_mut().unwrap().set_current(assign.value);

    let mut via_var = Checksum::new();
    via_var.update_var(&state.arena, out_id);
    let mut direct = Checksum::new();
    direct.update_value(assign.value);
    assert_eq!(via_var.seed(), direct.seed());

    let files = emit::emit_program(&state, &[Stmt::ExprStmt(assign)]);
    assert!(files.func_cpp.contains("= 42"));
}

/// S2: `int a = 7; int b = 0;` — `a / b` must be rewritten away from `/`.
#[test]
fn scenario_division_by_induced_zero_is_rewritten() {
    let mut state = fresh_state();
    let int_ty = state.types.plain(IntTypeId::Int);
    let a_id = state
        .arena
        .push(Variable::Scalar(ScalarVar::new("a".to_string(), int_ty, EvalResult::concrete(IntTypeId::Int, 7))));
    let b_id = state
        .arena
        .push(Variable::Scalar(ScalarVar::new("b".to_string(), int_ty, EvalResult::concrete(IntTypeId::Int, 0))));

    let a_expr = ExprNode::var_use(a_id, int_ty, EvalResult::concrete(IntTypeId::Int, 7));
    let b_expr = ExprNode::var_use(b_id, int_ty, EvalResult::concrete(IntTypeId::Int, 0));
    let node = ExprNode::binary(BinaryOp::Div, a_expr, b_expr, &mut state.types, &state.target);
    assert!(node.value.is_ub());

    let fixed = rewrite_until_no_ub(&mut state, node);
    assert!(!fixed.value.is_ub());
    match &fixed.kind {
        ExprKind::Binary(op, ..) => assert!(matches!(op, BinaryOp::Mul | BinaryOp::Sub)),
        _ => panic!("expected a rewritten Binary node"),
    }

    let files = emit::emit_program(&state, &[Stmt::ExprStmt(fixed)]);
    assert!(!files.func_cpp.contains(") / ("), "no division should survive between a and b");
}

/// S3: `int a = 1;` then `a << 64` — the rewriter must keep the original
/// `64` rhs as an operand, wrapping it in `Binary(Sub, 64, k)` rather than
/// discarding it for a fresh constant, and the resulting shift amount
/// (`64 - k`) must land in int's valid shift range.
#[test]
fn scenario_shift_by_too_large_constant_is_rewritten_in_range() {
    let mut state = fresh_state();
    let int_ty = state.types.plain(IntTypeId::Int);
    let a = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, 1), int_ty);
    let sixty_four = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, 64), int_ty);
    let node = ExprNode::binary(BinaryOp::Shl, a, sixty_four, &mut state.types, &state.target);
    assert!(node.value.is_ub());

    let fixed = rewrite_until_no_ub(&mut state, node);
    assert!(!fixed.value.is_ub());
    assert_eq!(fixed.ty.id(), IntTypeId::Int);

    let rhs = match &fixed.kind {
        ExprKind::Binary(BinaryOp::Shl, _, rhs) => rhs,
        other => panic!("expected a Shl node, found {other:?}"),
    };
    match &rhs.kind {
        ExprKind::Binary(BinaryOp::Sub, inner_lhs, inner_rhs) => {
            assert_eq!(inner_lhs.value, EvalResult::concrete(IntTypeId::Int, 64), "original rhs must survive as the Sub's lhs, not be discarded");
            let k = match inner_rhs.value {
                EvalResult::Concrete { raw, .. } => raw.as_signed() as i64,
                EvalResult::Undef { .. } => panic!("k must be a concrete constant"),
            };
            let rewritten_amount = 64 - k;
            assert!(
                (0..32).contains(&rewritten_amount),
                "rewritten shift amount must be representable, got {rewritten_amount}"
            );
        }
        other => panic!("expected rhs to be rewritten into a Sub over the original rhs, found {other:?}"),
    }
}

/// S5: `struct S { int m0; long m1; }; s.m1 = (long)(~((signed char)100));`
#[test]
fn scenario_struct_member_assignment_computes_minus_101() {
    let mut state = fresh_state();
    let int_ty = state.types.plain(IntTypeId::Int);
    let long_ty = state.types.plain(IntTypeId::Long);
    let schar_ty = state.types.plain(IntTypeId::SChar);

    let m0 = Variable::Scalar(ScalarVar::new("m0".to_string(), int_ty, EvalResult::concrete(IntTypeId::Int, 0)));
    let m1 = Variable::Scalar(ScalarVar::new("m1".to_string(), long_ty, EvalResult::concrete(IntTypeId::Long, 0)));
    let s_id = state.arena.push(Variable::Struct(StructVar {
        name: "s".to_string(),
        type_name: "struct_0".to_string(),
        members: vec![m0, m1],
    }));

    let hundred = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, 100), int_ty);
    let narrowed = ExprNode::cast(hundred, schar_ty, false, &state.target);
    let flipped = ExprNode::unary(UnaryOp::BitNot, narrowed, &mut state.types, &state.target);
    let widened = ExprNode::cast(flipped, long_ty, false, &state.target);

    let target_expr = ExprNode::member_use(s_id, vec![1], long_ty, EvalResult::concrete(IntTypeId::Long, 0));
    let assign = ExprNode::assign(target_expr, widened, true, &state.target);
    assert_eq!(assign.value, EvalResult::concrete(IntTypeId::Long, -101));

    state.arena.get_mut(s_id).resolve_member_mut(&[1]).unwrap().set_current(assign.value);

    let mut direct = Checksum::new();
    direct.update_value(assign.value);
    let member_current = state.arena.get(s_id).resolve_member(&[1]).unwrap().current;
    let mut via_member = Checksum::new();
    via_member.update_value(member_current);
    assert_eq!(direct.seed(), via_member.seed());

    let files = emit::emit_program(&state, &[Stmt::ExprStmt(assign)]);
    assert!(files.func_cpp.contains("s.m1 = "));
}

/// S4 (an untaken `then` branch never mutates current values) and S6 (a
/// zero-iteration loop body never mutates current values) both reduce, in
/// this generator, to the private `gen_expr_stmt` only committing its
/// computed value into a variable's `current` when `ctx.taken` is true —
/// `gen_if`/`gen_loop` compute their body's `taken` as `ctx.taken && ...`
/// before recursing into it, and that commit gate is exercised directly by
/// `stmt.rs`'s own `not_taken_expr_stmt_leaves_current_value_unchanged`
/// unit test (this crate cannot call a private function from here). What
/// is checked at this, public, layer is the piece `gen_expr_stmt` relies
/// on: `ExprNode::assign` always computes a value from its operands
/// regardless of `taken` — `taken` is carried on the node for emission
/// only, never gates propagation — which is what lets the generator defer
/// the "commit or not" decision to the caller in the first place.
#[test]
fn assign_value_propagation_does_not_depend_on_taken() {
    let mut state = fresh_state();
    let int_ty = state.types.plain(IntTypeId::Int);
    let target_expr = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, 0), int_ty);
    let source = ExprNode::constant(EvalResult::concrete(IntTypeId::Int, 5), int_ty);

    let taken = ExprNode::assign(target_expr.clone(), source.clone(), true, &state.target);
    let not_taken = ExprNode::assign(target_expr, source, false, &state.target);
    assert_eq!(taken.value, not_taken.value);
}

#[test]
fn full_pipeline_is_deterministic_and_writes_six_files() {
    let a = generate(2024, GenPolicy::default(), TargetConfig::default()).unwrap();
    let b = generate(2024, GenPolicy::default(), TargetConfig::default()).unwrap();
    assert_eq!(a.checksum, b.checksum);

    let dir = tempfile::tempdir().expect("tempdir");
    for (name, contents) in a.files.files() {
        std::fs::write(dir.path().join(name), contents).expect("write output file");
    }
    for (name, _) in a.files.files() {
        assert!(dir.path().join(name).exists());
    }
}
