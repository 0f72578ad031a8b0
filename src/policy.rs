//! Generation policy and RNG (C2).
//!
//! `GenPolicy` is pure configuration — distributions over type/operator
//! choices, tree depths, statement kinds, loop shapes — grounded on
//! `original_source/src/gen_policy.h`'s field list. It is `serde`
//! (de)serializable so it can round-trip through the TOML config layer
//! (C9, `config.rs`), the way `LintConfig` does for `lints.toml`.
//!
//! The RNG itself is a thin wrapper around `rand_chacha::ChaCha8Rng`
//! (seeded deterministically, per the Design Notes' "Global mutable RNG":
//! threaded explicitly through every generator call, never a `thread_local!`
//! or process global) offering `uniform` and weighted `pick`, mirroring the
//! original's `rand_val_gen.h` surface.

use rand::{Rng as _, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::types::IntTypeId;

/// A weighted alternative, mirroring `original_source/src/gen_policy.h`'s
/// `Probability<T>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weighted<T> {
    pub value: T,
    pub weight: u32,
}

impl<T> Weighted<T> {
    pub fn new(value: T, weight: u32) -> Self {
        Weighted { value, weight }
    }
}

/// Deterministic RNG wrapper. `uniform` and `pick` are the only primitives
/// the rest of the generator may use — per §5's determinism invariant,
/// every random choice must go through this single entry point in a fixed
/// call sequence.
pub struct Rng {
    inner: ChaCha8Rng,
}

impl Rng {
    pub fn seeded(seed: u64) -> Self {
        Rng { inner: ChaCha8Rng::seed_from_u64(seed) }
    }

    /// Inclusive uniform integer in `[lo, hi]`.
    pub fn uniform(&mut self, lo: i64, hi: i64) -> i64 {
        assert!(lo <= hi, "uniform range must be non-empty");
        self.inner.gen_range(lo..=hi)
    }

    pub fn uniform_u64(&mut self, lo: u64, hi: u64) -> u64 {
        assert!(lo <= hi, "uniform range must be non-empty");
        self.inner.gen_range(lo..=hi)
    }

    pub fn flip(&mut self, prob_true_pct: u32) -> bool {
        self.inner.gen_range(0..100) < prob_true_pct
    }

    /// Weighted choice among `items`. Panics on an empty or all-zero-weight
    /// list — that is a policy-construction bug, not a runtime condition.
    pub fn pick<'a, T>(&mut self, items: &'a [Weighted<T>]) -> &'a T {
        let total: u64 = items.iter().map(|w| w.weight as u64).sum();
        assert!(total > 0, "pick() requires at least one positive-weight alternative");
        let mut roll = self.uniform_u64(0, total - 1);
        for item in items {
            if roll < item.weight as u64 {
                return &item.value;
            }
            roll -= item.weight as u64;
        }
        unreachable!("weighted roll exceeded total weight")
    }
}

/// Per-slot statement kinds a scope generator chooses among (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StmtKind {
    Decl,
    ExprStmt,
    If,
    Loop,
}

/// Where an `ExprStmt`'s assignment target comes from (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignTargetKind {
    NewOutput,
    ExistingMixed,
}

/// Kinds of nodes the expression generator may emit at a given depth
/// (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExprNodeKind {
    ConstLeaf,
    VarLeaf,
    Unary,
    Binary,
    TypeCast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenPolicy {
    // ---- Scope / statement shape (§4.4) ----
    pub scope_stmt_min: usize,
    pub scope_stmt_max: usize,
    pub stmt_kind_distr: Vec<Weighted<StmtKind>>,
    pub assign_target_distr: Vec<Weighted<AssignTargetKind>>,

    // ---- If/else (§4.4) ----
    pub if_depth_limit: u32,
    pub else_branch_probability_pct: u32,

    // ---- Loops (§4.4) ----
    pub loop_depth_limit: u32,
    pub loop_seq_num_limit: usize,
    pub loop_step_magnitudes: Vec<i64>,

    // ---- Expression generation (§4.5) ----
    pub max_arith_depth: u32,
    pub leaf_prob_bump_per_depth: u32,
    pub const_leaf_probability_pct: u32,
    pub arith_node_distr: Vec<Weighted<ExprNodeKind>>,
    pub unary_op_distr: Vec<Weighted<crate::ops::UnaryOp>>,
    pub binary_op_distr: Vec<Weighted<crate::ops::BinaryOp>>,
    pub int_type_distr: Vec<Weighted<IntTypeId>>,

    // ---- Population (§2 flow) ----
    pub min_input_vars: usize,
    pub max_input_vars: usize,
    pub min_mixed_vars: usize,
    pub max_mixed_vars: usize,
    pub min_output_vars: usize,
    pub max_output_vars: usize,
    pub struct_probability_pct: u32,
    pub max_struct_members: usize,
}

impl Default for GenPolicy {
    fn default() -> Self {
        use crate::ops::{BinaryOp, UnaryOp};

        GenPolicy {
            scope_stmt_min: 3,
            scope_stmt_max: 10,
            stmt_kind_distr: vec![
                Weighted::new(StmtKind::Decl, 20),
                Weighted::new(StmtKind::ExprStmt, 50),
                Weighted::new(StmtKind::If, 20),
                Weighted::new(StmtKind::Loop, 10),
            ],
            assign_target_distr: vec![
                Weighted::new(AssignTargetKind::NewOutput, 40),
                Weighted::new(AssignTargetKind::ExistingMixed, 60),
            ],

            if_depth_limit: 3,
            else_branch_probability_pct: 60,

            loop_depth_limit: 2,
            loop_seq_num_limit: 3,
            loop_step_magnitudes: vec![1, 2, 3, 4, 8],

            max_arith_depth: 5,
            leaf_prob_bump_per_depth: 15,
            const_leaf_probability_pct: 35,
            arith_node_distr: vec![
                Weighted::new(ExprNodeKind::ConstLeaf, 20),
                Weighted::new(ExprNodeKind::VarLeaf, 25),
                Weighted::new(ExprNodeKind::Unary, 15),
                Weighted::new(ExprNodeKind::Binary, 35),
                Weighted::new(ExprNodeKind::TypeCast, 5),
            ],
            // Inc/dec are deliberately absent here: the expression generator
            // applies a chosen unary op to an arbitrary, recursively-built
            // operand that is almost never an lvalue, and `++`/`--` only
            // compile against one. `UnaryOp` keeps the four variants (and
            // `eval_unary`/`rewrite_unary_op` still know how to evaluate and
            // rewrite them) for whenever an lvalue-aware call site grows one.
            unary_op_distr: vec![
                Weighted::new(UnaryOp::Plus, 10),
                Weighted::new(UnaryOp::Negate, 20),
                Weighted::new(UnaryOp::BitNot, 20),
                Weighted::new(UnaryOp::LogicalNot, 10),
            ],
            binary_op_distr: vec![
                Weighted::new(BinaryOp::Add, 14),
                Weighted::new(BinaryOp::Sub, 14),
                Weighted::new(BinaryOp::Mul, 10),
                Weighted::new(BinaryOp::Div, 6),
                Weighted::new(BinaryOp::Mod, 6),
                Weighted::new(BinaryOp::Shl, 5),
                Weighted::new(BinaryOp::Shr, 5),
                Weighted::new(BinaryOp::Lt, 6),
                Weighted::new(BinaryOp::Gt, 6),
                Weighted::new(BinaryOp::Le, 4),
                Weighted::new(BinaryOp::Ge, 4),
                Weighted::new(BinaryOp::Eq, 4),
                Weighted::new(BinaryOp::Ne, 4),
                Weighted::new(BinaryOp::BitAnd, 4),
                Weighted::new(BinaryOp::BitOr, 4),
                Weighted::new(BinaryOp::BitXor, 4),
            ],
            int_type_distr: IntTypeId::ALL.iter().map(|t| Weighted::new(*t, 10)).collect(),

            min_input_vars: 2,
            max_input_vars: 6,
            min_mixed_vars: 1,
            max_mixed_vars: 4,
            min_output_vars: 1,
            max_output_vars: 4,
            struct_probability_pct: 20,
            max_struct_members: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_sequence() {
        let mut a = Rng::seeded(42);
        let mut b = Rng::seeded(42);
        let seq_a: Vec<i64> = (0..50).map(|_| a.uniform(0, 1_000_000)).collect();
        let seq_b: Vec<i64> = (0..50).map(|_| b.uniform(0, 1_000_000)).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn different_seeds_usually_diverge() {
        let mut a = Rng::seeded(1);
        let mut b = Rng::seeded(2);
        let seq_a: Vec<i64> = (0..20).map(|_| a.uniform(0, 1_000_000)).collect();
        let seq_b: Vec<i64> = (0..20).map(|_| b.uniform(0, 1_000_000)).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn pick_respects_zero_weight_exclusion() {
        let mut rng = Rng::seeded(7);
        let items = vec![Weighted::new("a", 1), Weighted::new("b", 0)];
        for _ in 0..50 {
            assert_eq!(*rng.pick(&items), "a");
        }
    }

    #[test]
    fn default_policy_round_trips_through_toml() {
        let policy = GenPolicy::default();
        let text = toml::to_string(&policy).expect("serialize");
        let back: GenPolicy = toml::from_str(&text).expect("deserialize");
        assert_eq!(back.scope_stmt_min, policy.scope_stmt_min);
        assert_eq!(back.binary_op_distr.len(), policy.binary_op_distr.len());
    }
}
