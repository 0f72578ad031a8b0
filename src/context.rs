//! Symbol tables, generation context, and the single per-run mutable
//! state bundle (C3, §3.4, §3.6, §3.7).
//!
//! Per the Design Notes' "Global mutable RNG" and "Variable identity"
//! entries, the truly process-wide, singly-owned pieces (type pool,
//! variable arena, name generator, RNG, policy, target, and the three
//! top-level symbol tables) live in one `RunState` that every generator
//! function borrows `&mut`. `Context` is the cheap, per-branch part: the
//! local scope chain plus `if`/`loop` depth and `taken`, cloned whenever
//! generation forks (an `if`'s two branches, a loop body).

use crate::policy::{GenPolicy, Rng};
use crate::symtab::{ScalarVar, StructVar, SymbolTable, VarArena, VarId, Variable};
use crate::types::{IntTypeId, TargetConfig, TypePool};
use crate::value::EvalResult;

/// Everything singly-owned for the lifetime of one generation run.
pub struct RunState {
    pub types: TypePool,
    pub arena: VarArena,
    pub names: crate::symtab::NameGen,
    pub rng: Rng,
    pub policy: GenPolicy,
    pub target: TargetConfig,
    pub extern_input: SymbolTable,
    pub extern_mixed: SymbolTable,
    pub extern_output: SymbolTable,
}

impl RunState {
    pub fn new(seed: u64, policy: GenPolicy, target: TargetConfig) -> Self {
        RunState {
            types: TypePool::new(),
            arena: VarArena::new(),
            names: crate::symtab::NameGen::new(),
            rng: Rng::seeded(seed),
            policy,
            target,
            extern_input: SymbolTable::new(),
            extern_mixed: SymbolTable::new(),
            extern_output: SymbolTable::new(),
        }
    }

    /// Declares a fresh Scalar of a policy-chosen type and in-range value,
    /// registers it in `table`, and returns its id.
    pub fn new_scalar(&mut self, table: ScalarTableKind) -> VarId {
        let int_ty = *self.rng.pick(&self.policy.int_type_distr);
        let ty = self.types.plain(int_ty);
        let initial = random_in_range(&mut self.rng, int_ty, &self.target);
        let name = self.names.fresh_var();
        let id = self.arena.push(Variable::Scalar(ScalarVar::new(name.clone(), ty, initial)));
        self.table_mut(table).insert(id, &name);
        id
    }

    /// Declares a fresh Struct with `member_count` Scalar members, per
    /// §3.3's "recursive aggregate of ordered named members". The
    /// `StructType` (tag name) and the instance (variable name) are
    /// dispensed from separate counters.
    pub fn new_struct(&mut self, table: ScalarTableKind, member_count: usize) -> VarId {
        let mut members = Vec::with_capacity(member_count);
        for _ in 0..member_count {
            let int_ty = *self.rng.pick(&self.policy.int_type_distr);
            let ty = self.types.plain(int_ty);
            let initial = random_in_range(&mut self.rng, int_ty, &self.target);
            let member_name = self.names.fresh_member();
            members.push(Variable::Scalar(ScalarVar::new(member_name, ty, initial)));
        }
        let type_name = self.names.fresh_struct_type();
        let name = self.names.fresh_var();
        let id = self.arena.push(Variable::Struct(StructVar { name: name.clone(), type_name, members }));
        self.table_mut(table).insert(id, &name);
        id
    }

    fn table_mut(&mut self, kind: ScalarTableKind) -> &mut SymbolTable {
        match kind {
            ScalarTableKind::Input => &mut self.extern_input,
            ScalarTableKind::Mixed => &mut self.extern_mixed,
            ScalarTableKind::Output => &mut self.extern_output,
        }
    }

    /// Every `(VarId, member path)` pair currently visible: extern-input,
    /// extern-mixed, then every local scope outward-to-inward (§4.4's
    /// "visible-expressions pool"). A struct contributes one leaf entry
    /// per scalar member, recursively.
    pub fn visible_leaves(&self, ctx: &Context) -> Vec<(VarId, Vec<usize>)> {
        let mut out = Vec::new();
        for id in self.extern_input.iter() {
            collect_leaves(&self.arena, id, &mut out);
        }
        for id in self.extern_mixed.iter() {
            collect_leaves(&self.arena, id, &mut out);
        }
        for scope in &ctx.locals {
            for id in scope.iter() {
                collect_leaves(&self.arena, id, &mut out);
            }
        }
        out
    }

    /// Mixed and output variables still eligible as an `ExprStmt`'s
    /// assignment target pool (§4.4).
    pub fn mixed_var_ids(&self) -> Vec<VarId> {
        self.extern_mixed.iter().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarTableKind {
    Input,
    Mixed,
    Output,
}

fn collect_leaves(arena: &VarArena, root: VarId, out: &mut Vec<(VarId, Vec<usize>)>) {
    fn walk(var: &Variable, root: VarId, path: Vec<usize>, out: &mut Vec<(VarId, Vec<usize>)>) {
        match var {
            Variable::Scalar(_) => out.push((root, path)),
            Variable::Struct(s) => {
                for (idx, member) in s.members.iter().enumerate() {
                    let mut p = path.clone();
                    p.push(idx);
                    walk(member, root, p, out);
                }
            }
        }
    }
    walk(arena.get(root), root, Vec::new(), out);
}

/// A value uniformly chosen within `ty`'s representable range (§4.5's
/// `Const` leaf, §3.1's min/max).
pub fn random_in_range(rng: &mut Rng, ty: IntTypeId, target: &TargetConfig) -> EvalResult {
    let (min, max) = ty.min_max(target);
    let to_i128 = |a: crate::types::AbsValue| {
        if a.negative {
            -(a.value as i128)
        } else {
            a.value as i128
        }
    };
    let lo = to_i128(min);
    let hi = to_i128(max);
    let span = (hi - lo) as u128;
    let offset = if span == 0 {
        0
    } else if span <= u64::MAX as u128 {
        rng.uniform_u64(0, span as u64) as u128
    } else {
        // Representable only for full-width unsigned 64-bit types; sample
        // the low 64 bits uniformly, which covers the whole range.
        rng.uniform_u64(0, u64::MAX) as u128
    };
    let raw = lo + offset as i128;
    EvalResult::wrapped(ty, raw, target)
}

/// The per-branch generation context (§2's "context threads ... loop/if
/// depth, and a `taken` flag"). Cheap to clone: local scopes hold only
/// `VarId`s, never `Variable` data.
#[derive(Debug, Clone)]
pub struct Context {
    pub locals: Vec<SymbolTable>,
    pub if_depth: u32,
    pub loop_depth: u32,
    pub taken: bool,
}

impl Context {
    pub fn top_level() -> Self {
        Context { locals: Vec::new(), if_depth: 0, loop_depth: 0, taken: true }
    }

    /// A new nested scope (e.g. entering a `Scope`/`If`-branch/`Loop` body).
    pub fn enter_scope(&self) -> Context {
        let mut c = self.clone();
        c.locals.push(SymbolTable::new());
        c
    }

    pub fn with_taken(&self, taken: bool) -> Context {
        let mut c = self.clone();
        c.taken = taken;
        c
    }

    pub fn declare_local(&mut self, id: VarId, name: &str) {
        self.locals
            .last_mut()
            .expect("declare_local called outside any scope")
            .insert(id, name);
    }
}
