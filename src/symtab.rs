//! Variables, arena-allocated storage, and symbol tables (C3, §3.3–§3.4).
//!
//! Per the Design Notes ("Variable identity"), we replace the original's
//! shared-ownership variables with arena-allocated storage: a `VarArena`
//! owns every top-level `Variable`, and handles (`VarId`) are stable,
//! `Copy` indices into it. `VarUse`/`MemberUse` in the expression IR
//! (`expr.rs`) hold such handles rather than pointers, so cloning a
//! `Context`'s scope chain (one per `if`/`loop` branch, per §3.6) never
//! duplicates variable storage.

use std::collections::HashSet;

use crate::types::TypeHandle;
use crate::value::EvalResult;

/// Stable handle to a top-level variable owned by the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub usize);

/// A scalar variable (§3.3): a named, typed value with separate initial,
/// current, and observed min/max, plus a write-tracking flag used by
/// name-analysis (§4.2's `Assign.propagate_value` note).
#[derive(Debug, Clone)]
pub struct ScalarVar {
    pub name: String,
    pub ty: TypeHandle,
    pub initial: EvalResult,
    pub current: EvalResult,
    pub observed_min: EvalResult,
    pub observed_max: EvalResult,
    pub written: bool,
}

impl ScalarVar {
    pub fn new(name: String, ty: TypeHandle, initial: EvalResult) -> Self {
        ScalarVar {
            name,
            ty,
            initial,
            current: initial,
            observed_min: initial,
            observed_max: initial,
            written: false,
        }
    }

    /// Record a freshly-computed current value, updating the observed
    /// range (used by the emitter only for documentation; not load-bearing
    /// for correctness, but mirrors the original's range tracking used to
    /// pick safe loop bounds).
    pub fn set_current(&mut self, value: EvalResult) {
        self.current = value;
        if let (EvalResult::Concrete { raw: cur, .. }, EvalResult::Concrete { raw: lo, .. }) =
            (value, self.observed_min)
        {
            if signed_or_unsigned_lt(value, self.ty.is_signed(), cur, lo) {
                self.observed_min = value;
            }
        }
        if let (EvalResult::Concrete { raw: cur, .. }, EvalResult::Concrete { raw: hi, .. }) =
            (value, self.observed_max)
        {
            if signed_or_unsigned_lt(self.observed_max, self.ty.is_signed(), hi, cur) {
                self.observed_max = value;
            }
        }
    }
}

fn signed_or_unsigned_lt(
    _tag: EvalResult,
    is_signed: bool,
    a: crate::value::RawBits,
    b: crate::value::RawBits,
) -> bool {
    if is_signed {
        a.as_signed() < b.as_signed()
    } else {
        a.as_unsigned() < b.as_unsigned()
    }
}

/// A struct variable (§3.3): a recursive aggregate of ordered named
/// members, each itself a `Scalar` or nested `Struct`. Layout (member
/// count/types) never changes after construction — only member *values*
/// mutate during generation.
#[derive(Debug, Clone)]
pub struct StructVar {
    pub name: String,
    /// Name of the `StructType` this instance belongs to (§3.3): distinct
    /// from `name`, the instance's own identifier, since two instances of
    /// the same struct type are possible in principle even though the
    /// current generator only ever instantiates one per type.
    pub type_name: String,
    pub members: Vec<Variable>,
}

#[derive(Debug, Clone)]
pub enum Variable {
    Scalar(ScalarVar),
    Struct(StructVar),
}

impl Variable {
    pub fn name(&self) -> &str {
        match self {
            Variable::Scalar(s) => &s.name,
            Variable::Struct(s) => &s.name,
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarVar> {
        match self {
            Variable::Scalar(s) => Some(s),
            Variable::Struct(_) => None,
        }
    }

    pub fn as_scalar_mut(&mut self) -> Option<&mut ScalarVar> {
        match self {
            Variable::Scalar(s) => Some(s),
            Variable::Struct(_) => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructVar> {
        match self {
            Variable::Struct(s) => Some(s),
            Variable::Scalar(_) => None,
        }
    }

    /// Walk a member path (§3.5's `MemberUse(parent, idx)`, flattened to a
    /// path from the arena root), returning the leaf `ScalarVar` if the
    /// path fully resolves through `Struct` members.
    pub fn resolve_member<'a>(&'a self, path: &[usize]) -> Option<&'a ScalarVar> {
        let mut cur = self;
        for &idx in path {
            let s = cur.as_struct()?;
            cur = s.members.get(idx)?;
        }
        cur.as_scalar()
    }

    pub fn resolve_member_mut<'a>(&'a mut self, path: &[usize]) -> Option<&'a mut ScalarVar> {
        let mut cur = self;
        for &idx in path {
            cur = match cur {
                Variable::Struct(s) => s.members.get_mut(idx)?,
                Variable::Scalar(_) => return None,
            };
        }
        cur.as_scalar_mut()
    }
}

/// Process-wide (per-run) arena owning every top-level variable (§9's
/// "arena-allocated storage"; lifetime bounded by the top-level context,
/// i.e. for the whole run).
#[derive(Debug, Default)]
pub struct VarArena {
    vars: Vec<Variable>,
}

impl VarArena {
    pub fn new() -> Self {
        VarArena { vars: Vec::new() }
    }

    pub fn push(&mut self, var: Variable) -> VarId {
        self.vars.push(var);
        VarId(self.vars.len() - 1)
    }

    pub fn get(&self, id: VarId) -> &Variable {
        &self.vars[id.0]
    }

    pub fn get_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.0]
    }
}

/// Monotonic fresh-name dispenser (§3.4): `var_N`, `arr_N`, `struct_N`,
/// `member_N`, each counted independently so names stay stable regardless
/// of generation order across categories.
#[derive(Debug, Default)]
pub struct NameGen {
    next_var: u64,
    next_struct: u64,
    next_member: u64,
}

impl NameGen {
    pub fn new() -> Self {
        NameGen::default()
    }

    pub fn fresh_var(&mut self) -> String {
        let n = self.next_var;
        self.next_var += 1;
        format!("var_{}", n)
    }

    pub fn fresh_struct_type(&mut self) -> String {
        let n = self.next_struct;
        self.next_struct += 1;
        format!("struct_{}", n)
    }

    pub fn fresh_member(&mut self) -> String {
        let n = self.next_member;
        self.next_member += 1;
        format!("member_{}", n)
    }
}

/// An ordered, name-unique list of variables (§3.4). The four top-level
/// tables (extern_input/mixed/output) and every local scope's table are
/// each one of these.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    names: HashSet<String>,
    order: Vec<VarId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Registers `id`, whose arena-stored name must be unique within this
    /// table (§3.4, §8.1 property 6). Panics on collision: the name
    /// generator guarantees freshness, so a collision is a generator bug.
    pub fn insert(&mut self, id: VarId, name: &str) {
        assert!(
            self.names.insert(name.to_string()),
            "duplicate variable name '{}' in symbol table",
            name
        );
        self.order.push(id);
    }

    pub fn iter(&self) -> impl Iterator<Item = VarId> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
