//! `ubgen`: a generator of self-checking, UB-free C/C++ test programs for
//! compiler fuzzing.
//!
//! The pipeline mirrors a `compile_file_with_config`-style driver: seed a
//! single mutable run state (C2/C3), populate the external variable pools,
//! drive the statement generator (C6, itself driving the expression
//! generator C4 and the UB-eliminating rewriter C5), fold the resulting
//! external state into a checksum (C4.7), and hand the whole tree to the
//! textual emitter (C7).

pub mod checksum;
pub mod config;
pub mod context;
pub mod emit;
pub mod error;
pub mod expr;
pub mod ops;
pub mod policy;
pub mod rewrite;
pub mod stmt;
pub mod symtab;
pub mod types;
pub mod value;

use context::{RunState, ScalarTableKind};
use emit::EmittedFiles;
use error::GenError;
use policy::GenPolicy;
use tracing::debug;
use types::TargetConfig;

/// Result of one generation run: the rendered source files plus the
/// checksum computed over the same run's final variable state (the value
/// the emitted program's `checksum()` must reproduce when compiled and
/// run — §8.1 property 4 — a comparison this crate does not itself
/// perform, since running the generated C++ is out of scope).
#[derive(Debug, Clone)]
pub struct GenOutput {
    pub files: EmittedFiles,
    pub checksum: u64,
}

/// Runs one full generation: seeds `RunState`, pre-populates the three
/// external variable pools within `policy`'s bounds, generates the
/// top-level statement tree, and emits it.
pub fn generate(seed: u64, policy: GenPolicy, target: TargetConfig) -> Result<GenOutput, GenError> {
    let mut state = RunState::new(seed, policy, target);

    let (min_in, max_in) = (state.policy.min_input_vars, state.policy.max_input_vars);
    populate_pool(&mut state, ScalarTableKind::Input, min_in, max_in);
    let (min_mixed, max_mixed) = (state.policy.min_mixed_vars, state.policy.max_mixed_vars);
    populate_pool(&mut state, ScalarTableKind::Mixed, min_mixed, max_mixed);
    let (min_out, max_out) = (state.policy.min_output_vars, state.policy.max_output_vars);
    populate_pool(&mut state, ScalarTableKind::Output, min_out, max_out);

    debug!(
        input = state.extern_input.len(),
        mixed = state.extern_mixed.len(),
        output = state.extern_output.len(),
        "populated external variable pools"
    );

    if state.extern_input.is_empty() && state.extern_mixed.is_empty() {
        return Err(GenError::Invariant {
            context: "generate".to_string(),
            op: "population produced no readable variables".to_string(),
        });
    }

    let body = stmt::gen_top_level(&mut state);
    debug!(top_level_stmts = body.len(), "statement generation complete");

    let mut acc = checksum::Checksum::new();
    for id in state.extern_mixed.iter().chain(state.extern_output.iter()) {
        acc.update_var(&state.arena, id);
    }

    let files = emit::emit_program(&state, &body);
    debug!(checksum = acc.seed(), "emission complete");

    Ok(GenOutput { files, checksum: acc.seed() })
}

/// Declares `count` (within `[min, max]`) fresh extern variables in
/// `kind`'s table, each independently a `Struct` with probability
/// `struct_probability_pct` and otherwise a plain `Scalar` (§3.3, §2's
/// population step).
fn populate_pool(state: &mut RunState, kind: ScalarTableKind, min: usize, max: usize) {
    let count = state.rng.uniform(min as i64, max as i64) as usize;
    for _ in 0..count {
        if state.rng.flip(state.policy.struct_probability_pct) {
            let member_count = state.rng.uniform(1, state.policy.max_struct_members.max(1) as i64) as usize;
            state.new_struct(kind, member_count);
        } else {
            state.new_scalar(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_all_six_files_and_a_checksum() {
        let result = generate(123, GenPolicy::default(), TargetConfig::default())
            .expect("generation must succeed with the default policy");
        let names: Vec<&str> = result.files.files().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["init.h", "init.cpp", "func.cpp", "check.cpp", "driver.cpp", "hash.cpp"]);
        for (_, contents) in result.files.files() {
            assert!(!contents.is_empty());
        }
    }

    #[test]
    fn same_seed_and_policy_reproduce_the_same_checksum() {
        let a = generate(7, GenPolicy::default(), TargetConfig::default()).unwrap();
        let b = generate(7, GenPolicy::default(), TargetConfig::default()).unwrap();
        assert_eq!(a.checksum, b.checksum);
        assert_eq!(a.files.func_cpp, b.files.func_cpp);
    }

    #[test]
    fn different_seeds_usually_produce_different_programs() {
        let a = generate(1, GenPolicy::default(), TargetConfig::default()).unwrap();
        let b = generate(2, GenPolicy::default(), TargetConfig::default()).unwrap();
        assert_ne!(a.files.func_cpp, b.files.func_cpp);
    }
}
