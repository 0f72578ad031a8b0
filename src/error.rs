//! Generator error type (C11).

/// Error type for the generation pipeline (C2 policy loading through C8
/// file writing). Mirrors the codegen error's split between a logical
/// error variant and wrapped lower-level errors, with `?`-friendly `From`
/// impls for both.
#[derive(Debug)]
pub enum GenError {
    /// An invariant the generator is supposed to uphold internally did
    /// not hold (§8.1's properties) — a generator bug, not a policy or
    /// I/O problem.
    Invariant { context: String, op: String },
    /// Reading/writing a policy file or output directory failed.
    Io(std::io::Error),
    /// A policy file was present but malformed or contained unknown keys.
    Config(String),
}

impl std::fmt::Display for GenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenError::Invariant { context, op } => {
                write!(f, "internal invariant violated in {}: {}", context, op)
            }
            GenError::Io(e) => write!(f, "I/O error: {}", e),
            GenError::Config(s) => write!(f, "invalid policy configuration: {}", s),
        }
    }
}

impl std::error::Error for GenError {}

impl From<std::io::Error> for GenError {
    fn from(e: std::io::Error) -> Self {
        GenError::Io(e)
    }
}
