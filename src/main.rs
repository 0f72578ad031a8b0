//! `ubgen` CLI
//!
//! Command-line interface for generating self-checking, UB-free C/C++ test
//! programs for compiler fuzzing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::{CommandFactory, Parser as ClapParser, Subcommand, ValueEnum};
use clap_complete::{generate as generate_completions, Shell};
use tracing::info;

use ubgen::config;
use ubgen::types::{Dialect, TargetConfig};

#[derive(ClapParser)]
#[command(name = "ubgen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate self-checking, UB-free C/C++ test programs for compiler fuzzing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliDialect {
    C,
    Cxx,
}

impl From<CliDialect> for Dialect {
    fn from(d: CliDialect) -> Self {
        match d {
            CliDialect::C => Dialect::C,
            CliDialect::Cxx => Dialect::Cxx,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one test program and write its six source files
    Generate {
        /// Deterministic generation seed
        #[arg(long)]
        seed: u64,

        /// Path to a TOML policy file overriding the embedded default
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Directory the six output files are written into
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,

        /// Target ABI where `long` and `long long` have the same width
        #[arg(long, default_value_t = true)]
        long_eq_llong: bool,

        /// C or C++ shift-UB dialect
        #[arg(long, value_enum, default_value_t = CliDialect::Cxx)]
        dialect: CliDialect,
    },

    /// Print the embedded default policy as a starting point for a custom one
    PolicyTemplate,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ubgen=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { seed, policy, out_dir, long_eq_llong, dialect } => {
            run_generate(seed, policy.as_deref(), &out_dir, long_eq_llong, dialect.into());
        }
        Commands::PolicyTemplate => {
            print!("{}", config::default_policy_text());
        }
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate_completions(shell, &mut cmd, "ubgen", &mut io::stdout());
}

fn run_generate(
    seed: u64,
    policy_path: Option<&Path>,
    out_dir: &Path,
    long_eq_llong: bool,
    dialect: Dialect,
) {
    let policy = match config::load_policy(policy_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error loading policy: {}", e);
            process::exit(1);
        }
    };

    let target = TargetConfig { long_eq_llong, dialect };

    info!(seed, out_dir = %out_dir.display(), "generating test program");

    match ubgen::generate(seed, policy, target) {
        Ok(output) => {
            if let Err(e) = write_output(out_dir, &output.files) {
                eprintln!("Error writing output: {}", e);
                process::exit(1);
            }
            println!("Generated program in {} (expected checksum {})", out_dir.display(), output.checksum);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn write_output(out_dir: &Path, files: &ubgen::emit::EmittedFiles) -> io::Result<()> {
    fs::create_dir_all(out_dir)?;
    for (name, contents) in files.files() {
        fs::write(out_dir.join(name), contents)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_generate_subcommand() {
        let cli = Cli::parse_from(["ubgen", "generate", "--seed", "42"]);
        match cli.command {
            Commands::Generate { seed, out_dir, .. } => {
                assert_eq!(seed, 42);
                assert_eq!(out_dir, PathBuf::from("out"));
            }
            _ => panic!("expected Generate"),
        }
    }
}
