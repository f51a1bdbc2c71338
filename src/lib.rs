//! # Fortiel
//!
//! Fortiel is a source-to-source preprocessor for Fortran: it consumes
//! a Fortran source file sprinkled with Fortiel directives
//! (conditionals, loops, variables, imports, and user-defined macros
//! with regex-based argument patterns) and emits plain Fortran
//! augmented with line markers for downstream compilers (`gfortran`,
//! `cpp`).
//!
//! ## Modules
//!
//! - [`line_source`]: joins continuation lines, classifies directives/calls
//! - [`tree`]: the node types produced by the parser
//! - [`parser`]: recursive-descent parser from lines to [`tree::Tree`]
//! - [`scope`]: the variable scope, macro table, and import set
//! - [`sandbox`]: the embedded (`rhai`-backed) expression evaluator
//! - [`resolve`]: macro call segment resolution (two-phase, pure)
//! - [`substitution`]: the four in-line substitution passes
//! - [`sink`]: output sinks the executor prints to
//! - [`executor`]: walks a tree and drives the whole pipeline
//! - [`error`]: `FortielError` and its `Syntax`/`Runtime` variant kinds
//!
//! The library entry point most callers want is [`preprocess_file`].

pub mod error;
pub mod executor;
pub mod line_source;
pub mod parser;
pub mod resolve;
pub mod sandbox;
pub mod scope;
pub mod sink;
pub mod substitution;
pub mod tree;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use crate::error::{FortielError, RuntimeErrorKind, SyntaxErrorKind};
pub use crate::executor::{Evaluator, MarkerFormat};
pub use crate::parser::Parser;
pub use crate::tree::Tree;

/// Preprocessor options gathered from the CLI: `-D` definitions, `-I`
/// include directories, and the line-marker format.
#[derive(Debug, Clone)]
pub struct Options {
    /// Each entry is `(name, value)`: a bare `-D NAME` has `value: None`
    /// (binds boolean `true`); `-D NAME=VALUE` carries the literal text
    /// of `VALUE`, evaluated as a Fortiel expression.
    pub defines: Vec<(String, Option<String>)>,
    pub include_dirs: Vec<PathBuf>,
    pub marker_format: MarkerFormat,
    /// Directory searched last when resolving `use` imports — the
    /// directory containing the running executable.
    pub install_dir: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            defines: Vec::new(),
            include_dirs: Vec::new(),
            marker_format: MarkerFormat::Fpp,
            install_dir: std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)),
        }
    }
}

/// Reads `file_path`, parses and executes it, and writes the result to
/// `output_file_path` (or stdout, one line per `println!`, when
/// `None`).
pub fn preprocess_file(file_path: &Path, output_file_path: Option<&Path>, options: &Options) -> Result<()> {
    let contents = fs::read_to_string(file_path)
        .with_context(|| format!("could not read `{}`", file_path.display()))?;
    let lines: Vec<String> = contents.lines().map(str::to_string).collect();

    let tree = Parser::new(file_path, lines).map_err(anyhow::Error::from)?.parse().map_err(anyhow::Error::from)?;

    let mut evaluator = Evaluator::new(options.include_dirs.clone(), options.install_dir.clone(), options.marker_format);
    for (name, value) in &options.defines {
        evaluator.define_from_cli(name, value.as_deref()).map_err(anyhow::Error::from)?;
    }

    match output_file_path {
        None => {
            let mut sink = |line: &str| println!("{line}");
            evaluator.execute(&tree, &mut sink).map_err(anyhow::Error::from)?;
        }
        Some(output_path) => {
            use std::io::Write;
            let mut output_file = fs::File::create(output_path)
                .with_context(|| format!("could not create `{}`", output_path.display()))?;
            let mut error: Option<FortielError> = None;
            {
                let mut sink = |line: &str| {
                    if error.is_none() {
                        if let Err(io_error) = writeln!(output_file, "{line}") {
                            error = Some(FortielError::Internal(io_error.to_string()));
                        }
                    }
                };
                evaluator.execute(&tree, &mut sink).map_err(anyhow::Error::from)?;
            }
            if let Some(error) = error {
                return Err(error.into());
            }
        }
    }
    Ok(())
}
