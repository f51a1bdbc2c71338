//! Fortiel CLI entry point: the thin collaborator that reads the
//! `-D`/`-I`/`-M` flags, resolves input/output paths, and drives the
//! core [`fortiel::preprocess_file`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use fortiel::{preprocess_file, Options};

/// Fortiel: a directive-based source-to-source preprocessor for Fortran.
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Define a named variable: `-D NAME` or `-D NAME=VALUE`.
    #[arg(short = 'D', long = "define", value_name = "name[=value]")]
    defines: Vec<String>,

    /// Add an include directory path.
    #[arg(short = 'I', long = "include", value_name = "include_dir")]
    include_dirs: Vec<PathBuf>,

    /// Line markers format.
    #[arg(short = 'M', long = "line-markers", value_enum, default_value = "fpp")]
    line_markers: LineMarkerArg,

    /// Input file path.
    file_path: PathBuf,

    /// Output file path; prints to stdout when omitted.
    #[arg(short = 'o', long = "output")]
    output_file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum LineMarkerArg {
    Fpp,
    Cpp,
    None,
}

impl From<LineMarkerArg> for fortiel::MarkerFormat {
    fn from(value: LineMarkerArg) -> Self {
        match value {
            LineMarkerArg::Fpp => fortiel::MarkerFormat::Fpp,
            LineMarkerArg::Cpp => fortiel::MarkerFormat::Cpp,
            LineMarkerArg::None => fortiel::MarkerFormat::None,
        }
    }
}

fn parse_define(raw: &str) -> (String, Option<String>) {
    match raw.split_once('=') {
        Some((name, value)) => (name.trim().to_string(), Some(value.trim().to_string())),
        None => (raw.trim().to_string(), None),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let options = Options {
        defines: cli.defines.iter().map(|raw| parse_define(raw)).collect(),
        include_dirs: cli.include_dirs,
        marker_format: cli.line_markers.into(),
        ..Options::default()
    };

    match preprocess_file(&cli.file_path, cli.output_file_path.as_deref(), &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}
