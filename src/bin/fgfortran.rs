//! `fgfortran`: a `gfortran` wrapper that preprocesses Fortiel sources
//! before handing them to the system compiler.
//!
//! Partitions `argv` into pass-through compiler flags and source file
//! paths, glob-expands the latter, preprocesses each into a temporary
//! file sharing the original extension, and — only if every file
//! preprocessed cleanly — invokes `gfortran` with the pass-through
//! flags followed by the temporary paths. Temporary files are always
//! removed before exit.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use fortiel::{preprocess_file, Options};
use tempfile::NamedTempFile;

const FORTRAN_EXTENSIONS: &[&str] = &["f", "for", "f90", "f03", "f08"];

fn is_fortran_source(arg: &str, previous_was_output_flag: bool) -> bool {
    if arg.starts_with('-') || previous_was_output_flag {
        return false;
    }
    Path::new(arg)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FORTRAN_EXTENSIONS.iter().any(|fortran_ext| ext.eq_ignore_ascii_case(fortran_ext)))
        .unwrap_or(false)
}

/// Splits `argv` into pass-through compiler args and source file
/// paths, glob-expanding each source argument (a literal path is kept
/// as-is when its glob yields no matches, so a nonexistent filename
/// still surfaces as a normal compiler error rather than vanishing).
fn partition_arguments(argv: &[String]) -> (Vec<String>, Vec<String>) {
    let mut other_args = Vec::new();
    let mut file_paths = Vec::new();
    for arg in argv {
        let previous_was_output_flag = other_args.last().map(|a: &String| a == "-o").unwrap_or(false);
        if is_fortran_source(arg, previous_was_output_flag) {
            match glob::glob(arg) {
                Ok(matches) => {
                    let matched: Vec<String> =
                        matches.filter_map(|entry| entry.ok()).map(|p| p.display().to_string()).collect();
                    if matched.is_empty() {
                        file_paths.push(arg.clone());
                    } else {
                        file_paths.extend(matched);
                    }
                }
                Err(_) => file_paths.push(arg.clone()),
            }
        } else {
            other_args.push(arg.clone());
        }
    }
    (other_args, file_paths)
}

/// Preprocesses one source file into a fresh temp file with a matching
/// extension; on failure, prints the GFortran-style fatal error and
/// returns `None`.
fn preprocess_to_temp_file(file_path: &str) -> Option<PathBuf> {
    let extension = Path::new(file_path).extension().and_then(|e| e.to_str()).unwrap_or("");
    let temp_file = match NamedTempFile::new() {
        Ok(file) => file,
        Err(error) => {
            eprintln!("{file_path}:1:1:\n\nFatal Error: could not create temporary file: {error}");
            return None;
        }
    };
    let (_file, temp_path) = match temp_file.keep() {
        Ok(pair) => pair,
        Err(error) => {
            eprintln!("{file_path}:1:1:\n\nFatal Error: could not persist temporary file: {error}");
            return None;
        }
    };
    let output_path = temp_path.with_extension(extension);
    let _ = std::fs::rename(&temp_path, &output_path);

    match preprocess_file(Path::new(file_path), Some(&output_path), &Options::default()) {
        Ok(()) => Some(output_path),
        Err(error) => {
            eprintln!("{error}");
            let _ = std::fs::remove_file(&output_path);
            None
        }
    }
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let (other_args, file_paths) = partition_arguments(&argv);

    let mut output_paths: Vec<PathBuf> = Vec::new();
    let mut any_failed = false;
    for file_path in &file_paths {
        match preprocess_to_temp_file(file_path) {
            Some(output_path) => output_paths.push(output_path),
            None => any_failed = true,
        }
    }

    let exit_code = if any_failed {
        ExitCode::FAILURE
    } else {
        let mut command = Command::new("gfortran");
        command.args(other_args.iter().map(OsString::from));
        command.args(output_paths.iter());
        match command.status() {
            Ok(status) => {
                if status.success() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(status.code().unwrap_or(1) as u8)
                }
            }
            Err(error) => {
                eprintln!("fgfortran: failed to invoke gfortran: {error}");
                ExitCode::FAILURE
            }
        }
    };

    for output_path in &output_paths {
        let _ = std::fs::remove_file(output_path);
    }

    exit_code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_fortran_sources_by_extension() {
        assert!(is_fortran_source("foo.f90", false));
        assert!(is_fortran_source("foo.F90", false));
        assert!(!is_fortran_source("foo.c", false));
        assert!(!is_fortran_source("-o", false));
    }

    #[test]
    fn argument_following_output_flag_is_never_a_source() {
        assert!(!is_fortran_source("foo.f90", true));
    }

    #[test]
    fn partition_separates_flags_from_sources() {
        let argv: Vec<String> =
            vec!["-O2".to_string(), "-o".to_string(), "a.out".to_string(), "nonexistent_source.f90".to_string()];
        let (other, sources) = partition_arguments(&argv);
        assert_eq!(other, vec!["-O2", "-o", "a.out"]);
        assert_eq!(sources, vec!["nonexistent_source.f90"]);
    }
}
