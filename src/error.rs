//! Error types for the Fortiel core.
//!
//! Every directive- or expression-level failure carries the file and
//! line it was raised against.

use std::path::PathBuf;

use thiserror::Error;

/// The result type used throughout the core.
pub type Result<T> = std::result::Result<T, FortielError>;

/// A Fortiel error, always attributable to a source location.
#[derive(Error, Debug)]
pub enum FortielError {
    #[error("{file}:{line}:1:\n\nFatal Error: {kind}")]
    Syntax {
        file: PathBuf,
        line: usize,
        kind: SyntaxErrorKind,
    },
    #[error("{file}:{line}:1:\n\nFatal Error: {kind}")]
    Runtime {
        file: PathBuf,
        line: usize,
        kind: RuntimeErrorKind,
    },
    /// Programming error inside the core itself: a missing case, an
    /// invariant the executor assumed and found violated. Distinct
    /// from `Syntax`/`Runtime` because no source location is at fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FortielError {
    pub fn syntax(file: impl Into<PathBuf>, line: usize, kind: SyntaxErrorKind) -> Self {
        FortielError::Syntax {
            file: file.into(),
            line,
            kind,
        }
    }

    pub fn runtime(file: impl Into<PathBuf>, line: usize, kind: RuntimeErrorKind) -> Self {
        FortielError::Runtime {
            file: file.into(),
            line,
            kind,
        }
    }

    /// File and line of the error, when it has one (`Internal` does not).
    pub fn location(&self) -> Option<(&PathBuf, usize)> {
        match self {
            FortielError::Syntax { file, line, .. } => Some((file, *line)),
            FortielError::Runtime { file, line, .. } => Some((file, *line)),
            FortielError::Internal(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SyntaxErrorKind {
    #[error("empty directive")]
    EmptyDirective,
    #[error("unknown or mistyped directive <{0}>")]
    UnknownDirective(String),
    #[error("misplaced directive <{0}>")]
    MisplacedDirective(String),
    #[error("invalid <{0}> directive syntax")]
    InvalidDirectiveSyntax(String),
    #[error("invalid call segment syntax")]
    InvalidCallSegment,
    #[error("unexpected end of file")]
    UnexpectedEof,
    #[error("unexpected end of file in continuation lines")]
    UnexpectedEofInContinuation,
    #[error("name `{0}` is a reserved word")]
    ReservedName(String),
    #[error("duplicate argument `{0}` of the functional <let>")]
    DuplicateLetArgument(String),
    #[error("<let> arguments `{0}` are reserved words")]
    ReservedLetArguments(String),
    #[error("<do> loop index name `{0}` is a reserved word")]
    ReservedDoIndex(String),
    #[error("<for> loop index names `{0}` are reserved words")]
    ReservedForIndex(String),
    #[error("expected <pattern> directive")]
    ExpectedPattern,
    #[error("invalid pattern regular expression `{pattern}`: {message}")]
    InvalidPatternRegex { pattern: String, message: String },
    #[error("section name cannot be the same with macro `{0}` name")]
    SectionNameCollidesWithMacro(String),
    #[error("duplicate section `{0}` of the macro construct `{1}`")]
    DuplicateSection(String, String),
}

#[derive(Error, Debug)]
pub enum RuntimeErrorKind {
    #[error("`{0}` was not found in the include paths")]
    IncludeNotFound(String),
    #[error("`{0}` is a directory")]
    IncludeIsDirectory(String),
    #[error("unable to read file `{0}`")]
    IncludeUnreadable(String),
    #[error("builtin name <{0}> can not be redefined")]
    BuiltinRedefinition(String),
    #[error("builtin name <{0}> can not be undefined")]
    BuiltinUndefine(String),
    #[error("name `{0}` was not previously defined")]
    NameNotBound(String),
    #[error("macro `{0}` was not previously defined")]
    UnknownMacro(String),
    #[error("expected `@{0}` call segment")]
    UnbalancedCallEnd(String),
    #[error("macro `{0}` call does not match any pattern")]
    NoPatternMatch(String),
    #[error("unexpected call section `{0}`")]
    UnexpectedCallSection(String),
    #[error("macro `{0}` is already defined")]
    MacroAlreadyDefined(String),
    #[error("loop index `__INDEX__` is not set")]
    LoopIndexUnset,
    #[error("<do> loop ranges must be a 2- or 3-integer tuple")]
    IllTypedDoRange,
    #[error("name `{0}` is not defined")]
    UndefinedName(String),
    #[error("failed to evaluate expression `{expression}`: {message}")]
    ExpressionFailed { expression: String, message: String },
    #[error("value of `{0}` is not iterable")]
    NotIterable(String),
    #[error("cannot destructure a <for> loop element into {0} names")]
    DestructureArity(usize),
    #[error("`{0}` could not be read or parsed: {1}")]
    ImportFailed(String, String),
}
