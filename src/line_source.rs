//! Line joining and directive/call-segment classification.
//!
//! Exposes exactly the three operations the parser needs: peek the
//! current logical line, advance past it, and test for end of input.
//! A logical line is one or more physical lines joined on a trailing
//! `&` continuation (grounded on `_advance_line` in the original
//! implementation).

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{FortielError, Result, SyntaxErrorKind};

/// `^\s*#[@$]\s*(?P<directive>.*)?$`
pub static DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*#[@$]\s*(?P<directive>.*)?$").unwrap());

/// `^(\s*)@(name)(argument)(!comment)?$`
pub static CALL_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<spaces>\s*)@(?P<name>(?:END\s*|ELSE\s*)?[A-Za-z]\w*)\b(?P<argument>[^!]*)(\s*!.*)?$").unwrap()
});

pub struct LineSource {
    lines: Vec<String>,
    /// Index of the *next* unconsumed physical line.
    index: usize,
    /// 1-based physical line number of the first line of the current
    /// logical line.
    line_number: usize,
    /// The current logical line, continuations joined with a single
    /// space; used for directive/call-segment classification.
    joined: String,
    /// The current logical line, continuations joined with embedded
    /// newlines; used when the line is emitted verbatim as code.
    raw: String,
    at_end: bool,
}

impl LineSource {
    pub fn new(lines: Vec<String>, file_path: &Path) -> Result<Self> {
        let mut source = LineSource {
            lines,
            index: 0,
            line_number: 1,
            joined: String::new(),
            raw: String::new(),
            at_end: false,
        };
        if source.lines.is_empty() {
            source.at_end = true;
        } else {
            source.build_logical_line(file_path)?;
        }
        Ok(source)
    }

    pub fn at_end(&self) -> bool {
        self.at_end
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn current_joined(&self) -> &str {
        &self.joined
    }

    pub fn current_raw(&self) -> &str {
        &self.raw
    }

    /// Consume the current logical line and build the next one.
    pub fn advance(&mut self, file_path: &Path) -> Result<()> {
        self.line_number += self.raw.matches('\n').count() + 1;
        if self.index >= self.lines.len() {
            self.at_end = true;
            self.joined.clear();
            self.raw.clear();
            return Ok(());
        }
        self.build_logical_line(file_path)
    }

    fn build_logical_line(&mut self, file_path: &Path) -> Result<()> {
        let first = self.lines[self.index].trim_end().to_string();
        self.index += 1;
        let mut joined = first.clone();
        let mut raw = first;
        while joined.ends_with('&') {
            if self.index >= self.lines.len() {
                return Err(FortielError::syntax(
                    file_path,
                    self.line_number + raw.matches('\n').count() + 1,
                    SyntaxErrorKind::UnexpectedEofInContinuation,
                ));
            }
            let next_raw = self.lines[self.index].trim_end().to_string();
            self.index += 1;
            raw.push('\n');
            raw.push_str(&next_raw);
            let next_trimmed = next_raw.trim_start();
            let next_trimmed = next_trimmed.strip_prefix('&').unwrap_or(next_trimmed).trim_start();
            joined = joined.trim_end_matches('&').trim_end().to_string();
            joined.push(' ');
            joined.push_str(next_trimmed);
        }
        self.joined = joined;
        self.raw = raw;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn src(lines: &[&str]) -> LineSource {
        let path = PathBuf::from("test.f90");
        LineSource::new(lines.iter().map(|s| s.to_string()).collect(), &path).unwrap()
    }

    #[test]
    fn plain_lines_are_untouched() {
        let mut s = src(&["a = 1", "b = 2"]);
        assert_eq!(s.current_joined(), "a = 1");
        assert_eq!(s.line_number(), 1);
        s.advance(&PathBuf::from("t")).unwrap();
        assert_eq!(s.current_joined(), "b = 2");
        assert_eq!(s.line_number(), 2);
        s.advance(&PathBuf::from("t")).unwrap();
        assert!(s.at_end());
    }

    #[test]
    fn continuation_joins_and_tracks_first_line_number() {
        let mut s = src(&["x = 1 &", "  + 2", "y = 3"]);
        assert_eq!(s.current_joined(), "x = 1 + 2");
        assert_eq!(s.line_number(), 1);
        s.advance(&PathBuf::from("t")).unwrap();
        assert_eq!(s.current_joined(), "y = 3");
        assert_eq!(s.line_number(), 3);
    }

    #[test]
    fn continuation_strips_leading_amp_on_next_line() {
        let s = src(&["x = 1 &", "& + 2"]);
        assert_eq!(s.current_joined(), "x = 1 + 2");
    }

    #[test]
    fn unterminated_continuation_is_syntax_error() {
        let err = LineSource::new(vec!["x = 1 &".to_string()], &PathBuf::from("t"));
        assert!(err.is_err());
    }

    #[test]
    fn directive_regex_matches() {
        assert!(DIRECTIVE.is_match("  #@ let N = 1"));
        assert!(DIRECTIVE.is_match("#$ if x"));
        assert!(!DIRECTIVE.is_match("x = 1"));
    }

    #[test]
    fn call_segment_regex_matches() {
        let caps = CALL_SEGMENT.captures("   @Square a+1").unwrap();
        assert_eq!(&caps["spaces"], "   ");
        assert_eq!(&caps["name"], "Square");
        assert_eq!(caps["argument"].trim(), "a+1");
    }
}
