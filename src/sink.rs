//! Output sinks the tree executor prints to.
//!
//! A plain closure-backed sink is enough for the top-level run; `use`
//! imports execute against a [`NullSink`] (definitions persist, code
//! lines are discarded) and macro calls execute against an
//! [`IndentingSink`] that prepends the call's leading spaces to every
//! non-marker line (grounded on `_spaced_print_func` in the original
//! executor).

/// Receives one already-substituted output line at a time.
pub trait LineSink {
    fn push_line(&mut self, line: &str);
}

impl<F: FnMut(&str)> LineSink for F {
    fn push_line(&mut self, line: &str) {
        self(line)
    }
}

/// Discards everything pushed to it; used while executing an imported
/// file purely for its definitions.
pub struct NullSink;

impl LineSink for NullSink {
    fn push_line(&mut self, _line: &str) {}
}

/// Prepends `spaces` to every line that is not a line marker (a marker
/// is any line whose first non-space character is `#`), so that a
/// macro call's expansion inherits the call site's indentation.
pub struct IndentingSink<'a> {
    pub inner: &'a mut dyn LineSink,
    pub spaces: String,
}

impl<'a> LineSink for IndentingSink<'a> {
    fn push_line(&mut self, line: &str) {
        if line.trim_start().starts_with('#') {
            self.inner.push_line(line);
        } else {
            let indented = format!("{}{}", self.spaces, line);
            self.inner.push_line(&indented);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indenting_sink_prefixes_non_marker_lines() {
        let mut collected = Vec::new();
        {
            let mut base = |line: &str| collected.push(line.to_string());
            let mut sink = IndentingSink { inner: &mut base, spaces: "  ".to_string() };
            sink.push_line("x = 1");
            sink.push_line("# 1 \"t.f90\"");
        }
        assert_eq!(collected, vec!["  x = 1".to_string(), "# 1 \"t.f90\"".to_string()]);
    }

    #[test]
    fn null_sink_discards() {
        let mut sink = NullSink;
        sink.push_line("anything");
    }
}
