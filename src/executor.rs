//! The tree executor and macro call invocation.
//!
//! Owns the [`Sandbox`], the [`Scope`] (including the macro table and
//! the idempotent import set), and streams preprocessed lines to a
//! [`LineSink`]. One [`Evaluator`] is constructed per input file, never
//! shared across runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rhai::Dynamic;

use crate::error::{FortielError, Result, RuntimeErrorKind};
use crate::parser::Parser;
use crate::resolve::resolve_call_segment;
use crate::sandbox::Sandbox;
use crate::scope::{is_builtin, normalize_name, Scope};
use crate::sink::{IndentingSink, LineSink, NullSink};
use crate::substitution::substitute_line;
use crate::tree::*;

/// Line-marker format selected by the `-M` CLI flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerFormat {
    /// `# <line> "<file>"`
    Fpp,
    /// `#line <line> "<file>"`
    Cpp,
    /// No markers emitted.
    None,
}

impl MarkerFormat {
    pub fn render(&self, file: &Path, line: usize) -> Option<String> {
        match self {
            MarkerFormat::Fpp => Some(format!("# {line} \"{}\"", file.display())),
            MarkerFormat::Cpp => Some(format!("#line {line} \"{}\"", file.display())),
            MarkerFormat::None => None,
        }
    }
}

/// Owns everything an execution run needs beyond the tree itself: the
/// expression sandbox, the scope/macro table, the include search path,
/// and the chosen line-marker format.
pub struct Evaluator {
    sandbox: Sandbox,
    scope: Scope,
    include_dirs: Vec<PathBuf>,
    install_dir: Option<PathBuf>,
    marker_format: MarkerFormat,
}

impl Evaluator {
    pub fn new(include_dirs: Vec<PathBuf>, install_dir: Option<PathBuf>, marker_format: MarkerFormat) -> Self {
        Evaluator {
            sandbox: Sandbox::new(),
            scope: Scope::new(),
            include_dirs,
            install_dir,
            marker_format,
        }
    }

    /// Pre-seeds the scope from a `-D NAME[=VALUE]` flag. A bare name
    /// binds boolean `true`; a `NAME=VALUE` form evaluates `VALUE` as a
    /// Fortiel expression so numeric/string literals come through typed.
    pub fn define_from_cli(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        let origin = PathBuf::from("<command line>");
        let dynamic = match value {
            None => Dynamic::from(true),
            Some(text) => self.sandbox.evaluate(text, &mut self.scope, &origin, 0)?,
        };
        self.scope.set_dynamic(name, dynamic);
        Ok(())
    }

    /// Executes a parsed tree, streaming output to `sink`. Prints the
    /// primary line marker first, then walks the root nodes.
    pub fn execute(&mut self, tree: &Tree, sink: &mut dyn LineSink) -> Result<()> {
        if let Some(marker) = self.marker_format.render(&tree.file_path, 1) {
            sink.push_line(&marker);
        }
        self.execute_body(&tree.root_nodes, sink)
    }

    /// Walks this sibling list, resolving each `CallSegment` against the
    /// macro table at the point the walk reaches it (spec §4.6: "performed
    /// lazily as the executor walks a sibling list") rather than
    /// resolving the whole list up front. This lets a macro defined
    /// earlier in the same list be called later in it — the defining
    /// `Macro` node has already executed and registered by the time its
    /// call segment is reached.
    fn execute_body(&mut self, nodes: &[Node], sink: &mut dyn LineSink) -> Result<()> {
        let mut index = 0;
        while index < nodes.len() {
            if matches!(nodes[index], Node::CallSegment(_)) {
                let (call, next_index) = resolve_call_segment(nodes, index, &self.scope.macros)?;
                self.execute_call(&call, sink)?;
                index = next_index;
            } else {
                self.execute_node(&nodes[index], sink)?;
                index += 1;
            }
        }
        Ok(())
    }

    fn execute_node(&mut self, node: &Node, sink: &mut dyn LineSink) -> Result<()> {
        match node {
            Node::LineList(n) => self.execute_line_list(n, sink),
            Node::Use(n) => self.execute_use(n, sink),
            Node::Let(n) => self.execute_let(n),
            Node::Del(n) => self.execute_del(n),
            Node::If(n) => self.execute_if(n, sink),
            Node::Do(n) => self.execute_do(n, sink),
            Node::For(n) => self.execute_for(n, sink),
            Node::Macro(n) => self.execute_macro_def(n),
            Node::Call(n) => self.execute_call(n, sink),
            Node::CallSegment(_) => {
                Err(FortielError::Internal("unresolved call segment reached the executor".to_string()))
            }
        }
    }

    fn execute_line_list(&mut self, n: &LineListNode, sink: &mut dyn LineSink) -> Result<()> {
        if let Some(marker) = self.marker_format.render(&n.file_path, n.line_number) {
            sink.push_line(&marker);
        }
        for raw_line in &n.lines {
            for physical_line in raw_line.split('\n') {
                let substituted =
                    substitute_line(physical_line, &self.sandbox, &mut self.scope, &n.file_path, n.line_number)?;
                for out in substituted.split('\n') {
                    sink.push_line(out);
                }
            }
        }
        Ok(())
    }

    fn execute_use(&mut self, n: &UseNode, sink: &mut dyn LineSink) -> Result<()> {
        let resolved = self.resolve_include_path(&n.imported_file_path, &n.file_path).ok_or_else(|| {
            FortielError::runtime(
                &n.file_path,
                n.line_number,
                RuntimeErrorKind::IncludeNotFound(n.imported_file_path.clone()),
            )
        })?;
        let canonical = fs::canonicalize(&resolved).unwrap_or(resolved.clone());
        if !self.scope.imported_files.insert(canonical) {
            return Ok(());
        }
        let contents = fs::read_to_string(&resolved).map_err(|error| {
            FortielError::runtime(
                &n.file_path,
                n.line_number,
                RuntimeErrorKind::ImportFailed(n.imported_file_path.clone(), error.to_string()),
            )
        })?;
        let lines: Vec<String> = contents.lines().map(str::to_string).collect();
        let tree = Parser::new(resolved, lines)?.parse()?;
        let mut null_sink = NullSink;
        self.execute(&tree, &mut null_sink)
    }

    /// Tries, in order: the literal path, each `-I` include directory,
    /// the directory containing the `use` directive's origin file, then
    /// the installation directory.
    fn resolve_include_path(&self, imported: &str, origin_file: &Path) -> Option<PathBuf> {
        let literal = PathBuf::from(imported);
        if literal.is_file() {
            return Some(literal);
        }
        for dir in &self.include_dirs {
            let candidate = dir.join(imported);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if let Some(origin_dir) = origin_file.parent() {
            let candidate = origin_dir.join(imported);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if let Some(install_dir) = &self.install_dir {
            let candidate = install_dir.join(imported);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    fn execute_let(&mut self, n: &LetNode) -> Result<()> {
        if is_builtin(&n.name) {
            return Err(FortielError::runtime(
                &n.file_path,
                n.line_number,
                RuntimeErrorKind::BuiltinRedefinition(n.name.clone()),
            ));
        }
        let value = match &n.arguments {
            Some(arguments) => self.sandbox.evaluate_function(
                arguments,
                &n.value_expression,
                &mut self.scope,
                &n.file_path,
                n.line_number,
            )?,
            None => self.sandbox.evaluate(&n.value_expression, &mut self.scope, &n.file_path, n.line_number)?,
        };
        self.scope.set_dynamic(&n.name, value);
        Ok(())
    }

    fn execute_del(&mut self, n: &DelNode) -> Result<()> {
        for name in &n.names {
            if is_builtin(name) {
                return Err(FortielError::runtime(
                    &n.file_path,
                    n.line_number,
                    RuntimeErrorKind::BuiltinUndefine(name.clone()),
                ));
            }
            if !self.scope.is_bound(name) {
                return Err(FortielError::runtime(
                    &n.file_path,
                    n.line_number,
                    RuntimeErrorKind::NameNotBound(name.clone()),
                ));
            }
            self.scope.unset(name);
        }
        Ok(())
    }

    fn execute_if(&mut self, n: &IfNode, sink: &mut dyn LineSink) -> Result<()> {
        if self.sandbox.evaluate_bool(&n.condition_expression, &mut self.scope, &n.file_path, n.line_number)? {
            return self.execute_body(&n.then_nodes, sink);
        }
        for elif in &n.elif_nodes {
            if self.sandbox.evaluate_bool(&elif.condition_expression, &mut self.scope, &elif.file_path, elif.line_number)? {
                return self.execute_body(&elif.then_nodes, sink);
            }
        }
        self.execute_body(&n.else_nodes, sink)
    }

    fn execute_do(&mut self, n: &DoNode, sink: &mut dyn LineSink) -> Result<()> {
        let values = self.sandbox.evaluate_ranges(&n.ranges_expression, &mut self.scope, &n.file_path, n.line_number)?;
        let previous_index = self.scope.loop_index;
        for value in values {
            self.scope.set_loop_index(Some(value));
            self.scope.set(&n.index_name, value);
            self.execute_body(&n.loop_nodes, sink)?;
        }
        self.scope.unset(&n.index_name);
        self.scope.set_loop_index(previous_index);
        Ok(())
    }

    fn execute_for(&mut self, n: &ForNode, sink: &mut dyn LineSink) -> Result<()> {
        let iterable =
            self.sandbox.evaluate(&n.iterable_expression, &mut self.scope, &n.file_path, n.line_number)?;

        if let Some(map) = iterable.clone().try_cast::<rhai::Map>() {
            for (key, value) in map.iter() {
                if n.index_names.len() == 2 {
                    self.scope.set_dynamic(&n.index_names[0], Dynamic::from(key.to_string()));
                    self.scope.set_dynamic(&n.index_names[1], value.clone());
                } else {
                    self.scope.set_dynamic(&n.index_names[0], Dynamic::from(key.to_string()));
                }
                self.execute_body(&n.loop_nodes, sink)?;
            }
        } else if let Some(array) = iterable.try_cast::<rhai::Array>() {
            for element in array {
                if n.index_names.len() > 1 {
                    let parts = element.clone().try_cast::<rhai::Array>().ok_or_else(|| {
                        FortielError::runtime(
                            &n.file_path,
                            n.line_number,
                            RuntimeErrorKind::DestructureArity(n.index_names.len()),
                        )
                    })?;
                    if parts.len() != n.index_names.len() {
                        return Err(FortielError::runtime(
                            &n.file_path,
                            n.line_number,
                            RuntimeErrorKind::DestructureArity(n.index_names.len()),
                        ));
                    }
                    for (name, value) in n.index_names.iter().zip(parts.into_iter()) {
                        self.scope.set_dynamic(name, value);
                    }
                } else {
                    self.scope.set_dynamic(&n.index_names[0], element);
                }
                self.execute_body(&n.loop_nodes, sink)?;
            }
        } else {
            return Err(FortielError::runtime(
                &n.file_path,
                n.line_number,
                RuntimeErrorKind::NotIterable(n.iterable_expression.clone()),
            ));
        }

        for name in &n.index_names {
            self.scope.unset(name);
        }
        Ok(())
    }

    fn execute_macro_def(&mut self, n: &Rc<MacroNode>) -> Result<()> {
        if self.scope.macros.contains_key(&n.name) {
            return Err(FortielError::runtime(
                &n.file_path,
                n.line_number,
                RuntimeErrorKind::MacroAlreadyDefined(n.name.clone()),
            ));
        }
        self.scope.macros.insert(n.name.clone(), n.clone());
        Ok(())
    }

    fn execute_call(&mut self, call: &CallNode, sink: &mut dyn LineSink) -> Result<()> {
        let macro_node = self.scope.macros.get(&normalize_name(&call.name)).cloned().ok_or_else(|| {
            FortielError::runtime(&call.file_path, call.line_number, RuntimeErrorKind::UnknownMacro(call.name.clone()))
        })?;

        self.run_matched_pattern(
            &macro_node.pattern_nodes,
            &call.argument,
            &macro_node.name,
            &call.file_path,
            call.line_number,
            &call.spaces_before,
            sink,
        )?;

        if !macro_node.is_construct() {
            return Ok(());
        }

        // Captured nodes run with the caller's own (un-indented) sink.
        self.execute_body(&call.captured_nodes, sink)?;

        let mut cursor = 0usize;
        for call_section in &call.call_section_nodes {
            let section_name = normalize_name(&call_section.name);
            let mut matched_index = None;
            let mut scan = cursor;
            while scan < macro_node.section_nodes.len() {
                if macro_node.section_nodes[scan].name == section_name {
                    matched_index = Some(scan);
                    break;
                }
                scan += 1;
            }
            let index = matched_index.ok_or_else(|| {
                FortielError::runtime(
                    &call_section.file_path,
                    call_section.line_number,
                    RuntimeErrorKind::UnexpectedCallSection(call_section.name.clone()),
                )
            })?;
            let section = &macro_node.section_nodes[index];
            let label = format!("{}.{}", macro_node.name, section.name);
            self.run_matched_pattern(
                &section.pattern_nodes,
                &call_section.argument,
                &label,
                &call_section.file_path,
                call_section.line_number,
                &call.spaces_before,
                sink,
            )?;
            // `once` sections may not be matched again; plain sections
            // stay at their own position so a repeated call segment of
            // the same name can match it again.
            cursor = if section.once { index + 1 } else { index };

            self.execute_body(&call_section.captured_nodes, sink)?;
        }

        let mut finally_sink = IndentingSink { inner: sink, spaces: call.spaces_before.clone() };
        self.execute_body(&macro_node.finally_nodes, &mut finally_sink)
    }

    /// Matches `argument` against `patterns` in order; the first match
    /// wins. Merges its named captures into scope permanently (they are
    /// never popped), then executes its body indented by `spaces`.
    fn run_matched_pattern(
        &mut self,
        patterns: &[PatternNode],
        argument: &str,
        label: &str,
        file: &Path,
        line: usize,
        spaces: &str,
        sink: &mut dyn LineSink,
    ) -> Result<()> {
        let mut selected: Option<usize> = None;
        let mut captures: Vec<(String, String)> = Vec::new();
        for (index, pattern) in patterns.iter().enumerate() {
            if let Some(caps) = pattern.pattern.captures(argument) {
                for name in pattern.pattern.capture_names().flatten() {
                    if let Some(value) = caps.name(name) {
                        captures.push((name.to_string(), value.as_str().to_string()));
                    }
                }
                selected = Some(index);
                break;
            }
        }
        let index = selected.ok_or_else(|| {
            FortielError::runtime(file, line, RuntimeErrorKind::NoPatternMatch(label.to_string()))
        })?;
        for (name, value) in captures {
            self.scope.set_dynamic(&name, Dynamic::from(value));
        }
        let mut indenting = IndentingSink { inner: sink, spaces: spaces.to_string() };
        self.execute_body(&patterns[index].match_nodes, &mut indenting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Vec<String> {
        let lines: Vec<String> = source.lines().map(str::to_string).collect();
        let tree = Parser::new("t.f", lines).unwrap().parse().unwrap();
        let mut evaluator = Evaluator::new(Vec::new(), None, MarkerFormat::None);
        let mut out = Vec::new();
        {
            let mut sink = |line: &str| out.push(line.to_string());
            evaluator.execute(&tree, &mut sink).unwrap();
        }
        out
    }

    #[test]
    fn value_let_and_expression_substitution() {
        let out = run("#@ let N = 3\nprint *, ${N*N}$\n");
        assert_eq!(out, vec!["print *, 9".to_string()]);
    }

    #[test]
    fn do_loop_emits_inclusive_range() {
        let out = run("#@ do I = (1, 3)\nx($I) = 0\n#@ end do\n");
        assert_eq!(out, vec!["x(1) = 0", "x(2) = 0", "x(3) = 0"]);
    }

    #[test]
    fn if_elif_else_picks_matching_branch() {
        let out = run("#@ let K = 2\n#@ if K==1\nA\n#@ else if K==2\nB\n#@ else\nC\n#@ end if\n");
        assert_eq!(out, vec!["B".to_string()]);
    }

    #[test]
    fn simple_macro_call_substitutes_capture() {
        let out = run("#@ macro SQUARE ^(?P<x>.+)$\n($x)*($x)\n#@ end macro\n@SQUARE a+1\n");
        assert_eq!(out, vec!["(a+1)*(a+1)".to_string()]);
    }

    #[test]
    fn macro_call_preserves_indent() {
        let out = run("#@ macro SQUARE ^(?P<x>.+)$\n($x)*($x)\n#@ end macro\n  @SQUARE a\n");
        assert_eq!(out, vec!["  (a)*(a)".to_string()]);
    }

    #[test]
    fn macro_defined_and_called_inside_a_nested_body() {
        // A macro defined and called within the same sibling list one
        // level down (inside a `do` body) must resolve against the
        // table as it stood when the walk reached the call, not an
        // up-front snapshot of the whole list.
        let out = run(
            "#@ do I = (1, 1)\n#@ macro SQUARE ^(?P<x>.+)$\n($x)*($x)\n#@ end macro\n@SQUARE a\n#@ end do\n",
        );
        assert_eq!(out, vec!["(a)*(a)".to_string()]);
    }

    #[test]
    fn unknown_macro_call_is_runtime_error() {
        let lines: Vec<String> = "@Bogus arg\n".lines().map(str::to_string).collect();
        let tree = Parser::new("t.f", lines).unwrap().parse().unwrap();
        let mut evaluator = Evaluator::new(Vec::new(), None, MarkerFormat::None);
        let mut out = Vec::new();
        let mut sink = |line: &str| out.push(line.to_string());
        let err = evaluator.execute(&tree, &mut sink);
        assert!(matches!(
            err,
            Err(FortielError::Runtime { kind: RuntimeErrorKind::UnknownMacro(_), .. })
        ));
    }

    #[test]
    fn del_of_undefined_name_is_runtime_error() {
        let lines: Vec<String> = "#@ del NOPE\n".lines().map(str::to_string).collect();
        let tree = Parser::new("t.f", lines).unwrap().parse().unwrap();
        let mut evaluator = Evaluator::new(Vec::new(), None, MarkerFormat::None);
        let mut sink = |_: &str| {};
        let err = evaluator.execute(&tree, &mut sink);
        assert!(matches!(
            err,
            Err(FortielError::Runtime { kind: RuntimeErrorKind::NameNotBound(_), .. })
        ));
    }

    #[test]
    fn builtin_redefinition_is_rejected() {
        let lines: Vec<String> = "#@ let __INDEX__ = 1\n".lines().map(str::to_string).collect();
        let tree = Parser::new("t.f", lines).unwrap().parse().unwrap();
        let mut evaluator = Evaluator::new(Vec::new(), None, MarkerFormat::None);
        let mut sink = |_: &str| {};
        let err = evaluator.execute(&tree, &mut sink);
        assert!(matches!(
            err,
            Err(FortielError::Runtime { kind: RuntimeErrorKind::BuiltinRedefinition(_), .. })
        ));
    }

    #[test]
    fn line_markers_precede_blocks_in_fpp_format() {
        let lines: Vec<String> = "x = 1\n".lines().map(str::to_string).collect();
        let tree = Parser::new("t.f", lines).unwrap().parse().unwrap();
        let mut evaluator = Evaluator::new(Vec::new(), None, MarkerFormat::Fpp);
        let mut out = Vec::new();
        {
            let mut sink = |line: &str| out.push(line.to_string());
            evaluator.execute(&tree, &mut sink).unwrap();
        }
        assert_eq!(out[0], "# 1 \"t.f\"");
        assert!(out.contains(&"x = 1".to_string()));
    }
}
