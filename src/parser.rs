//! Recursive-descent parser from lines to a tree.
//!
//! Converts logical lines into a [`Tree`] of typed nodes. Never
//! evaluates expressions, names, or argument patterns — only extracts
//! their textual form and origin, exactly as the original
//! `FortielParser` does.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{FortielError, Result, SyntaxErrorKind};
use crate::line_source::{LineSource, CALL_SEGMENT, DIRECTIVE};
use crate::scope::{is_reserved, normalize_name};
use crate::tree::*;

macro_rules! re {
    ($pat:expr) => {
        Lazy::new(|| Regex::new(concat!("(?i)", $pat)).unwrap())
    };
}

static USE: Lazy<Regex> = re!(r#"^USE\s+(?P<path>(?:"[^"]+")|(?:'[^']+')|(?:<[^>]+>))$"#);
static LET: Lazy<Regex> = re!(
    r"^LET\s+(?P<name>[A-Za-z_]\w*)\s*(?:\(\s*(?P<arguments>(?:\*\s*){0,2}[A-Za-z_]\w*(?:\s*,\s*(?:\*\s*){0,2}[A-Za-z_]\w*)*)\s*\))?\s*=\s*(?P<value_expression>.*)$"
);
static DEFINE: Lazy<Regex> = re!(r"^DEFINE\s+(?P<name>[A-Za-z_]\w*)(?P<segment>.*)$");
static DEL: Lazy<Regex> = re!(r"^DEL\s+(?P<names>[A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)$");
static IF: Lazy<Regex> = re!(r"^IF\s*(?P<condition_expression>.+)$");
static ELIF: Lazy<Regex> = re!(r"^ELSE\s*IF\s*(?P<condition_expression>.+)$");
static ELSE: Lazy<Regex> = re!(r"^ELSE$");
static END_IF: Lazy<Regex> = re!(r"^END\s*IF$");
static IFDEF: Lazy<Regex> = re!(r"^IFDEF\s+(?P<name>[A-Za-z_]\w*)$");
static IFNDEF: Lazy<Regex> = re!(r"^IFNDEF\s+(?P<name>[A-Za-z_]\w*)$");
static DO: Lazy<Regex> = re!(r"^DO\s+(?P<index_name>[A-Za-z_]\w*)\s*=\s*(?P<ranges_expression>.*)$");
static END_DO: Lazy<Regex> = re!(r"^END\s*DO$");
static FOR: Lazy<Regex> =
    re!(r"^FOR\s+(?P<index_names>[A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s*IN\s*(?P<iterable_expression>.*)$");
static END_FOR: Lazy<Regex> = re!(r"^END\s*FOR$");
static MACRO: Lazy<Regex> = re!(r"^MACRO\s+(?P<name>[A-Za-z]\w*)(?:\s+(?P<pattern>.*))?$");
static PATTERN: Lazy<Regex> = re!(r"^PATTERN\s+(?P<pattern>.*)$");
static SECTION: Lazy<Regex> = re!(r"^SECTION\s+(?P<once>ONCE\s+)?(?P<name>[A-Za-z]\w*)(?:\s+(?P<pattern>.*))?$");
static FINALLY: Lazy<Regex> = re!(r"^FINALLY$");
static END_MACRO: Lazy<Regex> = re!(r"^END\s*MACRO$");

const BUILTIN_HEADER_F90: &str = "tiel/syntax.fd";

/// Parses a source file into a [`Tree`].
pub struct Parser {
    source: LineSource,
    file_path: PathBuf,
}

impl Parser {
    pub fn new(file_path: impl Into<PathBuf>, lines: Vec<String>) -> Result<Self> {
        let file_path = file_path.into();
        let source = LineSource::new(lines, &file_path)?;
        Ok(Parser { source, file_path })
    }

    pub fn parse(mut self) -> Result<Tree> {
        let mut root_nodes = Vec::new();
        if let Some(ext) = self.file_path.extension().and_then(|e| e.to_str()) {
            if ext.eq_ignore_ascii_case("f90") {
                root_nodes.push(Node::Use(UseNode {
                    file_path: self.file_path.clone(),
                    line_number: 0,
                    imported_file_path: BUILTIN_HEADER_F90.to_string(),
                }));
            }
        }
        while !self.source.at_end() {
            root_nodes.push(self.parse_statement()?);
        }
        Ok(Tree { file_path: self.file_path, root_nodes })
    }

    fn line_number(&self) -> usize {
        self.source.line_number()
    }

    fn advance(&mut self) -> Result<()> {
        self.source.advance(&self.file_path)
    }

    fn syntax_err(&self, kind: SyntaxErrorKind) -> FortielError {
        FortielError::syntax(&self.file_path, self.line_number(), kind)
    }

    fn require_not_at_end(&self) -> Result<()> {
        if self.source.at_end() {
            return Err(self.syntax_err(SyntaxErrorKind::UnexpectedEof));
        }
        Ok(())
    }

    /// Returns the directive body text (after `#@`/`#$`), if the
    /// current line is a directive.
    fn directive_text(&self) -> Result<Option<String>> {
        self.require_not_at_end()?;
        Ok(DIRECTIVE
            .captures(self.source.current_joined())
            .map(|c| c.name("directive").map(|m| m.as_str()).unwrap_or("").to_string()))
    }

    fn parse_head(directive: &str) -> Option<String> {
        if directive.is_empty() {
            return None;
        }
        let mut parts = directive.splitn(3, ' ');
        let first = parts.next().unwrap_or("");
        let mut head = first.to_lowercase();
        if let Some(second) = parts.next() {
            let second_word = second.to_lowercase();
            if head == "end" || (head == "else" && second_word == "if") {
                head.push_str(&second_word);
            }
        }
        Some(head)
    }

    /// Peeks whether the current line is a directive with one of the
    /// given (unnormalized, space-free) heads, without consuming it.
    fn matches_directive(&self, expected_heads: &[&str]) -> Result<Option<String>> {
        let Some(directive) = self.directive_text()? else { return Ok(None) };
        let Some(head) = Self::parse_head(&directive.to_lowercase()) else { return Ok(None) };
        let expected: Vec<String> = expected_heads.iter().map(|h| normalize_name(h)).collect();
        if expected.contains(&head) {
            Ok(Some(head))
        } else {
            Ok(None)
        }
    }

    fn matches_call_or_directive(&self) -> bool {
        if self.source.at_end() {
            return true;
        }
        let line = self.source.current_joined();
        DIRECTIVE.is_match(line) || CALL_SEGMENT.is_match(line)
    }

    /// Matches the current directive's body against `pattern`,
    /// advancing on success; raises `InvalidDirectiveSyntax` otherwise.
    /// `extract` pulls whatever owned data the caller needs out of the
    /// captures while the matched text is still alive, so no borrow
    /// escapes this function.
    fn match_directive_syntax<T>(
        &mut self,
        pattern: &Regex,
        head_for_error: &str,
        extract: impl FnOnce(&regex::Captures) -> T,
    ) -> Result<T> {
        let directive = self.directive_text()?.unwrap_or_default();
        let trimmed = directive.trim_end().to_string();
        match pattern.captures(&trimmed) {
            Some(caps) => {
                let value = extract(&caps);
                self.advance()?;
                Ok(value)
            }
            None => Err(self.syntax_err(SyntaxErrorKind::InvalidDirectiveSyntax(head_for_error.to_string()))),
        }
    }

    fn parse_statement(&mut self) -> Result<Node> {
        self.require_not_at_end()?;
        let line = self.source.current_joined();
        if DIRECTIVE.is_match(line) {
            self.parse_directive()
        } else if CALL_SEGMENT.is_match(line) {
            self.parse_call_segment()
        } else {
            self.parse_line_list()
        }
    }

    fn parse_line_list(&mut self) -> Result<Node> {
        let file_path = self.file_path.clone();
        let line_number = self.line_number();
        let mut lines = Vec::new();
        loop {
            lines.push(self.source.current_raw().to_string());
            self.advance()?;
            if self.source.at_end() || self.matches_call_or_directive() {
                break;
            }
        }
        Ok(Node::LineList(LineListNode { file_path, line_number, lines }))
    }

    fn parse_directive(&mut self) -> Result<Node> {
        let directive = self.directive_text()?.unwrap_or_default();
        let head = Self::parse_head(&directive).ok_or_else(|| self.syntax_err(SyntaxErrorKind::EmptyDirective))?;
        match head.as_str() {
            "use" => self.parse_use_directive(),
            "let" => self.parse_let_directive(),
            "define" => self.parse_define_directive(),
            "del" => self.parse_del_directive(),
            "if" => self.parse_if_directive(),
            "ifdef" => self.parse_ifdef_directive(),
            "ifndef" => self.parse_ifndef_directive(),
            "do" => self.parse_do_directive(),
            "for" => self.parse_for_directive(),
            "macro" => self.parse_macro_directive(),
            _ => {
                const MISPLACED: &[&str] =
                    &["else", "else if", "end if", "end do", "end for", "section", "finally", "pattern", "end macro"];
                if MISPLACED.iter().any(|m| normalize_name(m) == head) {
                    Err(self.syntax_err(SyntaxErrorKind::MisplacedDirective(head)))
                } else {
                    Err(self.syntax_err(SyntaxErrorKind::UnknownDirective(head)))
                }
            }
        }
    }

    fn parse_use_directive(&mut self) -> Result<Node> {
        let file_path = self.file_path.clone();
        let line_number = self.line_number();
        let path = self.match_directive_syntax(&USE, "use", |caps| {
            let raw = caps.name("path").unwrap().as_str();
            raw[1..raw.len() - 1].to_string()
        })?;
        Ok(Node::Use(UseNode { file_path, line_number, imported_file_path: path }))
    }

    fn parse_let_directive(&mut self) -> Result<Node> {
        let file_path = self.file_path.clone();
        let line_number = self.line_number();
        let (name, value_expression, arguments_raw) = self.match_directive_syntax(&LET, "let", |caps| {
            (
                caps.name("name").unwrap().as_str().to_string(),
                caps.name("value_expression").unwrap().as_str().to_string(),
                caps.name("arguments").map(|m| m.as_str().to_string()),
            )
        })?;
        if is_reserved(&name) {
            return Err(FortielError::syntax(&file_path, line_number, SyntaxErrorKind::ReservedName(name)));
        }
        let arguments = match arguments_raw {
            None => None,
            Some(raw) => {
                let args: Vec<String> = raw
                    .split(',')
                    .map(|a| a.chars().filter(|c| !c.is_whitespace()).collect::<String>())
                    .collect();
                let naked: Vec<String> = args.iter().map(|a| a.replace('*', "")).collect();
                if let Some(dup) = find_duplicate(&naked) {
                    return Err(FortielError::syntax(
                        &file_path,
                        line_number,
                        SyntaxErrorKind::DuplicateLetArgument(dup),
                    ));
                }
                let bad: Vec<&String> = naked.iter().filter(|a| is_reserved(a)).collect();
                if !bad.is_empty() {
                    let joined = bad.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("`, `");
                    return Err(FortielError::syntax(
                        &file_path,
                        line_number,
                        SyntaxErrorKind::ReservedLetArguments(joined),
                    ));
                }
                Some(args)
            }
        };
        Ok(Node::Let(LetNode { file_path, line_number, name, arguments, value_expression }))
    }

    fn parse_define_directive(&mut self) -> Result<Node> {
        let file_path = self.file_path.clone();
        let line_number = self.line_number();
        let (name, segment) = self.match_directive_syntax(&DEFINE, "define", |caps| {
            (caps.name("name").unwrap().as_str().to_string(), caps.name("segment").unwrap().as_str().to_string())
        })?;
        if is_reserved(&name) {
            return Err(FortielError::syntax(&file_path, line_number, SyntaxErrorKind::ReservedName(name)));
        }
        Ok(Node::Let(LetNode {
            file_path,
            line_number,
            name,
            arguments: None,
            value_expression: format!("'{segment}'"),
        }))
    }

    fn parse_del_directive(&mut self) -> Result<Node> {
        let file_path = self.file_path.clone();
        let line_number = self.line_number();
        let names = self.match_directive_syntax(&DEL, "del", |caps| {
            caps.name("names").unwrap().as_str().split(',').map(|n| n.trim().to_string()).collect()
        })?;
        Ok(Node::Del(DelNode { file_path, line_number, names }))
    }

    fn parse_if_directive(&mut self) -> Result<Node> {
        let file_path = self.file_path.clone();
        let line_number = self.line_number();
        let condition_expression = self
            .match_directive_syntax(&IF, "if", |caps| caps.name("condition_expression").unwrap().as_str().to_string())?;
        let mut then_nodes = Vec::new();
        while self.matches_directive(&["else if", "else", "end if"])?.is_none() {
            then_nodes.push(self.parse_statement()?);
        }
        let mut elif_nodes = Vec::new();
        if self.matches_directive(&["else if"])?.is_some() {
            while self.matches_directive(&["else", "end if"])?.is_none() {
                let line_number = self.line_number();
                let condition_expression = self.match_directive_syntax(&ELIF, "else if", |caps| {
                    caps.name("condition_expression").unwrap().as_str().to_string()
                })?;
                let mut elif_then = Vec::new();
                while self.matches_directive(&["else if", "else", "end if"])?.is_none() {
                    elif_then.push(self.parse_statement()?);
                }
                elif_nodes.push(ElifNode {
                    file_path: file_path.clone(),
                    line_number,
                    condition_expression,
                    then_nodes: elif_then,
                });
            }
        }
        let mut else_nodes = Vec::new();
        if self.matches_directive(&["else"])?.is_some() {
            self.match_directive_syntax(&ELSE, "else", |_| ())?;
            while self.matches_directive(&["end if"])?.is_none() {
                else_nodes.push(self.parse_statement()?);
            }
        }
        self.match_directive_syntax(&END_IF, "end if", |_| ())?;
        Ok(Node::If(IfNode { file_path, line_number, condition_expression, then_nodes, elif_nodes, else_nodes }))
    }

    fn parse_ifdef_directive(&mut self) -> Result<Node> {
        let file_path = self.file_path.clone();
        let line_number = self.line_number();
        let name = self.match_directive_syntax(&IFDEF, "ifdef", |caps| caps.name("name").unwrap().as_str().to_string())?;
        let condition_expression = format!("defined(\"{name}\")");
        self.parse_if_like_body(file_path, line_number, condition_expression)
    }

    fn parse_ifndef_directive(&mut self) -> Result<Node> {
        let file_path = self.file_path.clone();
        let line_number = self.line_number();
        let name = self.match_directive_syntax(&IFNDEF, "ifndef", |caps| caps.name("name").unwrap().as_str().to_string())?;
        let condition_expression = format!("!defined(\"{name}\")");
        self.parse_if_like_body(file_path, line_number, condition_expression)
    }

    fn parse_if_like_body(&mut self, file_path: PathBuf, line_number: usize, condition_expression: String) -> Result<Node> {
        let mut then_nodes = Vec::new();
        while self.matches_directive(&["else", "end if"])?.is_none() {
            then_nodes.push(self.parse_statement()?);
        }
        let mut else_nodes = Vec::new();
        if self.matches_directive(&["else"])?.is_some() {
            self.match_directive_syntax(&ELSE, "else", |_| ())?;
            while self.matches_directive(&["end if"])?.is_none() {
                else_nodes.push(self.parse_statement()?);
            }
        }
        self.match_directive_syntax(&END_IF, "end if", |_| ())?;
        Ok(Node::If(IfNode { file_path, line_number, condition_expression, then_nodes, elif_nodes: Vec::new(), else_nodes }))
    }

    fn parse_do_directive(&mut self) -> Result<Node> {
        let file_path = self.file_path.clone();
        let line_number = self.line_number();
        let (index_name, ranges_expression) = self.match_directive_syntax(&DO, "do", |caps| {
            (
                caps.name("index_name").unwrap().as_str().to_string(),
                caps.name("ranges_expression").unwrap().as_str().to_string(),
            )
        })?;
        if is_reserved(&index_name) {
            return Err(FortielError::syntax(&file_path, line_number, SyntaxErrorKind::ReservedDoIndex(index_name)));
        }
        let mut loop_nodes = Vec::new();
        while self.matches_directive(&["end do"])?.is_none() {
            loop_nodes.push(self.parse_statement()?);
        }
        self.match_directive_syntax(&END_DO, "end do", |_| ())?;
        Ok(Node::Do(DoNode { file_path, line_number, index_name, ranges_expression, loop_nodes }))
    }

    fn parse_for_directive(&mut self) -> Result<Node> {
        let file_path = self.file_path.clone();
        let line_number = self.line_number();
        let (index_names, iterable_expression): (Vec<String>, String) = self.match_directive_syntax(&FOR, "for", |caps| {
            (
                caps.name("index_names").unwrap().as_str().split(',').map(|n| n.trim().to_string()).collect(),
                caps.name("iterable_expression").unwrap().as_str().to_string(),
            )
        })?;
        let bad: Vec<&String> = index_names.iter().filter(|n| is_reserved(n)).collect();
        if !bad.is_empty() {
            let joined = bad.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("`, `");
            return Err(FortielError::syntax(&file_path, line_number, SyntaxErrorKind::ReservedForIndex(joined)));
        }
        let mut loop_nodes = Vec::new();
        while self.matches_directive(&["end for"])?.is_none() {
            loop_nodes.push(self.parse_statement()?);
        }
        self.match_directive_syntax(&END_FOR, "end for", |_| ())?;
        Ok(Node::For(ForNode { file_path, line_number, index_names, iterable_expression, loop_nodes }))
    }

    fn parse_call_segment(&mut self) -> Result<Node> {
        let file_path = self.file_path.clone();
        let line_number = self.line_number();
        let line = self.source.current_joined().to_string();
        let caps = CALL_SEGMENT
            .captures(&line)
            .ok_or_else(|| self.syntax_err(SyntaxErrorKind::InvalidCallSegment))?;
        let spaces_before = caps.name("spaces").unwrap().as_str().to_string();
        let name = normalize_name(caps.name("name").unwrap().as_str());
        let argument = caps.name("argument").unwrap().as_str().trim().to_string();
        self.advance()?;
        Ok(Node::CallSegment(CallSegmentNode { file_path, line_number, spaces_before, name, argument }))
    }

    fn parse_macro_directive(&mut self) -> Result<Node> {
        let file_path = self.file_path.clone();
        let line_number = self.line_number();
        let (name, inline_pattern) = self.match_directive_syntax(&MACRO, "macro", |caps| {
            (
                normalize_name(caps.name("name").unwrap().as_str()),
                caps.name("pattern").map(|m| m.as_str().to_string()),
            )
        })?;

        let pattern_nodes = self.parse_pattern_directive_list(&file_path, line_number, inline_pattern)?;

        let mut section_nodes = Vec::new();
        if self.matches_directive(&["section"])?.is_some() {
            while self.matches_directive(&["finally", "end macro"])?.is_none() {
                let section_line = self.line_number();
                let (section_name, once, inline_pattern) = self.match_directive_syntax(&SECTION, "section", |caps| {
                    (
                        normalize_name(caps.name("name").unwrap().as_str()),
                        caps.name("once").is_some(),
                        caps.name("pattern").map(|m| m.as_str().to_string()),
                    )
                })?;
                let section_patterns = self.parse_pattern_directive_list(&file_path, section_line, inline_pattern)?;
                section_nodes.push(SectionNode {
                    file_path: file_path.clone(),
                    line_number: section_line,
                    name: section_name,
                    once,
                    pattern_nodes: section_patterns,
                });
            }
        }
        if section_nodes.iter().any(|s| s.name == name) {
            return Err(FortielError::syntax(
                &file_path,
                line_number,
                SyntaxErrorKind::SectionNameCollidesWithMacro(name),
            ));
        }
        if let Some(dup) = find_duplicate(&section_nodes.iter().map(|s| s.name.clone()).collect::<Vec<_>>()) {
            return Err(FortielError::syntax(
                &file_path,
                line_number,
                SyntaxErrorKind::DuplicateSection(dup, name),
            ));
        }

        let mut finally_nodes = Vec::new();
        if self.matches_directive(&["finally"])?.is_some() {
            self.match_directive_syntax(&FINALLY, "finally", |_| ())?;
            while self.matches_directive(&["end macro"])?.is_none() {
                finally_nodes.push(self.parse_statement()?);
            }
        }
        self.match_directive_syntax(&END_MACRO, "end macro", |_| ())?;
        Ok(Node::Macro(std::rc::Rc::new(MacroNode {
            file_path,
            line_number,
            name,
            pattern_nodes,
            section_nodes,
            finally_nodes,
        })))
    }

    fn parse_pattern_directive_list(
        &mut self,
        file_path: &Path,
        line_number: usize,
        inline_pattern: Option<String>,
    ) -> Result<Vec<PatternNode>> {
        let mut raw_patterns: Vec<(usize, String)> = Vec::new();
        match inline_pattern {
            Some(pattern) => raw_patterns.push((line_number, pattern)),
            None => {
                if self.matches_directive(&["pattern"])?.is_none() {
                    return Err(self.syntax_err(SyntaxErrorKind::ExpectedPattern));
                }
            }
        }

        let mut pattern_nodes = Vec::new();
        // First (possibly inline) pattern's body.
        if let Some((pat_line, pattern)) = raw_patterns.pop() {
            let mut match_nodes = Vec::new();
            while self.matches_directive(&["pattern", "section", "finally", "end macro"])?.is_none() {
                match_nodes.push(self.parse_statement()?);
            }
            pattern_nodes.push(self.compile_pattern(file_path, pat_line, pattern, match_nodes)?);
        }
        // Zero or more explicit `pattern` directives.
        while self.matches_directive(&["pattern"])?.is_some() {
            let pat_line = self.line_number();
            let pattern =
                self.match_directive_syntax(&PATTERN, "pattern", |caps| caps.name("pattern").unwrap().as_str().to_string())?;
            let mut match_nodes = Vec::new();
            while self.matches_directive(&["pattern", "section", "finally", "end macro"])?.is_none() {
                match_nodes.push(self.parse_statement()?);
            }
            pattern_nodes.push(self.compile_pattern(file_path, pat_line, pattern, match_nodes)?);
        }
        Ok(pattern_nodes)
    }

    fn compile_pattern(
        &self,
        file_path: &Path,
        line_number: usize,
        pattern: String,
        match_nodes: Vec<Node>,
    ) -> Result<PatternNode> {
        let compiled = Regex::new(&format!("(?imx){pattern}")).map_err(|error| {
            FortielError::syntax(
                file_path,
                line_number,
                SyntaxErrorKind::InvalidPatternRegex { pattern: pattern.clone(), message: error.to_string() },
            )
        })?;
        Ok(PatternNode { file_path: file_path.to_path_buf(), line_number, pattern: compiled, match_nodes })
    }
}

fn find_duplicate(items: &[String]) -> Option<String> {
    let mut seen = std::collections::HashSet::new();
    for item in items {
        if !seen.insert(item.to_lowercase()) {
            return Some(item.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<Tree> {
        let lines = src.lines().map(|l| l.to_string()).collect();
        Parser::new("t.f", lines)?.parse()
    }

    #[test]
    fn plain_code_becomes_one_line_list() {
        let tree = parse("x = 1\ny = 2\n").unwrap();
        assert_eq!(tree.root_nodes.len(), 1);
        assert!(matches!(tree.root_nodes[0], Node::LineList(_)));
    }

    #[test]
    fn let_directive_parses_name_and_value() {
        let tree = parse("#@ let N = 3\n").unwrap();
        match &tree.root_nodes[0] {
            Node::Let(n) => {
                assert_eq!(n.name, "N");
                assert_eq!(n.value_expression, "3");
                assert!(n.arguments.is_none());
            }
            other => panic!("expected Let, got {other:?}"),
        }
    }

    #[test]
    fn functional_let_parses_arguments() {
        let tree = parse("#@ let SQ(x) = x * x\n").unwrap();
        match &tree.root_nodes[0] {
            Node::Let(n) => assert_eq!(n.arguments.as_deref(), Some(&["x".to_string()][..])),
            other => panic!("expected Let, got {other:?}"),
        }
    }

    #[test]
    fn if_elif_else_parses_all_branches() {
        let tree = parse("#@ if K==1\nA\n#@ else if K==2\nB\n#@ else\nC\n#@ end if\n").unwrap();
        match &tree.root_nodes[0] {
            Node::If(n) => {
                assert_eq!(n.elif_nodes.len(), 1);
                assert!(!n.else_nodes.is_empty());
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn do_loop_parses_index_and_range() {
        let tree = parse("#@ do I = (1, 3)\nx($I) = 0\n#@ end do\n").unwrap();
        match &tree.root_nodes[0] {
            Node::Do(n) => {
                assert_eq!(n.index_name, "I");
                assert_eq!(n.ranges_expression, "(1, 3)");
                assert_eq!(n.loop_nodes.len(), 1);
            }
            other => panic!("expected Do, got {other:?}"),
        }
    }

    #[test]
    fn macro_with_single_inline_pattern() {
        let tree = parse("#@ macro SQUARE (?P<x>.+)\n($x)*($x)\n#@ end macro\n").unwrap();
        match &tree.root_nodes[0] {
            Node::Macro(m) => {
                assert_eq!(m.name, "square");
                assert_eq!(m.pattern_nodes.len(), 1);
                assert!(!m.is_construct());
            }
            other => panic!("expected Macro, got {other:?}"),
        }
    }

    #[test]
    fn call_segment_is_left_unresolved_by_parser() {
        let tree = parse("@Square a+1\n").unwrap();
        assert!(matches!(tree.root_nodes[0], Node::CallSegment(_)));
    }

    #[test]
    fn misplaced_terminator_is_syntax_error() {
        assert!(parse("#@ end if\n").is_err());
    }

    #[test]
    fn unknown_directive_is_syntax_error() {
        assert!(parse("#@ bogus\n").is_err());
    }
}
