//! The Fortiel syntax tree: node types produced by the parser and
//! consumed by the executor.
//!
//! The parser only ever captures textual form and origin; it never
//! evaluates expressions, argument patterns, or names (see
//! [`crate::parser`]).

use std::path::{Path, PathBuf};
use std::rc::Rc;

use regex::Regex;

/// A parsed source file: a root path plus its top-level nodes.
#[derive(Debug, Clone)]
pub struct Tree {
    pub file_path: PathBuf,
    pub root_nodes: Vec<Node>,
}

/// A directive or code-line node, ordered as it appeared in the source.
#[derive(Debug, Clone)]
pub enum Node {
    LineList(LineListNode),
    Use(UseNode),
    Let(LetNode),
    Del(DelNode),
    If(IfNode),
    Do(DoNode),
    For(ForNode),
    Macro(Rc<MacroNode>),
    /// Raw, pre-resolution call. Only ever appears in a sibling list
    /// before [`crate::resolve::resolve_call_segment`] has run on it.
    CallSegment(CallSegmentNode),
    /// Post-resolution call, with captured body and sections attached.
    Call(CallNode),
}

impl Node {
    pub fn origin_file(&self) -> &Path {
        match self {
            Node::LineList(n) => &n.file_path,
            Node::Use(n) => &n.file_path,
            Node::Let(n) => &n.file_path,
            Node::Del(n) => &n.file_path,
            Node::If(n) => &n.file_path,
            Node::Do(n) => &n.file_path,
            Node::For(n) => &n.file_path,
            Node::Macro(n) => &n.file_path,
            Node::CallSegment(n) => &n.file_path,
            Node::Call(n) => &n.file_path,
        }
    }

    pub fn origin_line(&self) -> usize {
        match self {
            Node::LineList(n) => n.line_number,
            Node::Use(n) => n.line_number,
            Node::Let(n) => n.line_number,
            Node::Del(n) => n.line_number,
            Node::If(n) => n.line_number,
            Node::Do(n) => n.line_number,
            Node::For(n) => n.line_number,
            Node::Macro(n) => n.line_number,
            Node::CallSegment(n) => n.line_number,
            Node::Call(n) => n.line_number,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LineListNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UseNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub imported_file_path: String,
}

#[derive(Debug, Clone)]
pub struct LetNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub name: String,
    /// `None` for a plain value `let`; `Some` (possibly empty) for a
    /// functional `let`, each entry still carrying its `*`/`**` markers.
    pub arguments: Option<Vec<String>>,
    pub value_expression: String,
}

#[derive(Debug, Clone)]
pub struct DelNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IfNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub condition_expression: String,
    pub then_nodes: Vec<Node>,
    pub elif_nodes: Vec<ElifNode>,
    pub else_nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct ElifNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub condition_expression: String,
    pub then_nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct DoNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub index_name: String,
    pub ranges_expression: String,
    pub loop_nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct ForNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub index_names: Vec<String>,
    pub iterable_expression: String,
    pub loop_nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct MacroNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub name: String,
    pub pattern_nodes: Vec<PatternNode>,
    pub section_nodes: Vec<SectionNode>,
    pub finally_nodes: Vec<Node>,
}

impl MacroNode {
    /// A macro is a "construct" macro (requires `@end<name>`) when it
    /// has at least one section or a finally body.
    pub fn is_construct(&self) -> bool {
        !self.section_nodes.is_empty() || !self.finally_nodes.is_empty()
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.section_nodes.iter().map(|s| s.name.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct SectionNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub name: String,
    pub once: bool,
    pub pattern_nodes: Vec<PatternNode>,
}

#[derive(Debug, Clone)]
pub struct PatternNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub pattern: Regex,
    pub match_nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct CallSegmentNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub spaces_before: String,
    pub name: String,
    pub argument: String,
}

#[derive(Debug, Clone)]
pub struct CallNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub spaces_before: String,
    pub name: String,
    pub argument: String,
    pub captured_nodes: Vec<Node>,
    pub call_section_nodes: Vec<CallSectionNode>,
}

impl CallNode {
    pub fn from_segment(segment: CallSegmentNode) -> Self {
        CallNode {
            file_path: segment.file_path,
            line_number: segment.line_number,
            spaces_before: segment.spaces_before,
            name: segment.name,
            argument: segment.argument,
            captured_nodes: Vec::new(),
            call_section_nodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallSectionNode {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub name: String,
    pub argument: String,
    pub captured_nodes: Vec<Node>,
}

impl CallSectionNode {
    pub fn from_segment(segment: CallSegmentNode) -> Self {
        CallSectionNode {
            file_path: segment.file_path,
            line_number: segment.line_number,
            name: segment.name,
            argument: segment.argument,
            captured_nodes: Vec::new(),
        }
    }
}
