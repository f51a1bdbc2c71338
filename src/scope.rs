//! Scope, macro table, and the set of already-imported files.
//!
//! The scope is a single flat identifier → value map, mirrored into
//! the `rhai` engine's own [`rhai::Scope`] so that expressions can see
//! exactly what directives have bound (see [`crate::sandbox`]).

use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;

use rhai::Scope as RhaiScope;

use crate::tree::MacroNode;

/// Reserved scope names with built-in meaning; `let`/`del` may not
/// bind or unbind them.
pub const BUILTIN_NAMES: &[&str] = &["__INDEX__", "__FILE__", "__LINE__", "__DATE__", "__TIME__"];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.iter().any(|b| b.eq_ignore_ascii_case(name))
}

/// Keywords of the embedded expression language; a `let`/`do`/`for`
/// name or functional-`let` argument colliding with one of these would
/// be unusable inside a generated expression, so the parser rejects it
/// up front (mirrors the original's guard against Python keywords,
/// adapted to the Rhai keyword set actually in use here).
const SANDBOX_KEYWORDS: &[&str] = &[
    "true", "false", "let", "const", "if", "else", "while", "loop", "for", "in", "continue",
    "break", "fn", "return", "throw", "try", "catch", "import", "export", "as", "global",
    "private", "and", "or", "not", "switch", "this", "type_of", "print", "debug",
];

pub fn is_reserved(name: &str) -> bool {
    SANDBOX_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(name))
}

/// Normalizes a macro/section/call name: strips internal whitespace,
/// lower-cases. Mirrors `_make_name`.
pub fn normalize_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase()
}

/// Owns the variable bindings, the macro table, and the idempotent
/// import set for a single evaluator run.
pub struct Scope {
    pub rhai_scope: RhaiScope<'static>,
    pub macros: std::collections::HashMap<String, Rc<MacroNode>>,
    pub imported_files: HashSet<PathBuf>,
    /// Mirrors the ambient `__INDEX__` binding; `None` outside any `do`.
    pub loop_index: Option<i64>,
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            rhai_scope: RhaiScope::new(),
            macros: std::collections::HashMap::new(),
            imported_files: HashSet::new(),
            loop_index: None,
        }
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.rhai_scope.contains(name)
    }

    pub fn set<T: rhai::Variant + Clone>(&mut self, name: &str, value: T) {
        if self.rhai_scope.contains(name) {
            self.rhai_scope.set_value(name, value);
        } else {
            self.rhai_scope.push(name.to_string(), value);
        }
    }

    /// Binds a name to an already-dynamic value (used when the value
    /// came out of the sandbox rather than from a concrete Rust type).
    pub fn set_dynamic(&mut self, name: &str, value: rhai::Dynamic) {
        if self.rhai_scope.contains(name) {
            self.rhai_scope.set_value(name, value);
        } else {
            self.rhai_scope.push_dynamic(name.to_string(), value);
        }
    }

    pub fn unset(&mut self, name: &str) {
        // rhai::Scope has no direct remove; rebuild without the entry.
        let remaining: Vec<(String, rhai::Dynamic)> = self
            .rhai_scope
            .iter()
            .filter(|(n, _, _)| *n != name)
            .map(|(n, _, v)| (n.to_string(), v))
            .collect();
        self.rhai_scope.clear();
        for (n, v) in remaining {
            self.rhai_scope.push_dynamic(n, v);
        }
    }

    pub fn set_loop_index(&mut self, index: Option<i64>) {
        self.loop_index = index;
        match index {
            Some(i) => self.set("__INDEX__", i),
            None => self.unset("__INDEX__"),
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}
