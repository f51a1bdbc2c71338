//! The embedded expression sandbox.
//!
//! Fortiel embeds `rhai` the same way the reference crate's own
//! template engine embeds it for `{{ }}` expressions (see
//! `rhai_bridge.rs`): one [`rhai::Engine`] per run, a [`rhai::Scope`]
//! kept in sync with directive bindings, and a small set of native
//! functions registered for the directive language's own vocabulary —
//! here just `defined(name)`.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;

use rhai::{Dynamic, Engine};

use crate::error::{FortielError, Result, RuntimeErrorKind};
use crate::scope::Scope;

pub struct Sandbox {
    engine: Engine,
    known_names: Rc<RefCell<HashSet<String>>>,
}

impl Sandbox {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_max_expr_depths(128, 128);

        let known_names: Rc<RefCell<HashSet<String>>> = Rc::new(RefCell::new(HashSet::new()));
        let defined_names = known_names.clone();
        engine.register_fn("defined", move |name: &str| -> bool {
            defined_names.borrow().contains(name)
        });

        Sandbox { engine, known_names }
    }

    fn sync_known_names(&self, scope: &Scope) {
        let mut known = self.known_names.borrow_mut();
        known.clear();
        for (name, _, _) in scope.rhai_scope.iter() {
            known.insert(name.to_string());
        }
    }

    /// Evaluates `expression` against `scope`, injecting fresh
    /// `__FILE__`/`__LINE__` bindings first so every expression sees
    /// the call site it was raised from.
    pub fn evaluate(
        &self,
        expression: &str,
        scope: &mut Scope,
        file: &Path,
        line: usize,
    ) -> Result<Dynamic> {
        scope.set("__FILE__", file.display().to_string());
        scope.set("__LINE__", line as i64);
        self.sync_known_names(scope);
        self.engine
            .eval_with_scope::<Dynamic>(&mut scope.rhai_scope, expression)
            .map_err(|error| {
                FortielError::runtime(
                    file,
                    line,
                    RuntimeErrorKind::ExpressionFailed {
                        expression: expression.to_string(),
                        message: error.to_string(),
                    },
                )
            })
    }

    /// Evaluates a bare identifier used in a `$NAME`/`@NAME`
    /// substitution; a lookup failure is reported as an undefined name
    /// rather than a generic expression failure.
    pub fn evaluate_name(
        &self,
        name: &str,
        scope: &mut Scope,
        file: &Path,
        line: usize,
    ) -> Result<Dynamic> {
        self.evaluate(name, scope, file, line)
            .map_err(|_| FortielError::runtime(file, line, RuntimeErrorKind::UndefinedName(name.to_string())))
    }

    pub fn evaluate_bool(
        &self,
        expression: &str,
        scope: &mut Scope,
        file: &Path,
        line: usize,
    ) -> Result<bool> {
        let value = self.evaluate(expression, scope, file, line)?;
        Ok(is_truthy(&value))
    }

    /// Evaluates a `do` ranges expression: a 2- or 3-integer tuple,
    /// inclusive of the top (`range(start, stop+step, step)`).
    pub fn evaluate_ranges(
        &self,
        expression: &str,
        scope: &mut Scope,
        file: &Path,
        line: usize,
    ) -> Result<Vec<i64>> {
        // The directive grammar writes ranges as a parenthesized tuple
        // (`(1, 3)`, `(1, 3, 2)`); Rhai has no bare tuple literal, so a
        // top-level `(...)` is rewritten to an array literal before
        // evaluation. General expressions use Rhai's own `[...]`.
        let rewritten = rewrite_tuple_literal(expression);
        let value = self.evaluate(&rewritten, scope, file, line)?;
        let array = value
            .into_array()
            .map_err(|_| FortielError::runtime(file, line, RuntimeErrorKind::IllTypedDoRange))?;
        if !(2..=3).contains(&array.len()) {
            return Err(FortielError::runtime(file, line, RuntimeErrorKind::IllTypedDoRange));
        }
        let ints: Vec<i64> = array
            .iter()
            .map(|d| d.as_int().ok())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| FortielError::runtime(file, line, RuntimeErrorKind::IllTypedDoRange))?;
        let start = ints[0];
        let stop = ints[1];
        let step = if ints.len() == 3 { ints[2] } else { 1 };
        if step == 0 {
            return Err(FortielError::runtime(file, line, RuntimeErrorKind::IllTypedDoRange));
        }
        let mut values = Vec::new();
        let mut i = start;
        if step > 0 {
            while i <= stop {
                values.push(i);
                i += step;
            }
        } else {
            while i >= stop {
                values.push(i);
                i += step;
            }
        }
        Ok(values)
    }

    /// Builds and evaluates a functional `let`: `|args| value_expr`.
    pub fn evaluate_function(
        &self,
        arguments: &[String],
        value_expression: &str,
        scope: &mut Scope,
        file: &Path,
        line: usize,
    ) -> Result<Dynamic> {
        let params = arguments
            .iter()
            .map(|a| a.trim_start_matches('*').to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let function_expression = format!("|{params}| {value_expression}");
        self.evaluate(&function_expression, scope, file, line)
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Host-language truthiness for `if`/`ifdef`-style conditions: `0`,
/// `0.0`, `""`, `()`/`[]`, and empty maps are falsy; unit (`()` as a
/// missing value, not an empty tuple) is falsy; everything else,
/// including non-empty strings/collections, is truthy. Mirrors the
/// original's plain `if condition:` (fortiel.py), where Python applies
/// the same rule to numbers, strings, and collections.
fn is_truthy(value: &Dynamic) -> bool {
    if let Ok(b) = value.as_bool() {
        return b;
    }
    if let Ok(i) = value.as_int() {
        return i != 0;
    }
    if let Ok(f) = value.as_float() {
        return f != 0.0;
    }
    if value.is_unit() {
        return false;
    }
    if let Ok(s) = value.clone().into_string() {
        return !s.is_empty();
    }
    if let Some(array) = value.clone().try_cast::<rhai::Array>() {
        return !array.is_empty();
    }
    if let Some(map) = value.clone().try_cast::<rhai::Map>() {
        return !map.is_empty();
    }
    true
}

fn rewrite_tuple_literal(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.starts_with('(') && trimmed.ends_with(')') && trimmed.contains(',') {
        format!("[{}]", &trimmed[1..trimmed.len() - 1])
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn evaluates_arithmetic() {
        let sandbox = Sandbox::new();
        let mut scope = Scope::new();
        scope.set("n", 3_i64);
        let value = sandbox
            .evaluate("n * n", &mut scope, &PathBuf::from("t"), 1)
            .unwrap();
        assert_eq!(value.as_int().unwrap(), 9);
    }

    #[test]
    fn defined_reflects_scope() {
        let sandbox = Sandbox::new();
        let mut scope = Scope::new();
        scope.set("FOO", 1_i64);
        let value = sandbox
            .evaluate_bool("defined(\"FOO\")", &mut scope, &PathBuf::from("t"), 1)
            .unwrap();
        assert!(value);
        let value = sandbox
            .evaluate_bool("defined(\"BAR\")", &mut scope, &PathBuf::from("t"), 1)
            .unwrap();
        assert!(!value);
    }

    #[test]
    fn zero_empty_string_and_empty_tuple_are_falsy() {
        let sandbox = Sandbox::new();
        let mut scope = Scope::new();
        assert!(!sandbox.evaluate_bool("0", &mut scope, &PathBuf::from("t"), 1).unwrap());
        assert!(!sandbox.evaluate_bool("\"\"", &mut scope, &PathBuf::from("t"), 1).unwrap());
        assert!(!sandbox.evaluate_bool("[]", &mut scope, &PathBuf::from("t"), 1).unwrap());
    }

    #[test]
    fn nonzero_and_nonempty_values_are_truthy() {
        let sandbox = Sandbox::new();
        let mut scope = Scope::new();
        assert!(sandbox.evaluate_bool("1", &mut scope, &PathBuf::from("t"), 1).unwrap());
        assert!(sandbox.evaluate_bool("\"x\"", &mut scope, &PathBuf::from("t"), 1).unwrap());
        assert!(sandbox.evaluate_bool("[1]", &mut scope, &PathBuf::from("t"), 1).unwrap());
    }

    #[test]
    fn ranges_require_two_or_three_ints() {
        let sandbox = Sandbox::new();
        let mut scope = Scope::new();
        let values = sandbox
            .evaluate_ranges("(1, 3)", &mut scope, &PathBuf::from("t"), 1)
            .unwrap();
        assert_eq!(values, vec![1, 2, 3]);

        let values = sandbox
            .evaluate_ranges("(1, 5, 2)", &mut scope, &PathBuf::from("t"), 1)
            .unwrap();
        assert_eq!(values, vec![1, 3, 5]);

        assert!(sandbox
            .evaluate_ranges("(1,)", &mut scope, &PathBuf::from("t"), 1)
            .is_err());
    }

    #[test]
    fn undefined_name_is_runtime_error() {
        let sandbox = Sandbox::new();
        let mut scope = Scope::new();
        let err = sandbox.evaluate_name("NOPE", &mut scope, &PathBuf::from("t"), 1);
        assert!(matches!(
            err,
            Err(FortielError::Runtime {
                kind: RuntimeErrorKind::UndefinedName(_),
                ..
            })
        ));
    }
}
