//! The substitution engine: four ordered passes applied to every
//! ordinary code line, each recursively re-processing the text it
//! produces.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{FortielError, Result, RuntimeErrorKind};
use crate::sandbox::Sandbox;
use crate::scope::Scope;

/// `${EXPR}$`
static INLINE_EVAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{(?P<expression>.+?)\}\$").unwrap());
/// `$NAME` or `@NAME`
static INLINE_SHORT_EVAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$@]\s*(?P<expression>\w+)\b").unwrap());
/// `@:` or `@NAME` (no braces), optionally flanked by commas.
static INLINE_SHORT_LOOP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<comma_before>,\s*)?[\^@](?P<expression>:|\w+)(?P<comma_after>\s*,)?").unwrap()
});
/// `@{EXPR}@` or `@{EXPR@|@RANGES}@`, optionally flanked by commas.
static INLINE_LOOP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<comma_before>,\s*)?[\^@]\{(?P<expression>.*?)(?:[\^@]\|[\^@](?P<ranges_expression>.*?))?\}[\^@](?P<comma_after>\s*,)?",
    )
    .unwrap()
});
/// `LHS += RHS` / `LHS -= RHS`.
static AUGMENTED_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<indent>\s*)(?P<lhs>.+?)\s*(?P<op>[+-])=\s*(?P<rhs>.*)$").unwrap());

/// Runs the full substitution pipeline over one ordinary code line.
pub fn substitute_line(
    line: &str,
    sandbox: &Sandbox,
    scope: &mut Scope,
    file: &Path,
    line_number: usize,
) -> Result<String> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('!') && !trimmed.starts_with("!$") {
        return Ok(line.to_string());
    }

    let mut text = line.to_string();
    text = sub_loop(&INLINE_LOOP, &text, sandbox, scope, file, line_number)?;
    text = sub_loop(&INLINE_SHORT_LOOP, &text, sandbox, scope, file, line_number)?;
    text = sub_eval(&INLINE_EVAL, &text, sandbox, scope, file, line_number, false)?;

    let lstripped = text.trim_start();
    text = if lstripped.len() >= 2 && lstripped[..2].eq_ignore_ascii_case("!$") {
        let cut = text.len() - lstripped.len() + 2;
        let (prefix, rest) = text.split_at(cut);
        let rest = sub_eval(&INLINE_SHORT_EVAL, rest, sandbox, scope, file, line_number, true)?;
        format!("{prefix}{rest}")
    } else {
        sub_eval(&INLINE_SHORT_EVAL, &text, sandbox, scope, file, line_number, true)?
    };

    text = apply_augmented_assignment(&text);
    Ok(text)
}

/// Applies a fallible replacement function over every non-overlapping
/// match of `re` in `text`.
fn replace_all_fallible(
    re: &Regex,
    text: &str,
    mut f: impl FnMut(&Captures) -> Result<String>,
) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        out.push_str(&text[last..whole.start()]);
        out.push_str(&f(&caps)?);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

fn sub_eval(
    re: &Regex,
    text: &str,
    sandbox: &Sandbox,
    scope: &mut Scope,
    file: &Path,
    line_number: usize,
    is_name_form: bool,
) -> Result<String> {
    replace_all_fallible(re, text, |caps| {
        let expression = &caps["expression"];
        let value = if is_name_form {
            sandbox.evaluate_name(expression, scope, file, line_number)?
        } else {
            sandbox.evaluate(expression, scope, file, line_number)?
        };
        let sub = stringify_substitution(&value);
        // Recursively process the substituted text.
        substitute_line(&sub, sandbox, scope, file, line_number)
    })
}

fn stringify_substitution(value: &rhai::Dynamic) -> String {
    if let Some(i) = value.as_int().ok() {
        if i < 0 {
            return format!("({i})");
        }
        return i.to_string();
    }
    if let Some(f) = value.as_float().ok() {
        if f < 0.0 {
            return format!("({f})");
        }
        return f.to_string();
    }
    value.to_string()
}

fn sub_loop(
    re: &Regex,
    text: &str,
    sandbox: &Sandbox,
    scope: &mut Scope,
    file: &Path,
    line_number: usize,
) -> Result<String> {
    replace_all_fallible(re, text, |caps| {
        let expression = &caps["expression"];
        let comma_before = caps.name("comma_before").map(|m| m.as_str());
        let comma_after = caps.name("comma_after").map(|m| m.as_str());
        let ranges_expression = caps.name("ranges_expression").map(|m| m.as_str());

        let indices: Vec<i64> = if let Some(ranges_expression) = ranges_expression {
            sandbox.evaluate_ranges(ranges_expression, scope, file, line_number)?
        } else {
            let index = scope
                .loop_index
                .ok_or_else(|| FortielError::runtime(file, line_number, RuntimeErrorKind::LoopIndexUnset))?;
            (1..=index.max(0)).collect()
        };

        let pieces: Vec<String> = indices
            .iter()
            .map(|i| expression.replace("$$", &i.to_string()))
            .collect();
        let joined = pieces.join(",");

        let sub = if !joined.is_empty() {
            let mut sub = String::new();
            if let Some(before) = comma_before {
                sub.push_str(before);
            }
            sub.push_str(&joined);
            if let Some(after) = comma_after {
                sub.push_str(after);
            }
            sub
        } else if comma_before.is_some() && comma_after.is_some() {
            ",".to_string()
        } else {
            String::new()
        };

        substitute_line(&sub, sandbox, scope, file, line_number)
    })
}

fn apply_augmented_assignment(line: &str) -> String {
    if let Some(caps) = AUGMENTED_ASSIGN.captures(line) {
        let indent = &caps["indent"];
        let lhs = &caps["lhs"];
        let op = &caps["op"];
        let rhs = &caps["rhs"];
        format!("{indent}{lhs} = {lhs} {op} {rhs}")
    } else {
        line.to_string()
    }
}
