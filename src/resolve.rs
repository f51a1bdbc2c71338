//! Macro call resolution: folds a `CallSegment` and whatever siblings
//! belong to it into a single `Call`/`CallSection` node.
//!
//! Resolution happens lazily, one call at a time, as the executor walks
//! a sibling list (spec §4.6) — not as an up-front pass over the whole
//! list. [`resolve_call_segment`] takes the list and the index of one
//! `CallSegment` within it and returns the finished `Call` node plus the
//! index of the first sibling it did not consume; it never mutates
//! `nodes`, so there is no aliasing between the list being scanned and
//! the node being built (per the Design Note in spec §9).

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{FortielError, Result, RuntimeErrorKind};
use crate::scope::normalize_name;
use crate::tree::{CallNode, CallSectionNode, MacroNode, Node};

/// Resolves the `CallSegment` at `nodes[start]` against `macros`,
/// consuming as many of the following siblings as the macro's
/// construct requires (sections, `finally`-eligible body, and the
/// terminating `@end<name>`). Nested, unrelated call segments
/// encountered while scanning are resolved first (depth-first, as the
/// original's recursion at the "any other name" branch does) and
/// folded into the enclosing call's captured area as `Node::Call`.
///
/// Returns the finished node and the index of the first sibling after
/// it — callers should resume their own walk from there.
pub fn resolve_call_segment(
    nodes: &[Node],
    start: usize,
    macros: &HashMap<String, Rc<MacroNode>>,
) -> Result<(CallNode, usize)> {
    let segment = match &nodes[start] {
        Node::CallSegment(segment) => segment.clone(),
        _ => return Err(FortielError::Internal("resolve_call_segment called on a non-CallSegment node".to_string())),
    };
    let macro_node = macros.get(&normalize_name(&segment.name)).cloned().ok_or_else(|| {
        FortielError::runtime(
            &segment.file_path,
            segment.line_number,
            RuntimeErrorKind::UnknownMacro(segment.name.clone()),
        )
    })?;
    let mut call = CallNode::from_segment(segment);

    if !macro_node.is_construct() {
        return Ok((call, start + 1));
    }

    let end_name = format!("end{}", macro_node.name);
    let section_names = macro_node.section_names();
    let mut index = start + 1;
    let mut found_end = false;

    while index < nodes.len() {
        match &nodes[index] {
            Node::CallSegment(next_segment) if normalize_name(&next_segment.name) == end_name => {
                found_end = true;
                index += 1;
                break;
            }
            Node::CallSegment(next_segment)
                if section_names.contains(&normalize_name(&next_segment.name).as_str()) =>
            {
                call.call_section_nodes.push(CallSectionNode::from_segment(next_segment.clone()));
                index += 1;
            }
            Node::CallSegment(_) => {
                // A nested (unrelated) scoped call: resolve it before
                // folding the result back in.
                let (nested_call, next_index) = resolve_call_segment(nodes, index, macros)?;
                append_captured(&mut call, Node::Call(nested_call));
                index = next_index;
            }
            other => {
                append_captured(&mut call, other.clone());
                index += 1;
            }
        }
    }

    if !found_end {
        return Err(FortielError::runtime(
            &call.file_path,
            call.line_number,
            RuntimeErrorKind::UnbalancedCallEnd(end_name),
        ));
    }

    Ok((call, index))
}

fn append_captured(call: &mut CallNode, node: Node) {
    match call.call_section_nodes.last_mut() {
        Some(section) => section.captured_nodes.push(node),
        None => call.captured_nodes.push(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::CallSegmentNode;
    use std::path::PathBuf;

    fn segment(name: &str) -> Node {
        Node::CallSegment(CallSegmentNode {
            file_path: PathBuf::from("t.f90"),
            line_number: 1,
            spaces_before: String::new(),
            name: name.to_string(),
            argument: String::new(),
        })
    }

    fn simple_macro(name: &str) -> Rc<MacroNode> {
        Rc::new(MacroNode {
            file_path: PathBuf::from("t.f90"),
            line_number: 1,
            name: name.to_string(),
            pattern_nodes: Vec::new(),
            section_nodes: Vec::new(),
            finally_nodes: Vec::new(),
        })
    }

    #[test]
    fn non_construct_macro_resolves_without_consuming_siblings() {
        let mut macros = HashMap::new();
        macros.insert("square".to_string(), simple_macro("square"));
        let nodes = vec![segment("square"), segment("square")];

        let (first, next) = resolve_call_segment(&nodes, 0, &macros).unwrap();
        assert!(matches!(first, CallNode { .. }));
        assert_eq!(next, 1);

        let (_second, next) = resolve_call_segment(&nodes, next, &macros).unwrap();
        assert_eq!(next, 2);
    }

    #[test]
    fn construct_macro_without_end_is_runtime_error() {
        let macro_node = MacroNode {
            file_path: PathBuf::from("t.f90"),
            line_number: 1,
            name: "m".to_string(),
            pattern_nodes: Vec::new(),
            section_nodes: Vec::new(),
            finally_nodes: vec![segment("tail")],
        };
        let mut macros = HashMap::new();
        macros.insert("m".to_string(), Rc::new(macro_node));
        let nodes = vec![segment("m")];
        assert!(resolve_call_segment(&nodes, 0, &macros).is_err());
    }

    #[test]
    fn construct_macro_consumes_up_to_its_end_marker() {
        let macro_node = MacroNode {
            file_path: PathBuf::from("t.f90"),
            line_number: 1,
            name: "m".to_string(),
            pattern_nodes: Vec::new(),
            section_nodes: Vec::new(),
            finally_nodes: vec![segment("tail")],
        };
        let mut macros = HashMap::new();
        macros.insert("m".to_string(), Rc::new(macro_node));
        let nodes = vec![segment("m"), segment("endm"), segment("square")];
        let mut macros_with_square = macros.clone();
        macros_with_square.insert("square".to_string(), simple_macro("square"));

        let (_call, next) = resolve_call_segment(&nodes, 0, &macros_with_square).unwrap();
        assert_eq!(next, 2);
    }
}
