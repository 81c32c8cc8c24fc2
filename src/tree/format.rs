//! Source rendering of production trees.
//!
//! Productions mark block structure with `{:` (open) and `:}` (close);
//! [`brackets_to_indent`] turns those markers into indentation.

use super::{arena::Tree, node::NodeId};
use crate::error::{Result, TreegraftError};

const INDENT: &str = "  ";
const LOOP_BREAK: &str = "loopBreak";
const LOOP_BREAK_UNNUMBERED: &str = "loopBreak%";
const LOOP_BREAK_INITIALISE: &str = "loopBreak% = 0";
const LOOP_BREAK_IF: &str = "if loopBreak% >";
const LOOP_BREAK_INCREMENT: &str = "loopBreak% += 1";
const FOR_COUNTER: &str = "forCounter";
const FOR_COUNTER_UNNUMBERED: &str = "forCounter%";

/// Raw production text of a subtree, block markers still in place.
pub fn to_source(tree: &Tree, id: NodeId) -> String {
    let mut out = String::new();
    render(tree, id, &mut out);
    out
}

fn render(tree: &Tree, id: NodeId, out: &mut String) {
    let Some(node) = tree.get(id) else {
        return;
    };
    let parts = &node.symbol().parts;
    if node.is_leaf() {
        out.push_str(parts.first().unwrap_or(&node.symbol().name));
    } else if parts.is_empty() {
        for &child in node.children() {
            render(tree, child, out);
        }
    } else {
        for (i, &child) in node.children().iter().enumerate() {
            if let Some(part) = parts.get(i) {
                out.push_str(part);
            }
            render(tree, child, out);
        }
        if let Some(part) = parts.get(node.child_count()) {
            out.push_str(part);
        }
    }
}

/// Converts block markers to two-space indentation and numbers loop helpers.
pub fn brackets_to_indent(code: &str, additional_indent: &str) -> Result<String> {
    let mut out = String::with_capacity(code.len());
    let mut indent: usize = 0;
    let mut for_counter = 0usize;

    for (i, raw) in code.split('\n').enumerate() {
        let mut line = raw.trim();
        while let Some(rest) = line.strip_prefix(":}") {
            indent = indent.saturating_sub(1);
            line = rest.trim();
        }

        if i > 0 {
            out.push_str(additional_indent);
        }
        for _ in 0..indent {
            out.push_str(INDENT);
        }

        while let Some(rest) = line.strip_suffix("{:") {
            indent += 1;
            line = rest.trim();
        }
        while let Some(rest) = line.strip_suffix(":}") {
            indent = indent.saturating_sub(1);
            line = rest.trim();
        }

        let line = if line.contains(LOOP_BREAK_UNNUMBERED) {
            if line.contains(LOOP_BREAK_INITIALISE) {
                String::new()
            } else if line.contains(LOOP_BREAK_IF) || line.contains(LOOP_BREAK_INCREMENT) {
                line.replace(LOOP_BREAK_UNNUMBERED, LOOP_BREAK)
            } else {
                return Err(TreegraftError::InvalidTree(format!(
                    "Malformed loop break line: '{}'",
                    line
                )));
            }
        } else if line.contains(FOR_COUNTER_UNNUMBERED) {
            let numbered = line.replace(FOR_COUNTER_UNNUMBERED, &format!("{}{}", FOR_COUNTER, for_counter));
            for_counter += 1;
            numbered
        } else {
            line.to_string()
        };

        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Renders a subtree as an executable fragment with the loop-break preamble.
///
/// The first line continues `header`; when `header` ends in whitespace that
/// whitespace becomes the indentation of every following line.
pub fn format_program(tree: &Tree, id: NodeId, loop_break_const: usize, header: &str) -> Result<String> {
    let last_line = header.rsplit('\n').next().unwrap_or("");
    let indent = if last_line.trim().is_empty() { last_line } else { "" };

    let mut out = String::from(header);
    out.push_str(&format!("loopBreakConst = {}\n", loop_break_const));
    out.push_str(indent);
    out.push_str("loopBreak = 0\n");
    out.push_str(indent);
    out.push_str(&brackets_to_indent(&to_source(tree, id), indent)?);
    Ok(out)
}
