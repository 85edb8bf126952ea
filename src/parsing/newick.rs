//! Newick reader and writer.
//!
//! Both directions are iterative so that deep, unbalanced trees with tens of
//! thousands of leaves cannot overflow the stack.
//!
//! Internal node labels may carry a support value, a taxon label, or both in
//! the `'support:label'` form used by GTDB trees:
//!
//! ```text
//! ((A:0.1,B:0.2)'100.0:g__Foo':0.3,C:0.4);
//! ```

use std::path::Path;

use crate::core::tree::{NodeId, ReferenceTree, TreeNode};
use crate::parsing::ParseError;
use crate::utils::validation::check_record_limit;

/// Parse a Newick file
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read or
/// `ParseError::Newick` if the text is malformed.
pub fn parse_newick_file(path: &Path) -> Result<ReferenceTree, ParseError> {
    let text = std::fs::read_to_string(path)?;
    parse_newick(&text)
}

/// Parse a Newick string into a [`ReferenceTree`].
///
/// Nodes are numbered in pre-order, so node 0 is the root.
///
/// # Errors
///
/// Returns `ParseError::Newick` on unbalanced parentheses, bad branch lengths,
/// unterminated quotes or a missing `;`.
pub fn parse_newick(text: &str) -> Result<ReferenceTree, ParseError> {
    let bytes = text.as_bytes();
    let mut nodes: Vec<TreeNode> = vec![TreeNode::default()];
    let mut has_children = vec![false];
    let mut current = NodeId(0);
    let mut pos = 0;
    let mut terminated = false;

    let err = |position: usize, message: &str| ParseError::Newick {
        position,
        message: message.to_string(),
    };

    while pos < bytes.len() {
        match bytes[pos] {
            b'(' => {
                has_children[current.0] = true;
                current = push_child(&mut nodes, &mut has_children, current)?;
                pos += 1;
            }
            b',' => {
                let parent = nodes[current.0]
                    .parent
                    .ok_or_else(|| err(pos, "',' outside of parentheses"))?;
                current = push_child(&mut nodes, &mut has_children, parent)?;
                pos += 1;
            }
            b')' => {
                current = nodes[current.0]
                    .parent
                    .ok_or_else(|| err(pos, "unbalanced ')'"))?;
                pos += 1;
            }
            b':' => {
                let start = pos + 1;
                let end = scan_unquoted(bytes, start);
                let raw = text[start..end].trim();
                let length: f64 = raw
                    .parse()
                    .map_err(|_| err(start, &format!("invalid branch length '{raw}'")))?;
                nodes[current.0].branch_length = Some(length);
                pos = end;
            }
            b';' => {
                if current.0 != 0 {
                    return Err(err(pos, "missing ')' before ';'"));
                }
                terminated = true;
                pos += 1;
                break;
            }
            b'[' => {
                pos = skip_comment(bytes, pos).ok_or_else(|| err(pos, "unterminated comment"))?;
            }
            c if c.is_ascii_whitespace() => pos += 1,
            b'\'' => {
                let (label, end) =
                    read_quoted(text, pos).ok_or_else(|| err(pos, "unterminated quoted label"))?;
                apply_label(&mut nodes[current.0], has_children[current.0], &label);
                pos = end;
            }
            _ => {
                let end = scan_unquoted(bytes, pos);
                apply_label(&mut nodes[current.0], has_children[current.0], text[pos..end].trim());
                pos = end;
            }
        }
    }

    if !terminated {
        return Err(err(bytes.len(), "missing terminating ';'"));
    }
    if text[pos..].trim().chars().any(|c| c != ';') {
        return Err(err(pos, "trailing content after ';'"));
    }

    Ok(ReferenceTree::from_nodes(nodes)?)
}

fn push_child(
    nodes: &mut Vec<TreeNode>,
    has_children: &mut Vec<bool>,
    parent: NodeId,
) -> Result<NodeId, ParseError> {
    if check_record_limit(nodes.len()).is_some() {
        return Err(ParseError::TooManyRecords(nodes.len()));
    }
    let id = NodeId(nodes.len());
    nodes.push(TreeNode::new(Some(parent), None));
    has_children.push(false);
    has_children[parent.0] = true;
    Ok(id)
}

/// End of an unquoted token
fn scan_unquoted(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && !matches!(bytes[end], b',' | b'(' | b')' | b':' | b';' | b'[') {
        end += 1;
    }
    end
}

fn skip_comment(bytes: &[u8], start: usize) -> Option<usize> {
    bytes[start..]
        .iter()
        .position(|&b| b == b']')
        .map(|offset| start + offset + 1)
}

/// Read a single-quoted label; `''` is an escaped quote
fn read_quoted(text: &str, start: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let mut label = String::new();
    let mut pos = start + 1;
    let mut chunk_start = pos;
    while pos < bytes.len() {
        if bytes[pos] == b'\'' {
            label.push_str(&text[chunk_start..pos]);
            if bytes.get(pos + 1) == Some(&b'\'') {
                label.push('\'');
                pos += 2;
                chunk_start = pos;
            } else {
                return Some((label, pos + 1));
            }
        } else {
            pos += 1;
        }
    }
    None
}

/// Interpret a node label as support, taxon label, or `support:label`
fn apply_label(node: &mut TreeNode, internal: bool, label: &str) {
    if label.is_empty() {
        return;
    }
    if internal {
        if let Some((support, name)) = label.split_once(':') {
            if let Ok(value) = support.trim().parse::<f64>() {
                node.support = Some(value);
                let name = name.trim();
                if !name.is_empty() {
                    node.name = Some(name.to_string());
                }
                return;
            }
        }
        if let Ok(value) = label.parse::<f64>() {
            node.support = Some(value);
            return;
        }
    }
    node.name = Some(label.to_string());
}

enum Step {
    Enter(NodeId),
    Comma,
    Exit(NodeId),
}

/// Serialize a tree to Newick, including support values and branch lengths
#[must_use]
pub fn write_newick(tree: &ReferenceTree) -> String {
    let mut out = String::new();
    let mut stack = vec![Step::Enter(tree.root())];

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(id) => {
                let children = tree.children(id);
                if children.is_empty() {
                    write_label(&mut out, tree, id);
                    write_length(&mut out, tree, id);
                } else {
                    out.push('(');
                    stack.push(Step::Exit(id));
                    for (i, &child) in children.iter().enumerate().rev() {
                        stack.push(Step::Enter(child));
                        if i > 0 {
                            stack.push(Step::Comma);
                        }
                    }
                }
            }
            Step::Comma => out.push(','),
            Step::Exit(id) => {
                out.push(')');
                write_label(&mut out, tree, id);
                write_length(&mut out, tree, id);
            }
        }
    }

    out.push(';');
    out
}

fn write_label(out: &mut String, tree: &ReferenceTree, id: NodeId) {
    let label = match (tree.support(id), tree.name(id)) {
        (Some(support), Some(name)) => format!("{support}:{name}"),
        (Some(support), None) => format!("{support}"),
        (None, Some(name)) => name.to_string(),
        (None, None) => return,
    };
    let needs_quotes = label
        .chars()
        .any(|c| matches!(c, ',' | '(' | ')' | ':' | ';' | '[' | ']' | '\'') || c.is_whitespace());
    if needs_quotes {
        out.push('\'');
        out.push_str(&label.replace('\'', "''"));
        out.push('\'');
    } else {
        out.push_str(&label);
    }
}

fn write_length(out: &mut String, tree: &ReferenceTree, id: NodeId) {
    if let Some(length) = tree.branch_length(id) {
        out.push(':');
        out.push_str(&length.to_string());
    }
}
