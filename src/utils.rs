//! # Utilities Module
//!
//! Deterministic digests, cooperative cancellation and DOT export.

use crate::graph::{Graph, NodeKind};
use anyhow::Result;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Hex-encoded SHA-256 over the given parts.
///
/// Parts are separated by a NUL byte so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn make_id<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for (index, part) in parts.into_iter().enumerate() {
        if index > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_ref().as_bytes());
    }
    hex(&hasher.finalize())
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Cooperative cancellation flag, checked between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Render a graph view in Graphviz DOT format.
pub fn export_to_dot(graph: &Graph) -> Result<String> {
    let mut dot = String::new();

    dot.push_str("digraph EntityGraph {\n");
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  node [style=filled];\n");
    dot.push_str("  edge [fontsize=10];\n\n");

    for node in &graph.nodes {
        let (shape, color) = match node.kind {
            NodeKind::Entity => ("box", "lightblue"),
            NodeKind::Value => ("ellipse", "lightyellow"),
        };
        writeln!(
            dot,
            "  \"{}\" [label=\"{}\", shape={}, fillcolor={}];",
            escape(&node.id),
            escape(&node.caption),
            shape,
            color
        )?;
    }
    dot.push('\n');

    for edge in &graph.edges {
        writeln!(
            dot,
            "  \"{}\" -> \"{}\" [label=\"{}\"];",
            escape(&edge.source),
            escape(&edge.target),
            escape(&edge.label)
        )?;
    }

    dot.push_str("}\n");
    Ok(dot)
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
