//! Diagram block discovery.
//!
//! Two passes over the document, concatenated and deduplicated by node
//! identity: an explicit pass over structural class markers, then a
//! content heuristic over every remaining `code` element. Pure reads; no
//! side effects.

use glance_dom::{Document, NodeId};

use crate::config::OverlayConfig;

/// Class token that explicitly marks a block as diagram source.
const EXPLICIT_CLASS: &str = "language-mermaid";

/// Class substring accepted on `code` elements that sit under a `pre`.
const LOOSE_CLASS_SUBSTRING: &str = "mermaid";

/// Leading tokens of the supported diagram grammars, used by the content
/// heuristic.
pub const DIAGRAM_KEYWORDS: &[&str] = &[
    "graph TD",
    "graph LR",
    "graph TB",
    "graph BT",
    "graph RL",
    "flowchart TD",
    "flowchart LR",
    "flowchart TB",
    "flowchart BT",
    "flowchart RL",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram",
    "stateDiagram-v2",
    "erDiagram",
    "gantt",
    "pie title",
    "journey",
    "gitGraph",
    "C4Context",
    "mindmap",
    "timeline",
    "quadrantChart",
    "requirementDiagram",
    "zenuml",
];

/// Whether the node carries an explicit diagram marker.
///
/// Matches `code` elements whose class attribute contains
/// `language-mermaid`, or contains `mermaid` at all when the element sits
/// under a `pre` ancestor.
pub(crate) fn matches_explicit(doc: &Document, id: NodeId) -> bool {
    if doc.tag(id).as_deref() != Some("code") {
        return false;
    }
    let Some(class) = doc.attr(id, "class") else {
        return false;
    };
    if class.contains(EXPLICIT_CLASS) {
        return true;
    }
    class.contains(LOOSE_CLASS_SUBSTRING)
        && doc
            .ancestors(id)
            .iter()
            .any(|a| doc.tag(*a).as_deref() == Some("pre"))
}

/// Content heuristic: does this text look like diagram source?
///
/// Text shorter than the configured minimum never matches. Otherwise the
/// trimmed text matches when it starts with a keyword, contains a newline
/// immediately followed by a keyword, or contains a single space
/// immediately followed by a keyword.
///
/// The single-space branch is a deliberately permissive soft line
/// boundary: ordinary prose that mentions a keyword mid-line preceded by
/// one space ("some notes graph TD") matches too. That false-positive
/// behavior is part of the detection contract and must not be tightened.
#[must_use]
pub fn is_diagram_source(text: &str, config: &OverlayConfig) -> bool {
    if text.len() < config.min_heuristic_len {
        return false;
    }
    let trimmed = text.trim();
    DIAGRAM_KEYWORDS.iter().any(|keyword| {
        trimmed.starts_with(keyword)
            || trimmed.contains(&format!("\n{keyword}"))
            || trimmed.contains(&format!(" {keyword}"))
    })
}

/// Find all diagram source blocks, in document order.
///
/// Explicit matches come first (document order), followed by heuristic
/// matches not already found by the explicit pass.
#[must_use]
pub fn find_blocks(doc: &Document, config: &OverlayConfig) -> Vec<NodeId> {
    let all = doc.subtree(doc.root());

    let mut blocks: Vec<NodeId> = all
        .iter()
        .copied()
        .filter(|id| matches_explicit(doc, *id))
        .collect();

    for id in all {
        if doc.tag(id).as_deref() != Some("code") || blocks.contains(&id) {
            continue;
        }
        let text = doc.text(id).unwrap_or_default();
        if is_diagram_source(&text, config) {
            blocks.push(id);
        }
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn add_code(doc: &Document, class: Option<&str>, text: &str) -> NodeId {
        let pre = doc.create_element("pre");
        let code = doc.create_element("code");
        if let Some(class) = class {
            doc.set_attr(code, "class", class).unwrap();
        }
        doc.set_text(code, text).unwrap();
        doc.append_child(doc.root(), pre).unwrap();
        doc.append_child(pre, code).unwrap();
        code
    }

    #[test]
    fn test_explicit_class_marker() {
        let doc = Document::new();
        let code = add_code(&doc, Some("language-mermaid"), "graph TD\nA-->B");
        assert!(matches_explicit(&doc, code));
    }

    #[test]
    fn test_explicit_highlighted_class_marker() {
        let doc = Document::new();
        let code = add_code(&doc, Some("hljs language-mermaid"), "graph TD");
        assert!(matches_explicit(&doc, code));
    }

    #[test]
    fn test_loose_mermaid_class_requires_pre_ancestor() {
        let doc = Document::new();
        let under_pre = add_code(&doc, Some("mermaid-block"), "whatever");
        assert!(matches_explicit(&doc, under_pre));

        let bare = doc.create_element("code");
        doc.set_attr(bare, "class", "mermaid-block").unwrap();
        doc.append_child(doc.root(), bare).unwrap();
        assert!(!matches_explicit(&doc, bare));
    }

    #[test]
    fn test_non_code_never_explicit() {
        let doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attr(div, "class", "language-mermaid").unwrap();
        doc.append_child(doc.root(), div).unwrap();
        assert!(!matches_explicit(&doc, div));
    }

    #[test]
    fn test_heuristic_keyword_at_start() {
        let config = OverlayConfig::default();
        assert!(is_diagram_source("graph TD\nA-->B", &config));
        assert!(is_diagram_source("  sequenceDiagram\nA->>B: hi", &config));
    }

    #[test]
    fn test_heuristic_keyword_after_newline() {
        let config = OverlayConfig::default();
        assert!(is_diagram_source("intro line\ngraph TD\nA-->B", &config));
    }

    #[test]
    fn test_heuristic_soft_space_boundary() {
        let config = OverlayConfig::default();
        // A single space before the keyword matches, even mid-line. This is
        // the documented permissive boundary.
        assert!(is_diagram_source("some notes graph TD\nA-->B", &config));
        // No separating space: not a match.
        assert!(!is_diagram_source("somegraph TD\nA-->B", &config));
    }

    #[test]
    fn test_heuristic_minimum_length() {
        let config = OverlayConfig::default();
        assert!(!is_diagram_source("pie", &config));
        assert!(!is_diagram_source("", &config));
    }

    #[test]
    fn test_heuristic_ignores_non_keywords() {
        let config = OverlayConfig::default();
        assert!(!is_diagram_source("fn main() {}\nprintln!(\"hi\");", &config));
    }

    #[test]
    fn test_find_blocks_explicit_then_heuristic_order() {
        let doc = Document::new();
        let config = OverlayConfig::default();
        let heuristic = add_code(&doc, None, "graph TD\nA-->B");
        let explicit = add_code(&doc, Some("language-mermaid"), "gantt\ntitle X");
        let plain = add_code(&doc, Some("language-rust"), "fn main() {}");

        let blocks = find_blocks(&doc, &config);
        assert_eq!(blocks, vec![explicit, heuristic]);
        assert!(!blocks.contains(&plain));
    }

    #[test]
    fn test_find_blocks_deduplicates_by_identity() {
        let doc = Document::new();
        let config = OverlayConfig::default();
        // Explicit marker whose text also matches the heuristic.
        let code = add_code(&doc, Some("language-mermaid"), "graph TD\nA-->B");

        let blocks = find_blocks(&doc, &config);
        assert_eq!(blocks, vec![code]);
    }
}
