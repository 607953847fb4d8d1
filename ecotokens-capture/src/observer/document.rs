//! Read-only view of a rendered page.
//!
//! The detector never holds element references; it addresses nodes by
//! [`NodeId`] and asks the document about them on every tick. A node that
//! has been removed simply reports `is_connected == false`.

use std::fmt;

/// Stable identifier of a rendered element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Queries the detector needs from a page.
///
/// Selectors are CSS selector strings. Group selectors (`a, b`) are only
/// passed to [`Document::query_all`].
pub trait Document {
    /// Returns connected elements matching `selector`, in document order.
    fn query_all(&self, selector: &str) -> Vec<NodeId>;

    /// Returns descendants of `root` (excluding `root`) matching `selector`.
    fn query_within(&self, root: NodeId, selector: &str) -> Vec<NodeId>;

    /// Returns true if `node` matches a single `selector`.
    fn matches(&self, node: NodeId, selector: &str) -> bool;

    /// Returns the parent element.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Returns the rendered text, trimmed.
    fn text(&self, node: NodeId) -> String;

    /// Returns false once `node` has been removed from the page.
    fn is_connected(&self, node: NodeId) -> bool;

    /// Returns the page URL.
    fn url(&self) -> String;
}

/// Text length in characters, as the detector measures it.
pub fn text_len(doc: &impl Document, node: NodeId) -> usize {
    doc.text(node).chars().count()
}
