//! In-memory [`Document`] for tests.
//!
//! Selectors are matched literally: a node "matches" a selector if it was
//! added with that exact selector string.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::document::{Document, NodeId};

#[derive(Debug)]
struct FakeNode {
    parent: Option<NodeId>,
    selectors: Vec<&'static str>,
    text: String,
    connected: bool,
}

#[derive(Debug)]
pub struct FakeDom {
    url: String,
    nodes: BTreeMap<NodeId, FakeNode>,
    next: u64,
}

impl FakeDom {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            nodes: BTreeMap::new(),
            next: 1,
        }
    }

    pub fn add(
        &mut self,
        parent: Option<NodeId>,
        selectors: &[&'static str],
        text: &str,
    ) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        self.nodes.insert(
            id,
            FakeNode {
                parent,
                selectors: selectors.to_vec(),
                text: text.to_string(),
                connected: true,
            },
        );
        id
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.text = text.to_string();
        }
    }

    pub fn remove(&mut self, node: NodeId) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.connected = false;
        }
    }

    fn is_descendant(&self, node: NodeId, root: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(parent) = current {
            if parent == root {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }
}

impl Document for FakeDom {
    fn query_all(&self, selector: &str) -> Vec<NodeId> {
        let parts: Vec<&str> = selector.split(',').map(str::trim).collect();
        self.nodes
            .iter()
            .filter(|(_, n)| n.connected && n.selectors.iter().any(|s| parts.contains(s)))
            .map(|(id, _)| *id)
            .collect()
    }

    fn query_within(&self, root: NodeId, selector: &str) -> Vec<NodeId> {
        self.query_all(selector)
            .into_iter()
            .filter(|id| self.is_descendant(*id, root))
            .collect()
    }

    fn matches(&self, node: NodeId, selector: &str) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|n| n.selectors.contains(&selector))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    fn text(&self, node: NodeId) -> String {
        self.nodes
            .get(&node)
            .map(|n| n.text.trim().to_string())
            .unwrap_or_default()
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|n| n.connected)
    }

    fn url(&self) -> String {
        self.url.clone()
    }
}

/// A [`FakeDom`] shared between a test and a running observer.
#[derive(Debug, Clone)]
pub struct SharedDom(pub Arc<Mutex<FakeDom>>);

impl SharedDom {
    pub fn new(dom: FakeDom) -> Self {
        Self(Arc::new(Mutex::new(dom)))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeDom) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }
}

impl Document for SharedDom {
    fn query_all(&self, selector: &str) -> Vec<NodeId> {
        self.with(|d| d.query_all(selector))
    }

    fn query_within(&self, root: NodeId, selector: &str) -> Vec<NodeId> {
        self.with(|d| d.query_within(root, selector))
    }

    fn matches(&self, node: NodeId, selector: &str) -> bool {
        self.with(|d| d.matches(node, selector))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.with(|d| d.parent(node))
    }

    fn text(&self, node: NodeId) -> String {
        self.with(|d| d.text(node))
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.with(|d| d.is_connected(node))
    }

    fn url(&self) -> String {
        self.with(|d| d.url())
    }
}
