//! Partition tree: an arena of `UnwrappedLine`s forming a strict tree. §9
//! calls for "arena + index" so node ids stay stable across the reshuffles
//! the layout solver's materialization performs; grounded in how
//! `tree_reshaper.cc`'s `BuildTokenPartitionTree` splices subtrees in place
//! without ever sharing a child between two parents.

use crate::unwrapped_line::UnwrappedLine;

/// Stable handle into a `PartitionTree`'s arena. Indices are never reused
/// within one tree's lifetime, so a `PartitionId` captured before a
/// materialization pass is still valid (if not orphaned) afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionId(usize);

#[derive(Debug, Clone)]
pub struct PartitionNode {
    pub line: UnwrappedLine,
    pub children: Vec<PartitionId>,
    pub parent: Option<PartitionId>,
}

impl PartitionNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena-backed partition tree. A parent's token range is always the
/// concatenation of its children's ranges, in order (§3 invariant); the
/// arena itself does not enforce this, construction and materialization do.
#[derive(Debug, Clone, Default)]
pub struct PartitionTree {
    nodes: Vec<PartitionNode>,
    root: Option<PartitionId>,
}

impl PartitionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a root node. Panics if a root already exists; callers build
    /// exactly one partition tree per formatting run.
    pub fn insert_root(&mut self, line: UnwrappedLine) -> PartitionId {
        assert!(self.root.is_none(), "partition tree already has a root");
        let id = self.push_node(PartitionNode {
            line,
            children: Vec::new(),
            parent: None,
        });
        self.root = Some(id);
        id
    }

    pub fn insert_child(&mut self, parent: PartitionId, line: UnwrappedLine) -> PartitionId {
        let id = self.push_node(PartitionNode {
            line,
            children: Vec::new(),
            parent: Some(parent),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Insert a node with no parent link yet. Used by the layout solver's
    /// materialization pass, which builds a subtree bottom-up and only
    /// knows the final parent/child wiring once every piece exists; the
    /// caller links it in with `set_children`.
    pub fn insert_detached(&mut self, line: UnwrappedLine) -> PartitionId {
        self.push_node(PartitionNode {
            line,
            children: Vec::new(),
            parent: None,
        })
    }

    fn push_node(&mut self, node: PartitionNode) -> PartitionId {
        self.nodes.push(node);
        PartitionId(self.nodes.len() - 1)
    }

    pub fn root(&self) -> Option<PartitionId> {
        self.root
    }

    pub fn node(&self, id: PartitionId) -> &PartitionNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: PartitionId) -> &mut PartitionNode {
        &mut self.nodes[id.0]
    }

    pub fn children(&self, id: PartitionId) -> &[PartitionId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: PartitionId) -> Option<PartitionId> {
        self.nodes[id.0].parent
    }

    /// Replace `id`'s children wholesale, as a materialization pass does
    /// when it splices a reshaped subtree back in. The new children's
    /// `parent` pointers are updated; the caller is responsible for leaving
    /// no other node referencing the discarded children.
    pub fn set_children(&mut self, id: PartitionId, children: Vec<PartitionId>) {
        for &child in &children {
            self.nodes[child.0].parent = Some(id);
        }
        self.nodes[id.0].children = children;
    }

    /// Depth-first pre-order walk starting at `id`.
    pub fn walk_preorder(&self, id: PartitionId, visit: &mut impl FnMut(PartitionId)) {
        visit(id);
        for &child in &self.nodes[id.0].children {
            self.walk_preorder(child, visit);
        }
    }

    /// Add `delta` to the indentation of every unwrapped line in the
    /// subtree rooted at `id`. Used to restore indentation after the layout
    /// solver solves a zero-indent subtree (§4.2).
    pub fn shift_indentation(&mut self, id: PartitionId, delta: i64) {
        let children = self.nodes[id.0].children.clone();
        self.nodes[id.0].line.indentation_spaces += delta;
        for child in children {
            self.shift_indentation(child, delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unwrapped_line::PartitionPolicy;

    fn leaf(start: usize, end: usize) -> UnwrappedLine {
        UnwrappedLine::new(0, start..end).with_policy(PartitionPolicy::AlwaysExpand)
    }

    #[test]
    fn insert_and_navigate() {
        let mut tree = PartitionTree::new();
        let root = tree.insert_root(leaf(0, 4));
        let a = tree.insert_child(root, leaf(0, 2));
        let b = tree.insert_child(root, leaf(2, 4));

        assert_eq!(tree.children(root), &[a, b]);
        assert_eq!(tree.parent(a), Some(root));
        assert!(tree.node(a).is_leaf());
    }

    #[test]
    fn shift_indentation_applies_recursively() {
        let mut tree = PartitionTree::new();
        let root = tree.insert_root(leaf(0, 4));
        let a = tree.insert_child(root, leaf(0, 2));
        tree.shift_indentation(root, 4);
        assert_eq!(tree.node(root).line.indentation_spaces, 4);
        assert_eq!(tree.node(a).line.indentation_spaces, 4);
    }

    #[test]
    fn walk_preorder_visits_all_nodes() {
        let mut tree = PartitionTree::new();
        let root = tree.insert_root(leaf(0, 4));
        let a = tree.insert_child(root, leaf(0, 2));
        let b = tree.insert_child(root, leaf(2, 4));
        let mut seen = Vec::new();
        tree.walk_preorder(root, &mut |id| seen.push(id));
        assert_eq!(seen, vec![root, a, b]);
    }
}
