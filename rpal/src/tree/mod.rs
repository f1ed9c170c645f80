//! Arena-backed first-child/next-sibling tree
//!
//! One representation serves both the raw AST produced by the parser and the
//! standardized tree consumed by the CSE machine. Nodes live in a `Vec` and
//! refer to each other by index, so structural edits are O(1) and there is no
//! shared or back reference: every node except the root is linked exactly
//! once, either as the first child of its parent or as the next sibling of
//! its left neighbour.

mod kind;
mod render;
mod span;

pub use kind::{Arity, NodeKind, Operator, Payload};
pub use render::{escape_str, NodeView, Preorder};
pub use span::Span;

use serde::Serialize;
use thiserror::Error;

/// Index of a node inside its `Tree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Id of the node stored at arena position `index`
    fn at(index: usize) -> Result<Self, TreeError> {
        u32::try_from(index)
            .map(NodeId)
            .map_err(|_| TreeError::invalid(format!("tree cannot hold more than {} nodes", u32::MAX)))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural edit rejected by the tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("invalid tree operation: {0}")]
    InvalidTreeOp(String),
}

impl TreeError {
    fn invalid(message: impl Into<String>) -> Self {
        TreeError::InvalidTreeOp(message.into())
    }
}

/// A single tree element
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub payload: Option<Payload>,
    pub span: Span,
    first_child: Option<NodeId>,
    next_sibling: Option<NodeId>,
    /// Set once the node is owned through a child or sibling edge
    linked: bool,
}

impl Node {
    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }
}

/// Arena of nodes with an optional designated root
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) -> Result<(), TreeError> {
        let node = self.checked(root)?;
        if node.linked {
            return Err(TreeError::invalid(format!("{root} is owned by another node and cannot be the root")));
        }
        self.root = Some(root);
        Ok(())
    }

    /// Create a detached node
    pub fn create(&mut self, kind: NodeKind, payload: Option<Payload>, span: Span) -> Result<NodeId, TreeError> {
        let id = NodeId::at(self.nodes.len())?;
        self.nodes.push(Node {
            kind,
            payload,
            span,
            first_child: None,
            next_sibling: None,
            linked: false,
        });
        Ok(id)
    }

    pub fn create_ident(&mut self, name: impl Into<String>, span: Span) -> Result<NodeId, TreeError> {
        self.create(NodeKind::Identifier, Some(Payload::Ident(name.into())), span)
    }

    pub fn attach_first_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.check_attachable(parent, child)?;
        if self.nodes[parent.index()].first_child.is_some() {
            return Err(TreeError::invalid(format!("{parent} already has a first child")));
        }
        self.nodes[parent.index()].first_child = Some(child);
        self.nodes[child.index()].linked = true;
        Ok(())
    }

    pub fn attach_sibling(&mut self, node: NodeId, sibling: NodeId) -> Result<(), TreeError> {
        self.check_attachable(node, sibling)?;
        if self.nodes[node.index()].next_sibling.is_some() {
            return Err(TreeError::invalid(format!("{node} already has a next sibling")));
        }
        self.nodes[node.index()].next_sibling = Some(sibling);
        self.nodes[sibling.index()].linked = true;
        Ok(())
    }

    fn check_attachable(&self, owner: NodeId, target: NodeId) -> Result<(), TreeError> {
        self.checked(owner)?;
        let node = self.checked(target)?;
        if owner == target {
            return Err(TreeError::invalid(format!("{owner} cannot own itself")));
        }
        if node.linked {
            return Err(TreeError::invalid(format!("{target} is already owned by another node")));
        }
        if self.root == Some(target) {
            return Err(TreeError::invalid(format!("root {target} cannot be attached below another node")));
        }
        Ok(())
    }

    fn checked(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| TreeError::invalid(format!("{id} does not exist")))
    }

    /// Create a node and link `children` below it in order
    pub fn build(
        &mut self,
        kind: NodeKind,
        payload: Option<Payload>,
        span: Span,
        children: &[NodeId],
    ) -> Result<NodeId, TreeError> {
        let parent = self.create(kind, payload, span)?;
        if let Some((&first, rest)) = children.split_first() {
            self.attach_first_child(parent, first)?;
            let mut prev = first;
            for &child in rest {
                self.attach_sibling(prev, child)?;
                prev = child;
            }
        }
        Ok(parent)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn payload(&self, id: NodeId) -> Option<&Payload> {
        self.node(id).payload.as_ref()
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Identifier name of a leaf, if it is one
    pub fn ident(&self, id: NodeId) -> Option<&str> {
        match self.node(id) {
            Node { kind: NodeKind::Identifier, payload: Some(payload), .. } => payload.as_ident(),
            _ => None,
        }
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.first_child(id),
        }
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    /// Lazy depth-first, left-to-right walk yielding `(node, depth)`
    pub fn preorder(&self, root: NodeId) -> Preorder<'_> {
        Preorder::new(self, root)
    }

    /// Deep-copy a subtree of this tree
    pub fn duplicate(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        let (kind, payload, span) = {
            let node = self.node(id);
            (node.kind, node.payload.clone(), node.span)
        };
        let children: Vec<NodeId> = self.children(id).collect();
        let mut copies = Vec::with_capacity(children.len());
        for child in children {
            copies.push(self.duplicate(child)?);
        }
        self.build(kind, payload, span, &copies)
    }

    /// Structural equality of two subtrees, ignoring spans
    pub fn same_shape(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        let (left, right) = (self.node(a), other.node(b));
        if left.kind != right.kind || left.payload != right.payload {
            return false;
        }
        let mut lhs = self.children(a);
        let mut rhs = other.children(b);
        loop {
            match (lhs.next(), rhs.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) if self.same_shape(x, other, y) => {}
                _ => return false,
            }
        }
    }

    /// Borrowed view of a subtree, used for rendering and serialization
    pub fn view(&self, id: NodeId) -> NodeView<'_> {
        NodeView::new(self, id)
    }
}

/// Iterator over the direct children of a node
pub struct Children<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.next_sibling(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(tree: &mut Tree, n: i64) -> NodeId {
        tree.create(NodeKind::Integer, Some(Payload::Int(n)), Span::default()).unwrap()
    }

    #[test]
    fn test_build_links_children_in_order() {
        let mut tree = Tree::new();
        let a = int(&mut tree, 1);
        let b = int(&mut tree, 2);
        let c = int(&mut tree, 3);
        let tau = tree.build(NodeKind::Tau, None, Span::default(), &[a, b, c]).unwrap();

        assert_eq!(tree.first_child(tau), Some(a));
        assert_eq!(tree.next_sibling(a), Some(b));
        assert_eq!(tree.next_sibling(b), Some(c));
        assert_eq!(tree.next_sibling(c), None);
        assert_eq!(tree.children(tau).collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(tree.child_count(tau), 3);
    }

    #[test]
    fn test_attach_first_child_twice_fails() {
        let mut tree = Tree::new();
        let parent = tree.create(NodeKind::Gamma, None, Span::default()).unwrap();
        let a = int(&mut tree, 1);
        let b = int(&mut tree, 2);
        tree.attach_first_child(parent, a).unwrap();
        let err = tree.attach_first_child(parent, b).unwrap_err();
        assert!(matches!(err, TreeError::InvalidTreeOp(msg) if msg.contains("first child")));
    }

    #[test]
    fn test_attach_sibling_twice_fails() {
        let mut tree = Tree::new();
        let a = int(&mut tree, 1);
        let b = int(&mut tree, 2);
        let c = int(&mut tree, 3);
        tree.attach_sibling(a, b).unwrap();
        assert!(tree.attach_sibling(a, c).is_err());
    }

    #[test]
    fn test_node_cannot_be_owned_twice() {
        let mut tree = Tree::new();
        let p1 = tree.create(NodeKind::Gamma, None, Span::default()).unwrap();
        let p2 = tree.create(NodeKind::Gamma, None, Span::default()).unwrap();
        let shared = int(&mut tree, 7);
        tree.attach_first_child(p1, shared).unwrap();
        assert!(tree.attach_first_child(p2, shared).is_err());
    }

    #[test]
    fn test_self_attachment_fails() {
        let mut tree = Tree::new();
        let a = int(&mut tree, 1);
        assert!(tree.attach_first_child(a, a).is_err());
        assert!(tree.attach_sibling(a, a).is_err());
    }

    #[test]
    fn test_root_cannot_be_attached() {
        let mut tree = Tree::new();
        let root = int(&mut tree, 1);
        tree.set_root(root).unwrap();
        let parent = tree.create(NodeKind::Gamma, None, Span::default()).unwrap();
        assert!(tree.attach_first_child(parent, root).is_err());
    }

    #[test]
    fn test_duplicate_is_disjoint() {
        let mut tree = Tree::new();
        let a = int(&mut tree, 1);
        let b = int(&mut tree, 2);
        let tau = tree.build(NodeKind::Tau, None, Span::default(), &[a, b]).unwrap();
        let copy = tree.duplicate(tau).unwrap();

        assert_ne!(copy, tau);
        assert!(tree.same_shape(tau, &tree, copy));
        let originals: Vec<_> = tree.preorder(tau).map(|(id, _)| id).collect();
        assert!(tree.preorder(copy).all(|(id, _)| !originals.contains(&id)));
    }

    #[test]
    fn test_same_shape_detects_payload_difference() {
        let mut tree = Tree::new();
        let a = int(&mut tree, 1);
        let b = int(&mut tree, 2);
        assert!(!tree.same_shape(a, &tree, b));
    }

    #[test]
    fn test_node_ids_are_bounded() {
        assert_eq!(NodeId::at(7), Ok(NodeId(7)));
        assert_eq!(NodeId::at(u32::MAX as usize), Ok(NodeId(u32::MAX)));
        let err = NodeId::at(u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, TreeError::InvalidTreeOp(msg) if msg.contains("more than")));
    }

    #[test]
    fn test_ident_accessor() {
        let mut tree = Tree::new();
        let x = tree.create_ident("x", Span::default()).unwrap();
        let n = int(&mut tree, 3);
        assert_eq!(tree.ident(x), Some("x"));
        assert_eq!(tree.ident(n), None);
    }
}
