//! Traversal, text dumps and JSON serialization of trees

use super::{NodeId, NodeKind, Payload, Tree};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

/// Depth-first, left-to-right traversal yielding `(node, depth)`
#[derive(Clone)]
pub struct Preorder<'a> {
    tree: &'a Tree,
    pending: Vec<(NodeId, usize)>,
}

impl<'a> Preorder<'a> {
    pub(super) fn new(tree: &'a Tree, root: NodeId) -> Self {
        Preorder {
            tree,
            pending: vec![(root, 0)],
        }
    }
}

impl Iterator for Preorder<'_> {
    type Item = (NodeId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.pending.pop()?;
        let start = self.pending.len();
        self.pending.extend(self.tree.children(id).map(|child| (child, depth + 1)));
        self.pending[start..].reverse();
        Some((id, depth))
    }
}

/// Re-encode the escapes the lexer decoded
pub fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            other => out.push(other),
        }
    }
    out
}

/// Borrowed view of one subtree
#[derive(Clone, Copy)]
pub struct NodeView<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl<'a> NodeView<'a> {
    pub(super) fn new(tree: &'a Tree, id: NodeId) -> Self {
        NodeView { tree, id }
    }

    /// Label printed by the dotted dump, e.g. `<ID:x>` or `gamma`
    pub fn dump_label(&self) -> String {
        let node = self.tree.node(self.id);
        match (&node.kind, &node.payload) {
            (NodeKind::Identifier, Some(Payload::Ident(name))) => format!("<ID:{name}>"),
            (NodeKind::Integer, Some(Payload::Int(n))) => format!("<INT:{n}>"),
            (NodeKind::Str, Some(Payload::Str(s))) => format!("<STR:'{}'>", escape_str(s)),
            (_, Some(Payload::Op(op))) => op.symbol().to_string(),
            (kind, _) => kind.label().to_string(),
        }
    }

    /// Label used by the compact form, e.g. `x` or `gamma`
    fn short_label(&self) -> String {
        let node = self.tree.node(self.id);
        match (&node.kind, &node.payload) {
            (_, Some(Payload::Ident(name))) => name.clone(),
            (_, Some(Payload::Int(n))) => n.to_string(),
            (_, Some(Payload::Str(s))) => format!("'{}'", escape_str(s)),
            (_, Some(Payload::Op(op))) => op.symbol().to_string(),
            (NodeKind::True, _) => "true".to_string(),
            (NodeKind::False, _) => "false".to_string(),
            (NodeKind::Nil, _) => "nil".to_string(),
            (NodeKind::Dummy, _) => "dummy".to_string(),
            (NodeKind::YStar, _) => "Y*".to_string(),
            (kind, _) => kind.label().to_string(),
        }
    }

    /// One node per line, each prefixed by one dot per level of depth
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (id, depth) in self.tree.preorder(self.id) {
            out.push_str(&".".repeat(depth));
            out.push_str(&self.tree.view(id).dump_label());
            out.push('\n');
        }
        out
    }

    /// Single-line form such as `gamma(lambda(x, x), 3)`
    pub fn sexpr(&self) -> String {
        let mut out = String::new();
        self.write_sexpr(&mut out);
        out
    }

    fn write_sexpr(&self, out: &mut String) {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.write_sexpr_inner(out))
    }

    fn write_sexpr_inner(&self, out: &mut String) {
        out.push_str(&self.short_label());
        let mut children = self.tree.children(self.id).peekable();
        if children.peek().is_none() {
            return;
        }
        out.push('(');
        for (i, child) in children.enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.tree.view(child).write_sexpr(out);
        }
        out.push(')');
    }
}

impl fmt::Display for NodeView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

impl Serialize for NodeView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.serialize_node(serializer))
    }
}

impl NodeView<'_> {
    fn serialize_node<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self.tree.node(self.id);
        let children: Vec<NodeView<'_>> = self.tree.children(self.id).map(|c| self.tree.view(c)).collect();
        let mut len = 2;
        if node.payload.is_some() {
            len += 1;
        }
        if !children.is_empty() {
            len += 1;
        }
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("kind", &node.kind)?;
        if let Some(payload) = &node.payload {
            map.serialize_entry("payload", payload)?;
        }
        map.serialize_entry("span", &node.span)?;
        if !children.is_empty() {
            map.serialize_entry("children", &children)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Operator, Span};
    use super::*;

    fn sample() -> (Tree, NodeId) {
        // gamma(lambda(x, +(x, 4)), 3) in core form
        let mut tree = Tree::new();
        let s = Span::default();
        let x = tree.create_ident("x", s).unwrap();
        let plus = tree.create(NodeKind::Operator, Some(Payload::Op(Operator::Plus)), s).unwrap();
        let x2 = tree.create_ident("x", s).unwrap();
        let inner = tree.build(NodeKind::Gamma, None, s, &[plus, x2]).unwrap();
        let four = tree.create(NodeKind::Integer, Some(Payload::Int(4)), s).unwrap();
        let outer = tree.build(NodeKind::Gamma, None, s, &[inner, four]).unwrap();
        let lambda = tree.build(NodeKind::Lambda, None, s, &[x, outer]).unwrap();
        let three = tree.create(NodeKind::Integer, Some(Payload::Int(3)), s).unwrap();
        let root = tree.build(NodeKind::Gamma, None, s, &[lambda, three]).unwrap();
        tree.set_root(root).unwrap();
        (tree, root)
    }

    #[test]
    fn test_preorder_depths() {
        let (tree, root) = sample();
        let depths: Vec<usize> = tree.preorder(root).map(|(_, d)| d).collect();
        assert_eq!(depths, vec![0, 1, 2, 2, 3, 4, 4, 3, 1]);
    }

    #[test]
    fn test_preorder_is_restartable() {
        let (tree, root) = sample();
        let walk = tree.preorder(root);
        let first: Vec<_> = walk.clone().collect();
        let second: Vec<_> = walk.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sexpr() {
        let (tree, root) = sample();
        assert_eq!(tree.view(root).sexpr(), "gamma(lambda(x, gamma(gamma(+, x), 4)), 3)");
    }

    #[test]
    fn test_dump() {
        let (tree, root) = sample();
        let expected = "gamma\n.lambda\n..<ID:x>\n..gamma\n...gamma\n....+\n....<ID:x>\n...<INT:4>\n.<INT:3>\n";
        assert_eq!(tree.view(root).dump(), expected);
    }

    #[test]
    fn test_string_labels_are_escaped() {
        let mut tree = Tree::new();
        let s = tree.create(NodeKind::Str, Some(Payload::Str("a'b\n".into())), Span::default()).unwrap();
        assert_eq!(tree.view(s).dump_label(), "<STR:'a\\'b\\n'>");
    }

    #[test]
    fn test_json_shape() {
        let (tree, root) = sample();
        let json = serde_json::to_value(tree.view(root)).unwrap();
        assert_eq!(json["kind"], "gamma");
        assert_eq!(json["children"][1]["payload"]["value"], 3);
        assert!(json["children"][1].get("children").is_none());
    }

    fn left_nested_sum(terms: usize) -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let s = Span::default();
        let mut sum = tree.create(NodeKind::Integer, Some(Payload::Int(1)), s).unwrap();
        for _ in 1..terms {
            let one = tree.create(NodeKind::Integer, Some(Payload::Int(1)), s).unwrap();
            let plus = tree.create(NodeKind::Operator, Some(Payload::Op(Operator::Plus)), s).unwrap();
            let partial = tree.build(NodeKind::Gamma, None, s, &[plus, sum]).unwrap();
            sum = tree.build(NodeKind::Gamma, None, s, &[partial, one]).unwrap();
        }
        tree.set_root(sum).unwrap();
        (tree, sum)
    }

    #[test]
    fn test_json_of_a_deep_tree() {
        let (tree, root) = left_nested_sum(100_000);
        let json = serde_json::to_string(&tree.view(root)).unwrap();
        assert!(json.starts_with(r#"{"kind":"gamma""#));
        assert_eq!(json.matches(r#""kind":"operator""#).count(), 99_999);
    }

    #[test]
    fn test_sexpr_of_a_deep_tree() {
        let (tree, root) = left_nested_sum(100_000);
        let text = tree.view(root).sexpr();
        assert!(text.starts_with("gamma(gamma(+, gamma("));
    }
}
