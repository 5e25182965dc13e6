//! # Generic Syntax Tree
//!
//! Grammar-shaped trees produced by parsing a source file. Nodes live
//! in an arena indexed by [`NodeId`]; parent back-edges are stored as
//! arena indices, never as owning references, so the structure stays
//! acyclic for ownership purposes while the transformer can still walk
//! upward.

use crate::grammar::Model;

pub mod transform;

/// CPython-style source span: 1-based lines, 0-based columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub lineno: u32,
    pub col_offset: u32,
    pub end_lineno: u32,
    pub end_col_offset: u32,
}

/// Arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One field value. Scalars are stored directly; child nodes by id.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Node(NodeId),
    Int(i64),
    Str(String),
    Enum { base: String, member: String },
    List(Vec<Value>),
    None,
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

/// A grammar node: constructor (or product) name plus its field values
/// in declaration order, and the annotations the transformer fills in.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: String,
    pub fields: Vec<(String, Value)>,
    pub span: Option<Span>,
    pub parent: Option<NodeId>,
    pub parent_field: Option<String>,
    /// Structural hash; `Some` marks the node as annotated
    pub tag: Option<u64>,
    /// Sorted, deduplicated `(ancestor type id, field)` pairs
    pub parent_types: Vec<(i64, String)>,
}

impl Node {
    pub fn new(kind: impl Into<String>) -> Node {
        Node {
            kind: kind.into(),
            fields: Vec::new(),
            span: None,
            parent: None,
            parent_field: None,
            tag: None,
            parent_types: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Node {
        self.span = Some(span);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn push_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }
}

/// The arena. The root is always the module node.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub fn new() -> Tree {
        Tree {
            nodes: Vec::new(),
            root: NodeId(0),
        }
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Child node ids of one node, fields in declaration order.
    pub fn children(&self, id: NodeId) -> Vec<(String, NodeId)> {
        let mut children = Vec::new();
        for (field, value) in &self.get(id).fields {
            match value {
                Value::Node(child) => children.push((field.clone(), *child)),
                Value::List(items) => {
                    for item in items {
                        if let Value::Node(child) = item {
                            children.push((field.clone(), *child));
                        }
                    }
                }
                _ => {}
            }
        }
        children
    }

    /// Walk the parent chain from a node to the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            current: Some(id),
        }
    }

    /// All spans in the tree, for nodes belonging to module-annotated
    /// bases. Used by the roundtrip property check.
    pub fn annotated_spans(&self, model: &Model) -> Vec<Span> {
        self.ids()
            .filter(|id| model.is_annotated_node(&self.get(*id).kind))
            .filter_map(|id| self.get(id).span)
            .collect()
    }
}

impl Default for Tree {
    fn default() -> Tree {
        Tree::new()
    }
}

/// Iterator over `(field, parent)` pairs walking towards the root.
pub struct Ancestors<'a> {
    tree: &'a Tree,
    current: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = (Option<&'a str>, NodeId);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let node = self.tree.get(id);
        let parent = node.parent?;
        let field = node.parent_field.as_deref();
        self.current = Some(parent);
        Some((field, parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_basics() {
        let mut tree = Tree::new();
        let leaf = tree.push(Node::new("Name"));
        let mut root = Node::new("Expr");
        root.push_field("value", Value::Node(leaf));
        let root = tree.push(root);
        tree.set_root(root);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.children(root), vec![("value".to_owned(), leaf)]);
    }

    #[test]
    fn ancestors_follow_parent_ids() {
        let mut tree = Tree::new();
        let leaf = tree.push(Node::new("Name"));
        let mid = tree.push(Node::new("Return"));
        let root = tree.push(Node::new("Module"));
        tree.set_root(root);

        tree.get_mut(leaf).parent = Some(mid);
        tree.get_mut(leaf).parent_field = Some("value".to_owned());
        tree.get_mut(mid).parent = Some(root);
        tree.get_mut(mid).parent_field = Some("body".to_owned());

        let chain: Vec<_> = tree.ancestors(leaf).collect();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0], (Some("value"), mid));
        assert_eq!(chain[1], (Some("body"), root));
    }
}
