//! The annotation passes applied to a freshly parsed tree, in order:
//! sentinel synthesis, parent back-edges, decorated-definition span
//! lowering, structural tags, and `_parent_types` materialization.
//!
//! The whole pass is idempotent: tags double as the "already annotated"
//! marker, sentinel holes exist only on the first run, and the span fix
//! assigns absolute positions.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::grammar::FieldKind;
use crate::schema::Schema;
use crate::tree::{Node, NodeId, Span, Tree, Value};

/// Tag value a `None` child contributes, mirroring the serializer's
/// treatment of absent fields.
const NONE_TAG: i64 = -1;

/// Run every annotation pass over the tree.
pub fn annotate(tree: &mut Tree, schema: &Schema) {
    synthesize_sentinels(tree, schema);
    add_parents(tree);
    fix_decorated_spans(tree);
    compute_tags(tree, schema);
    compute_parent_types(tree, schema);
}

/// Replace `None` holes inside grammar-typed sequences (dictionary
/// double-star keys, absent keyword-only defaults) with field-less
/// `Sentinel` nodes so that every sequence slot holds a real object.
fn synthesize_sentinels(tree: &mut Tree, schema: &Schema) {
    let mut holes = Vec::new();
    for id in tree.ids() {
        let node = tree.get(id);
        for (field_index, (field, value)) in node.fields.iter().enumerate() {
            let Value::List(items) = value else { continue };
            if !is_node_sequence(schema, &node.kind, field) {
                continue;
            }
            for (item_index, item) in items.iter().enumerate() {
                if item.is_none() {
                    holes.push((id, field_index, item_index));
                }
            }
        }
    }

    for (id, field_index, item_index) in holes {
        let sentinel = tree.push(Node::new("Sentinel").with_span(Span {
            lineno: 0,
            col_offset: 0,
            end_lineno: 0,
            end_col_offset: 0,
        }));
        if let Value::List(items) = &mut tree.get_mut(id).fields[field_index].1 {
            items[item_index] = Value::Node(sentinel);
        }
    }
}

fn is_node_sequence(schema: &Schema, kind: &str, field: &str) -> bool {
    schema
        .field_db()
        .lookup(kind, field)
        .map(|info| matches!(&info.kind, FieldKind::Named(name) if !schema.model().is_enum_base(name)))
        .unwrap_or(false)
}

/// Attach parent id and parent field to every child in one walk.
fn add_parents(tree: &mut Tree) {
    let mut edges = Vec::new();
    for id in tree.ids() {
        for (field, child) in tree.children(id) {
            edges.push((child, id, field));
        }
    }
    for (child, parent, field) in edges {
        let node = tree.get_mut(child);
        node.parent = Some(parent);
        node.parent_field = Some(field);
    }
}

/// A decorated definition starts at its first decorator's `@`, so that
/// highlighting the node covers the conventional decorated span.
fn fix_decorated_spans(tree: &mut Tree) {
    for id in tree.ids() {
        let node = tree.get(id);
        let Some(Value::List(decorators)) = node.field("decorator_list") else {
            continue;
        };
        let Some(Value::Node(first)) = decorators.first() else {
            continue;
        };
        let Some(decorator_span) = tree.get(*first).span else {
            continue;
        };
        let node = tree.get_mut(id);
        if let Some(span) = &mut node.span {
            span.lineno = decorator_span.lineno;
            span.col_offset = decorator_span.col_offset.saturating_sub(1);
        }
    }
}

/// One resolved ingredient of a structural tag.
enum TagAtom {
    None,
    Int(i64),
    Str(String),
    Enum(String, String),
    Node(u64),
    List(Vec<TagAtom>),
}

fn compute_tags(tree: &mut Tree, schema: &Schema) {
    for id in tree.ids() {
        compute_tag(tree, schema, id);
    }
}

/// Post-order structural hash. Already-annotated nodes short-circuit,
/// which both memoizes the recursion and makes a second transformer
/// pass a no-op.
fn compute_tag(tree: &mut Tree, schema: &Schema, id: NodeId) -> u64 {
    if let Some(tag) = tree.get(id).tag {
        return tag;
    }

    let field_count = tree.get(id).fields.len();
    let mut atoms = Vec::with_capacity(field_count);
    for index in 0..field_count {
        let (field, value) = tree.get(id).fields[index].clone();
        if schema.model().is_tag_excluded(&field) {
            continue;
        }
        atoms.push(resolve_atom(tree, schema, &value));
    }

    let type_id = schema.model().type_id(&tree.get(id).kind).unwrap_or(NONE_TAG);
    let mut hasher = Sha256::new();
    hasher.update([0xA5]);
    hasher.update(type_id.to_le_bytes());
    for atom in &atoms {
        feed_atom(&mut hasher, atom);
    }
    let digest = hasher.finalize();
    let tag = u64::from_le_bytes(digest[..8].try_into().expect("digest shorter than 8 bytes"));
    tree.get_mut(id).tag = Some(tag);
    tag
}

fn resolve_atom(tree: &mut Tree, schema: &Schema, value: &Value) -> TagAtom {
    match value {
        Value::None => TagAtom::None,
        Value::Int(value) => TagAtom::Int(*value),
        Value::Str(value) => TagAtom::Str(value.clone()),
        Value::Enum { base, member } => TagAtom::Enum(base.clone(), member.clone()),
        Value::Node(child) => TagAtom::Node(compute_tag(tree, schema, *child)),
        Value::List(items) => TagAtom::List(
            items
                .iter()
                .map(|item| resolve_atom(tree, schema, item))
                .collect(),
        ),
    }
}

fn feed_atom(hasher: &mut Sha256, atom: &TagAtom) {
    match atom {
        TagAtom::None => {
            hasher.update([0x00]);
            hasher.update(NONE_TAG.to_le_bytes());
        }
        TagAtom::Int(value) => {
            hasher.update([0x01]);
            hasher.update(value.to_le_bytes());
        }
        TagAtom::Str(value) => {
            hasher.update([0x02]);
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        TagAtom::Enum(base, member) => {
            hasher.update([0x03]);
            hasher.update(base.as_bytes());
            hasher.update([0x00]);
            hasher.update(member.as_bytes());
        }
        TagAtom::Node(tag) => {
            hasher.update([0x04]);
            hasher.update(tag.to_le_bytes());
        }
        TagAtom::List(items) => {
            hasher.update([0x05]);
            hasher.update((items.len() as u64).to_le_bytes());
            for item in items {
                feed_atom(hasher, item);
            }
        }
    }
}

/// Collect the deduplicated `(ancestor type id, field)` pairs along the
/// parent chain of every module-annotated node.
fn compute_parent_types(tree: &mut Tree, schema: &Schema) {
    for id in tree.ids() {
        if !schema.model().is_annotated_node(&tree.get(id).kind) {
            continue;
        }
        let mut pairs = BTreeSet::new();
        for (field, parent) in tree.ancestors(id) {
            if let (Some(field), Some(type_id)) =
                (field, schema.model().type_id(&tree.get(parent).kind))
            {
                pairs.insert((type_id, field.to_owned()));
            }
        }
        tree.get_mut(id).parent_types = pairs.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::python;

    fn annotated(source: &str) -> (Tree, Schema) {
        let schema = Schema::bootstrap().unwrap();
        let mut tree = python::parse_module(source, "<test>").unwrap();
        annotate(&mut tree, &schema);
        (tree, schema)
    }

    fn find(tree: &Tree, kind: &str) -> NodeId {
        tree.ids()
            .find(|id| tree.get(*id).kind == kind)
            .unwrap_or_else(|| panic!("no {kind} node"))
    }

    #[test]
    fn parents_are_attached() {
        let (tree, _) = annotated("x = 1\n");
        let name = find(&tree, "Name");
        let assign = find(&tree, "Assign");
        let node = tree.get(name);
        assert_eq!(node.parent, Some(assign));
        assert_eq!(node.parent_field.as_deref(), Some("targets"));
    }

    #[test]
    fn tags_ignore_positions() {
        let (tree, _) = annotated("foo(1)\nfoo(1)\n");
        let calls: Vec<_> = tree
            .ids()
            .filter(|id| tree.get(*id).kind == "Call")
            .collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(tree.get(calls[0]).tag, tree.get(calls[1]).tag);
        assert_ne!(tree.get(calls[0]).span, tree.get(calls[1]).span);
    }

    #[test]
    fn tags_differ_on_structure() {
        let (tree, _) = annotated("foo(1)\nfoo(2)\n");
        let calls: Vec<_> = tree
            .ids()
            .filter(|id| tree.get(*id).kind == "Call")
            .collect();
        assert_ne!(tree.get(calls[0]).tag, tree.get(calls[1]).tag);
    }

    #[test]
    fn double_star_key_becomes_sentinel() {
        let (tree, _) = annotated("d = {**other}\n");
        let sentinel = find(&tree, "Sentinel");
        let dict = find(&tree, "Dict");
        assert_eq!(tree.get(sentinel).parent, Some(dict));
        assert!(tree.get(sentinel).tag.is_some());
    }

    #[test]
    fn decorated_function_span_starts_at_decorator() {
        let (tree, _) = annotated("@classmethod\ndef f():\n    pass\n");
        let function = find(&tree, "FunctionDef");
        let span = tree.get(function).span.unwrap();
        assert_eq!(span.lineno, 1);
    }

    #[test]
    fn annotation_is_idempotent() {
        let schema = Schema::bootstrap().unwrap();
        let mut tree = python::parse_module("def f(a, b):\n    return a\n", "<test>").unwrap();
        annotate(&mut tree, &schema);
        let tags: Vec<_> = tree.ids().map(|id| tree.get(id).tag).collect();
        let count = tree.len();
        annotate(&mut tree, &schema);
        assert_eq!(count, tree.len());
        assert_eq!(tags, tree.ids().map(|id| tree.get(id).tag).collect::<Vec<_>>());
    }

    #[test]
    fn parent_types_reach_the_module() {
        let (tree, schema) = annotated("def f():\n    return 1\n");
        let constant = find(&tree, "Constant");
        let pairs = &tree.get(constant).parent_types;
        let return_id = schema.model().type_id("Return").unwrap();
        let function_id = schema.model().type_id("FunctionDef").unwrap();
        assert!(pairs.contains(&(return_id, "value".to_owned())));
        assert!(pairs.contains(&(function_id, "body".to_owned())));
    }
}
