//! Pattern-based IR rewrites.
//!
//! Each rewrite inspects one node and returns `Some(replacement)` or
//! `None` to leave the node untouched (the "quit optimization" path).
//! The visitor re-enters every replacement, so rewrites cascade until
//! the tree settles, and recurses into children afterwards.

use crate::ir::{Comparator, Ir, UnaryOperator};

/// Optimize a whole IR tree.
pub fn optimize(node: Ir) -> Ir {
    visit(node)
}

fn visit(node: Ir) -> Ir {
    let node = apply_rules(node);
    map_children(node, visit)
}

fn apply_rules(mut node: Ir) -> Ir {
    loop {
        let rewritten = match &node {
            Ir::Unary { .. } => invert_negated_comparison(&node)
                .or_else(|| eliminate_double_negation(&node)),
            Ir::Compare { .. } => coalesce_type_union(&node),
            _ => None,
        };
        match rewritten {
            Some(replacement) => node = replacement,
            None => return node,
        }
    }
}

/// `NOT (a OP b)` -> `a COUNTER-OP b` for comparators with an inverse.
fn invert_negated_comparison(node: &Ir) -> Option<Ir> {
    let Ir::Unary {
        operator: UnaryOperator::Not,
        operand,
    } = node
    else {
        return None;
    };
    let Ir::Compare {
        left,
        operator,
        right,
    } = operand.as_ref()
    else {
        return None;
    };
    // only plain comparisons; chains keep their explicit NOT
    if matches!(left.as_ref(), Ir::Compare { .. }) || matches!(right.as_ref(), Ir::Compare { .. }) {
        return None;
    }
    let counter = operator.counter()?;
    Some(Ir::compare(
        left.as_ref().clone(),
        counter,
        right.as_ref().clone(),
    ))
}

/// `NOT NOT x` -> `x`.
fn eliminate_double_negation(node: &Ir) -> Option<Ir> {
    let Ir::Unary {
        operator: UnaryOperator::Not,
        operand,
    } = node
    else {
        return None;
    };
    let Ir::Unary {
        operator: UnaryOperator::Not,
        operand: inner,
    } = operand.as_ref()
    else {
        return None;
    };
    Some(inner.as_ref().clone())
}

/// `(x IS A) OR (x IS B)` -> `x IS (A | B)` when both sides test the
/// same expression against namespaced types.
fn coalesce_type_union(node: &Ir) -> Option<Ir> {
    let Ir::Compare {
        left,
        operator: Comparator::Or,
        right,
    } = node
    else {
        return None;
    };
    let Ir::Compare {
        left: first_expr,
        operator: Comparator::Is,
        right: first_type,
    } = left.as_ref()
    else {
        return None;
    };
    let Ir::Compare {
        left: second_expr,
        operator: Comparator::Is,
        right: second_type,
    } = right.as_ref()
    else {
        return None;
    };
    if !matches!(first_type.as_ref(), Ir::NamespaceAttribute { .. })
        || !matches!(second_type.as_ref(), Ir::NamespaceAttribute { .. })
    {
        return None;
    }
    if first_expr != second_expr {
        return None;
    }
    let union = Ir::compare(
        first_type.as_ref().clone(),
        Comparator::BitOr,
        second_type.as_ref().clone(),
    );
    Some(Ir::compare(
        first_expr.as_ref().clone(),
        Comparator::Is,
        union,
    ))
}

/// Rebuild a node with every child visited.
fn map_children(node: Ir, f: fn(Ir) -> Ir) -> Ir {
    let map_box = |child: Box<Ir>| Box::new(f(*child));
    let map_vec = |children: Vec<Ir>| children.into_iter().map(f).collect();
    let map_opt = |child: Option<Ir>| child.map(f);
    let map_body =
        |body: Vec<(String, Ir)>| body.into_iter().map(|(name, value)| (name, f(value))).collect();

    match node {
        Ir::Literal(_)
        | Ir::Name(_)
        | Ir::Variable(_)
        | Ir::Property(_)
        | Ir::RootAttribute(_)
        | Ir::NamespaceAttribute { .. } => node,
        Ir::Attribute { base, attr } => Ir::Attribute {
            base: map_box(base),
            attr,
        },
        Ir::Subscript { item, index } => Ir::Subscript {
            item: map_box(item),
            index: map_box(index),
        },
        Ir::Call { func, args } => Ir::Call {
            func,
            args: map_vec(args),
        },
        Ir::Cast { model, item } => Ir::Cast {
            model,
            item: map_box(item),
        },
        Ir::Exists(value) => Ir::Exists(map_box(value)),
        Ir::Assign { target, value } => Ir::Assign {
            target: map_box(target),
            value: map_box(value),
        },
        Ir::Tuple(items) => Ir::Tuple(map_vec(items)),
        Ir::Array(items) => Ir::Array(map_vec(items)),
        Ir::Set(items) => Ir::Set(map_vec(items)),
        Ir::Compare {
            left,
            operator,
            right,
        } => Ir::Compare {
            left: map_box(left),
            operator,
            right: map_box(right),
        },
        Ir::Unary { operator, operand } => Ir::Unary {
            operator,
            operand: map_box(operand),
        },
        Ir::Union { left, right } => Ir::Union {
            left: map_box(left),
            right: map_box(right),
        },
        Ir::Select(select) => {
            let mut select = *select;
            select.model = f(select.model);
            select.filters = map_opt(select.filters);
            select.order = map_opt(select.order);
            Ir::Select(Box::new(select))
        }
        Ir::Insert(insert) => {
            let mut insert = *insert;
            insert.body = map_body(insert.body);
            Ir::Insert(Box::new(insert))
        }
        Ir::Update(update) => {
            let mut update = *update;
            update.filters = map_opt(update.filters);
            update.body = map_body(update.body);
            Ir::Update(Box::new(update))
        }
        Ir::For(loop_) => {
            let mut loop_ = *loop_;
            loop_.iterator = f(loop_.iterator);
            loop_.body = f(loop_.body);
            Ir::For(Box::new(loop_))
        }
        Ir::With(with) => {
            let mut with = *with;
            with.bindings = map_body(with.bindings);
            Ir::With(Box::new(with))
        }
        Ir::Wrapped(wrapped) => {
            let mut wrapped = *wrapped;
            wrapped.namespace.bindings = map_body(wrapped.namespace.bindings);
            wrapped.statement = f(wrapped.statement);
            Ir::Wrapped(Box::new(wrapped))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Select;

    fn is_test(attr: &str, type_name: &str) -> Ir {
        Ir::compare(
            Ir::RootAttribute(attr.to_owned()),
            Comparator::Is,
            Ir::NamespaceAttribute {
                namespace: "ast".to_owned(),
                attr: type_name.to_owned(),
            },
        )
    }

    #[test]
    fn negated_equality_becomes_inequality() {
        let node = Ir::negate(Ir::compare(
            Ir::RootAttribute("py_id".into()),
            Comparator::Eq,
            Ir::string("foo"),
        ));
        let optimized = optimize(node);
        assert_eq!(
            optimized,
            Ir::compare(
                Ir::RootAttribute("py_id".into()),
                Comparator::Ne,
                Ir::string("foo"),
            )
        );
    }

    #[test]
    fn double_negation_is_eliminated() {
        let node = Ir::negate(Ir::negate(Ir::exists(Ir::RootAttribute(
            "annotation".into(),
        ))));
        let optimized = optimize(node);
        assert_eq!(optimized, Ir::exists(Ir::RootAttribute("annotation".into())));
    }

    #[test]
    fn negation_without_counterpart_is_kept() {
        let node = Ir::negate(Ir::exists(Ir::RootAttribute("value".into())));
        assert_eq!(optimize(node.clone()), node);
    }

    #[test]
    fn type_or_coalesces_into_bitor() {
        let node = Ir::compare(
            is_test("value", "Name"),
            Comparator::Or,
            is_test("value", "Tuple"),
        );
        let optimized = optimize(node);
        let Ir::Compare {
            operator: Comparator::Is,
            right,
            ..
        } = &optimized
        else {
            panic!("expected IS comparison, got {optimized:?}");
        };
        assert!(matches!(
            right.as_ref(),
            Ir::Compare {
                operator: Comparator::BitOr,
                ..
            }
        ));
    }

    #[test]
    fn type_or_requires_matching_subject() {
        let node = Ir::compare(
            is_test("value", "Name"),
            Comparator::Or,
            is_test("target", "Tuple"),
        );
        assert_eq!(optimize(node.clone()), node);
    }

    #[test]
    fn rewrites_apply_inside_statements() {
        let mut select = Select::new(Ir::name("ast::Name"));
        select.filters = Some(Ir::negate(Ir::compare(
            Ir::RootAttribute("py_id".into()),
            Comparator::Eq,
            Ir::string("foo"),
        )));
        let optimized = optimize(Ir::select(select));
        let Ir::Select(select) = optimized else {
            panic!("expected select");
        };
        assert_eq!(
            select.filters,
            Some(Ir::compare(
                Ir::RootAttribute("py_id".into()),
                Comparator::Ne,
                Ir::string("foo"),
            ))
        );
    }

    #[test]
    fn cascades_after_rewrites() {
        // NOT NOT NOT (a = b) needs two cascaded rewrites
        let compare = Ir::compare(Ir::name("a"), Comparator::Eq, Ir::name("b"));
        let node = Ir::negate(Ir::negate(Ir::negate(compare)));
        let optimized = optimize(node);
        assert_eq!(
            optimized,
            Ir::compare(Ir::name("a"), Comparator::Ne, Ir::name("b"))
        );
    }
}
