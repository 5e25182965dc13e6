//! Optimizer properties: counter-op involution, and the absence of
//! double negation in optimized trees.

use proptest::prelude::*;

use reiz::ir::{optimize, Comparator, Ir};

const INVERTIBLE: [Comparator; 14] = [
    Comparator::Gt,
    Comparator::Lt,
    Comparator::Gte,
    Comparator::Lte,
    Comparator::Eq,
    Comparator::Ne,
    Comparator::In,
    Comparator::NotIn,
    Comparator::Is,
    Comparator::IsNot,
    Comparator::Like,
    Comparator::NotLike,
    Comparator::ILike,
    Comparator::NotILike,
];

fn comparator() -> impl Strategy<Value = Comparator> {
    proptest::sample::select(&INVERTIBLE[..])
}

proptest! {
    #[test]
    fn counter_op_is_involutive(op in comparator()) {
        let counter = op.counter().expect("invertible comparator");
        prop_assert_eq!(counter.counter(), Some(op));
    }

    #[test]
    fn negated_comparisons_lose_their_not(op in comparator(), depth in 0usize..4) {
        // wrap a comparison in `depth` extra double negations
        let mut node = Ir::negate(Ir::compare(Ir::name("a"), op, Ir::name("b")));
        for _ in 0..depth {
            node = Ir::negate(Ir::negate(node));
        }
        let optimized = optimize(node);
        prop_assert!(!contains_not(&optimized), "{:?}", optimized);
    }
}

/// Recursively look for a NOT anywhere in the tree, via the printed
/// form (the printer spells every operator out).
fn contains_not(node: &Ir) -> bool {
    let rendered = reiz::ir::construct(node);
    rendered.split_whitespace().any(|token| token == "NOT")
}

#[test]
fn optimization_reaches_nested_filters() {
    let inner = Ir::negate(Ir::negate(Ir::exists(Ir::RootAttribute("x".into()))));
    let call = Ir::call("any", vec![Ir::negate(inner)]);
    let optimized = optimize(call);
    assert_eq!(reiz::ir::construct(&optimized), "any(NOT EXISTS .x)");
}
