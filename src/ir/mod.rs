//! # Query IR
//!
//! The backend-neutral query algebra. Everything the compiler and the
//! serializer emit is built from this tagged sum, optimized by
//! [`optimizer`], and rendered by [`printer`].
//!
//! Statements (`SELECT`, `INSERT`, `UPDATE`, `FOR`, `WITH`) are plain
//! variants of [`Ir`]; whether they print wrapped in parentheses is
//! decided by the printer from their position, never by the nodes.

use thiserror::Error;

pub mod optimizer;
pub mod printer;

pub use optimizer::optimize;
pub use printer::construct;

/// The requested operator has no counterpart in the chosen backend.
#[derive(Error, Debug)]
#[error("backend doesn't support {0}")]
pub struct UnsupportedOperation(pub String);

/// Binary comparators and logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Or,
    And,
    Coalesce,
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Ne,
    In,
    NotIn,
    Is,
    IsNot,
    Like,
    ILike,
    NotLike,
    NotILike,
    BitOr,
}

impl Comparator {
    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Or => "OR",
            Comparator::And => "AND",
            Comparator::Coalesce => "??",
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Gte => ">=",
            Comparator::Lte => "<=",
            Comparator::Eq => "=",
            Comparator::Ne => "!=",
            Comparator::In => "IN",
            Comparator::NotIn => "NOT IN",
            Comparator::Is => "IS",
            Comparator::IsNot => "IS NOT",
            Comparator::Like => "LIKE",
            Comparator::ILike => "ILIKE",
            Comparator::NotLike => "NOT LIKE",
            Comparator::NotILike => "NOT ILIKE",
            Comparator::BitOr => "|",
        }
    }

    /// Resolve an operator symbol, refusing anything the backend has
    /// no counterpart for.
    pub fn from_symbol(symbol: &str) -> Result<Comparator, UnsupportedOperation> {
        Ok(match symbol {
            "OR" => Comparator::Or,
            "AND" => Comparator::And,
            "??" => Comparator::Coalesce,
            ">" => Comparator::Gt,
            "<" => Comparator::Lt,
            ">=" => Comparator::Gte,
            "<=" => Comparator::Lte,
            "=" => Comparator::Eq,
            "!=" => Comparator::Ne,
            "IN" => Comparator::In,
            "NOT IN" => Comparator::NotIn,
            "IS" => Comparator::Is,
            "IS NOT" => Comparator::IsNot,
            "LIKE" => Comparator::Like,
            "ILIKE" => Comparator::ILike,
            "NOT LIKE" => Comparator::NotLike,
            "NOT ILIKE" => Comparator::NotILike,
            "|" => Comparator::BitOr,
            other => return Err(UnsupportedOperation(format!("operator '{other}'"))),
        })
    }

    /// The comparator expressing the negation of this one, if the
    /// backend has it. The table is involutive.
    pub fn counter(self) -> Option<Comparator> {
        Some(match self {
            Comparator::Gt => Comparator::Lte,
            Comparator::Lte => Comparator::Gt,
            Comparator::Lt => Comparator::Gte,
            Comparator::Gte => Comparator::Lt,
            Comparator::Eq => Comparator::Ne,
            Comparator::Ne => Comparator::Eq,
            Comparator::In => Comparator::NotIn,
            Comparator::NotIn => Comparator::In,
            Comparator::Is => Comparator::IsNot,
            Comparator::IsNot => Comparator::Is,
            Comparator::Like => Comparator::NotLike,
            Comparator::NotLike => Comparator::Like,
            Comparator::ILike => Comparator::NotILike,
            Comparator::NotILike => Comparator::ILike,
            Comparator::Or | Comparator::And | Comparator::Coalesce | Comparator::BitOr => {
                return None
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    Is,
}

impl UnaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOperator::Not => "NOT",
            UnaryOperator::Is => "IS",
        }
    }
}

/// Scalar literals; strings print in the backend's quoted form.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
}

/// One entry of a selection shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// `name` or `name: { nested }`
    Field {
        name: String,
        nested: Vec<Selection>,
    },
    /// `@index := item.0` style computed selections
    Assign { target: Ir, value: Ir },
}

impl Selection {
    pub fn field(name: impl Into<String>) -> Selection {
        Selection::Field {
            name: name.into(),
            nested: Vec::new(),
        }
    }

    pub fn nested(name: impl Into<String>, nested: Vec<Selection>) -> Selection {
        Selection::Field {
            name: name.into(),
            nested,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub model: Ir,
    pub selections: Vec<Selection>,
    pub filters: Option<Ir>,
    pub order: Option<Ir>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl Select {
    pub fn new(model: Ir) -> Select {
        Select {
            model,
            selections: Vec::new(),
            filters: None,
            order: None,
            offset: None,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub model: String,
    pub body: Vec<(String, Ir)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub model: String,
    pub filters: Option<Ir>,
    pub body: Vec<(String, Ir)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub target: String,
    pub iterator: Ir,
    pub body: Ir,
}

#[derive(Debug, Clone, PartialEq)]
pub struct With {
    pub bindings: Vec<(String, Ir)>,
}

/// A statement prefixed by a `WITH` namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Wrapped {
    pub namespace: With,
    pub statement: Ir,
}

/// The IR node. Structural equality is derived; the optimizer relies
/// on it for the type-union rewrite.
#[derive(Debug, Clone, PartialEq)]
pub enum Ir {
    Literal(Literal),
    /// Bare name (`__item`, a bound variable, a qualified type)
    Name(String),
    /// `$parameter`
    Variable(String),
    /// `@property`
    Property(String),
    /// `.field` rooted at the selection scope
    RootAttribute(String),
    /// `<base>.<attr>`
    Attribute { base: Box<Ir>, attr: String },
    /// `namespace::attr`
    NamespaceAttribute { namespace: String, attr: String },
    /// `<item>[<index>]`; with an `IS` unary inside, a type assertion
    Subscript { item: Box<Ir>, index: Box<Ir> },
    Call { func: String, args: Vec<Ir> },
    /// `<model>value`
    Cast { model: String, item: Box<Ir> },
    Exists(Box<Ir>),
    Assign { target: Box<Ir>, value: Box<Ir> },
    Tuple(Vec<Ir>),
    Array(Vec<Ir>),
    Set(Vec<Ir>),
    Compare {
        left: Box<Ir>,
        operator: Comparator,
        right: Box<Ir>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Ir>,
    },
    Union { left: Box<Ir>, right: Box<Ir> },
    Select(Box<Select>),
    Insert(Box<Insert>),
    Update(Box<Update>),
    For(Box<For>),
    With(Box<With>),
    Wrapped(Box<Wrapped>),
}

impl Ir {
    pub fn string(value: impl Into<String>) -> Ir {
        Ir::Literal(Literal::Str(value.into()))
    }

    pub fn int(value: i64) -> Ir {
        Ir::Literal(Literal::Int(value))
    }

    pub fn name(value: impl Into<String>) -> Ir {
        Ir::Name(value.into())
    }

    pub fn attribute(base: Option<Ir>, attr: impl Into<String>) -> Ir {
        match base {
            Some(base) => Ir::Attribute {
                base: Box::new(base),
                attr: attr.into(),
            },
            None => Ir::RootAttribute(attr.into()),
        }
    }

    pub fn subscript(item: Ir, index: Ir) -> Ir {
        Ir::Subscript {
            item: Box::new(item),
            index: Box::new(index),
        }
    }

    pub fn call(func: impl Into<String>, args: Vec<Ir>) -> Ir {
        Ir::Call {
            func: func.into(),
            args,
        }
    }

    pub fn cast(model: impl Into<String>, item: Ir) -> Ir {
        Ir::Cast {
            model: model.into(),
            item: Box::new(item),
        }
    }

    pub fn compare(left: Ir, operator: Comparator, right: Ir) -> Ir {
        Ir::Compare {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    pub fn negate(operand: Ir) -> Ir {
        Ir::Unary {
            operator: UnaryOperator::Not,
            operand: Box::new(operand),
        }
    }

    pub fn exists(value: Ir) -> Ir {
        Ir::Exists(Box::new(value))
    }

    pub fn assign(target: Ir, value: Ir) -> Ir {
        Ir::Assign {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    /// Runtime type assertion: `<node>[IS <model>]`.
    pub fn typed(node: Ir, model: impl Into<String>) -> Ir {
        Ir::subscript(
            node,
            Ir::Unary {
                operator: UnaryOperator::Is,
                operand: Box::new(Ir::name(model)),
            },
        )
    }

    /// Cast form of an enum member literal: `<base>'Member'`.
    pub fn enum_member(base: impl Into<String>, member: impl Into<String>) -> Ir {
        Ir::cast(base, Ir::string(member))
    }

    /// AND-chain an optional accumulator with the next filter.
    pub fn combine(left: Option<Ir>, right: Ir) -> Ir {
        match left {
            Some(left) => Ir::compare(left, Comparator::And, right),
            None => right,
        }
    }

    /// Fold a union over at least one expression.
    pub fn merge(mut expressions: impl Iterator<Item = Ir>) -> Option<Ir> {
        let first = expressions.next()?;
        Some(expressions.fold(first, |left, right| Ir::Union {
            left: Box::new(left),
            right: Box::new(right),
        }))
    }

    pub fn select(select: Select) -> Ir {
        Ir::Select(Box::new(select))
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            Ir::Select(_) | Ir::Insert(_) | Ir::Update(_) | Ir::For(_) | Ir::With(_) | Ir::Wrapped(_)
        )
    }
}

/// Fresh namespace binding name (`sequence_3af19c02`), used by the
/// list-match compiler.
pub fn new_reference(category: &str) -> String {
    let suffix: u32 = rand::random();
    format!("{category}_{suffix:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_table_is_involutive() {
        let all = [
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
        for op in all {
            assert_eq!(op.counter().and_then(Comparator::counter), Some(op));
        }
    }

    #[test]
    fn symbols_resolve_or_are_unsupported() {
        assert_eq!(Comparator::from_symbol("LIKE").unwrap(), Comparator::Like);
        assert_eq!(Comparator::from_symbol("??").unwrap(), Comparator::Coalesce);
        assert!(Comparator::from_symbol("~=").is_err());
    }

    #[test]
    fn logical_operators_have_no_counter() {
        assert_eq!(Comparator::And.counter(), None);
        assert_eq!(Comparator::Or.counter(), None);
        assert_eq!(Comparator::BitOr.counter(), None);
    }

    #[test]
    fn combine_starts_and_chains() {
        let first = Ir::combine(None, Ir::int(1));
        assert_eq!(first, Ir::int(1));
        let chained = Ir::combine(Some(first), Ir::int(2));
        assert!(matches!(
            chained,
            Ir::Compare {
                operator: Comparator::And,
                ..
            }
        ));
    }

    #[test]
    fn fresh_references_are_distinct() {
        assert_ne!(new_reference("sequence"), new_reference("sequence"));
    }
}
