//! Indentation-aware IR rendering.
//!
//! Statements print wrapped in balanced parentheses unless they sit at
//! the top level; compare chains of more than two operands render one
//! operand per line; unions do the same with a `UNION` delimiter.
//! Operand grouping is always made explicit with parentheses, so the
//! backend never has to apply its own precedence rules to our output.

use crate::ir::{Comparator, Ir, Literal, Select, Selection, UnaryOperator};
use crate::python::str_repr;

/// Render a top-level statement (or expression).
pub fn construct(node: &Ir) -> String {
    let mut printer = Printer {
        out: String::new(),
        level: 0,
    };
    printer.view(node, true);
    // drop lines that ended up all-whitespace
    let lines: Vec<&str> = printer
        .out
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    lines.join("\n")
}

struct Printer {
    out: String,
    level: usize,
}

impl Printer {
    fn write(&mut self, source: &str) {
        self.out.push_str(source);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.level {
            self.out.push_str("    ");
        }
    }

    fn view(&mut self, node: &Ir, top_level: bool) {
        if node.is_statement() && !top_level {
            self.write("(");
            self.level += 1;
            self.newline();
            self.view_inner(node);
            self.level -= 1;
            self.newline();
            self.write(")");
        } else {
            self.view_inner(node);
        }
    }

    /// Parenthesize operands whose own operator could bleed into the
    /// surrounding expression.
    fn view_operand(&mut self, node: &Ir) {
        match node {
            Ir::Compare { .. } | Ir::Union { .. } | Ir::Unary { .. } => {
                self.write("(");
                self.view_inner(node);
                self.write(")");
            }
            _ => self.view(node, false),
        }
    }

    fn view_inner(&mut self, node: &Ir) {
        match node {
            Ir::Literal(Literal::Str(value)) => self.write(&str_repr(value)),
            Ir::Literal(Literal::Int(value)) => self.write(&value.to_string()),
            Ir::Name(name) => self.write(name),
            Ir::Variable(name) => {
                self.write("$");
                self.write(name);
            }
            Ir::Property(name) => {
                self.write("@");
                self.write(name);
            }
            Ir::RootAttribute(attr) => {
                self.write(".");
                self.write(attr);
            }
            Ir::Attribute { base, attr } => {
                self.view(base, false);
                self.write(".");
                self.write(attr);
            }
            Ir::NamespaceAttribute { namespace, attr } => {
                self.write(namespace);
                self.write("::");
                self.write(attr);
            }
            Ir::Subscript { item, index } => {
                self.view(item, false);
                self.write("[");
                self.view(index, false);
                self.write("]");
            }
            Ir::Call { func, args } => {
                self.write(func);
                self.write("(");
                for (position, arg) in args.iter().enumerate() {
                    if position > 0 {
                        self.write(", ");
                    }
                    self.view(arg, false);
                }
                self.write(")");
            }
            Ir::Cast { model, item } => {
                self.write("<");
                self.write(model);
                self.write(">");
                self.view(item, false);
            }
            Ir::Exists(value) => {
                self.write("EXISTS ");
                self.view_operand(value);
            }
            Ir::Assign { target, value } => {
                self.view(target, false);
                self.write(" := ");
                self.view(value, false);
            }
            Ir::Tuple(items) => self.container("(", ")", items),
            Ir::Array(items) => self.container("[", "]", items),
            Ir::Set(items) => self.container("{", "}", items),
            Ir::Compare { .. } => self.view_compare(node),
            Ir::Unary { operator, operand } => {
                self.write(operator.as_str());
                self.write(" ");
                match operator {
                    UnaryOperator::Not => self.view_operand(operand),
                    UnaryOperator::Is => self.view(operand, false),
                }
            }
            Ir::Union { .. } => self.view_union(node),
            Ir::Select(select) => self.view_select(select),
            Ir::Insert(insert) => {
                self.write("INSERT ");
                self.write(&insert.model);
                if !insert.body.is_empty() {
                    self.write(" {");
                    self.level += 1;
                    for (position, (field, value)) in insert.body.iter().enumerate() {
                        self.newline();
                        self.write(field);
                        self.write(" := ");
                        self.view(value, false);
                        if position + 1 < insert.body.len() {
                            self.write(",");
                        }
                    }
                    self.level -= 1;
                    self.newline();
                    self.write("}");
                }
            }
            Ir::Update(update) => {
                self.write("UPDATE ");
                self.write(&update.model);
                if let Some(filters) = &update.filters {
                    self.write(" FILTER ");
                    self.view(filters, false);
                }
                self.write(" SET {");
                self.level += 1;
                for (position, (field, value)) in update.body.iter().enumerate() {
                    self.newline();
                    self.write(field);
                    self.write(" := ");
                    self.view(value, false);
                    if position + 1 < update.body.len() {
                        self.write(",");
                    }
                }
                self.level -= 1;
                self.newline();
                self.write("}");
            }
            Ir::For(loop_) => {
                self.write("FOR ");
                self.write(&loop_.target);
                self.write(" IN {");
                self.view(&loop_.iterator, false);
                self.write("}");
                self.newline();
                self.write("UNION ");
                self.view(&loop_.body, false);
            }
            Ir::With(with) => self.view_with(with),
            Ir::Wrapped(wrapped) => {
                self.view_with(&wrapped.namespace);
                self.newline();
                self.view_inner(&wrapped.statement);
            }
        }
    }

    fn view_with(&mut self, with: &super::With) {
        self.write("WITH");
        self.level += 1;
        for (position, (name, value)) in with.bindings.iter().enumerate() {
            self.newline();
            self.write(name);
            self.write(" := ");
            self.view(value, false);
            if position + 1 < with.bindings.len() {
                self.write(",");
            }
        }
        self.level -= 1;
    }

    fn container(&mut self, open: &str, close: &str, items: &[Ir]) {
        self.write(open);
        for (position, item) in items.iter().enumerate() {
            if position > 0 {
                self.write(", ");
            }
            self.view(item, false);
        }
        self.write(close);
    }

    /// Flatten nested AND chains into their operands.
    fn unpack_and<'a>(node: &'a Ir, operands: &mut Vec<&'a Ir>) {
        if let Ir::Compare {
            left,
            operator: Comparator::And,
            right,
        } = node
        {
            Self::unpack_and(left, operands);
            Self::unpack_and(right, operands);
        } else {
            operands.push(node);
        }
    }

    fn view_compare(&mut self, node: &Ir) {
        let mut operands = Vec::new();
        Self::unpack_and(node, &mut operands);
        if operands.len() > 2 {
            self.write("(");
            self.level += 1;
            for (position, operand) in operands.iter().enumerate() {
                self.newline();
                if position > 0 {
                    self.write("AND ");
                }
                self.view_operand(operand);
            }
            self.level -= 1;
            self.newline();
            self.write(")");
            return;
        }

        let Ir::Compare {
            left,
            operator,
            right,
        } = node
        else {
            unreachable!("view_compare called on a non-compare node");
        };
        self.view_operand(left);
        self.write(" ");
        self.write(operator.as_str());
        self.write(" ");
        self.view_operand(right);
    }

    fn unpack_union<'a>(node: &'a Ir, operands: &mut Vec<&'a Ir>) {
        if let Ir::Union { left, right } = node {
            Self::unpack_union(left, operands);
            Self::unpack_union(right, operands);
        } else {
            operands.push(node);
        }
    }

    fn view_union(&mut self, node: &Ir) {
        let mut operands = Vec::new();
        Self::unpack_union(node, &mut operands);
        if operands.len() > 2 {
            self.write("(");
            self.level += 1;
            for (position, operand) in operands.iter().enumerate() {
                self.newline();
                if position > 0 {
                    self.write("UNION ");
                }
                self.view_operand(operand);
            }
            self.level -= 1;
            self.newline();
            self.write(")");
            return;
        }
        for (position, operand) in operands.iter().enumerate() {
            if position > 0 {
                self.write(" UNION ");
            }
            self.view_operand(operand);
        }
    }

    fn view_select(&mut self, select: &Select) {
        self.write("SELECT ");
        self.view(&select.model, false);
        if !select.selections.is_empty() {
            self.write(" {");
            self.level += 1;
            for (position, selection) in select.selections.iter().enumerate() {
                self.newline();
                self.view_selection(selection);
                if position + 1 < select.selections.len() {
                    self.write(",");
                }
            }
            self.level -= 1;
            self.newline();
            self.write("}");
        }
        if let Some(filters) = &select.filters {
            self.newline();
            self.write("FILTER ");
            self.view(filters, false);
        }
        if let Some(order) = &select.order {
            self.newline();
            self.write("ORDER BY ");
            self.view(order, false);
        }
        if let Some(offset) = select.offset {
            self.newline();
            self.write("OFFSET ");
            self.write(&offset.to_string());
        }
        if let Some(limit) = select.limit {
            self.newline();
            self.write("LIMIT ");
            self.write(&limit.to_string());
        }
    }

    fn view_selection(&mut self, selection: &Selection) {
        match selection {
            Selection::Field { name, nested } => {
                self.write(name);
                if !nested.is_empty() {
                    self.write(": {");
                    self.level += 1;
                    for (position, inner) in nested.iter().enumerate() {
                        self.newline();
                        self.view_selection(inner);
                        if position + 1 < nested.len() {
                            self.write(",");
                        }
                    }
                    self.level -= 1;
                    self.newline();
                    self.write("}");
                }
            }
            Selection::Assign { target, value } => {
                self.view(target, false);
                self.write(" := ");
                self.view(value, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Insert, Update, With, Wrapped};

    #[test]
    fn simple_select_with_filter() {
        let select = Ir::select({
            let mut select = Select::new(Ir::name("ast::Name"));
            select.filters = Some(Ir::compare(
                Ir::RootAttribute("py_id".to_owned()),
                Comparator::Eq,
                Ir::string("foo"),
            ));
            select.limit = Some(10);
            select
        });
        assert_eq!(
            construct(&select),
            "SELECT ast::Name\nFILTER .py_id = 'foo'\nLIMIT 10"
        );
    }

    #[test]
    fn nested_statements_are_parenthesized() {
        let inner = Ir::select(Select::new(Ir::name("ast::expr")));
        let call = Ir::call("count", vec![inner]);
        assert_eq!(construct(&call), "count((\n    SELECT ast::expr\n))");
    }

    #[test]
    fn and_chains_unpack_one_per_line() {
        let a = Ir::compare(Ir::RootAttribute("a".into()), Comparator::Eq, Ir::int(1));
        let b = Ir::compare(Ir::RootAttribute("b".into()), Comparator::Eq, Ir::int(2));
        let c = Ir::compare(Ir::RootAttribute("c".into()), Comparator::Eq, Ir::int(3));
        let chain = Ir::combine(Some(Ir::combine(Some(a), b)), c);
        let rendered = construct(&chain);
        assert!(rendered.contains("AND (.b = 2)"));
        assert!(rendered.contains("AND (.c = 3)"));
    }

    #[test]
    fn typed_subscript_prints_is_assertion() {
        let typed = Ir::typed(Ir::RootAttribute("value".into()), "ast::Tuple");
        assert_eq!(construct(&typed), ".value[IS ast::Tuple]");
    }

    #[test]
    fn enum_member_prints_as_cast_literal() {
        let member = Ir::enum_member("ast::expr_context", "Load");
        assert_eq!(construct(&member), "<ast::expr_context>'Load'");
    }

    #[test]
    fn insert_renders_assignments() {
        let insert = Ir::Insert(Box::new(Insert {
            model: "ast::Name".to_owned(),
            body: vec![
                ("py_id".to_owned(), Ir::string("x")),
                ("lineno".to_owned(), Ir::int(3)),
            ],
        }));
        assert_eq!(
            construct(&insert),
            "INSERT ast::Name {\n    py_id := 'x',\n    lineno := 3\n}"
        );
    }

    #[test]
    fn update_renders_filter_and_set() {
        let update = Ir::Update(Box::new(Update {
            model: "ast::stmt".to_owned(),
            filters: Some(Ir::compare(
                Ir::RootAttribute("id".into()),
                Comparator::In,
                Ir::call(
                    "array_unpack",
                    vec![Ir::cast("array<uuid>", Ir::Variable("ids".into()))],
                ),
            )),
            body: vec![("_module".to_owned(), Ir::name("m"))],
        }));
        assert_eq!(
            construct(&update),
            "UPDATE ast::stmt FILTER .id IN array_unpack(<array<uuid>>$ids) SET {\n    _module := m\n}"
        );
    }

    #[test]
    fn wrapped_statement_prints_namespace_first() {
        let wrapped = Ir::Wrapped(Box::new(Wrapped {
            namespace: With {
                bindings: vec![("items".to_owned(), Ir::Set(vec![Ir::int(1)]))],
            },
            statement: Ir::select(Select::new(Ir::name("x"))),
        }));
        assert_eq!(construct(&wrapped), "WITH\n    items := {1}\nSELECT x");
    }

    #[test]
    fn string_literals_are_quoted_and_escaped() {
        assert_eq!(construct(&Ir::string("it's")), "\"it's\"");
        assert_eq!(construct(&Ir::string("a%")), "'a%'");
    }
}
