//! # Grammar Model
//!
//! Loads an ASDL-style description of the target language's abstract
//! grammar and annotates it into the immutable [`Model`] every later
//! stage (schema generation, ingest, query compilation) consults.
//!
//! A grammar is a list of type declarations. Each declaration is either
//! a *product* (one fixed set of named fields) or a *sum* (a set of
//! constructors). A sum whose constructors all carry zero fields is
//! *enum-like* and is stored as a scalar enumeration; any other sum is
//! *polymorphic* and becomes an abstract object base.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod parser;

pub use parser::parse;

/// Errors raised while loading or validating a grammar.
#[derive(Error, Debug)]
pub enum GrammarError {
    /// Lexical or syntactic error in the ASDL source
    #[error("malformed grammar at line {line}: {message}")]
    Malformed { line: usize, message: String },

    /// A field references a type the grammar never declares
    #[error("field '{field}' of '{owner}' references undeclared type '{kind}'")]
    UndeclaredType {
        owner: String,
        field: String,
        kind: String,
    },

    /// Two declarations (or constructors) share a name
    #[error("duplicate definition of '{0}'")]
    DuplicateDefinition(String),

    /// A directive comment could not be interpreted
    #[error("invalid directive '{0}': {1}")]
    InvalidDirective(String, String),
}

/// Field multiplicity, straight from the ASDL qualifier characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Qualifier {
    /// No qualifier: exactly one value
    Required,
    /// `?`: zero or one value
    Optional,
    /// `*`: an ordered sequence
    Sequence,
}

/// What a field holds: one of the four ASDL primitives, or another
/// grammar type by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum FieldKind {
    Int,
    String,
    Identifier,
    Constant,
    Named(String),
}

impl FieldKind {
    pub fn from_name(name: &str) -> FieldKind {
        match name {
            "int" => FieldKind::Int,
            "string" => FieldKind::String,
            "identifier" => FieldKind::Identifier,
            "constant" => FieldKind::Constant,
            _ => FieldKind::Named(name.to_owned()),
        }
    }

    /// Primitive kinds become properties in the schema; named kinds
    /// become links (unless they resolve to an enum-like sum).
    pub fn is_primitive(&self) -> bool {
        !matches!(self, FieldKind::Named(_))
    }
}

impl From<String> for FieldKind {
    fn from(name: String) -> FieldKind {
        FieldKind::from_name(&name)
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> String {
        kind.to_string()
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Int => f.write_str("int"),
            FieldKind::String => f.write_str("string"),
            FieldKind::Identifier => f.write_str("identifier"),
            FieldKind::Constant => f.write_str("constant"),
            FieldKind::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub qualifier: Qualifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constructor {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDef {
    Product {
        fields: Vec<Field>,
        attributes: Vec<Field>,
    },
    Sum {
        constructors: Vec<Constructor>,
        attributes: Vec<Field>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub def: TypeDef,
}

impl TypeDecl {
    pub fn is_enum(&self) -> bool {
        match &self.def {
            TypeDef::Sum { constructors, .. } => {
                constructors.iter().all(|ctor| ctor.fields.is_empty())
            }
            TypeDef::Product { .. } => false,
        }
    }
}

/// Schema configuration carried as directive comments inside the ASDL
/// source (`-- unique_fields: [...]` and friends).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    /// `Type.field` pairs that get an exclusive constraint
    pub unique_fields: Vec<String>,
    /// Field names excluded from the structural tag
    pub tag_exclusions: Vec<String>,
    /// Base types that receive `_module`/`_tag`/`_parent_types`
    pub module_annotated_types: Vec<String>,
}

/// The raw parse result: declarations in source order plus directives.
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
    pub module_name: String,
    pub types: Vec<TypeDecl>,
    pub directives: Directives,
}

/// Where a name points inside the grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum NameKind {
    /// A product declaration
    Product,
    /// A polymorphic sum declaration
    Sum,
    /// An enum-like sum declaration
    EnumSum,
    /// A constructor of a polymorphic sum (carries the sum's name)
    Constructor(String),
    /// A field-less constructor of an enum-like sum
    EnumMember(String),
}

struct NameEntry {
    kind: NameKind,
    decl: usize,
    ctor: Option<usize>,
}

/// The annotated grammar: name resolution, dense type ids, and the
/// classification every later stage keys off. Built once per process
/// and passed around by reference.
pub struct Model {
    grammar: Grammar,
    names: HashMap<String, NameEntry>,
    type_ids: HashMap<String, i64>,
}

impl Model {
    /// Annotate a parsed grammar. Verifies that every referenced type
    /// is declared and that names are unique across declarations and
    /// constructors, then assigns dense type ids to every concrete
    /// type (products and constructors) in declaration order.
    pub fn new(grammar: Grammar) -> Result<Model, GrammarError> {
        let mut names = HashMap::new();
        let mut type_ids = HashMap::new();
        let mut next_id: i64 = 0;

        for (decl_index, decl) in grammar.types.iter().enumerate() {
            let kind = match &decl.def {
                TypeDef::Product { .. } => NameKind::Product,
                TypeDef::Sum { .. } if decl.is_enum() => NameKind::EnumSum,
                TypeDef::Sum { .. } => NameKind::Sum,
            };
            let entry = NameEntry {
                kind: kind.clone(),
                decl: decl_index,
                ctor: None,
            };
            if names.insert(decl.name.clone(), entry).is_some() {
                return Err(GrammarError::DuplicateDefinition(decl.name.clone()));
            }
            if matches!(kind, NameKind::Product) {
                type_ids.insert(decl.name.clone(), next_id);
                next_id += 1;
            }

            if let TypeDef::Sum { constructors, .. } = &decl.def {
                let enum_like = decl.is_enum();
                for (ctor_index, ctor) in constructors.iter().enumerate() {
                    let kind = if enum_like {
                        NameKind::EnumMember(decl.name.clone())
                    } else {
                        NameKind::Constructor(decl.name.clone())
                    };
                    let entry = NameEntry {
                        kind,
                        decl: decl_index,
                        ctor: Some(ctor_index),
                    };
                    if names.insert(ctor.name.clone(), entry).is_some() {
                        return Err(GrammarError::DuplicateDefinition(ctor.name.clone()));
                    }
                    if !enum_like {
                        type_ids.insert(ctor.name.clone(), next_id);
                        next_id += 1;
                    }
                }
            }
        }

        let model = Model {
            grammar,
            names,
            type_ids,
        };
        model.check_references()?;
        Ok(model)
    }

    fn check_references(&self) -> Result<(), GrammarError> {
        let check = |owner: &str, fields: &[Field]| -> Result<(), GrammarError> {
            for field in fields {
                if let FieldKind::Named(kind) = &field.kind {
                    if !self.names.contains_key(kind.as_str()) {
                        return Err(GrammarError::UndeclaredType {
                            owner: owner.to_owned(),
                            field: field.name.clone(),
                            kind: kind.clone(),
                        });
                    }
                }
            }
            Ok(())
        };

        for decl in &self.grammar.types {
            match &decl.def {
                TypeDef::Product { fields, attributes } => {
                    check(&decl.name, fields)?;
                    check(&decl.name, attributes)?;
                }
                TypeDef::Sum {
                    constructors,
                    attributes,
                } => {
                    check(&decl.name, attributes)?;
                    for ctor in constructors {
                        check(&ctor.name, &ctor.fields)?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn directives(&self) -> &Directives {
        &self.grammar.directives
    }

    pub fn declarations(&self) -> &[TypeDecl] {
        &self.grammar.types
    }

    pub fn name_kind(&self, name: &str) -> Option<&NameKind> {
        self.names.get(name).map(|entry| &entry.kind)
    }

    /// Dense id of a concrete type (product or constructor of a
    /// polymorphic sum). Enum members and abstract sums carry none.
    pub fn type_id(&self, name: &str) -> Option<i64> {
        self.type_ids.get(name).copied()
    }

    /// The base type a concrete name serializes under: the owning sum
    /// for constructors, the type itself for products.
    pub fn base_of<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        match self.names.get(name)?.kind {
            NameKind::Product => Some(name),
            NameKind::Constructor(ref sum) | NameKind::EnumMember(ref sum) => Some(sum.as_str()),
            NameKind::Sum | NameKind::EnumSum => Some(name),
        }
    }

    /// Declared fields of a concrete type, in grammar order.
    pub fn fields_of(&self, name: &str) -> Option<&[Field]> {
        let entry = self.names.get(name)?;
        let decl = &self.grammar.types[entry.decl];
        match (&decl.def, entry.ctor) {
            (TypeDef::Product { fields, .. }, None) => Some(fields),
            (TypeDef::Sum { constructors, .. }, Some(index)) => Some(&constructors[index].fields),
            _ => None,
        }
    }

    /// Attributes a concrete type inherits: its own for products, the
    /// owning sum's for constructors.
    pub fn attributes_of(&self, name: &str) -> Option<&[Field]> {
        let entry = self.names.get(name)?;
        let decl = &self.grammar.types[entry.decl];
        match &decl.def {
            TypeDef::Product { attributes, .. } => Some(attributes),
            TypeDef::Sum { attributes, .. } => Some(attributes),
        }
    }

    pub fn is_enum_base(&self, name: &str) -> bool {
        matches!(self.name_kind(name), Some(NameKind::EnumSum))
    }

    /// Whether a concrete type carries source positions (and therefore
    /// may act as the root of a query).
    pub fn has_position_attributes(&self, name: &str) -> bool {
        self.attributes_of(name)
            .map(|attrs| {
                attrs.iter().any(|attr| attr.name == "lineno")
                    && attrs.iter().any(|attr| attr.name == "col_offset")
            })
            .unwrap_or(false)
    }

    /// Whether a base type receives the synthetic `_module` back-link,
    /// `_tag` and `_parent_types` attributes.
    pub fn is_module_annotated(&self, base: &str) -> bool {
        self.grammar
            .directives
            .module_annotated_types
            .iter()
            .any(|name| name == base)
    }

    /// Whether a concrete type belongs to a module-annotated base.
    pub fn is_annotated_node(&self, name: &str) -> bool {
        self.base_of(name)
            .map(|base| self.is_module_annotated(base))
            .unwrap_or(false)
    }

    pub fn is_tag_excluded(&self, field: &str) -> bool {
        self.grammar
            .directives
            .tag_exclusions
            .iter()
            .any(|name| name == field)
    }

    pub fn is_unique_field(&self, owner: &str, field: &str) -> bool {
        let dotted = format!("{owner}.{field}");
        self.grammar
            .directives
            .unique_fields
            .iter()
            .any(|name| *name == dotted)
    }

    /// Whether `name` is (or is a constructor of) the given base.
    pub fn extends(&self, name: &str, base: &str) -> bool {
        name == base || self.base_of(name) == Some(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_grammar() -> Grammar {
        parse(
            r#"
            -- module_annotated_types: ["expr"]
            module Tiny
            {
                expr = Name(identifier id, ctx ctx)
                     | Pair(expr left, expr right)
                     attributes (int lineno, int col_offset)
                ctx = Load | Store
                leaf = (int value)
            }
            "#,
        )
        .unwrap()
    }

    #[test]
    fn classifies_sums() {
        let model = Model::new(tiny_grammar()).unwrap();
        assert!(matches!(model.name_kind("expr"), Some(NameKind::Sum)));
        assert!(matches!(model.name_kind("ctx"), Some(NameKind::EnumSum)));
        assert!(matches!(model.name_kind("leaf"), Some(NameKind::Product)));
        assert!(matches!(
            model.name_kind("Load"),
            Some(NameKind::EnumMember(base)) if base == "ctx"
        ));
    }

    #[test]
    fn type_ids_are_dense_and_skip_enum_members() {
        let model = Model::new(tiny_grammar()).unwrap();
        assert_eq!(model.type_id("Name"), Some(0));
        assert_eq!(model.type_id("Pair"), Some(1));
        assert_eq!(model.type_id("leaf"), Some(2));
        assert_eq!(model.type_id("Load"), None);
        assert_eq!(model.type_id("expr"), None);
    }

    #[test]
    fn base_resolution() {
        let model = Model::new(tiny_grammar()).unwrap();
        assert_eq!(model.base_of("Name"), Some("expr"));
        assert_eq!(model.base_of("leaf"), Some("leaf"));
        assert!(model.is_annotated_node("Pair"));
        assert!(!model.is_annotated_node("leaf"));
    }

    #[test]
    fn undeclared_reference_is_rejected() {
        let result = parse("module T { thing = (ghost value) }")
            .map_err(GrammarError::from)
            .and_then(Model::new);
        assert!(matches!(result, Err(GrammarError::UndeclaredType { .. })));
    }

    #[test]
    fn position_attributes_detected() {
        let model = Model::new(tiny_grammar()).unwrap();
        assert!(model.has_position_attributes("Name"));
        assert!(!model.has_position_attributes("leaf"));
    }
}
