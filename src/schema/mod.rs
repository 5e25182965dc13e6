//! # Corpus Schema
//!
//! Wraps the annotated grammar [`Model`] with everything that is
//! backend-facing: reserved-identifier renaming, the field database the
//! query compiler type-checks against, and the names of the synthetic
//! attributes every stage agrees on.
//!
//! The renaming table lives here and nowhere else; the schema
//! generator, the serializer and the query compiler all go through
//! [`Schema::wrap`].

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::grammar::{self, Field, FieldKind, GrammarError, Model, Qualifier, TypeDef};

pub mod codegen;

/// Backend namespace every corpus type lives under.
pub const NAMESPACE: &str = "ast";

/// Name of the abstract root every concrete object extends.
pub const BASE_TYPE: &str = "AST";

/// Synthetic attribute names.
pub const MODULE_LINK: &str = "_module";
pub const TAG_PROPERTY: &str = "_tag";
pub const PARENT_TYPES_PROPERTY: &str = "_parent_types";
pub const INDEX_PROPERTY: &str = "index";

const KEYWORDS: &str = include_str!("../../static/edgeql_keywords.txt");
const PYTHON_GRAMMAR: &str = include_str!("../../static/Python.asdl");

/// Kind and multiplicity of one field, as recorded in the field DB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub kind: FieldKind,
    pub qualifier: Qualifier,
}

/// The `type -> field -> {kind, qualifier}` side-table consulted by the
/// query compiler. Derived from the grammar in-process; the same data
/// is emitted as JSON by the schema generation CLI.
///
/// Fields are kept in grammar order. The JSON form is a nested object
/// keyed by type and field name; a loaded field DB therefore carries
/// its fields in the file's own order.
#[derive(Debug, Clone, Default)]
pub struct FieldDb {
    types: BTreeMap<String, Vec<(String, FieldInfo)>>,
}

impl Serialize for FieldDb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        struct Fields<'a>(&'a [(String, FieldInfo)]);
        impl Serialize for Fields<'_> {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (name, info) in self.0 {
                    map.serialize_entry(name, info)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(self.types.len()))?;
        for (name, fields) in &self.types {
            map.serialize_entry(name, &Fields(fields))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldDb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<FieldDb, D::Error> {
        let raw: BTreeMap<String, Vec<(String, FieldInfo)>> =
            BTreeMap::<String, serde_json_map::OrderedFields>::deserialize(deserializer)?
                .into_iter()
                .map(|(name, fields)| (name, fields.0))
                .collect();
        Ok(FieldDb { types: raw })
    }
}

/// Keeps the field order of the JSON document while deserializing.
mod serde_json_map {
    use super::FieldInfo;
    use serde::de::{MapAccess, Visitor};
    use serde::Deserialize;

    pub struct OrderedFields(pub Vec<(String, FieldInfo)>);

    impl<'de> Deserialize<'de> for OrderedFields {
        fn deserialize<D: serde::Deserializer<'de>>(
            deserializer: D,
        ) -> Result<OrderedFields, D::Error> {
            struct FieldVisitor;

            impl<'de> Visitor<'de> for FieldVisitor {
                type Value = OrderedFields;

                fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str("a map of field name to field info")
                }

                fn visit_map<A: MapAccess<'de>>(
                    self,
                    mut access: A,
                ) -> Result<OrderedFields, A::Error> {
                    let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                    while let Some(entry) = access.next_entry::<String, FieldInfo>()? {
                        fields.push(entry);
                    }
                    Ok(OrderedFields(fields))
                }
            }

            deserializer.deserialize_map(FieldVisitor)
        }
    }
}

impl FieldDb {
    /// Build the field DB from the grammar model: declared fields plus
    /// inherited attributes, in grammar order, for every concrete type.
    pub fn from_model(model: &Model) -> FieldDb {
        let mut types = BTreeMap::new();
        let mut record = |name: &str, fields: &[Field], attributes: &[Field]| {
            let mut entries = Vec::new();
            for field in fields.iter().chain(attributes) {
                entries.push((
                    field.name.clone(),
                    FieldInfo {
                        kind: field.kind.clone(),
                        qualifier: field.qualifier,
                    },
                ));
            }
            types.insert(name.to_owned(), entries);
        };

        for decl in model.declarations() {
            match &decl.def {
                TypeDef::Product { fields, attributes } => {
                    record(&decl.name, fields, attributes);
                }
                TypeDef::Sum {
                    constructors,
                    attributes,
                } => {
                    if decl.is_enum() {
                        continue;
                    }
                    for ctor in constructors {
                        record(&ctor.name, &ctor.fields, attributes);
                    }
                }
            }
        }
        FieldDb { types }
    }

    pub fn load(path: &Path) -> Result<FieldDb, std::io::Error> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(std::io::Error::other)
    }

    pub fn lookup(&self, type_name: &str, field: &str) -> Option<&FieldInfo> {
        self.types
            .get(type_name)?
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, info)| info)
    }

    /// Declared field names of a type, in grammar order (attributes
    /// included, after the fields).
    pub fn field_names(&self, type_name: &str) -> Option<Vec<&str>> {
        self.types
            .get(type_name)
            .map(|entries| entries.iter().map(|(name, _)| name.as_str()).collect())
    }

    pub fn contains_type(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }
}

/// The runtime schema: grammar model + reserved-name table + field DB.
pub struct Schema {
    model: Model,
    keywords: HashSet<String>,
    field_db: FieldDb,
}

impl Schema {
    pub fn new(model: Model) -> Schema {
        let keywords = KEYWORDS
            .lines()
            .map(|line| line.trim().to_owned())
            .filter(|line| !line.is_empty())
            .collect();
        let field_db = FieldDb::from_model(&model);
        Schema {
            model,
            keywords,
            field_db,
        }
    }

    /// Load the grammar that ships with the crate.
    pub fn bootstrap() -> Result<Schema, GrammarError> {
        let grammar = grammar::parse(PYTHON_GRAMMAR)?;
        Ok(Schema::new(Model::new(grammar)?))
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn field_db(&self) -> &FieldDb {
        &self.field_db
    }

    /// Rename identifiers clashing with backend keywords: titlecase
    /// names get a `Py` prefix, anything else a `py_` prefix.
    pub fn wrap(&self, name: &str) -> String {
        if self.keywords.contains(&name.to_lowercase()) {
            if name.starts_with(char::is_uppercase) {
                format!("Py{name}")
            } else {
                format!("py_{name}")
            }
        } else {
            name.to_owned()
        }
    }

    /// Fully-qualified backend name: `ast::<wrapped>`.
    pub fn qualified(&self, name: &str) -> String {
        format!("{NAMESPACE}::{}", self.wrap(name))
    }

    /// The concrete type modules are stored as: the owner of the first
    /// `unique_fields` entry (`Module.filename` in the shipped grammar).
    pub fn module_type(&self) -> &str {
        self.model
            .directives()
            .unique_fields
            .first()
            .and_then(|dotted| dotted.split('.').next())
            .unwrap_or("Module")
    }

    /// The project record type, resolved through the module type's
    /// `project` field.
    pub fn project_type(&self) -> &str {
        self.model
            .fields_of(self.module_type())
            .and_then(|fields| fields.iter().find(|field| field.name == "project"))
            .and_then(|field| match &field.kind {
                FieldKind::Named(name) => Some(name.as_str()),
                _ => None,
            })
            .unwrap_or("project")
    }

    /// Whether values of this kind live in an enum-like sum (and are
    /// therefore stored as scalar enumeration properties).
    pub fn is_enum_kind(&self, kind: &FieldKind) -> bool {
        match kind {
            FieldKind::Named(name) => self.model.is_enum_base(name),
            _ => false,
        }
    }

    /// Whether a field of this kind is emitted as a property rather
    /// than a link.
    pub fn is_property_kind(&self, kind: &FieldKind) -> bool {
        kind.is_primitive() || self.is_enum_kind(kind)
    }

    /// Scalar backend type for a primitive kind.
    pub fn primitive_type(kind: &FieldKind) -> Option<&'static str> {
        match kind {
            FieldKind::Int => Some("int64"),
            FieldKind::String | FieldKind::Identifier | FieldKind::Constant => Some("str"),
            FieldKind::Named(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_loads_shipped_grammar() {
        let schema = Schema::bootstrap().unwrap();
        assert_eq!(schema.module_type(), "Module");
        assert_eq!(schema.project_type(), "project");
        assert!(schema.model().is_module_annotated("expr"));
    }

    #[test]
    fn keyword_wrapping() {
        let schema = Schema::bootstrap().unwrap();
        assert_eq!(schema.wrap("Module"), "PyModule");
        assert_eq!(schema.wrap("id"), "py_id");
        assert_eq!(schema.wrap("Name"), "Name");
        assert_eq!(schema.wrap("lineno"), "lineno");
        assert_eq!(schema.qualified("Set"), "ast::PySet");
    }

    #[test]
    fn field_db_orders_fields_like_the_grammar() {
        let schema = Schema::bootstrap().unwrap();
        let names = schema.field_db().field_names("FunctionDef").unwrap();
        assert_eq!(
            &names[..6],
            &[
                "name",
                "args",
                "body",
                "decorator_list",
                "returns",
                "type_comment"
            ]
        );
        // attributes follow the declared fields
        assert!(names.contains(&"lineno"));
    }

    #[test]
    fn field_db_lookup() {
        let schema = Schema::bootstrap().unwrap();
        let info = schema.field_db().lookup("Name", "id").unwrap();
        assert_eq!(info.kind, FieldKind::Identifier);
        assert_eq!(info.qualifier, Qualifier::Required);

        let info = schema.field_db().lookup("Call", "args").unwrap();
        assert_eq!(info.kind, FieldKind::Named("expr".to_owned()));
        assert_eq!(info.qualifier, Qualifier::Sequence);
    }

    #[test]
    fn enum_kind_detection() {
        let schema = Schema::bootstrap().unwrap();
        assert!(schema.is_enum_kind(&FieldKind::Named("expr_context".to_owned())));
        assert!(!schema.is_enum_kind(&FieldKind::Named("expr".to_owned())));
        assert!(schema.is_property_kind(&FieldKind::Identifier));
    }
}
