//! Schema generation: turns the grammar model into the backend's
//! migration SDL plus the companion field DB JSON.
//!
//! Declarations are built as small [`ModelDecl`]/[`FieldDecl`] values
//! first and rendered at the end, so the emission rules stay in one
//! place: primitives become properties, grammar types become links,
//! `sequence` maps to `multi`, multi links get an `index` link
//! property, and `unique_fields` entries get an exclusive constraint.

use crate::grammar::{Field, Qualifier, TypeDef};
use crate::schema::{
    Schema, BASE_TYPE, INDEX_PROPERTY, MODULE_LINK, NAMESPACE, PARENT_TYPES_PROPERTY, TAG_PROPERTY,
};

const INDENT: &str = "    ";

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldConstraint {
    Multi,
    Required,
}

impl FieldConstraint {
    fn as_str(self) -> &'static str {
        match self {
            FieldConstraint::Multi => "multi",
            FieldConstraint::Required => "required",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ModelConstraint {
    Scalar,
    Abstract,
}

#[derive(Debug, Clone)]
struct FieldDecl {
    name: String,
    target: String,
    constraint: Option<FieldConstraint>,
    is_property: bool,
    is_unique: bool,
}

impl FieldDecl {
    fn property(name: &str, target: &str) -> FieldDecl {
        FieldDecl {
            name: name.to_owned(),
            target: target.to_owned(),
            constraint: None,
            is_property: true,
            is_unique: false,
        }
    }

    fn link(name: &str, target: &str) -> FieldDecl {
        FieldDecl {
            name: name.to_owned(),
            target: target.to_owned(),
            constraint: None,
            is_property: false,
            is_unique: false,
        }
    }

    fn with_constraint(mut self, constraint: FieldConstraint) -> FieldDecl {
        self.constraint = Some(constraint);
        self
    }

    /// Multi links to object types carry the child's ordinal position.
    fn is_ordered_sequence(&self) -> bool {
        self.constraint == Some(FieldConstraint::Multi) && !self.is_property
    }

    fn construct(&self) -> String {
        let mut source = Vec::new();
        if let Some(constraint) = self.constraint {
            source.push(constraint.as_str().to_owned());
        }
        source.push(if self.is_property { "property" } else { "link" }.to_owned());
        source.push(self.name.clone());
        source.push("->".to_owned());
        source.push(self.target.clone());

        let mut declaration = source.join(" ");
        if self.is_ordered_sequence() || self.is_unique {
            declaration.push_str(&format!(" {{\n{INDENT}{INDENT}"));
            if self.is_ordered_sequence() {
                declaration.push_str(&FieldDecl::property(INDEX_PROPERTY, "int64").construct());
            } else {
                declaration.push_str("constraint exclusive;");
            }
            declaration.push_str(&format!("\n{INDENT}}}"));
        }
        declaration + ";"
    }
}

#[derive(Debug, Clone)]
struct ModelDecl {
    name: String,
    fields: Vec<FieldDecl>,
    constraint: Option<ModelConstraint>,
    extending: Vec<String>,
}

impl ModelDecl {
    fn new(name: String) -> ModelDecl {
        ModelDecl {
            name,
            fields: Vec::new(),
            constraint: None,
            extending: Vec::new(),
        }
    }

    /// Members are rendered as quoted literals since some of them
    /// (`And`, `Or`, `Not`, `Is`, `In`) are backend keywords.
    fn enumeration(name: String, members: &[String]) -> ModelDecl {
        let quoted: Vec<String> = members.iter().map(|member| format!("'{member}'")).collect();
        ModelDecl {
            name,
            fields: Vec::new(),
            constraint: Some(ModelConstraint::Scalar),
            extending: vec![format!("enum<{}>", quoted.join(", "))],
        }
    }

    fn construct(&self) -> String {
        let mut line = format!("type {}", self.name);
        match self.constraint {
            Some(ModelConstraint::Scalar) => line = format!("scalar {line}"),
            Some(ModelConstraint::Abstract) => line = format!("abstract {line}"),
            None => {}
        }
        if !self.extending.is_empty() {
            line.push_str(" extending ");
            line.push_str(&self.extending.join(", "));
        }

        if self.constraint == Some(ModelConstraint::Scalar) {
            return line + ";";
        }

        line.push_str(" {");
        let mut source = vec![line];
        for field in &self.fields {
            for rendered_line in field.construct().lines() {
                source.push(format!("{INDENT}{rendered_line}"));
            }
        }
        if source.len() == 1 {
            source[0].push('}');
        } else {
            source.push("}".to_owned());
        }
        source.join("\n")
    }
}

/// Emit the full migration document for the loaded grammar.
pub fn generate_schema(schema: &Schema) -> String {
    let mut declarations = vec![ModelDecl {
        name: BASE_TYPE.to_owned(),
        fields: Vec::new(),
        constraint: Some(ModelConstraint::Abstract),
        extending: Vec::new(),
    }];

    for decl in schema.model().declarations() {
        match &decl.def {
            TypeDef::Sum {
                constructors,
                attributes,
            } => {
                if decl.is_enum() {
                    let members: Vec<String> =
                        constructors.iter().map(|ctor| ctor.name.clone()).collect();
                    declarations.push(ModelDecl::enumeration(schema.wrap(&decl.name), &members));
                    continue;
                }

                let mut base = ModelDecl::new(schema.wrap(&decl.name));
                base.constraint = Some(ModelConstraint::Abstract);
                push_fields(schema, &mut base, &decl.name, attributes);
                push_synthetics(schema, &mut base, &decl.name);
                declarations.push(base);

                for ctor in constructors {
                    let mut model = ModelDecl::new(schema.wrap(&ctor.name));
                    model.extending =
                        vec![schema.wrap(&decl.name), BASE_TYPE.to_owned()];
                    push_fields(schema, &mut model, &ctor.name, &ctor.fields);
                    declarations.push(model);
                }
            }
            TypeDef::Product { fields, attributes } => {
                let mut model = ModelDecl::new(schema.wrap(&decl.name));
                push_fields(schema, &mut model, &decl.name, fields);
                push_fields(schema, &mut model, &decl.name, attributes);
                push_synthetics(schema, &mut model, &decl.name);
                declarations.push(model);
            }
        }
    }

    let mut output = String::from("START MIGRATION TO {\n");
    output.push_str(&format!("{INDENT}module {NAMESPACE} {{\n"));
    for declaration in &declarations {
        for line in declaration.construct().lines() {
            output.push_str(&format!("{INDENT}{INDENT}{line}\n"));
        }
    }
    output.push_str(&format!("{INDENT}}}\n"));
    output.push_str("};\n");
    output
}

fn push_fields(schema: &Schema, model: &mut ModelDecl, owner: &str, fields: &[Field]) {
    for field in fields {
        model.fields.push(emit_field(schema, owner, field));
    }
}

fn emit_field(schema: &Schema, owner: &str, field: &Field) -> FieldDecl {
    let name = schema.wrap(&field.name);
    let mut decl = if let Some(scalar) = Schema::primitive_type(&field.kind) {
        FieldDecl::property(&name, scalar)
    } else if schema.is_enum_kind(&field.kind) {
        FieldDecl::property(&name, &schema.wrap(&field.kind.to_string()))
    } else {
        FieldDecl::link(&name, &schema.wrap(&field.kind.to_string()))
    };

    decl = match field.qualifier {
        Qualifier::Required => decl.with_constraint(FieldConstraint::Required),
        Qualifier::Sequence => decl.with_constraint(FieldConstraint::Multi),
        Qualifier::Optional => decl,
    };
    decl.is_unique = schema.model().is_unique_field(owner, &field.name);
    decl
}

/// `_module`, `_tag` and `_parent_types` on module-annotated types.
fn push_synthetics(schema: &Schema, model: &mut ModelDecl, name: &str) {
    if !schema.model().is_module_annotated(name) {
        return;
    }
    model
        .fields
        .push(FieldDecl::link(MODULE_LINK, &schema.wrap(schema.module_type())));
    model
        .fields
        .push(FieldDecl::property(TAG_PROPERTY, "int64"));
    model.fields.push(
        FieldDecl::property(PARENT_TYPES_PROPERTY, "tuple<int64, str>")
            .with_constraint(FieldConstraint::Multi),
    );
}

/// The companion field DB JSON, pretty-printed for diffability.
pub fn generate_field_db(schema: &Schema) -> String {
    serde_json::to_string_pretty(schema.field_db()).unwrap_or_else(|_| "{}".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_abstract_root_and_enum_scalars() {
        let schema = Schema::bootstrap().unwrap();
        let sdl = generate_schema(&schema);
        assert!(sdl.contains("abstract type AST {}"));
        assert!(sdl.contains("scalar type expr_context extending enum<'Load', 'Store', 'Del'>;"));
    }

    #[test]
    fn constructors_extend_base_and_ast() {
        let schema = Schema::bootstrap().unwrap();
        let sdl = generate_schema(&schema);
        assert!(sdl.contains("type FunctionDef extending stmt, AST {"));
        // reserved names are wrapped on both sides of the declaration
        assert!(sdl.contains("type PySet extending expr, AST {"));
        assert!(sdl.contains("type PyModule extending mod, AST {"));
    }

    #[test]
    fn unique_fields_get_exclusive_constraints() {
        let schema = Schema::bootstrap().unwrap();
        let sdl = generate_schema(&schema);
        assert!(sdl.contains("required property filename -> str {"));
        assert!(sdl.contains("constraint exclusive;"));
    }

    #[test]
    fn multi_links_carry_index_property() {
        let schema = Schema::bootstrap().unwrap();
        let sdl = generate_schema(&schema);
        assert!(sdl.contains("multi link body -> stmt {"));
        assert!(sdl.contains("property index -> int64;"));
    }

    #[test]
    fn module_annotated_bases_get_synthetics() {
        let schema = Schema::bootstrap().unwrap();
        let sdl = generate_schema(&schema);
        assert!(sdl.contains("link _module -> PyModule;"));
        assert!(sdl.contains("property _tag -> int64;"));
        assert!(sdl.contains("multi property _parent_types -> tuple<int64, str>;"));
    }

    #[test]
    fn renamed_fields() {
        let schema = Schema::bootstrap().unwrap();
        let sdl = generate_schema(&schema);
        assert!(sdl.contains("required property py_id -> str;"));
        assert!(sdl.contains("property py_module -> str;"));
    }

    #[test]
    fn field_db_json_round_trips() {
        let schema = Schema::bootstrap().unwrap();
        let raw = generate_field_db(&schema);
        let parsed: crate::schema::FieldDb = serde_json::from_str(&raw).unwrap();
        assert!(parsed.contains_type("FunctionDef"));
        assert_eq!(
            parsed.lookup("Name", "id").unwrap(),
            schema.field_db().lookup("Name", "id").unwrap()
        );
    }
}
