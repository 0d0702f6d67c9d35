//! Schema rewriting.
//!
//! Turns the remote SDL into SDL the host can register: prefixed type names,
//! the host's date scalar, the node interface on documents, conflict-free
//! field names, typed block lists for JSON aliases and a raw JSON twin for
//! every non-scalar field. The transform is pure; the same input always
//! prints the same output.

use crate::ast::{
    Definition, Directive, FieldDefinition, InputObjectType, InputValue, ObjectType,
    SchemaDocument, TypeRef, UnionType,
};
use crate::naming::{conflict_free_field_name, raw_field_name, type_name};
use crate::type_map::{TypeMap, DOCUMENT_INTERFACE, JSON_ALIAS_DIRECTIVE};

/// Host interface implemented by every document type.
const NODE_INTERFACE: &str = "Node";

/// Rewrites a parsed remote schema for the host.
pub fn rewrite_schema(doc: &SchemaDocument, type_map: &TypeMap) -> SchemaDocument {
    let prefix = type_map.prefix();
    let roots = doc.root_operation_types();
    let mut definitions = Vec::new();
    let mut needs_resolve_config = false;

    for def in &doc.definitions {
        match def {
            Definition::Object(object) if !roots.contains(&object.name) => {
                let rewritten = rewrite_object(object, type_map);
                needs_resolve_config |= rewritten
                    .fields
                    .iter()
                    .any(|f| !f.arguments.is_empty());
                definitions.push(Definition::Object(rewritten));
            }
            Definition::Interface(interface) => {
                definitions.push(Definition::Interface(rewrite_interface(interface, type_map)));
            }
            Definition::Union(union) => {
                definitions.push(Definition::Union(UnionType {
                    name: type_name(&union.name, prefix),
                    description: None,
                    directives: Vec::new(),
                    members: union.members.iter().map(|m| type_name(m, prefix)).collect(),
                }));
            }
            _ => {}
        }
    }

    if needs_resolve_config {
        definitions.push(Definition::InputObject(InputObjectType {
            name: resolve_config_type(prefix),
            description: None,
            directives: Vec::new(),
            fields: vec![InputValue::new(
                "maxDepth",
                TypeRef::NonNull(Box::new(TypeRef::named("Int"))),
            )],
        }));
    }

    SchemaDocument { definitions }
}

fn resolve_config_type(prefix: &str) -> String {
    format!("{prefix}ResolveReferencesConfiguration")
}

fn block_type(prefix: &str) -> String {
    format!("{prefix}Block")
}

fn alias_target(field: &FieldDefinition) -> Option<&str> {
    field
        .directive(JSON_ALIAS_DIRECTIVE)
        .and_then(|d| d.argument("for"))
        .and_then(|v| v.as_str())
}

fn rewrite_object(object: &ObjectType, type_map: &TypeMap) -> ObjectType {
    let prefix = type_map.prefix();

    let mut interfaces: Vec<String> = object
        .interfaces
        .iter()
        .map(|i| type_name(i, prefix))
        .collect();
    if object.implements(DOCUMENT_INTERFACE) {
        interfaces.push(NODE_INTERFACE.to_string());
    }

    let mut fields: Vec<FieldDefinition> = object
        .fields
        .iter()
        .filter(|f| alias_target(f).is_none())
        .map(|f| rewrite_field(f, type_map))
        .collect();

    // JSON aliases become typed block lists named after their target
    fields.extend(
        object
            .fields
            .iter()
            .filter_map(alias_target)
            .map(|target| FieldDefinition::new(target, TypeRef::list_of(block_type(prefix)))),
    );

    fields.extend(object.fields.iter().filter_map(|field| {
        let raw_of = match alias_target(field) {
            Some(target) => target,
            None if !type_map.is_scalar(field.ty.named_type()) => field.name.as_str(),
            None => return None,
        };
        Some(FieldDefinition {
            arguments: vec![InputValue::new(
                "resolveReferences",
                TypeRef::named(resolve_config_type(prefix)),
            )],
            ..FieldDefinition::new(raw_field_name(raw_of), TypeRef::named("JSON"))
        })
    }));

    ObjectType {
        name: type_name(&object.name, prefix),
        description: None,
        interfaces,
        directives: vec![Directive::bare("dontInfer")],
        fields,
    }
}

fn rewrite_interface(interface: &ObjectType, type_map: &TypeMap) -> ObjectType {
    ObjectType {
        name: type_name(&interface.name, type_map.prefix()),
        description: None,
        interfaces: Vec::new(),
        directives: Vec::new(),
        fields: interface
            .fields
            .iter()
            .filter(|f| alias_target(f).is_none())
            .map(|f| rewrite_field(f, type_map))
            .collect(),
    }
}

fn rewrite_field(field: &FieldDefinition, type_map: &TypeMap) -> FieldDefinition {
    let prefix = type_map.prefix();
    let ty = field.ty.map_named(&|name| match name {
        "DateTime" => "Date".to_string(),
        "ID" => "String".to_string(),
        other if type_map.is_scalar(other) => other.to_string(),
        other => type_name(other, prefix),
    });

    let mut directives = Vec::new();
    if ty.named_type() == "Date" {
        directives.push(Directive::bare("dateformat"));
    }

    FieldDefinition {
        name: conflict_free_field_name(&field.name, prefix),
        description: None,
        arguments: Vec::new(),
        ty,
        directives,
    }
}
