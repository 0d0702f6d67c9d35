//! Structural description of the remote schema.
//!
//! Built once from the schema text and read-only afterwards. The reconciler
//! uses it to reject documents of undeclared types and to find raw-alias and
//! union fields; the schema rewriter uses it for scalar and document checks.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{Definition, FieldDefinition, SchemaDocument};
use crate::error::{SchemaError, SchemaResult};
use crate::naming::{type_name, BUILTIN_SCALARS};
use crate::parser::parse_schema;

/// Interface marking top-level documents in the remote schema.
pub(crate) const DOCUMENT_INTERFACE: &str = "Document";

/// Directive marking a field as a reference to another document.
pub(crate) const REFERENCE_DIRECTIVE: &str = "reference";

/// Directive marking a JSON field as the raw form of another field.
pub(crate) const JSON_ALIAS_DIRECTIVE: &str = "jsonAlias";

/// A field of an object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    /// Innermost named type; host name for object types, source name for scalars.
    pub named_type: String,
    /// Whether the field holds a list.
    pub is_list: bool,
    /// Whether the field is a reference to another document.
    pub is_reference: bool,
    /// Whether the named type is a scalar or enum.
    pub is_scalar: bool,
    /// For JSON alias fields, the document key whose raw value this field carries.
    pub alias_for: Option<String>,
}

/// An object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Host type name.
    pub name: String,
    /// Name as declared in the remote schema.
    pub source_name: String,
    /// Whether the type implements the document marker interface.
    pub is_document: bool,
    /// Fields keyed by source field name.
    pub fields: BTreeMap<String, FieldEntry>,
}

impl ObjectEntry {
    /// Iterates over fields whose raw values are kept alongside the node,
    /// yielding `(document key, field)`.
    pub fn raw_fields(&self) -> impl Iterator<Item = (&str, &FieldEntry)> {
        self.fields.iter().filter_map(|(name, field)| match &field.alias_for {
            Some(target) => Some((target.as_str(), field)),
            None if !field.is_scalar => Some((name.as_str(), field)),
            None => None,
        })
    }
}

/// The type map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMap {
    prefix: String,
    scalars: BTreeSet<String>,
    objects: BTreeMap<String, ObjectEntry>,
    unions: BTreeMap<String, Vec<String>>,
}

impl TypeMap {
    /// Parses SDL and builds the type map.
    pub fn from_sdl(sdl: &str, prefix: &str) -> SchemaResult<Self> {
        let doc = parse_schema(sdl)?;
        Self::from_schema(&doc, prefix)
    }

    /// Builds the type map from a parsed schema.
    ///
    /// Root operation types are not document types and are left out.
    pub fn from_schema(doc: &SchemaDocument, prefix: &str) -> SchemaResult<Self> {
        let mut scalars: BTreeSet<String> = BUILTIN_SCALARS.iter().map(|s| s.to_string()).collect();
        for def in &doc.definitions {
            match def {
                Definition::Scalar(s) => {
                    scalars.insert(s.name.clone());
                }
                Definition::Enum(e) => {
                    scalars.insert(e.name.clone());
                }
                _ => {}
            }
        }

        let roots = doc.root_operation_types();
        let mut objects = BTreeMap::new();
        let mut unions = BTreeMap::new();

        for def in &doc.definitions {
            match def {
                Definition::Object(object) if !roots.contains(&object.name) => {
                    let name = type_name(&object.name, prefix);
                    let fields = object
                        .fields
                        .iter()
                        .map(|field| (field.name.clone(), field_entry(field, &scalars, prefix)))
                        .collect();
                    objects.insert(
                        name.clone(),
                        ObjectEntry {
                            name,
                            source_name: object.name.clone(),
                            is_document: object.implements(DOCUMENT_INTERFACE),
                            fields,
                        },
                    );
                }
                Definition::Union(union) => {
                    unions.insert(
                        type_name(&union.name, prefix),
                        union.members.iter().map(|m| type_name(m, prefix)).collect(),
                    );
                }
                _ => {}
            }
        }

        if objects.is_empty() {
            return Err(SchemaError::Empty);
        }

        tracing::debug!(
            objects = objects.len(),
            unions = unions.len(),
            "built type map"
        );

        Ok(Self {
            prefix: prefix.to_string(),
            scalars,
            objects,
            unions,
        })
    }

    /// Returns the type prefix the map was built with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Maps a document type tag or schema name to its host type name.
    pub fn host_type_name(&self, raw: &str) -> String {
        type_name(raw, &self.prefix)
    }

    /// Looks up an object type by host name.
    pub fn object(&self, host_name: &str) -> Option<&ObjectEntry> {
        self.objects.get(host_name)
    }

    /// Looks up the object type a document with the given `_type` belongs to.
    pub fn object_for_document_type(&self, doc_type: &str) -> Option<&ObjectEntry> {
        self.objects.get(&self.host_type_name(doc_type))
    }

    /// Iterates over all object types in name order.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectEntry> {
        self.objects.values()
    }

    /// Returns the members of a union by host name.
    pub fn union_members(&self, host_name: &str) -> Option<&[String]> {
        self.unions.get(host_name).map(Vec::as_slice)
    }

    /// Returns true if the host name denotes a union.
    pub fn is_union(&self, host_name: &str) -> bool {
        self.unions.contains_key(host_name)
    }

    /// Returns true if the source name denotes a scalar or enum.
    pub fn is_scalar(&self, source_name: &str) -> bool {
        self.scalars.contains(source_name)
    }
}

fn field_entry(field: &FieldDefinition, scalars: &BTreeSet<String>, prefix: &str) -> FieldEntry {
    let named = field.ty.named_type();
    let is_scalar = scalars.contains(named);
    FieldEntry {
        named_type: if is_scalar {
            named.to_string()
        } else {
            type_name(named, prefix)
        },
        is_list: field.ty.is_list(),
        is_reference: field.directive(REFERENCE_DIRECTIVE).is_some(),
        is_scalar,
        alias_for: field
            .directive(JSON_ALIAS_DIRECTIVE)
            .and_then(|d| d.argument("for"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
    }
}
