//! # docsync schema
//!
//! Remote schema handling for docsync.
//!
//! This crate provides:
//! - A GraphQL SDL parser producing a flat definition list
//! - The type map used to validate incoming documents
//! - Type and field naming rules shared with the reconciler
//! - The schema rewriter producing host-compatible SDL
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod ast;
mod error;
mod naming;
mod parser;
mod rewrite;
mod type_map;

pub use ast::{
    ConstValue, Definition, Directive, EnumType, FieldDefinition, InputObjectType, InputValue,
    ObjectType, ScalarType, SchemaDocument, TypeRef, UnionType,
};
pub use error::{SchemaError, SchemaResult};
pub use naming::{
    conflict_free_field_name, is_builtin_scalar, raw_data_field_name, raw_field_name,
    type_name, upper_first, BUILTIN_SCALARS, DEFAULT_TYPE_PREFIX, RAW_DATA_PREFIX, RAW_PREFIX,
    RESTRICTED_NODE_FIELDS,
};
pub use parser::parse_schema;
pub use rewrite::rewrite_schema;
pub use type_map::{FieldEntry, ObjectEntry, TypeMap};
