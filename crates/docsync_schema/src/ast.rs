//! Schema definition tree.
//!
//! The parser produces a flat list of definitions; nesting stops at field
//! and argument level, so every transform over it is a plain loop. The same
//! types are printed back to SDL through their `Display` impls.

use std::fmt;

/// A parsed SDL document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaDocument {
    /// Top-level definitions in source order.
    pub definitions: Vec<Definition>,
}

impl SchemaDocument {
    /// Returns the object type with the given name, if declared.
    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        self.definitions.iter().find_map(|def| match def {
            Definition::Object(object) if object.name == name => Some(object),
            _ => None,
        })
    }

    /// Returns the names of root operation types (`Query`, `RootQuery`, ...).
    ///
    /// An explicit `schema { ... }` block wins over the conventional names.
    pub fn root_operation_types(&self) -> Vec<String> {
        let declared: Vec<String> = self
            .definitions
            .iter()
            .filter_map(|def| match def {
                Definition::Schema(operations) => {
                    Some(operations.iter().map(|(_, ty)| ty.clone()).collect::<Vec<_>>())
                }
                _ => None,
            })
            .flatten()
            .collect();

        if declared.is_empty() {
            ["Query", "RootQuery", "Mutation", "Subscription"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            declared
        }
    }
}

/// A top-level SDL definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    /// `type Name { ... }`
    Object(ObjectType),
    /// `interface Name { ... }`
    Interface(ObjectType),
    /// `union Name = A | B`
    Union(UnionType),
    /// `scalar Name`
    Scalar(ScalarType),
    /// `enum Name { ... }`
    Enum(EnumType),
    /// `input Name { ... }`
    InputObject(InputObjectType),
    /// `schema { query: Q }` as (operation, type) pairs.
    Schema(Vec<(String, String)>),
    /// `directive @name ...`; only the name is kept.
    DirectiveDefinition(String),
}

impl Definition {
    /// Returns the defined name, if the definition has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Definition::Object(t) | Definition::Interface(t) => Some(&t.name),
            Definition::Union(u) => Some(&u.name),
            Definition::Scalar(s) => Some(&s.name),
            Definition::Enum(e) => Some(&e.name),
            Definition::InputObject(i) => Some(&i.name),
            Definition::DirectiveDefinition(name) => Some(name),
            Definition::Schema(_) => None,
        }
    }
}

/// An object or interface type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectType {
    /// Type name.
    pub name: String,
    /// Optional description string.
    pub description: Option<String>,
    /// Implemented interfaces.
    pub interfaces: Vec<String>,
    /// Directives applied to the type.
    pub directives: Vec<Directive>,
    /// Field definitions.
    pub fields: Vec<FieldDefinition>,
}

impl ObjectType {
    /// Returns true if the type implements the named interface.
    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }
}

/// A field on an object or interface type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    /// Field name.
    pub name: String,
    /// Optional description string.
    pub description: Option<String>,
    /// Field arguments.
    pub arguments: Vec<InputValue>,
    /// Field type.
    pub ty: TypeRef,
    /// Directives applied to the field.
    pub directives: Vec<Directive>,
}

impl FieldDefinition {
    /// Creates a field with no arguments or directives.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
            ty,
            directives: Vec::new(),
        }
    }

    /// Returns the directive with the given name, if applied.
    pub fn directive(&self, name: &str) -> Option<&Directive> {
        self.directives.iter().find(|d| d.name == name)
    }
}

/// An argument or input object field.
#[derive(Debug, Clone, PartialEq)]
pub struct InputValue {
    /// Name.
    pub name: String,
    /// Type.
    pub ty: TypeRef,
    /// Default value.
    pub default_value: Option<ConstValue>,
    /// Directives.
    pub directives: Vec<Directive>,
}

impl InputValue {
    /// Creates an input value without default or directives.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            default_value: None,
            directives: Vec::new(),
        }
    }
}

/// A type reference such as `String`, `[Post!]` or `ID!`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// A named type.
    Named(String),
    /// A list of the inner type.
    List(Box<TypeRef>),
    /// A non-null wrapper.
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    /// Creates a named type reference.
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    /// Creates a list of the named type.
    pub fn list_of(name: impl Into<String>) -> Self {
        TypeRef::List(Box::new(TypeRef::Named(name.into())))
    }

    /// Returns the innermost named type.
    pub fn named_type(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named_type(),
        }
    }

    /// Returns true if the type is a list at any wrapping level.
    pub fn is_list(&self) -> bool {
        match self {
            TypeRef::Named(_) => false,
            TypeRef::List(_) => true,
            TypeRef::NonNull(inner) => inner.is_list(),
        }
    }

    /// Returns a copy with the innermost name replaced.
    pub fn map_named(&self, f: &impl Fn(&str) -> String) -> TypeRef {
        match self {
            TypeRef::Named(name) => TypeRef::Named(f(name)),
            TypeRef::List(inner) => TypeRef::List(Box::new(inner.map_named(f))),
            TypeRef::NonNull(inner) => TypeRef::NonNull(Box::new(inner.map_named(f))),
        }
    }
}

/// A directive application, e.g. `@jsonAlias(for: "body")`.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// Directive name without the `@`.
    pub name: String,
    /// Arguments in source order.
    pub arguments: Vec<(String, ConstValue)>,
}

impl Directive {
    /// Creates a directive without arguments.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    /// Returns the argument with the given name.
    pub fn argument(&self, name: &str) -> Option<&ConstValue> {
        self.arguments
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, value)| value)
    }
}

/// A constant input value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// `null`
    Null,
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    String(String),
    /// `true` / `false`
    Boolean(bool),
    /// Enum value.
    Enum(String),
    /// List literal.
    List(Vec<ConstValue>),
    /// Object literal.
    Object(Vec<(String, ConstValue)>),
}

impl ConstValue {
    /// Returns the string payload of a string literal.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A union type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnionType {
    /// Union name.
    pub name: String,
    /// Optional description string.
    pub description: Option<String>,
    /// Directives.
    pub directives: Vec<Directive>,
    /// Member type names.
    pub members: Vec<String>,
}

/// A custom scalar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScalarType {
    /// Scalar name.
    pub name: String,
    /// Optional description string.
    pub description: Option<String>,
    /// Directives.
    pub directives: Vec<Directive>,
}

/// An enum type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnumType {
    /// Enum name.
    pub name: String,
    /// Optional description string.
    pub description: Option<String>,
    /// Directives.
    pub directives: Vec<Directive>,
    /// Value names.
    pub values: Vec<String>,
}

/// An input object type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputObjectType {
    /// Input type name.
    pub name: String,
    /// Optional description string.
    pub description: Option<String>,
    /// Directives.
    pub directives: Vec<Directive>,
    /// Input fields.
    pub fields: Vec<InputValue>,
}

// ============================================================================
// Printing
// ============================================================================

impl fmt::Display for SchemaDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, def) in self.definitions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{def}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Definition::Object(t) => write_object(f, "type", t),
            Definition::Interface(t) => write_object(f, "interface", t),
            Definition::Union(u) => {
                write_description(f, &u.description, "")?;
                write!(f, "union {}", u.name)?;
                write_directives(f, &u.directives)?;
                write!(f, " = {}", u.members.join(" | "))
            }
            Definition::Scalar(s) => {
                write_description(f, &s.description, "")?;
                write!(f, "scalar {}", s.name)?;
                write_directives(f, &s.directives)
            }
            Definition::Enum(e) => {
                write_description(f, &e.description, "")?;
                write!(f, "enum {}", e.name)?;
                write_directives(f, &e.directives)?;
                writeln!(f, " {{")?;
                for value in &e.values {
                    writeln!(f, "  {value}")?;
                }
                write!(f, "}}")
            }
            Definition::InputObject(i) => {
                write_description(f, &i.description, "")?;
                write!(f, "input {}", i.name)?;
                write_directives(f, &i.directives)?;
                writeln!(f, " {{")?;
                for field in &i.fields {
                    writeln!(f, "  {field}")?;
                }
                write!(f, "}}")
            }
            Definition::Schema(operations) => {
                writeln!(f, "schema {{")?;
                for (op, ty) in operations {
                    writeln!(f, "  {op}: {ty}")?;
                }
                write!(f, "}}")
            }
            Definition::DirectiveDefinition(name) => write!(f, "directive @{name}"),
        }
    }
}

fn write_object(f: &mut fmt::Formatter<'_>, keyword: &str, t: &ObjectType) -> fmt::Result {
    write_description(f, &t.description, "")?;
    write!(f, "{keyword} {}", t.name)?;
    if !t.interfaces.is_empty() {
        write!(f, " implements {}", t.interfaces.join(" & "))?;
    }
    write_directives(f, &t.directives)?;
    writeln!(f, " {{")?;
    for field in &t.fields {
        write_description(f, &field.description, "  ")?;
        writeln!(f, "  {field}")?;
    }
    write!(f, "}}")
}

fn write_description(f: &mut fmt::Formatter<'_>, desc: &Option<String>, indent: &str) -> fmt::Result {
    match desc {
        Some(text) => writeln!(f, "{indent}{}", quote(text)),
        None => Ok(()),
    }
}

fn write_directives(f: &mut fmt::Formatter<'_>, directives: &[Directive]) -> fmt::Result {
    for directive in directives {
        write!(f, " {directive}")?;
    }
    Ok(())
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl fmt::Display for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.arguments.is_empty() {
            let args: Vec<String> = self.arguments.iter().map(|a| a.to_string()).collect();
            write!(f, "({})", args.join(", "))?;
        }
        write!(f, ": {}", self.ty)?;
        write_directives(f, &self.directives)
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)?;
        if let Some(default) = &self.default_value {
            write!(f, " = {default}")?;
        }
        write_directives(f, &self.directives)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{name}"),
            TypeRef::List(inner) => write!(f, "[{inner}]"),
            TypeRef::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if !self.arguments.is_empty() {
            let args: Vec<String> = self
                .arguments
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect();
            write!(f, "({})", args.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Null => write!(f, "null"),
            ConstValue::Int(i) => write!(f, "{i}"),
            ConstValue::Float(x) => write!(f, "{x:?}"),
            ConstValue::String(s) => write!(f, "{}", quote(s)),
            ConstValue::Boolean(b) => write!(f, "{b}"),
            ConstValue::Enum(e) => write!(f, "{e}"),
            ConstValue::List(items) => {
                let items: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            ConstValue::Object(fields) => {
                let fields: Vec<String> = fields
                    .iter()
                    .map(|(name, value)| format!("{name}: {value}"))
                    .collect();
                write!(f, "{{{}}}", fields.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_ref_helpers() {
        let ty = TypeRef::NonNull(Box::new(TypeRef::list_of("Post")));
        assert_eq!(ty.named_type(), "Post");
        assert!(ty.is_list());
        assert_eq!(ty.to_string(), "[Post]!");

        let renamed = ty.map_named(&|name| format!("Sanity{name}"));
        assert_eq!(renamed.to_string(), "[SanityPost]!");
        assert!(!TypeRef::named("String").is_list());
    }

    #[test]
    fn prints_object_type() {
        let object = ObjectType {
            name: "Post".into(),
            interfaces: vec!["Document".into(), "Node".into()],
            directives: vec![Directive::bare("dontInfer")],
            fields: vec![
                FieldDefinition::new("title", TypeRef::named("String")),
                FieldDefinition {
                    arguments: vec![InputValue::new("depth", TypeRef::named("Int"))],
                    ..FieldDefinition::new("_rawBody", TypeRef::named("JSON"))
                },
            ],
            ..ObjectType::default()
        };

        let printed = Definition::Object(object).to_string();
        assert_eq!(
            printed,
            "type Post implements Document & Node @dontInfer {\n  title: String\n  _rawBody(depth: Int): JSON\n}"
        );
    }

    #[test]
    fn prints_directive_arguments() {
        let directive = Directive {
            name: "jsonAlias".into(),
            arguments: vec![("for".into(), ConstValue::String("body".into()))],
        };
        assert_eq!(directive.to_string(), "@jsonAlias(for: \"body\")");
        assert_eq!(directive.argument("for").and_then(|v| v.as_str()), Some("body"));
    }

    #[test]
    fn root_operation_types_default() {
        let doc = SchemaDocument::default();
        assert!(doc.root_operation_types().contains(&"RootQuery".to_string()));

        let doc = SchemaDocument {
            definitions: vec![Definition::Schema(vec![("query".into(), "Root".into())])],
        };
        assert_eq!(doc.root_operation_types(), vec!["Root".to_string()]);
    }
}
