//! SDL parser.
//!
//! Parses the GraphQL type-definition language published by the remote
//! store into a [`SchemaDocument`]. Executable definitions (queries,
//! fragments) and `extend` blocks are not accepted.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_until, take_while},
    character::complete::{char, digit1, multispace1, one_of, satisfy},
    combinator::{all_consuming, cut, map, not, opt, recognize, value},
    error::{context, ErrorKind, ParseError, VerboseError},
    multi::many0,
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use crate::ast::*;
use crate::error::{SchemaError, SchemaResult};

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

// ============================================================================
// Public API
// ============================================================================

/// Parses SDL text into a schema document.
pub fn parse_schema(input: &str) -> SchemaResult<SchemaDocument> {
    match all_consuming(document)(input) {
        Ok((_, doc)) => Ok(doc),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(SchemaError::parse(nom::error::convert_error(input, e)))
        }
        Err(nom::Err::Incomplete(_)) => Err(SchemaError::parse("incomplete input")),
    }
}

// ============================================================================
// Lexical helpers
// ============================================================================

fn document<'a>(input: &'a str) -> Res<'a, SchemaDocument> {
    let (input, _) = ignored(input)?;
    let (input, definitions) = many0(terminated(definition, ignored))(input)?;
    Ok((input, SchemaDocument { definitions }))
}

/// Whitespace, commas and `#` comments are insignificant in SDL.
fn ignored<'a>(input: &'a str) -> Res<'a, ()> {
    value((), many0(alt((multispace1, tag(","), comment))))(input)
}

fn comment<'a>(input: &'a str) -> Res<'a, &'a str> {
    recognize(pair(char('#'), take_while(|c| c != '\n')))(input)
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> Res<'a, O>
where
    F: FnMut(&'a str) -> Res<'a, O>,
{
    preceded(ignored, inner)
}

fn name<'a>(input: &'a str) -> Res<'a, &'a str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    terminated(
        tag(kw),
        not(satisfy(|c: char| c.is_ascii_alphanumeric() || c == '_')),
    )
}

fn description<'a>(input: &'a str) -> Res<'a, Option<String>> {
    opt(terminated(string_value, ignored))(input)
}

// ============================================================================
// Values
// ============================================================================

fn string_value<'a>(input: &'a str) -> Res<'a, String> {
    alt((block_string, quoted_string))(input)
}

fn block_string<'a>(input: &'a str) -> Res<'a, String> {
    map(
        delimited(tag("\"\"\""), take_until("\"\"\""), tag("\"\"\"")),
        dedent,
    )(input)
}

fn quoted_string<'a>(input: &'a str) -> Res<'a, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                is_not("\\\"\n"),
                '\\',
                alt((
                    value("\\", char('\\')),
                    value("\"", char('"')),
                    value("/", char('/')),
                    value("\n", char('n')),
                    value("\t", char('t')),
                    value("\r", char('r')),
                )),
            )),
            Option::unwrap_or_default,
        ),
        char('"'),
    )(input)
}

/// Strips the common indentation of a block string.
fn dedent(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let indent = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let body: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.trim_start()
            } else if line.len() >= indent {
                &line[indent..]
            } else {
                line.trim_start()
            }
        })
        .collect();

    body.join("\n").trim().to_string()
}

fn number<'a>(input: &'a str) -> Res<'a, ConstValue> {
    let (rest, text) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;

    let parsed = if text.contains(|c| matches!(c, '.' | 'e' | 'E')) {
        text.parse::<f64>().ok().map(ConstValue::Float)
    } else {
        text.parse::<i64>().ok().map(ConstValue::Int)
    };

    match parsed {
        Some(v) => Ok((rest, v)),
        None => Err(nom::Err::Error(VerboseError::from_error_kind(
            input,
            ErrorKind::Digit,
        ))),
    }
}

fn const_value<'a>(input: &'a str) -> Res<'a, ConstValue> {
    alt((
        map(string_value, ConstValue::String),
        number,
        map(
            delimited(char('['), many0(ws(const_value)), cut(ws(char(']')))),
            ConstValue::List,
        ),
        map(
            delimited(char('{'), many0(ws(object_field)), cut(ws(char('}')))),
            ConstValue::Object,
        ),
        map(name, |n| match n {
            "true" => ConstValue::Boolean(true),
            "false" => ConstValue::Boolean(false),
            "null" => ConstValue::Null,
            other => ConstValue::Enum(other.to_string()),
        }),
    ))(input)
}

fn object_field<'a>(input: &'a str) -> Res<'a, (String, ConstValue)> {
    map(
        separated_pair(name, ws(char(':')), cut(ws(const_value))),
        |(n, v)| (n.to_string(), v),
    )(input)
}

// ============================================================================
// Types and directives
// ============================================================================

fn type_ref<'a>(input: &'a str) -> Res<'a, TypeRef> {
    let (input, base) = alt((
        map(
            delimited(char('['), cut(ws(type_ref)), cut(ws(char(']')))),
            |inner| TypeRef::List(Box::new(inner)),
        ),
        map(name, TypeRef::named),
    ))(input)?;
    let (input, bang) = opt(ws(char('!')))(input)?;

    let ty = if bang.is_some() {
        TypeRef::NonNull(Box::new(base))
    } else {
        base
    };
    Ok((input, ty))
}

fn directive<'a>(input: &'a str) -> Res<'a, Directive> {
    let (input, _) = char('@')(input)?;
    let (input, name) = cut(name)(input)?;
    let (input, arguments) = opt(ws(delimited(
        char('('),
        many0(ws(object_field)),
        cut(ws(char(')'))),
    )))(input)?;

    Ok((
        input,
        Directive {
            name: name.to_string(),
            arguments: arguments.unwrap_or_default(),
        },
    ))
}

fn directives<'a>(input: &'a str) -> Res<'a, Vec<Directive>> {
    many0(ws(directive))(input)
}

fn input_value<'a>(input: &'a str) -> Res<'a, InputValue> {
    let (input, _) = description(input)?;
    let (input, name) = name(input)?;
    let (input, _) = cut(ws(char(':')))(input)?;
    let (input, ty) = cut(ws(type_ref))(input)?;
    let (input, default_value) = opt(preceded(ws(char('=')), cut(ws(const_value))))(input)?;
    let (input, directives) = directives(input)?;

    Ok((
        input,
        InputValue {
            name: name.to_string(),
            ty,
            default_value,
            directives,
        },
    ))
}

fn arguments_definition<'a>(input: &'a str) -> Res<'a, Vec<InputValue>> {
    delimited(char('('), many0(ws(input_value)), cut(ws(char(')'))))(input)
}

fn field_definition<'a>(input: &'a str) -> Res<'a, FieldDefinition> {
    let (input, description) = description(input)?;
    let (input, name) = name(input)?;
    let (input, arguments) = opt(ws(arguments_definition))(input)?;
    let (input, _) = cut(ws(char(':')))(input)?;
    let (input, ty) = cut(ws(type_ref))(input)?;
    let (input, directives) = directives(input)?;

    Ok((
        input,
        FieldDefinition {
            name: name.to_string(),
            description,
            arguments: arguments.unwrap_or_default(),
            ty,
            directives,
        },
    ))
}

// ============================================================================
// Definitions
// ============================================================================

fn definition<'a>(input: &'a str) -> Res<'a, Definition> {
    let (input, desc) = description(input)?;
    let (input, mut def) = alt((
        context(
            "type definition",
            map(preceded(keyword("type"), cut(object_body)), Definition::Object),
        ),
        context(
            "interface definition",
            map(
                preceded(keyword("interface"), cut(object_body)),
                Definition::Interface,
            ),
        ),
        context(
            "union definition",
            map(preceded(keyword("union"), cut(union_body)), Definition::Union),
        ),
        context(
            "scalar definition",
            map(preceded(keyword("scalar"), cut(scalar_body)), Definition::Scalar),
        ),
        context(
            "enum definition",
            map(preceded(keyword("enum"), cut(enum_body)), Definition::Enum),
        ),
        context(
            "input definition",
            map(
                preceded(keyword("input"), cut(input_body)),
                Definition::InputObject,
            ),
        ),
        context(
            "schema definition",
            map(preceded(keyword("schema"), cut(schema_body)), Definition::Schema),
        ),
        context(
            "directive definition",
            map(
                preceded(keyword("directive"), cut(directive_definition_body)),
                Definition::DirectiveDefinition,
            ),
        ),
    ))(input)?;

    match &mut def {
        Definition::Object(t) | Definition::Interface(t) => t.description = desc,
        Definition::Union(u) => u.description = desc,
        Definition::Scalar(s) => s.description = desc,
        Definition::Enum(e) => e.description = desc,
        Definition::InputObject(i) => i.description = desc,
        Definition::Schema(_) | Definition::DirectiveDefinition(_) => {}
    }

    Ok((input, def))
}

fn object_body<'a>(input: &'a str) -> Res<'a, ObjectType> {
    let (input, name) = ws(name)(input)?;
    let (input, interfaces) = opt(ws(implements))(input)?;
    let (input, directives) = directives(input)?;
    let (input, fields) = opt(ws(delimited(
        char('{'),
        many0(ws(field_definition)),
        cut(ws(char('}'))),
    )))(input)?;

    Ok((
        input,
        ObjectType {
            name: name.to_string(),
            description: None,
            interfaces: interfaces.unwrap_or_default(),
            directives,
            fields: fields.unwrap_or_default(),
        },
    ))
}

fn implements<'a>(input: &'a str) -> Res<'a, Vec<String>> {
    let (input, _) = keyword("implements")(input)?;
    let (input, _) = opt(ws(char('&')))(input)?;
    let (input, first) = cut(ws(name))(input)?;
    let (input, rest) = many0(preceded(ws(char('&')), cut(ws(name))))(input)?;

    let mut names = vec![first.to_string()];
    names.extend(rest.into_iter().map(str::to_string));
    Ok((input, names))
}

fn union_body<'a>(input: &'a str) -> Res<'a, UnionType> {
    let (input, union_name) = ws(name)(input)?;
    let (input, directives) = directives(input)?;
    let (input, _) = ws(char('='))(input)?;
    let (input, _) = opt(ws(char('|')))(input)?;
    let (input, first) = ws(name)(input)?;
    let (input, rest) = many0(preceded(ws(char('|')), cut(ws(name))))(input)?;

    let mut members = vec![first.to_string()];
    members.extend(rest.into_iter().map(str::to_string));
    Ok((
        input,
        UnionType {
            name: union_name.to_string(),
            description: None,
            directives,
            members,
        },
    ))
}

fn scalar_body<'a>(input: &'a str) -> Res<'a, ScalarType> {
    let (input, name) = ws(name)(input)?;
    let (input, directives) = directives(input)?;
    Ok((
        input,
        ScalarType {
            name: name.to_string(),
            description: None,
            directives,
        },
    ))
}

fn enum_value<'a>(input: &'a str) -> Res<'a, String> {
    let (input, _) = description(input)?;
    let (input, value) = name(input)?;
    let (input, _) = directives(input)?;
    Ok((input, value.to_string()))
}

fn enum_body<'a>(input: &'a str) -> Res<'a, EnumType> {
    let (input, name) = ws(name)(input)?;
    let (input, directives) = directives(input)?;
    let (input, values) = ws(delimited(
        char('{'),
        many0(ws(enum_value)),
        cut(ws(char('}'))),
    ))(input)?;
    Ok((
        input,
        EnumType {
            name: name.to_string(),
            description: None,
            directives,
            values,
        },
    ))
}

fn input_body<'a>(input: &'a str) -> Res<'a, InputObjectType> {
    let (input, name) = ws(name)(input)?;
    let (input, directives) = directives(input)?;
    let (input, fields) = ws(delimited(
        char('{'),
        many0(ws(input_value)),
        cut(ws(char('}'))),
    ))(input)?;
    Ok((
        input,
        InputObjectType {
            name: name.to_string(),
            description: None,
            directives,
            fields,
        },
    ))
}

fn schema_body<'a>(input: &'a str) -> Res<'a, Vec<(String, String)>> {
    let (input, _) = directives(input)?;
    ws(delimited(
        char('{'),
        many0(ws(map(
            separated_pair(name, ws(char(':')), cut(ws(name))),
            |(op, ty)| (op.to_string(), ty.to_string()),
        ))),
        cut(ws(char('}'))),
    ))(input)
}

fn directive_definition_body<'a>(input: &'a str) -> Res<'a, String> {
    let (input, _) = ws(char('@'))(input)?;
    let (input, directive_name) = name(input)?;
    let (input, _) = opt(ws(arguments_definition))(input)?;
    let (input, _) = opt(ws(keyword("repeatable")))(input)?;
    let (input, _) = ws(keyword("on"))(input)?;
    let (input, _) = opt(ws(char('|')))(input)?;
    let (input, _) = ws(name)(input)?;
    let (input, _) = many0(preceded(ws(char('|')), cut(ws(name))))(input)?;
    Ok((input, directive_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDL: &str = r#"
        # Generated by the remote store
        schema { query: RootQuery }

        directive @jsonAlias(for: String!) on FIELD_DEFINITION
        directive @reference on FIELD_DEFINITION

        scalar DateTime
        scalar JSON

        interface Document {
          _id: ID
          _type: String
        }

        """
        A blog post.
        """
        type Post implements Document {
          _id: ID
          _type: String
          title: String
          publishedAt: DateTime
          author: Author @reference
          categories: [Category!] @reference
          bodyRaw: JSON @jsonAlias(for: "body")
        }

        union AuthorOrCategory = Author | Category

        enum Status { DRAFT, PUBLISHED }

        input PostFilter {
          title: String = "untitled"
          limit: Int = 10
        }

        type RootQuery {
          Post(id: ID!): Post
          allPost(limit: Int, offset: Int): [Post!]!
        }
    "#;

    #[test]
    fn parses_full_document() {
        let doc = parse_schema(SDL).unwrap();
        let names: Vec<&str> = doc.definitions.iter().filter_map(|d| d.name()).collect();
        assert_eq!(
            names,
            vec![
                "jsonAlias",
                "reference",
                "DateTime",
                "JSON",
                "Document",
                "Post",
                "AuthorOrCategory",
                "Status",
                "PostFilter",
                "RootQuery"
            ]
        );
        assert_eq!(doc.root_operation_types(), vec!["RootQuery".to_string()]);
    }

    #[test]
    fn parses_object_fields_and_directives() {
        let doc = parse_schema(SDL).unwrap();
        let post = doc.object("Post").unwrap();

        assert_eq!(post.description.as_deref(), Some("A blog post."));
        assert!(post.implements("Document"));
        assert_eq!(post.fields.len(), 7);

        let categories = &post.fields[5];
        assert_eq!(categories.name, "categories");
        assert!(categories.ty.is_list());
        assert_eq!(categories.ty.named_type(), "Category");
        assert!(categories.directive("reference").is_some());

        let alias = post.fields[6].directive("jsonAlias").unwrap();
        assert_eq!(alias.argument("for").and_then(|v| v.as_str()), Some("body"));
    }

    #[test]
    fn parses_field_arguments_and_defaults() {
        let doc = parse_schema(SDL).unwrap();
        let root = doc.object("RootQuery").unwrap();
        assert_eq!(root.fields[1].arguments.len(), 2);
        assert_eq!(root.fields[1].ty.to_string(), "[Post!]!");

        let filter = doc
            .definitions
            .iter()
            .find_map(|d| match d {
                Definition::InputObject(i) => Some(i),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            filter.fields[0].default_value,
            Some(ConstValue::String("untitled".into()))
        );
        assert_eq!(filter.fields[1].default_value, Some(ConstValue::Int(10)));
    }

    #[test]
    fn parses_union_with_leading_pipe() {
        let doc = parse_schema("union U =\n  | A\n  | B").unwrap();
        match &doc.definitions[0] {
            Definition::Union(u) => {
                assert_eq!(u.name, "U");
                assert_eq!(u.members, vec!["A", "B"]);
            }
            other => panic!("unexpected definition {other:?}"),
        }
    }

    #[test]
    fn parses_directive_definition_with_locations() {
        let doc = parse_schema(
            "directive @internal(reason: String) repeatable on FIELD_DEFINITION | OBJECT | UNION",
        )
        .unwrap();
        let names: Vec<&str> = doc.definitions.iter().filter_map(|d| d.name()).collect();
        assert_eq!(names, vec!["internal"]);
    }

    #[test]
    fn parses_escaped_and_empty_strings() {
        let doc = parse_schema(r#"type A { f: String @x(a: "", b: "q\"uote", c: [1, 2.5, true]) }"#)
            .unwrap();
        let directive = &doc.object("A").unwrap().fields[0].directives[0];
        assert_eq!(directive.argument("a"), Some(&ConstValue::String(String::new())));
        assert_eq!(
            directive.argument("b"),
            Some(&ConstValue::String("q\"uote".into()))
        );
        assert_eq!(
            directive.argument("c"),
            Some(&ConstValue::List(vec![
                ConstValue::Int(1),
                ConstValue::Float(2.5),
                ConstValue::Boolean(true)
            ]))
        );
    }

    #[test]
    fn keyword_requires_boundary() {
        // `typeFoo` is not the `type` keyword
        assert!(parse_schema("typeFoo { a: String }").is_err());
    }

    #[test]
    fn reports_unclosed_type() {
        let err = parse_schema("type Post { title: String").unwrap_err();
        assert!(matches!(err, SchemaError::Parse { .. }));
    }

    #[test]
    fn empty_input_is_empty_document() {
        let doc = parse_schema("  # nothing here\n").unwrap();
        assert!(doc.definitions.is_empty());
    }

    #[test]
    fn printed_schema_parses_back() {
        let doc = parse_schema(SDL).unwrap();
        let object_only = SchemaDocument {
            definitions: doc
                .definitions
                .into_iter()
                .filter(|d| matches!(d, Definition::Object(_) | Definition::Union(_)))
                .collect(),
        };
        let reparsed = parse_schema(&object_only.to_string()).unwrap();
        assert_eq!(reparsed, object_only);
    }
}
