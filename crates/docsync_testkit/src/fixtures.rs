//! Test fixtures and document helpers.
//!
//! Provides a small but complete remote schema (documents, references,
//! a union, a JSON alias and a restricted field name) together with
//! builders for documents that conform to it.

use chrono::{DateTime, TimeZone, Utc};
use docsync_protocol::id::draft_id_of;
use docsync_protocol::Document;
use docsync_schema::TypeMap;
use serde_json::{json, Value};

/// Remote schema used across the test suites.
pub const SAMPLE_SDL: &str = r#"
scalar Date
scalar DateTime
scalar JSON

directive @reference on FIELD_DEFINITION
directive @jsonAlias(for: String!) on FIELD_DEFINITION

"""
A top-level document.
"""
interface Document {
  _id: ID
  _type: String
  _createdAt: DateTime
  _updatedAt: DateTime
  _rev: String
}

type Post implements Document {
  _id: ID
  _type: String
  _createdAt: DateTime
  _updatedAt: DateTime
  _rev: String
  title: String
  slug: Slug
  author: Author @reference
  categories: [Category] @reference
  related: Post @reference
  sections: [Section]
  bodyRaw: JSON @jsonAlias(for: "body")
}

type Author implements Document {
  _id: ID
  _type: String
  _createdAt: DateTime
  _updatedAt: DateTime
  _rev: String
  name: String
  bio: String
}

type Category implements Document {
  _id: ID
  _type: String
  _createdAt: DateTime
  _updatedAt: DateTime
  _rev: String
  title: String
  parent: Category @reference
}

type SanityImageAsset implements Document {
  _id: ID
  _type: String
  _createdAt: DateTime
  _updatedAt: DateTime
  _rev: String
  url: String
}

type Slug {
  _type: String
  current: String
}

type Hero {
  _key: String
  _type: String
  heading: String
}

type Gallery {
  _key: String
  _type: String
  caption: String
  featured: Post @reference
}

union Section = Hero | Gallery

type RootQuery {
  Post(id: ID!): Post
  allPost(limit: Int, offset: Int): [Post!]!
}

schema {
  query: RootQuery
}
"#;

/// Type prefix used by the fixtures.
pub const SAMPLE_PREFIX: &str = "Sanity";

/// Builds the type map for [`SAMPLE_SDL`].
pub fn sample_type_map() -> TypeMap {
    TypeMap::from_sdl(SAMPLE_SDL, SAMPLE_PREFIX).expect("sample schema must parse")
}

/// Fixed timestamp used by builders.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
        .single()
        .expect("valid fixed time")
}

/// A strong reference value.
pub fn reference(target: &str) -> Value {
    json!({ "_type": "reference", "_ref": target })
}

/// A weak reference value.
pub fn weak_reference(target: &str) -> Value {
    json!({ "_type": "reference", "_ref": target, "_weak": true })
}

/// Builder for test documents.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    doc: Document,
}

impl DocumentBuilder {
    /// Starts a document with the given raw id and type tag.
    pub fn new(id: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            doc: Document::new(id, doc_type),
        }
    }

    /// Sets a field.
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.doc.fields.insert(key.to_string(), value.into());
        self
    }

    /// Sets a strong reference field.
    pub fn reference(self, key: &str, target: &str) -> Self {
        self.field(key, reference(target))
    }

    /// Sets a weak reference field.
    pub fn weak_reference(self, key: &str, target: &str) -> Self {
        self.field(key, weak_reference(target))
    }

    /// Sets a list-of-references field with generated `_key`s.
    pub fn reference_list(self, key: &str, targets: &[&str]) -> Self {
        let items: Vec<Value> = targets
            .iter()
            .enumerate()
            .map(|(i, target)| {
                let mut item = reference(target);
                item["_key"] = json!(format!("k{i}"));
                item
            })
            .collect();
        self.field(key, Value::Array(items))
    }

    /// Sets the revision.
    pub fn rev(mut self, rev: &str) -> Self {
        self.doc.revision = Some(rev.to_string());
        self
    }

    /// Sets the update time.
    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.doc.updated_at = Some(at);
        self
    }

    /// Turns the document into its draft counterpart.
    pub fn draft(mut self) -> Self {
        self.doc.id = draft_id_of(&self.doc.id);
        self
    }

    /// Finishes the document.
    pub fn build(self) -> Document {
        self.doc
    }
}

/// A published post with a title.
pub fn post(id: &str, title: &str) -> Document {
    DocumentBuilder::new(id, "post")
        .field("title", title)
        .rev("r1")
        .updated_at(fixed_time())
        .build()
}

/// A draft post with a title; `id` is the published id.
pub fn draft_post(id: &str, title: &str) -> Document {
    DocumentBuilder::new(id, "post")
        .field("title", title)
        .rev("r1")
        .updated_at(fixed_time())
        .draft()
        .build()
}

/// A published author.
pub fn author(id: &str, name: &str) -> Document {
    DocumentBuilder::new(id, "author").field("name", name).build()
}

/// Renders documents as an NDJSON export.
pub fn to_ndjson(docs: &[Document]) -> String {
    docs.iter()
        .map(|d| d.to_value().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
