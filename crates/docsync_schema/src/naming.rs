//! Naming rules shared by the schema rewriter and the reconciler.
//!
//! Document type tags (`post`, `sanity.imageAsset`) and remote schema type
//! names (`Post`, `SanityImageAsset`) both map onto one prefixed host type
//! name, so a document can be matched against the schema it was published
//! with.

/// Default prefix for host type names.
pub const DEFAULT_TYPE_PREFIX: &str = "Sanity";

/// Scalars that are never renamed.
pub const BUILTIN_SCALARS: [&str; 8] = [
    "ID", "String", "Int", "Float", "Boolean", "Date", "DateTime", "JSON",
];

/// Field names reserved by the host's node model.
pub const RESTRICTED_NODE_FIELDS: [&str; 5] = ["id", "children", "parent", "fields", "internal"];

/// Returns true for scalars the host provides natively.
pub fn is_builtin_scalar(name: &str) -> bool {
    BUILTIN_SCALARS.contains(&name)
}

/// Maps a document type tag or schema type name to its host type name.
///
/// ```
/// use docsync_schema::type_name;
///
/// assert_eq!(type_name("post", "Sanity"), "SanityPost");
/// assert_eq!(type_name("Post", "Sanity"), "SanityPost");
/// assert_eq!(type_name("sanity.imageAsset", "Sanity"), "SanityImageAsset");
/// assert_eq!(type_name("String", "Sanity"), "String");
/// ```
pub fn type_name(raw: &str, prefix: &str) -> String {
    if raw.is_empty() || is_builtin_scalar(raw) {
        return raw.to_string();
    }

    let joined: String = words(raw).iter().map(|w| upper_first(w)).collect();
    let stripped = match joined.strip_prefix(DEFAULT_TYPE_PREFIX) {
        Some(rest) if !rest.is_empty() => rest,
        _ => joined.as_str(),
    };

    format!("{prefix}{stripped}")
}

/// Renames fields that collide with the host's reserved node fields.
///
/// `id` becomes `sanityId` with the default prefix; other names pass through.
pub fn conflict_free_field_name(field: &str, prefix: &str) -> String {
    if RESTRICTED_NODE_FIELDS.contains(&field) {
        format!("{}{}", lower_first(prefix), upper_first(field))
    } else {
        field.to_string()
    }
}

/// Key prefix for raw, unresolved values stored on a node.
pub const RAW_DATA_PREFIX: &str = "_rawData";

/// Field prefix for raw JSON fields exposed in the host schema.
pub const RAW_PREFIX: &str = "_raw";

/// Name under which a field's raw, unresolved value is stored on a node.
pub fn raw_data_field_name(field: &str) -> String {
    format!("{RAW_DATA_PREFIX}{}", upper_first(field))
}

/// Name of the synthetic raw JSON field exposed in the host schema.
pub fn raw_field_name(field: &str) -> String {
    format!("{RAW_PREFIX}{}", upper_first(field))
}

/// Upper-cases the first character.
pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Splits on separators and camel-case boundaries.
///
/// `imageAsset` → `image`, `Asset`; `HTMLBlock` → `HTML`, `Block`.
fn words(raw: &str) -> Vec<String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if !current.is_empty() && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}
