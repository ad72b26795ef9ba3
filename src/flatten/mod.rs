//! Flattening of arbitrary values into dotted-path update documents.
//!
//! A partial update only touches the paths it names. [`flatten`] turns a (possibly nested)
//! value into exactly such a set of paths, suitable for a `$set` update:
//!
//! ```
//! use mongo_odm::{bson::doc, flatten::flatten};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Bar {
//!     action: String,
//! }
//!
//! #[derive(Serialize)]
//! struct Dummy {
//!     name: Option<String>,
//!     bar: Bar,
//!     bars: Vec<String>,
//! }
//!
//! let patch = Dummy {
//!     name: None,
//!     bar: Bar { action: "dumb".to_string() },
//!     bars: vec!["tata".to_string(), "toto".to_string()],
//! };
//!
//! assert_eq!(
//!     flatten(&patch)?,
//!     doc! { "bar.action": "dumb", "bars.0": "tata", "bars.1": "toto" },
//! );
//! # Ok::<(), mongo_odm::error::Error>(())
//! ```

mod field_names;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use heck::ToLowerCamelCase;

use crate::{
    bson::{Bson, Document},
    error::{Error, Result},
};

pub use field_names::FieldNames;

/// The default limit on how deeply nested a flattened value may be.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// How sequences are written into the flattened document.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum ArrayPolicy {
    /// Each element is written at its own `path.<index>`, recursing into nested documents. An
    /// empty sequence is written whole so that the field can still be cleared.
    #[default]
    Indexed,

    /// The sequence is written as a single value at `path`.
    Whole,
}

/// How null (and undefined) values are treated.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum NullPolicy {
    /// Null values produce no path.
    #[default]
    Skip,

    /// Null values are written as an explicit null.
    Keep,
}

/// How empty strings are treated.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum EmptyStringPolicy {
    /// Empty strings are written like any other string.
    #[default]
    Include,

    /// Empty strings produce no path.
    Skip,
}

/// The casing convention applied to every path segment that has no explicit entry in the
/// [`FieldNames`] table.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum KeyCase {
    /// Identifier-like segments are converted to lowerCamelCase (`first_name` and
    /// `FirstName` both become `firstName`). Other segments, such as the `en-US` or
    /// `2024-01-01` keys of a map, are written as serialized.
    #[default]
    LowerCamel,

    /// Segments are written exactly as serialized.
    Preserve,
}

impl KeyCase {
    fn apply(self, key: &str) -> String {
        match self {
            KeyCase::LowerCamel if is_identifier(key) => key.to_lower_camel_case(),
            KeyCase::LowerCamel => key.to_string(),
            KeyCase::Preserve => key.to_string(),
        }
    }
}

/// Whether `key` matches `[A-Za-z_][A-Za-z0-9_]*`.
fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Options that control how a value is flattened.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, TypedBuilder)]
#[builder(field_defaults(default))]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct FlattenOptions {
    /// How sequences are written. Defaults to [`ArrayPolicy::Indexed`].
    pub array_policy: ArrayPolicy,

    /// How nulls are treated. Defaults to [`NullPolicy::Skip`].
    pub null_policy: NullPolicy,

    /// How empty strings are treated. Defaults to [`EmptyStringPolicy::Include`].
    pub empty_string_policy: EmptyStringPolicy,

    /// The casing applied to path segments. Defaults to [`KeyCase::LowerCamel`].
    pub key_case: KeyCase,

    /// Keys that are never written, together with everything nested under them. A key is
    /// excluded if either its serialized or its normalized name is listed.
    ///
    /// The default is `["id", "_id"]`: a partial update must never rewrite the identifier.
    #[builder(default = default_excluded_keys(), setter(into))]
    pub excluded_keys: Vec<String>,

    /// The deepest nesting accepted before flattening fails. Defaults to
    /// [`DEFAULT_MAX_DEPTH`].
    #[builder(default = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn default_excluded_keys() -> Vec<String> {
    vec!["id".to_string(), "_id".to_string()]
}

/// Flattens `value` into a document of dotted paths using the default [`FlattenOptions`].
///
/// This fails only if `value` cannot be represented as a BSON document.
pub fn flatten<T>(value: &T) -> Result<Document>
where
    T: Serialize + ?Sized,
{
    Flattener::new(&FlattenOptions::default()).flatten(value)
}

/// Flattens `value` into a document of dotted paths using the given options.
pub fn flatten_with_options<T>(value: &T, options: &FlattenOptions) -> Result<Document>
where
    T: Serialize + ?Sized,
{
    Flattener::new(options).flatten(value)
}

/// Converts values into flat documents of dotted paths.
///
/// A `Flattener` borrows its options and an optional [`FieldNames`] table, so it is cheap to
/// create per call and can be shared freely across threads.
#[derive(Clone, Copy, Debug)]
pub struct Flattener<'a> {
    options: &'a FlattenOptions,
    names: &'a FieldNames,
}

impl<'a> Flattener<'a> {
    /// Creates a flattener that applies `options`.
    pub fn new(options: &'a FlattenOptions) -> Self {
        Self {
            options,
            names: FieldNames::empty(),
        }
    }

    /// Resolves path segments through `names` before falling back to the configured
    /// [`KeyCase`].
    pub fn with_field_names(mut self, names: &'a FieldNames) -> Self {
        self.names = names;
        self
    }

    /// Flattens `value`.
    ///
    /// `value` is first serialized into BSON; it must serialize to a document (a struct, a
    /// map, or a [`Document`]).
    pub fn flatten<T>(&self, value: &T) -> Result<Document>
    where
        T: Serialize + ?Sized,
    {
        let document = match crate::bson::to_bson(value)? {
            Bson::Document(document) => document,
            other => {
                return Err(Error::serialization(format!(
                    "expected a value that serializes to a document, got {:?}",
                    other.element_type()
                )))
            }
        };

        let mut flattened = Document::new();
        self.flatten_document("", document, 0, &mut flattened)?;

        #[cfg(feature = "tracing")]
        self.emit_flattened(&flattened);

        Ok(flattened)
    }

    fn flatten_document(
        &self,
        prefix: &str,
        document: Document,
        depth: usize,
        dest: &mut Document,
    ) -> Result<()> {
        if depth > self.options.max_depth {
            return Err(Error::serialization(format!(
                "value nested deeper than {} levels at {:?}",
                self.options.max_depth, prefix
            )));
        }

        for (key, value) in document {
            if self.is_excluded(&key) {
                continue;
            }
            let segment = self.normalize(&key);
            if self.is_excluded(&segment) {
                continue;
            }
            self.flatten_value(join(prefix, &segment), value, depth, dest)?;
        }

        Ok(())
    }

    fn flatten_value(
        &self,
        path: String,
        value: Bson,
        depth: usize,
        dest: &mut Document,
    ) -> Result<()> {
        match value {
            Bson::Document(child) => self.flatten_document(&path, child, depth + 1, dest),
            Bson::Array(items) => match self.options.array_policy {
                ArrayPolicy::Indexed if !items.is_empty() => {
                    if depth + 1 > self.options.max_depth {
                        return Err(Error::serialization(format!(
                            "value nested deeper than {} levels at {:?}",
                            self.options.max_depth, path
                        )));
                    }
                    for (index, item) in items.into_iter().enumerate() {
                        self.flatten_value(format!("{path}.{index}"), item, depth + 1, dest)?;
                    }
                    Ok(())
                }
                _ => insert(dest, path, Bson::Array(items)),
            },
            Bson::Null | Bson::Undefined => match self.options.null_policy {
                NullPolicy::Skip => Ok(()),
                NullPolicy::Keep => insert(dest, path, Bson::Null),
            },
            Bson::String(s)
                if s.is_empty() && self.options.empty_string_policy == EmptyStringPolicy::Skip =>
            {
                Ok(())
            }
            leaf => insert(dest, path, leaf),
        }
    }

    fn normalize(&self, key: &str) -> String {
        match self.names.resolve(key) {
            Some(persisted) => persisted.to_string(),
            None => self.options.key_case.apply(key),
        }
    }

    fn is_excluded(&self, key: &str) -> bool {
        self.options.excluded_keys.iter().any(|k| k == key)
    }

    #[cfg(feature = "tracing")]
    fn emit_flattened(&self, flattened: &Document) {
        use crate::trace::{
            trace_or_log_enabled,
            TracingOrLogLevel,
            TracingRepresentation,
            FLATTEN_TRACING_EVENT_TARGET,
        };

        if trace_or_log_enabled!(
            target: FLATTEN_TRACING_EVENT_TARGET,
            TracingOrLogLevel::Debug
        ) {
            tracing::debug!(
                target: FLATTEN_TRACING_EVENT_TARGET,
                pathCount = flattened.len(),
                arrayPolicy = ?self.options.array_policy,
                paths = flattened.tracing_representation(),
                "Value flattened"
            );
        }
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// Two distinct fields can normalize to the same path (e.g. `Name` and `name`); that is
/// reported rather than letting one value silently replace the other.
fn insert(dest: &mut Document, path: String, value: Bson) -> Result<()> {
    if dest.contains_key(&path) {
        return Err(Error::serialization(format!(
            "more than one field flattens to the path {path:?}"
        )));
    }
    dest.insert(path, value);
    Ok(())
}
