//! Mapping between Rust types and the documents stored for them.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    bson::{DateTime, Document},
    error::Result,
    flatten::FieldNames,
};

/// The bookkeeping fields every stored document carries.
///
/// Embed it in a model with `#[serde(flatten)]` so that its fields sit at the top level of the
/// stored document:
///
/// ```
/// use mongo_odm::{Metadata, Model};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct Book {
///     #[serde(flatten)]
///     meta: Metadata,
///     title: String,
///     author: String,
/// }
///
/// impl Model for Book {
///     const COLLECTION: &'static str = "books";
///
///     fn metadata(&self) -> &Metadata {
///         &self.meta
///     }
///
///     fn metadata_mut(&mut self) -> &mut Metadata {
///         &mut self.meta
///     }
/// }
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Metadata {
    /// The primary key. Empty until the document is first persisted.
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// When the document was first persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,

    /// When the document was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    /// The number of writes applied to the document.
    #[serde(default)]
    pub version: i64,
}

impl Metadata {
    /// Creates metadata for a document that has not been persisted yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates metadata for a document with a known primary key.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// A type that is persisted as a document in its own collection.
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    /// The name of the collection documents of this type are stored in.
    const COLLECTION: &'static str;

    /// The document's bookkeeping fields.
    fn metadata(&self) -> &Metadata;

    /// Mutable access to the document's bookkeeping fields.
    fn metadata_mut(&mut self) -> &mut Metadata;

    /// Persisted names for fields whose casing differs from what the update flattener would
    /// produce on its own. Build the table once, e.g. in a `static LazyLock`.
    fn field_names() -> &'static FieldNames {
        FieldNames::empty()
    }

    /// The primary key, empty if the document has never been persisted.
    fn id(&self) -> &str {
        &self.metadata().id
    }

    /// Sets the primary key from a UUID.
    fn set_id(&mut self, id: Uuid) {
        self.metadata_mut().id = id.to_string();
    }

    /// Bumps the document's version by one.
    fn increment_version(&mut self) {
        self.metadata_mut().version += 1;
    }

    /// Records `now` as the creation time.
    fn set_created_at(&mut self, now: DateTime) {
        self.metadata_mut().created_at = Some(now);
    }

    /// Records `now` as the last write time.
    fn set_updated_at(&mut self, now: DateTime) {
        self.metadata_mut().updated_at = Some(now);
    }

    /// Encodes the model as the document that gets stored.
    fn to_document(&self) -> Result<Document> {
        Ok(crate::bson::to_document(self)?)
    }

    /// Decodes a stored document.
    fn from_document(document: Document) -> Result<Self> {
        Ok(crate::bson::from_document(document)?)
    }
}
