pub mod options;
mod store;

use std::{future::Future, time::Duration};

use uuid::Uuid;

use crate::{
    bson::{doc, Bson, DateTime, Document},
    error::{Error, ErrorKind, Result},
    flatten::{FlattenOptions, Flattener},
    model::{Metadata, Model},
    runtime,
};

use self::options::ClientConfig;
pub use self::store::{DocumentStore, MongoStore};

#[cfg(feature = "tracing")]
use crate::trace::{
    trace_or_log_enabled,
    TracingOrLogLevel,
    TracingRepresentation,
    CLIENT_TRACING_EVENT_TARGET,
};

/// The persisted name of the last-write timestamp in [`Metadata`](crate::Metadata).
const UPDATED_AT_KEY: &str = "updatedAt";

/// The persisted name of the version counter in [`Metadata`](crate::Metadata).
const VERSION_KEY: &str = "version";

/// Reads and writes [`Model`]s through a [`DocumentStore`].
///
/// Every write stamps the model's [`Metadata`](crate::Metadata): a missing primary key is
/// generated on first persist, the creation and update times are recorded, and the version is
/// bumped. Each store call is bounded by the configured operation timeout.
///
/// ```no_run
/// # async fn run() -> mongo_odm::error::Result<()> {
/// use mongo_odm::{options::ClientConfig, Client, Metadata, Model};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct Book {
///     #[serde(flatten)]
///     meta: Metadata,
///     title: String,
///     pages: Option<i32>,
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
///
/// #[derive(Serialize)]
/// struct PagesPatch {
///     pages: i32,
/// }
///
/// let config = ClientConfig::builder()
///     .host("localhost")
///     .database("library")
///     .build();
/// let client = Client::connect(config).await?;
///
/// let mut book = Book {
///     meta: Metadata::new(),
///     title: "1984".to_string(),
///     pages: None,
/// };
/// client.persist(&mut book).await?;
/// client.update(&mut book, &PagesPatch { pages: 328 }).await?;
///
/// let found: Option<Book> = client.find_one_by_id(book.id()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client<S = MongoStore> {
    store: S,
    uri: String,
    operation_timeout: Duration,
    update_options: FlattenOptions,
}

impl Client<MongoStore> {
    /// Connects to the deployment described by `config`.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let uri = config.generate_uri()?;
        let store = runtime::timeout(
            "connect",
            config.operation_timeout(),
            MongoStore::connect(&uri, &config.database),
        )
        .await??;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: CLIENT_TRACING_EVENT_TARGET,
            host = config.host.as_str(),
            database = config.database.as_str(),
            clustered = config.clustered,
            "Client connected"
        );

        Ok(Self::from_parts(store, uri, config))
    }
}

impl<S: DocumentStore> Client<S> {
    /// Creates a client that reads and writes through `store`, configured by `config`.
    ///
    /// The configuration is validated and its connection string generated, but no connection
    /// is made; `store` is used as-is.
    pub fn with_store(store: S, config: ClientConfig) -> Result<Self> {
        let uri = config.generate_uri()?;
        Ok(Self::from_parts(store, uri, config))
    }

    fn from_parts(store: S, uri: String, config: ClientConfig) -> Self {
        Self {
            store,
            uri,
            operation_timeout: config.operation_timeout(),
            update_options: config.update_options,
        }
    }

    /// The connection string this client was configured with.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The name of the collection documents of type `M` are stored in.
    pub fn collection_name<M: Model>(&self) -> &'static str {
        M::COLLECTION
    }

    /// Generates a new random primary key.
    pub fn generate_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }

    /// Checks that the deployment is reachable.
    pub async fn health_check(&self) -> Result<()> {
        self.execute("ping", self.store.ping()).await
    }

    /// Shuts the client down.
    pub async fn disconnect(self) -> Result<()> {
        runtime::timeout("shutdown", self.operation_timeout, self.store.shutdown()).await?
    }

    /// Inserts `model` as a new document.
    ///
    /// A primary key is generated if the model has none. The creation and update times are set
    /// to now and the version is incremented. If the write fails, the model's
    /// [`Metadata`](crate::Metadata) is left as it was.
    pub async fn persist<M: Model>(&self, model: &mut M) -> Result<()> {
        let previous = model.metadata().clone();
        let now = DateTime::now();
        model.increment_version();
        model.set_updated_at(now);

        let result = self.insert(model, now).await;
        restore_on_error(model, previous, result)
    }

    /// Returns the first `M` matching `filter`, if any.
    pub async fn find_one<M: Model>(&self, filter: Document) -> Result<Option<M>> {
        let found = self
            .execute("findOne", self.store.find_one(M::COLLECTION, filter))
            .await?;
        found.map(M::from_document).transpose()
    }

    /// Returns the `M` whose primary key is `id`, if any.
    pub async fn find_one_by_id<M: Model>(&self, id: &str) -> Result<Option<M>> {
        self.find_one(id_filter(id)).await
    }

    /// Replaces the stored document for `model` with its current state.
    ///
    /// The version is incremented and the update time set to now. Fails with
    /// [`ErrorKind::NotFound`] if no document has the model's primary key. If the replace
    /// fails, the model's [`Metadata`](crate::Metadata) is left as it was.
    pub async fn replace<M: Model>(&self, model: &mut M) -> Result<()> {
        let id = required_id(model)?;
        let previous = model.metadata().clone();
        model.increment_version();
        model.set_updated_at(DateTime::now());

        let result = match self.replace_by_id(model, &id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(not_found::<M>(id)),
            Err(err) => Err(err),
        };
        restore_on_error(model, previous, result)
    }

    /// Replaces the stored document for `model`, or inserts it if there is none.
    ///
    /// The version is incremented once either way. The creation time is only set when the
    /// model ends up being inserted.
    pub async fn replace_or_persist<M: Model>(&self, model: &mut M) -> Result<()> {
        let previous = model.metadata().clone();
        let now = DateTime::now();
        model.increment_version();
        model.set_updated_at(now);

        let result = self.replace_or_insert(model, now).await;
        restore_on_error(model, previous, result)
    }

    /// Deletes the stored document for `model`.
    ///
    /// Fails with [`ErrorKind::UnexpectedDeleteCount`] unless exactly one document was
    /// removed.
    pub async fn delete<M: Model>(&self, model: &M) -> Result<()> {
        let id = required_id(model)?;
        let result = self
            .execute(
                "deleteOne",
                self.store.delete_one(M::COLLECTION, id_filter(&id)),
            )
            .await?;

        if result.deleted_count != 1 {
            return Err(ErrorKind::UnexpectedDeleteCount {
                collection: M::COLLECTION.to_string(),
                deleted: result.deleted_count,
            }
            .into());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: CLIENT_TRACING_EVENT_TARGET,
            collection = M::COLLECTION,
            id = id.as_str(),
            "Document deleted"
        );

        Ok(())
    }

    /// Applies `patch` to the stored document for `model` as a partial update.
    ///
    /// `patch` is flattened into dotted paths (see [`crate::flatten`]) and only those paths
    /// are `$set`. Each path segment is matched, ignoring case and underscores, against
    /// [`Model::field_names`] and then against the field names `model` is stored under, so a
    /// patch reaches the stored fields whatever casing its own serialization uses. Segments
    /// matching neither fall back to the configured [`FlattenOptions`] key case.
    ///
    /// The update time is overwritten and the version incremented, both in the database and
    /// on `model`; a patch that sets the version itself replaces it instead. Flattening
    /// completes before anything is written, so a patch that cannot be flattened leaves the
    /// stored document untouched.
    ///
    /// Fails with [`ErrorKind::NotFound`] if no document has the model's primary key.
    pub async fn update<M, P>(&self, model: &mut M, patch: &P) -> Result<()>
    where
        M: Model,
        P: serde::Serialize + ?Sized,
    {
        let id = required_id(model)?;
        let now = DateTime::now();
        let update = self.build_update(model, patch, now)?;
        let patched_version = patched_version(&update);

        #[cfg(feature = "tracing")]
        if trace_or_log_enabled!(
            target: CLIENT_TRACING_EVENT_TARGET,
            TracingOrLogLevel::Debug
        ) {
            tracing::debug!(
                target: CLIENT_TRACING_EVENT_TARGET,
                collection = M::COLLECTION,
                id = id.as_str(),
                update = update.tracing_representation(),
                "Applying partial update"
            );
        }

        let result = self
            .execute(
                "updateOne",
                self.store.update_one(M::COLLECTION, id_filter(&id), update),
            )
            .await?;

        if result.matched_count == 0 {
            return Err(not_found::<M>(id));
        }

        match patched_version {
            Some(version) => model.metadata_mut().version = version,
            None => model.increment_version(),
        }
        model.set_updated_at(now);
        Ok(())
    }

    /// Builds the update [`Client::update`] would send for `patch` against `model`, without
    /// executing it.
    ///
    /// The result holds a `$set` of the flattened patch plus the update time, and an `$inc` of
    /// the version unless the patch sets the version itself. A patched version must be an
    /// integer.
    pub fn update_document<M, P>(&self, model: &M, patch: &P) -> Result<Document>
    where
        M: Model,
        P: serde::Serialize + ?Sized,
    {
        self.build_update(model, patch, DateTime::now())
    }

    fn build_update<M, P>(&self, model: &M, patch: &P, now: DateTime) -> Result<Document>
    where
        M: Model,
        P: serde::Serialize + ?Sized,
    {
        let mut names = M::field_names().clone();
        names.learn_keys(&model.to_document()?);

        let mut set = Flattener::new(&self.update_options)
            .with_field_names(&names)
            .flatten(patch)?;
        set.insert(UPDATED_AT_KEY, Bson::DateTime(now));

        let mut update = Document::new();
        match set.get(VERSION_KEY) {
            None => {
                update.insert("$inc", doc! { VERSION_KEY: 1_i64 });
            }
            Some(Bson::Int32(_) | Bson::Int64(_)) => {}
            Some(other) => {
                return Err(Error::invalid_argument(format!(
                    "{VERSION_KEY} must be an integer, got {other}"
                )))
            }
        }
        update.insert("$set", set);
        Ok(update)
    }

    async fn replace_or_insert<M: Model>(&self, model: &mut M, now: DateTime) -> Result<()> {
        let id = model.id().to_string();
        if !id.is_empty() && self.replace_by_id(model, &id).await? {
            return Ok(());
        }

        self.insert(model, now).await
    }

    async fn insert<M: Model>(&self, model: &mut M, now: DateTime) -> Result<()> {
        if model.id().is_empty() {
            model.set_id(self.generate_uuid());
        }
        model.set_created_at(now);

        let document = model.to_document()?;
        self.execute("insertOne", self.store.insert_one(M::COLLECTION, document))
            .await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: CLIENT_TRACING_EVENT_TARGET,
            collection = M::COLLECTION,
            id = model.id(),
            "Document persisted"
        );

        Ok(())
    }

    /// Returns whether a document was matched.
    async fn replace_by_id<M: Model>(&self, model: &M, id: &str) -> Result<bool> {
        let document = model.to_document()?;
        let result = self
            .execute(
                "replaceOne",
                self.store
                    .replace_one(M::COLLECTION, id_filter(id), document),
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn execute<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let result = runtime::timeout(operation, self.operation_timeout, future)
            .await
            .and_then(|r| r);

        #[cfg(feature = "tracing")]
        if let Err(ref err) = result {
            tracing::debug!(
                target: CLIENT_TRACING_EVENT_TARGET,
                operation,
                failure = err.tracing_representation(),
                "Operation failed"
            );
        }

        result
    }
}

/// The version a `$set` assigns explicitly, if any.
fn patched_version(update: &Document) -> Option<i64> {
    match update.get_document("$set").ok()?.get(VERSION_KEY)? {
        Bson::Int32(version) => Some(i64::from(*version)),
        Bson::Int64(version) => Some(*version),
        _ => None,
    }
}

/// Puts `previous` back on `model` when `result` is an error.
fn restore_on_error<M: Model, T>(
    model: &mut M,
    previous: Metadata,
    result: Result<T>,
) -> Result<T> {
    if result.is_err() {
        *model.metadata_mut() = previous;
    }
    result
}

fn id_filter(id: &str) -> Document {
    doc! { "_id": id }
}

fn required_id<M: Model>(model: &M) -> Result<String> {
    match model.id() {
        "" => Err(Error::invalid_argument(format!(
            "a {} document without a primary key cannot be written by id",
            M::COLLECTION
        ))),
        id => Ok(id.to_string()),
    }
}

fn not_found<M: Model>(id: String) -> Error {
    ErrorKind::NotFound {
        collection: M::COLLECTION.to_string(),
        id,
    }
    .into()
}
