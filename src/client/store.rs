use std::future::Future;

use crate::{
    bson::{doc, Document},
    error::Result,
    results::{DeleteResult, UpdateResult},
};

/// The database operations a [`Client`](crate::Client) is built on.
///
/// [`MongoStore`] implements this over the MongoDB driver. Other implementations can stand in
/// for it, for example to run the client against an in-memory store in tests.
pub trait DocumentStore: Send + Sync {
    /// Inserts `document` into `collection`.
    fn insert_one(
        &self,
        collection: &str,
        document: Document,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Returns the first document in `collection` matching `filter`, if any.
    fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> impl Future<Output = Result<Option<Document>>> + Send;

    /// Replaces the first document in `collection` matching `filter` with `replacement`.
    fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
    ) -> impl Future<Output = Result<UpdateResult>> + Send;

    /// Deletes the first document in `collection` matching `filter`.
    fn delete_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> impl Future<Output = Result<DeleteResult>> + Send;

    /// Applies the update operators in `update` to the first document in `collection` matching
    /// `filter`.
    fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> impl Future<Output = Result<UpdateResult>> + Send;

    /// Checks that the deployment is reachable.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    /// Releases the store's resources.
    fn shutdown(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

/// A [`DocumentStore`] backed by a database of a MongoDB deployment.
#[derive(Clone, Debug)]
pub struct MongoStore {
    client: mongodb::Client,
    database: mongodb::Database,
}

impl MongoStore {
    /// Connects to the deployment at `uri` and uses the database named `database`.
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = mongodb::Client::with_uri_str(uri).await?;
        Ok(Self::new(client, database))
    }

    /// Wraps an existing driver client, using the database named `database`.
    pub fn new(client: mongodb::Client, database: &str) -> Self {
        let database = client.database(database);
        Self { client, database }
    }

    /// The driver's handle to the database this store reads and writes.
    pub fn database(&self) -> &mongodb::Database {
        &self.database
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.database.collection(name)
    }
}

impl DocumentStore for MongoStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<()> {
        self.collection(collection).insert_one(document).await?;
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        Ok(self.collection(collection).find_one(filter).await?)
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
    ) -> Result<UpdateResult> {
        let result = self
            .collection(collection)
            .replace_one(filter, replacement)
            .await?;
        Ok(result.into())
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<DeleteResult> {
        let result = self.collection(collection).delete_one(filter).await?;
        Ok(result.into())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult> {
        let result = self
            .collection(collection)
            .update_one(filter, update)
            .await?;
        Ok(result.into())
    }

    async fn ping(&self) -> Result<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn shutdown(self) -> Result<()> {
        self.client.shutdown().await;
        Ok(())
    }
}
