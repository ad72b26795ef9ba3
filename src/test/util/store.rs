use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    bson::{Bson, Document},
    error::{Error, Result},
    results::{DeleteResult, UpdateResult},
    DocumentStore,
};

/// A store operation as seen by `MemoryStore`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RecordedOperation {
    pub(crate) name: &'static str,
    pub(crate) collection: String,
    pub(crate) filter: Option<Document>,
    pub(crate) payload: Option<Document>,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Vec<Document>>,
    operations: Vec<RecordedOperation>,
    shut_down: bool,
}

/// An in-memory `DocumentStore` supporting top-level equality filters and `$set` / `$inc`
/// updates with dotted paths. Clones share state.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<State>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Delays every operation by `latency` before it runs.
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Default::default()
        }
    }

    pub(crate) fn documents(&self, collection: &str) -> Vec<Document> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn operations(&self) -> Vec<RecordedOperation> {
        self.state.lock().unwrap().operations.clone()
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.state.lock().unwrap().shut_down
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn record(
        state: &mut State,
        name: &'static str,
        collection: &str,
        filter: Option<&Document>,
        payload: Option<&Document>,
    ) {
        state.operations.push(RecordedOperation {
            name,
            collection: collection.to_string(),
            filter: filter.cloned(),
            payload: payload.cloned(),
        });
    }
}

impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<()> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, "insertOne", collection, None, Some(&document));

        let documents = state.collections.entry(collection.to_string()).or_default();
        if let Some(id) = document.get("_id") {
            if documents.iter().any(|d| d.get("_id") == Some(id)) {
                return Err(Error::invalid_argument(format!("duplicate _id {id}")));
            }
        }
        documents.push(document);
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, "findOne", collection, Some(&filter), None);

        Ok(state
            .collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|d| matches(d, &filter)))
            .cloned())
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
    ) -> Result<UpdateResult> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        Self::record(
            &mut state,
            "replaceOne",
            collection,
            Some(&filter),
            Some(&replacement),
        );

        let Some(target) = find_mut(&mut state, collection, &filter) else {
            return Ok(UpdateResult::new(0, 0));
        };
        let modified = *target != replacement;
        *target = replacement;
        Ok(UpdateResult::new(1, modified as u64))
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<DeleteResult> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, "deleteOne", collection, Some(&filter), None);

        let Some(documents) = state.collections.get_mut(collection) else {
            return Ok(DeleteResult::new(0));
        };
        match documents.iter().position(|d| matches(d, &filter)) {
            Some(index) => {
                documents.remove(index);
                Ok(DeleteResult::new(1))
            }
            None => Ok(DeleteResult::new(0)),
        }
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        Self::record(
            &mut state,
            "updateOne",
            collection,
            Some(&filter),
            Some(&update),
        );

        let Some(target) = find_mut(&mut state, collection, &filter) else {
            return Ok(UpdateResult::new(0, 0));
        };
        let before = target.clone();
        for (operator, fields) in update {
            let Bson::Document(fields) = fields else {
                return Err(Error::invalid_argument(format!(
                    "{operator} expects a document"
                )));
            };
            for (path, value) in fields {
                match operator.as_str() {
                    "$set" => set_path(target, &path, value)?,
                    "$inc" => inc_path(target, &path, value)?,
                    other => {
                        return Err(Error::invalid_argument(format!(
                            "unsupported update operator {other}"
                        )))
                    }
                }
            }
        }
        Ok(UpdateResult::new(1, (*target != before) as u64))
    }

    async fn ping(&self) -> Result<()> {
        self.delay().await;
        Ok(())
    }

    async fn shutdown(self) -> Result<()> {
        self.state.lock().unwrap().shut_down = true;
        Ok(())
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

fn find_mut<'a>(
    state: &'a mut State,
    collection: &str,
    filter: &Document,
) -> Option<&'a mut Document> {
    state
        .collections
        .get_mut(collection)?
        .iter_mut()
        .find(|d| matches(d, filter))
}

fn set_path(target: &mut Document, path: &str, value: Bson) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| Error::invalid_argument("empty update path"))?;

    let mut current = target;
    for segment in parents {
        if current.get(*segment).is_none() {
            current.insert(*segment, Document::new());
        }
        current = match current.get_mut(*segment) {
            Some(Bson::Document(child)) => child,
            _ => {
                return Err(Error::invalid_argument(format!(
                    "cannot traverse {path}: only document paths are supported"
                )))
            }
        };
    }
    current.insert(*last, value);
    Ok(())
}

fn inc_path(target: &mut Document, path: &str, amount: Bson) -> Result<()> {
    let current = target.get(path).cloned().unwrap_or(Bson::Int64(0));
    let incremented = match (current, amount) {
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a + b),
        (Bson::Int32(a), Bson::Int32(b)) => Bson::Int32(a + b),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a + i64::from(b)),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(i64::from(a) + b),
        (current, amount) => {
            return Err(Error::invalid_argument(format!(
                "cannot increment {current:?} by {amount:?}"
            )))
        }
    };
    set_path(target, path, incremented)
}
