//! Contains the types of results returned by write operations on a
//! [`DocumentStore`](crate::DocumentStore).

use serde::Serialize;

/// The result of a replace or update operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct UpdateResult {
    /// The number of documents that matched the filter.
    pub matched_count: u64,
    /// The number of documents that were modified by the operation.
    pub modified_count: u64,
}

impl UpdateResult {
    /// Creates a result reporting the given counts.
    pub fn new(matched_count: u64, modified_count: u64) -> Self {
        Self {
            matched_count,
            modified_count,
        }
    }
}

impl From<mongodb::results::UpdateResult> for UpdateResult {
    fn from(result: mongodb::results::UpdateResult) -> Self {
        Self::new(result.matched_count, result.modified_count)
    }
}

/// The result of a delete operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct DeleteResult {
    /// The number of documents deleted by the operation.
    pub deleted_count: u64,
}

impl DeleteResult {
    /// Creates a result reporting the given count.
    pub fn new(deleted_count: u64) -> Self {
        Self { deleted_count }
    }
}

impl From<mongodb::results::DeleteResult> for DeleteResult {
    fn from(result: mongodb::results::DeleteResult) -> Self {
        Self::new(result.deleted_count)
    }
}
