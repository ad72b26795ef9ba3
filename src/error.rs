//! Contains the `Error` and `Result` types that `mongo_odm` uses.

use std::time::Duration;

use thiserror::Error;

/// The result type for all methods that can return an error in the `mongo_odm` crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur in the `mongo_odm` crate. The inner
/// [`ErrorKind`](enum.ErrorKind.html) is boxed to keep `Result`s small.
#[derive(Clone, Debug, Error)]
#[error("Kind: {kind}")]
#[non_exhaustive]
pub struct Error {
    /// The type of error that occurred.
    pub kind: Box<ErrorKind>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        ErrorKind::InvalidArgument {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn serialization(message: impl Into<String>) -> Self {
        ErrorKind::Serialization {
            message: message.into(),
        }
        .into()
    }

    /// Whether this error was raised because a value could not be converted to or from BSON.
    pub fn is_serialization_error(&self) -> bool {
        matches!(
            self.kind.as_ref(),
            ErrorKind::BsonSerialization(_)
                | ErrorKind::BsonDeserialization(_)
                | ErrorKind::Serialization { .. }
        )
    }

    /// Whether this error indicates that the targeted document does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::NotFound { .. })
    }

    /// Returns the underlying driver error, if this error originated in the driver.
    pub fn driver_error(&self) -> Option<&mongodb::error::Error> {
        match self.kind.as_ref() {
            ErrorKind::Driver(err) => Some(err),
            _ => None,
        }
    }
}

impl<E> From<E> for Error
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        Error::new(err.into())
    }
}

impl From<crate::bson::ser::Error> for ErrorKind {
    fn from(err: crate::bson::ser::Error) -> Self {
        Self::BsonSerialization(err)
    }
}

impl From<crate::bson::de::Error> for ErrorKind {
    fn from(err: crate::bson::de::Error) -> Self {
        Self::BsonDeserialization(err)
    }
}

impl From<mongodb::error::Error> for ErrorKind {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Driver(err)
    }
}

impl From<std::convert::Infallible> for ErrorKind {
    fn from(_err: std::convert::Infallible) -> Self {
        unreachable!()
    }
}

/// The types of errors that can occur.
#[allow(missing_docs)]
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An invalid argument was provided.
    #[error("An invalid argument was provided: {message}")]
    #[non_exhaustive]
    InvalidArgument { message: String },

    /// Wrapper around `bson::ser::Error`.
    #[error("{0}")]
    BsonSerialization(crate::bson::ser::Error),

    /// Wrapper around `bson::de::Error`.
    #[error("{0}")]
    BsonDeserialization(crate::bson::de::Error),

    /// A value serialized fine but has a shape that cannot be flattened into update paths.
    #[error("Unable to flatten value: {message}")]
    #[non_exhaustive]
    Serialization { message: String },

    /// A replace or update matched no document.
    #[error("No document with _id {id:?} found in collection {collection}")]
    #[non_exhaustive]
    NotFound { collection: String, id: String },

    /// A delete removed a number of documents other than one.
    #[error("Expected to delete 1 document from {collection}, deleted {deleted}")]
    #[non_exhaustive]
    UnexpectedDeleteCount { collection: String, deleted: u64 },

    /// An operation did not complete within the configured operation timeout.
    #[error("{operation} did not complete within {timeout:?}")]
    #[non_exhaustive]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// Wrapper around [`mongodb::error::Error`].
    #[error("Driver error: {0}")]
    Driver(mongodb::error::Error),
}
