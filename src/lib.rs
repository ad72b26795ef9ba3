//! This crate is a convenience layer over the official [MongoDB Rust driver](mongodb). It maps
//! Rust types to documents, provides CRUD helpers that keep per-document bookkeeping
//! (primary key, creation and update times, version), builds connection strings from plain
//! configuration, and turns arbitrary values into dotted-path partial updates.
//!
//! # Flattening partial updates
//!
//! A `$set` update only touches the paths it names. [`flatten()`] turns a nested value into
//! exactly such a set of paths:
//!
//! ```
//! use mongo_odm::{bson::doc, flatten::flatten};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Address {
//!     city: String,
//!     zip: Option<String>,
//! }
//!
//! #[derive(Serialize)]
//! struct ProfilePatch {
//!     display_name: String,
//!     address: Address,
//!     tags: Vec<String>,
//! }
//!
//! let patch = ProfilePatch {
//!     display_name: "Alex".to_string(),
//!     address: Address { city: "Paris".to_string(), zip: None },
//!     tags: vec!["admin".to_string()],
//! };
//!
//! assert_eq!(
//!     flatten(&patch)?,
//!     doc! { "displayName": "Alex", "address.city": "Paris", "tags.0": "admin" },
//! );
//! # Ok::<(), mongo_odm::error::Error>(())
//! ```
//!
//! How sequences, nulls, empty strings and key casing are handled is configured through
//! [`FlattenOptions`](flatten::FlattenOptions).
//!
//! # Models and the client
//!
//! Types implementing [`Model`] are stored in their own collection and carry a [`Metadata`]
//! record. A [`Client`] persists, finds, replaces, deletes and partially updates them:
//!
//! ```no_run
//! # async fn run() -> mongo_odm::error::Result<()> {
//! use mongo_odm::{
//!     bson::doc,
//!     options::{ClientConfig, ConnectionOptions},
//!     Client,
//!     Metadata,
//!     Model,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct User {
//!     #[serde(flatten)]
//!     meta: Metadata,
//!     first_name: String,
//!     email: String,
//! }
//!
//! impl Model for User {
//!     const COLLECTION: &'static str = "users";
//!
//!     fn metadata(&self) -> &Metadata {
//!         &self.meta
//!     }
//!
//!     fn metadata_mut(&mut self) -> &mut Metadata {
//!         &mut self.meta
//!     }
//! }
//!
//! let config = ClientConfig::builder()
//!     .host("localhost")
//!     .database("app")
//!     .options(ConnectionOptions::builder().retry_writes(true).build())
//!     .build();
//! let client = Client::connect(config).await?;
//! client.health_check().await?;
//!
//! let mut user = User {
//!     meta: Metadata::new(),
//!     first_name: "Alex".to_string(),
//!     email: "alex@example.com".to_string(),
//! };
//! client.persist(&mut user).await?;
//!
//! client
//!     .update(&mut user, &doc! { "email": "alex@example.org" })
//!     .await?;
//!
//! let found: Option<User> = client
//!     .find_one(doc! { "email": "alex@example.org" })
//!     .await?;
//! assert_eq!(found.map(|u| u.meta.version), Some(2));
//!
//! client.delete(&user).await?;
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! | Feature   | Description                                                        | Default |
//! |:----------|:-------------------------------------------------------------------|:--------|
//! | `tracing` | Emit [`tracing`](https://docs.rs/tracing) events for flattening and client operations, under the `mongo_odm::flatten` and `mongo_odm::client` targets. | yes |

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use mongodb;
pub use mongodb::bson;

mod client;
pub mod error;
pub mod flatten;
mod model;
pub mod results;
mod runtime;
mod serde_util;
#[cfg(test)]
mod test;
#[cfg(feature = "tracing")]
mod trace;

pub use crate::{
    client::{Client, DocumentStore, MongoStore},
    flatten::flatten,
    model::{Metadata, Model},
};

/// Contains the options for connecting a [`Client`] and for flattening updates.
pub mod options {
    pub use crate::{
        client::options::{
            ClientConfig,
            ConnectionOptions,
            Credential,
            DEFAULT_OPERATION_TIMEOUT,
            DEFAULT_PORT,
        },
        flatten::{
            ArrayPolicy,
            EmptyStringPolicy,
            FlattenOptions,
            KeyCase,
            NullPolicy,
        },
    };
}
