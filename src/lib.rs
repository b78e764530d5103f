//! # mongo-aggregate
//!
//! Client-side execution of aggregation pipelines against MongoDB-compatible
//! servers.
//!
//! An aggregation validates its pipeline and options, sends one `aggregate`
//! command, then follows the returned cursor with `getMore` requests until the
//! server reports it exhausted. Batches are concatenated in arrival order.
//! Either the documents come back, or the whole operation fails; a partially
//! drained result is never returned.
//!
//! Networking is left to a [`Transport`] implementation supplied by the caller.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mongo_aggregate::{bson::doc, AggregateOptions, Client};
//!
//! async fn report(transport: std::sync::Arc<dyn mongo_aggregate::Transport>) -> mongo_aggregate::Result<()> {
//!     let client = Client::with_transport("mongodb://localhost/mydb", transport)?;
//!     let coll = client.database("mydb").collection("mycol");
//!
//!     // Every document, however many getMore round trips that takes
//!     let groups = coll
//!         .aggregate(vec![
//!             doc! { "$group": { "_id": "$oh", "many_lolz": { "$sum": "$lulz" } } },
//!             doc! { "$sort": { "_id": 1 } },
//!         ])
//!         .await?;
//!
//!     // Server status fields plus the documents under `result`
//!     let full = coll
//!         .aggregate_with_options(
//!             vec![doc! { "$match": { "oh": "hai" } }],
//!             AggregateOptions::builder()
//!                 .full_response(true)
//!                 .initial_batch_size(0)
//!                 .comment("nightly report")
//!                 .build(),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```

mod aggregate;
pub mod client;
pub mod collection;
pub mod command;
pub mod cursor;
pub mod db;
pub mod error;
pub mod namespace;
pub mod options;
pub mod pipeline;
pub mod reply;
pub mod result;
pub mod transport;

// Re-export main types
pub use client::{Client, ClientOptions, ClientOptionsBuilder};
pub use collection::Collection;
pub use command::AggregateTarget;
pub use cursor::{Cursor, CursorState};
pub use db::Database;
pub use error::{DrainPhase, ErrorKind, MongoError, Result};
pub use namespace::Namespace;
pub use options::{AggregateOptions, AggregateOptionsBuilder, Hint};
pub use pipeline::Pipeline;
pub use result::AggregationResult;
pub use transport::Transport;

// Re-export bson for convenience
pub use bson;
pub use bson::doc;

/// Prelude module for common imports.
pub mod prelude {
    pub use super::client::{Client, ClientOptions};
    pub use super::collection::Collection;
    pub use super::cursor::Cursor;
    pub use super::db::Database;
    pub use super::error::{ErrorKind, MongoError, Result};
    pub use super::options::{AggregateOptions, Hint};
    pub use super::result::AggregationResult;
    pub use super::transport::Transport;
    pub use bson::{doc, Document};
}

/// Get the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
