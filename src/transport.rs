//! The transport collaborator the aggregation engine sends commands through.
//!
//! Connection establishment, authentication, server selection and pooling all
//! live behind this trait. The engine only needs to run a command against a
//! database and get the decoded reply back.

use crate::command::kill_cursors_command;
use crate::error::Result;
use crate::namespace::Namespace;
use crate::reply::check_ok;
use async_trait::async_trait;
use bson::Document;

/// Sends command documents to a server and resolves with its decoded reply.
///
/// Each call is treated as atomic and independent. Implementations are
/// expected to surface `ok: 0` replies either as `Ok(reply)` (the engine
/// checks the status field itself) or as [`MongoError::Command`].
///
/// [`MongoError::Command`]: crate::error::MongoError::Command
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run `command` against `database`.
    async fn run_command(&self, database: &str, command: Document) -> Result<Document>;

    /// Kill open cursors on `namespace`.
    async fn kill_cursors(&self, namespace: &Namespace, cursor_ids: &[i64]) -> Result<()> {
        let reply = self
            .run_command(&namespace.db, kill_cursors_command(namespace, cursor_ids))
            .await?;
        check_ok(&reply)
    }
}
