//! Database handle.

use crate::aggregate::AggregateRequest;
use crate::client::ClientOptions;
use crate::collection::Collection;
use crate::command::AggregateTarget;
use crate::error::Result;
use crate::options::AggregateOptions;
use crate::pipeline::Pipeline;
use crate::reply::check_ok;
use crate::result::AggregationResult;
use crate::transport::Transport;
use bson::Document;
use std::sync::Arc;

/// A handle to a database.
///
/// # Example
///
/// ```ignore
/// let db = client.database("mydb");
/// let ops = db
///     .aggregate(vec![doc! { "$currentOp": {} }], None)
///     .await?
///     .into_documents();
/// ```
#[derive(Clone)]
pub struct Database {
    /// Database name.
    pub(crate) name: String,
    /// Transport shared with the owning client.
    pub(crate) transport: Arc<dyn Transport>,
    /// Client configuration.
    pub(crate) options: ClientOptions,
}

impl Database {
    /// Create a new database handle.
    pub(crate) fn new(name: String, transport: Arc<dyn Transport>, options: ClientOptions) -> Self {
        Self {
            name,
            transport,
            options,
        }
    }

    /// Get the database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a handle to a collection.
    pub fn collection(&self, name: &str) -> Collection {
        Collection::new(
            self.name.clone(),
            name.to_string(),
            self.transport.clone(),
            self.options.clone(),
        )
    }

    /// Run a database command and check its status.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let reply = db.run_command(doc! { "ping": 1 }).await?;
    /// ```
    pub async fn run_command(&self, command: Document) -> Result<Document> {
        let reply = self.transport.run_command(&self.name, command).await?;
        check_ok(&reply)?;
        Ok(reply)
    }

    /// Run a database-level aggregation such as `$currentOp`.
    #[tracing::instrument(
        skip_all,
        fields(database = %self.name, app_name = self.options.app_name.as_deref())
    )]
    pub async fn aggregate(
        &self,
        pipeline: impl IntoIterator<Item = Document>,
        options: impl Into<Option<AggregateOptions>>,
    ) -> Result<AggregationResult> {
        let pipeline = Pipeline::new(pipeline);
        let options = options.into().unwrap_or_default();
        AggregateRequest {
            transport: &self.transport,
            database: &self.name,
            target: AggregateTarget::Database,
            kill_cursors_on_error: self.options.kill_cursors_on_error,
        }
        .run(&pipeline, &options)
        .await
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("name", &self.name).finish()
    }
}
