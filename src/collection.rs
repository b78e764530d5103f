//! Collection handle exposing aggregation.

use crate::aggregate::AggregateRequest;
use crate::client::ClientOptions;
use crate::command::AggregateTarget;
use crate::cursor::Cursor;
use crate::error::{MongoError, Result};
use crate::namespace::Namespace;
use crate::options::AggregateOptions;
use crate::pipeline::Pipeline;
use crate::result::AggregationResult;
use crate::transport::Transport;
use bson::{Bson, Document};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// A handle to a collection.
///
/// # Example
///
/// ```ignore
/// use mongo_aggregate::{bson::doc, AggregateOptions, Client};
///
/// let client = Client::with_transport("mongodb://localhost/mydb", transport)?;
/// let coll = client.database("mydb").collection("mycol");
///
/// let groups = coll
///     .aggregate(vec![
///         doc! { "$group": { "_id": "$oh", "many_lolz": { "$sum": "$lulz" } } },
///         doc! { "$sort": { "_id": 1 } },
///     ])
///     .await?;
/// ```
#[derive(Clone)]
pub struct Collection {
    /// Database name.
    pub(crate) db_name: String,
    /// Collection name.
    pub(crate) name: String,
    /// Transport shared with the owning client.
    pub(crate) transport: Arc<dyn Transport>,
    /// Client configuration.
    pub(crate) options: ClientOptions,
}

impl Collection {
    /// Create a new collection handle.
    pub(crate) fn new(
        db_name: String,
        name: String,
        transport: Arc<dyn Transport>,
        options: ClientOptions,
    ) -> Self {
        Self {
            db_name,
            name,
            transport,
            options,
        }
    }

    /// Get the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the database name.
    pub fn database_name(&self) -> &str {
        &self.db_name
    }

    /// Get the full namespace (db.collection).
    pub fn namespace(&self) -> Namespace {
        Namespace::new(self.db_name.clone(), self.name.clone())
    }

    fn request(&self) -> AggregateRequest<'_> {
        AggregateRequest {
            transport: &self.transport,
            database: &self.db_name,
            target: AggregateTarget::Collection(self.name.clone()),
            kill_cursors_on_error: self.options.kill_cursors_on_error,
        }
    }

    /// Run a pipeline and return every result document.
    pub async fn aggregate(
        &self,
        pipeline: impl IntoIterator<Item = Document>,
    ) -> Result<Vec<Document>> {
        self.aggregate_with_options(pipeline, AggregateOptions::default())
            .await
            .map(AggregationResult::into_documents)
    }

    /// Run a pipeline with options.
    ///
    /// With `full_response` set, the result carries the server's status
    /// fields and the documents under `result`.
    #[tracing::instrument(
        skip_all,
        fields(namespace = %self.namespace(), app_name = self.options.app_name.as_deref())
    )]
    pub async fn aggregate_with_options(
        &self,
        pipeline: impl IntoIterator<Item = Document>,
        options: impl Into<Option<AggregateOptions>>,
    ) -> Result<AggregationResult> {
        let pipeline = Pipeline::new(pipeline);
        let options = options.into().unwrap_or_default();
        self.request().run(&pipeline, &options).await
    }

    /// Run a pipeline given as untyped values.
    ///
    /// `pipeline` must be an array of documents. `options` is an option bag
    /// as accepted by [`AggregateOptions::from_document`]. Both are checked
    /// before anything is sent.
    pub async fn aggregate_raw(
        &self,
        pipeline: impl Into<Bson>,
        options: &Document,
    ) -> Result<AggregationResult> {
        let pipeline = Pipeline::try_from(pipeline.into())?;
        let options = AggregateOptions::from_document(options)?;
        self.request().run(&pipeline, &options).await
    }

    /// Run a pipeline and deserialize every result document into `R`.
    pub async fn aggregate_as<R: DeserializeOwned>(
        &self,
        pipeline: impl IntoIterator<Item = Document>,
        options: impl Into<Option<AggregateOptions>>,
    ) -> Result<Vec<R>> {
        self.aggregate_with_options(pipeline, options)
            .await?
            .into_documents()
            .into_iter()
            .map(|document| bson::from_document(document).map_err(MongoError::from))
            .collect()
    }

    /// Open a cursor without draining it.
    ///
    /// `full_response` has no effect here; the initial reply's status
    /// fields are available from [`Cursor::metadata`].
    pub async fn aggregate_cursor(
        &self,
        pipeline: impl IntoIterator<Item = Document>,
        options: impl Into<Option<AggregateOptions>>,
    ) -> Result<Cursor> {
        let pipeline = Pipeline::new(pipeline);
        let options = options.into().unwrap_or_default();
        self.request().open(&pipeline, &options).await
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("db_name", &self.db_name)
            .field("name", &self.name)
            .finish()
    }
}
