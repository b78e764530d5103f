//! The aggregation pipeline shared by collection- and database-level aggregates.
//!
//! validate → build command → initial round trip → drain → assemble.

use crate::command::{aggregate_command, AggregateTarget};
use crate::cursor::Cursor;
use crate::error::Result;
use crate::options::AggregateOptions;
use crate::pipeline::Pipeline;
use crate::result::AggregationResult;
use crate::transport::Transport;
use std::sync::Arc;
use tracing::info;

/// Everything needed to address one aggregate command.
pub(crate) struct AggregateRequest<'a> {
    pub transport: &'a Arc<dyn Transport>,
    pub database: &'a str,
    pub target: AggregateTarget,
    pub kill_cursors_on_error: bool,
}

impl AggregateRequest<'_> {
    /// Validate, send the initial command and return the open cursor.
    ///
    /// Validation finishes before the transport is touched.
    pub(crate) async fn open(
        self,
        pipeline: &Pipeline,
        options: &AggregateOptions,
    ) -> Result<Cursor> {
        options.validate()?;
        let command = aggregate_command(&self.target, pipeline, options);

        info!(
            database = self.database,
            target = ?self.target,
            stages = pipeline.len(),
            initial_batch_size = options.initial_batch_size,
            "running aggregate"
        );

        Cursor::open(
            self.transport.clone(),
            self.database,
            command,
            self.kill_cursors_on_error,
        )
        .await
    }

    /// Run the aggregation to completion.
    pub(crate) async fn run(
        self,
        pipeline: &Pipeline,
        options: &AggregateOptions,
    ) -> Result<AggregationResult> {
        let cursor = self.open(pipeline, options).await?;
        let metadata = cursor.metadata().clone();
        let documents = cursor.drain().await?;
        Ok(AggregationResult::assemble(
            metadata,
            documents,
            options.full_response,
        ))
    }
}
