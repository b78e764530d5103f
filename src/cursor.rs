//! Server-side cursors and the loop that drains them.

use crate::command::get_more_command;
use crate::error::{DrainPhase, MongoError, Result};
use crate::namespace::Namespace;
use crate::reply::{BatchField, CursorReply};
use crate::transport::Transport;
use bson::{Bson, Document};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Server error code for a cursor the server no longer knows about.
const CURSOR_NOT_FOUND: i32 = 43;

/// Where a cursor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// The server still holds the cursor; more batches may follow.
    Draining,
    /// The server reported id zero. Nothing more will be fetched.
    Exhausted,
    /// A round trip failed. The cursor must not be used again.
    Failed,
}

/// A cursor over the result of an aggregation.
///
/// Batches are fetched strictly one after another: a `getMore` is only sent
/// once the reply to the previous one has been consumed. Each cursor owns
/// its buffer and id exclusively.
///
/// # Example
///
/// ```ignore
/// let mut cursor = collection.aggregate_cursor(pipeline, options).await?;
/// while let Some(batch) = cursor.next_batch().await? {
///     println!("got {} documents", batch.len());
/// }
/// ```
pub struct Cursor {
    transport: Arc<dyn Transport>,
    namespace: Namespace,
    id: i64,
    state: CursorState,
    buffer: VecDeque<Document>,
    metadata: Document,
    kill_on_error: bool,
    round_trips: usize,
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("namespace", &self.namespace)
            .field("id", &self.id)
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .field("round_trips", &self.round_trips)
            .finish()
    }
}

impl Cursor {
    /// Send the initial command and build a cursor from its reply.
    ///
    /// Fails with a protocol error if the reply has no cursor descriptor. A
    /// malformed reply that still names a live cursor gets a best-effort kill
    /// when `kill_on_error` is set.
    pub async fn open(
        transport: Arc<dyn Transport>,
        database: &str,
        command: Document,
        kill_on_error: bool,
    ) -> Result<Self> {
        let reply = transport
            .run_command(database, command)
            .await
            .map_err(|err| err.in_phase(DrainPhase::Initial))?;

        // The server may have opened a cursor even though the reply is unusable.
        let opened = live_cursor(&reply);
        let reply = match CursorReply::parse(reply, BatchField::First) {
            Ok(reply) => reply,
            Err(err) => {
                if let Some((namespace, cursor_id)) = opened.filter(|_| kill_on_error) {
                    kill_quietly(transport.as_ref(), &namespace, cursor_id).await;
                }
                return Err(err.in_phase(DrainPhase::Initial));
            }
        };

        debug!(
            cursor_id = reply.id,
            namespace = %reply.namespace,
            first_batch = reply.batch.len(),
            "aggregate cursor opened"
        );

        Ok(Self::from_reply(transport, reply, kill_on_error))
    }

    /// Build a cursor from an already parsed first reply.
    pub fn from_reply(
        transport: Arc<dyn Transport>,
        reply: CursorReply,
        kill_on_error: bool,
    ) -> Self {
        let state = if reply.id == 0 {
            CursorState::Exhausted
        } else {
            CursorState::Draining
        };
        Self {
            transport,
            namespace: reply.namespace,
            id: reply.id,
            state,
            buffer: reply.batch.into(),
            metadata: reply.metadata,
            kill_on_error,
            round_trips: 1,
        }
    }

    /// The current server-side id. Zero once exhausted.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// The namespace continuations are sent to.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Lifecycle state.
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Whether every batch has been fetched and handed out.
    pub fn is_exhausted(&self) -> bool {
        self.state == CursorState::Exhausted && self.buffer.is_empty()
    }

    /// Documents received but not yet handed out.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Fields of the initial reply other than the cursor descriptor.
    pub fn metadata(&self) -> &Document {
        &self.metadata
    }

    /// Number of round trips made so far, the initial command included.
    pub fn round_trips(&self) -> usize {
        self.round_trips
    }

    /// Return the next batch, fetching it with a `getMore` if nothing is buffered.
    ///
    /// An empty batch with a live cursor is returned as an empty vector; it is
    /// never treated as the end. `None` means the cursor is exhausted.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
        if !self.buffer.is_empty() {
            return Ok(Some(self.buffer.drain(..).collect()));
        }
        match self.state {
            CursorState::Exhausted => Ok(None),
            CursorState::Failed => Err(MongoError::CursorExhausted),
            CursorState::Draining => self.get_more().await.map(Some),
        }
    }

    /// Return the next document, fetching batches as needed.
    pub async fn try_next(&mut self) -> Result<Option<Document>> {
        loop {
            if let Some(document) = self.buffer.pop_front() {
                return Ok(Some(document));
            }
            match self.next_batch().await? {
                Some(batch) => self.buffer.extend(batch),
                None => return Ok(None),
            }
        }
    }

    /// Fetch every remaining batch and return all documents in arrival order.
    ///
    /// If any continuation fails, whatever was accumulated is dropped and
    /// only the error is returned.
    pub async fn drain(mut self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            documents.extend(batch);
        }
        debug!(
            namespace = %self.namespace,
            documents = documents.len(),
            round_trips = self.round_trips,
            "aggregate cursor exhausted"
        );
        Ok(documents)
    }

    /// Consume the cursor as a stream of documents.
    pub fn into_stream(self) -> BoxStream<'static, Result<Document>> {
        stream::try_unfold(self, |mut cursor| async move {
            let next = cursor.try_next().await?;
            Ok::<_, MongoError>(next.map(|document| (document, cursor)))
        })
        .boxed()
    }

    /// Kill the server-side cursor if it is still open and discard the buffer.
    pub async fn kill(&mut self) -> Result<()> {
        if self.state == CursorState::Draining && self.id != 0 {
            self.transport
                .kill_cursors(&self.namespace, &[self.id])
                .await?;
            debug!(cursor_id = self.id, namespace = %self.namespace, "cursor killed");
        }
        self.id = 0;
        self.state = CursorState::Exhausted;
        self.buffer.clear();
        Ok(())
    }

    async fn get_more(&mut self) -> Result<Vec<Document>> {
        let cursor_id = self.id;
        let command = get_more_command(cursor_id, &self.namespace);

        let outcome = self
            .transport
            .run_command(&self.namespace.db, command)
            .await
            .and_then(|reply| CursorReply::parse(reply, BatchField::Next));

        match outcome {
            Ok(reply) => {
                self.round_trips += 1;
                self.id = reply.id;
                if reply.id == 0 {
                    self.state = CursorState::Exhausted;
                }
                debug!(
                    cursor_id,
                    next_cursor_id = reply.id,
                    batch = reply.batch.len(),
                    "getMore"
                );
                Ok(reply.batch)
            }
            Err(err) => {
                self.state = CursorState::Failed;
                self.release_after_error(&err).await;
                Err(err.in_phase(DrainPhase::Continuation { cursor_id }))
            }
        }
    }

    /// Best-effort `killCursors` for a cursor abandoned by a failed round trip.
    async fn release_after_error(&mut self, err: &MongoError) {
        let cursor_id = std::mem::replace(&mut self.id, 0);
        if !self.kill_on_error || cursor_id == 0 || err.code() == Some(CURSOR_NOT_FOUND) {
            return;
        }
        kill_quietly(self.transport.as_ref(), &self.namespace, cursor_id).await;
    }
}

/// Id and namespace of a still-open cursor in a raw reply, if it names one.
fn live_cursor(reply: &Document) -> Option<(Namespace, i64)> {
    let cursor = reply.get_document("cursor").ok()?;
    let id = match cursor.get("id")? {
        Bson::Int64(id) => *id,
        Bson::Int32(id) => i64::from(*id),
        _ => return None,
    };
    if id == 0 {
        return None;
    }
    let namespace = cursor.get_str("ns").ok()?.parse::<Namespace>().ok()?;
    Some((namespace, id))
}

/// `killCursors` whose failure is logged and otherwise ignored.
async fn kill_quietly(transport: &dyn Transport, namespace: &Namespace, cursor_id: i64) {
    if let Err(kill_err) = transport.kill_cursors(namespace, &[cursor_id]).await {
        warn!(
            cursor_id,
            namespace = %namespace,
            error = %kill_err,
            "failed to kill cursor after error"
        );
    }
}
