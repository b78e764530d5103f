//! Command documents sent over the transport.
//!
//! Everything here is a pure transform; nothing touches the network.

use crate::namespace::Namespace;
use crate::options::AggregateOptions;
use crate::pipeline::Pipeline;
use bson::{doc, Bson, Document};

/// What an `aggregate` command runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateTarget {
    /// A named collection.
    Collection(String),
    /// The database itself, for stages like `$currentOp`.
    Database,
}

impl AggregateTarget {
    fn to_bson(&self) -> Bson {
        match self {
            AggregateTarget::Collection(name) => Bson::String(name.clone()),
            AggregateTarget::Database => Bson::Int32(1),
        }
    }
}

/// Build the `aggregate` command for a validated pipeline and options.
///
/// The `cursor` sub-document is always present. Optional fields that were not
/// supplied are omitted rather than sent as null.
pub fn aggregate_command(
    target: &AggregateTarget,
    pipeline: &Pipeline,
    options: &AggregateOptions,
) -> Document {
    let mut cursor = Document::new();
    if let Some(size) = options.initial_batch_size {
        // Range checked by AggregateOptions::validate.
        cursor.insert("batchSize", size as i32);
    }

    let mut command = doc! {
        "aggregate": target.to_bson(),
        "pipeline": pipeline.to_bson(),
        "cursor": cursor,
    };

    if let Some(ref comment) = options.comment {
        command.insert("comment", comment.clone());
    }
    if let Some(ms) = options.max_time_ms {
        command.insert("maxTimeMS", ms as i64);
    }
    if let Some(ref hint) = options.hint {
        command.insert("hint", hint.to_bson());
    }
    if let Some(allow) = options.allow_disk_use {
        command.insert("allowDiskUse", allow);
    }
    if let Some(ref collation) = options.collation {
        command.insert("collation", collation.clone());
    }
    if let Some(ref vars) = options.let_vars {
        command.insert("let", vars.clone());
    }

    command
}

/// Build a `getMore` continuation. No batch size is requested; the server
/// sizes every batch after the first.
pub fn get_more_command(cursor_id: i64, namespace: &Namespace) -> Document {
    doc! {
        "getMore": cursor_id,
        "collection": namespace.coll.clone(),
    }
}

/// Build a `killCursors` command.
pub fn kill_cursors_command(namespace: &Namespace, cursor_ids: &[i64]) -> Document {
    doc! {
        "killCursors": namespace.coll.clone(),
        "cursors": cursor_ids.iter().copied().map(Bson::Int64).collect::<Vec<_>>(),
    }
}
