//! Parsing of server replies to `aggregate` and `getMore`.

use crate::error::{MongoError, Result};
use crate::namespace::Namespace;
use bson::{Bson, Document};

/// Which batch field a cursor reply carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchField {
    /// `cursor.firstBatch`, sent in reply to `aggregate`.
    First,
    /// `cursor.nextBatch`, sent in reply to `getMore`.
    Next,
}

impl BatchField {
    /// The field name in the cursor descriptor.
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchField::First => "firstBatch",
            BatchField::Next => "nextBatch",
        }
    }
}

/// Fail with [`MongoError::Command`] unless the reply reports success.
pub fn check_ok(reply: &Document) -> Result<()> {
    let ok = match reply.get("ok") {
        Some(Bson::Double(v)) => *v == 1.0,
        Some(Bson::Int32(v)) => *v == 1,
        Some(Bson::Int64(v)) => *v == 1,
        Some(Bson::Boolean(v)) => *v,
        Some(other) => {
            return Err(MongoError::protocol(format!(
                "reply status has unexpected type {:?}",
                other.element_type()
            )))
        }
        None => return Err(MongoError::protocol("reply has no ok field")),
    };
    if ok {
        return Ok(());
    }

    let code = match reply.get("code") {
        Some(Bson::Int32(code)) => *code,
        Some(Bson::Int64(code)) => i32::try_from(*code).unwrap_or(0),
        Some(Bson::Double(code)) => *code as i32,
        _ => 0,
    };
    let message = reply
        .get_str("errmsg")
        .unwrap_or("command failed without an error message")
        .to_string();
    let code_name = reply.get_str("codeName").ok().map(str::to_string);

    Err(MongoError::Command {
        code,
        code_name,
        message,
    })
}

/// A decoded cursor reply.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorReply {
    /// Cursor id. Zero means the cursor is exhausted.
    pub id: i64,
    /// Namespace continuations must address.
    pub namespace: Namespace,
    /// The documents of this batch, in server order.
    pub batch: Vec<Document>,
    /// Every top-level field of the reply except `cursor`.
    pub metadata: Document,
}

impl CursorReply {
    /// Check the status of `reply` and take its cursor descriptor apart.
    pub fn parse(mut reply: Document, field: BatchField) -> Result<Self> {
        check_ok(&reply)?;

        let mut cursor = match reply.remove("cursor") {
            Some(Bson::Document(cursor)) => cursor,
            Some(other) => {
                return Err(MongoError::protocol(format!(
                    "cursor descriptor has unexpected type {:?}",
                    other.element_type()
                )))
            }
            None => return Err(MongoError::protocol("reply has no cursor descriptor")),
        };

        let id = match cursor.get("id") {
            Some(Bson::Int64(id)) => *id,
            Some(Bson::Int32(id)) => i64::from(*id),
            Some(other) => {
                return Err(MongoError::protocol(format!(
                    "cursor id has unexpected type {:?}",
                    other.element_type()
                )))
            }
            None => return Err(MongoError::protocol("cursor descriptor has no id")),
        };

        let namespace = cursor
            .get_str("ns")
            .map_err(|_| MongoError::protocol("cursor descriptor has no ns string"))?
            .parse::<Namespace>()?;

        let batch = match cursor.remove(field.as_str()) {
            Some(Bson::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Bson::Document(document) => Ok(document),
                    other => Err(MongoError::protocol(format!(
                        "{} holds a non-document {:?}",
                        field.as_str(),
                        other.element_type()
                    ))),
                })
                .collect::<Result<Vec<_>>>()?,
            _ => {
                return Err(MongoError::protocol(format!(
                    "cursor descriptor has no {} array",
                    field.as_str()
                )))
            }
        };

        Ok(Self {
            id,
            namespace,
            batch,
            metadata: reply,
        })
    }
}
