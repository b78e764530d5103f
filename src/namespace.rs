//! `database.collection` namespaces.

use crate::error::{MongoError, Result};
use std::fmt;
use std::str::FromStr;

/// A fully qualified collection namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// Database name.
    pub db: String,
    /// Collection name. May itself contain dots.
    pub coll: String,
}

impl Namespace {
    /// Create a namespace from its parts.
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}

impl FromStr for Namespace {
    type Err = MongoError;

    /// Split at the first dot; everything after it is the collection.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((db, coll)) if !db.is_empty() && !coll.is_empty() => Ok(Self::new(db, coll)),
            _ => Err(MongoError::protocol(format!("malformed namespace {:?}", s))),
        }
    }
}
