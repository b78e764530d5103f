//! Options for aggregate operations.

use crate::error::{MongoError, Result};
use bson::{Bson, Document};

/// Index hint for an aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum Hint {
    /// Index name.
    Name(String),
    /// Ordered field to direction map, e.g. `{ "x": -1 }`.
    Keys(Document),
}

impl Hint {
    /// The hint as it is sent on the wire.
    pub fn to_bson(&self) -> Bson {
        match self {
            Hint::Name(name) => Bson::String(name.clone()),
            Hint::Keys(keys) => Bson::Document(keys.clone()),
        }
    }
}

impl From<&str> for Hint {
    fn from(name: &str) -> Self {
        Hint::Name(name.to_string())
    }
}

impl From<String> for Hint {
    fn from(name: String) -> Self {
        Hint::Name(name)
    }
}

impl From<Document> for Hint {
    fn from(keys: Document) -> Self {
        Hint::Keys(keys)
    }
}

/// Options for aggregate operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOptions {
    /// Return the server reply with the drained documents under `result`.
    pub full_response: bool,
    /// Size of the first batch. `0` is meaningful; `None` lets the server choose.
    pub initial_batch_size: Option<u32>,
    /// Opaque tag visible in server-side diagnostics.
    pub comment: Option<String>,
    /// Server-side execution budget in milliseconds.
    pub max_time_ms: Option<u64>,
    /// Index to use.
    pub hint: Option<Hint>,
    /// Allow stages to write temporary files.
    pub allow_disk_use: Option<bool>,
    /// Collation for string comparisons.
    pub collation: Option<Document>,
    /// Variables accessible in the pipeline as `$$name`.
    pub let_vars: Option<Document>,
}

impl AggregateOptions {
    /// Create a builder.
    pub fn builder() -> AggregateOptionsBuilder {
        AggregateOptionsBuilder::default()
    }

    /// Check that typed values fit their wire representation.
    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.initial_batch_size {
            if i32::try_from(size).is_err() {
                return Err(MongoError::invalid_argument(format!(
                    "initialBatchSize {} does not fit in a 32-bit integer",
                    size
                )));
            }
        }
        if let Some(ms) = self.max_time_ms {
            if i64::try_from(ms).is_err() {
                return Err(MongoError::invalid_argument(format!(
                    "maxTimeMs {} does not fit in a 64-bit integer",
                    ms
                )));
            }
        }
        Ok(())
    }

    /// Build options from a loosely typed option bag.
    ///
    /// Every value is type checked; unknown keys are rejected.
    pub fn from_document(bag: &Document) -> Result<Self> {
        let mut options = AggregateOptions::default();

        for (key, value) in bag {
            match key.as_str() {
                "fullResponse" => options.full_response = expect_bool(key, value)?,
                "initialBatchSize" => {
                    let size = expect_non_negative(key, value)?;
                    let size = u32::try_from(size).map_err(|_| {
                        MongoError::invalid_argument(format!(
                            "initialBatchSize {} does not fit in a 32-bit integer",
                            size
                        ))
                    })?;
                    options.initial_batch_size = Some(size);
                }
                "comment" => match value {
                    Bson::String(comment) => options.comment = Some(comment.clone()),
                    other => {
                        return Err(type_error(key, "a string", other));
                    }
                },
                "maxTimeMS" | "maxTimeMs" => {
                    if options.max_time_ms.is_some() {
                        return Err(MongoError::invalid_argument(
                            "maxTimeMS and maxTimeMs are aliases; give only one",
                        ));
                    }
                    options.max_time_ms = Some(expect_non_negative(key, value)?);
                }
                "hint" => match value {
                    Bson::String(name) => options.hint = Some(Hint::Name(name.clone())),
                    Bson::Document(keys) => options.hint = Some(Hint::Keys(keys.clone())),
                    other => {
                        return Err(type_error(key, "a string or a document", other));
                    }
                },
                "allowDiskUse" => options.allow_disk_use = Some(expect_bool(key, value)?),
                "collation" => options.collation = Some(expect_document(key, value)?),
                "let" => options.let_vars = Some(expect_document(key, value)?),
                unknown => {
                    return Err(MongoError::invalid_argument(format!(
                        "unrecognized aggregate option {:?}",
                        unknown
                    )))
                }
            }
        }

        options.validate()?;
        Ok(options)
    }
}

fn type_error(key: &str, expected: &str, value: &Bson) -> MongoError {
    MongoError::invalid_argument(format!(
        "{} must be {}, got {:?}",
        key,
        expected,
        value.element_type()
    ))
}

fn expect_bool(key: &str, value: &Bson) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| type_error(key, "a boolean", value))
}

fn expect_document(key: &str, value: &Bson) -> Result<Document> {
    value
        .as_document()
        .cloned()
        .ok_or_else(|| type_error(key, "a document", value))
}

// Doubles are rejected even when integral.
fn expect_non_negative(key: &str, value: &Bson) -> Result<u64> {
    let n = match value {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        other => return Err(type_error(key, "an integer", other)),
    };
    u64::try_from(n)
        .map_err(|_| MongoError::invalid_argument(format!("{} must be non-negative, got {}", key, n)))
}

/// Builder for AggregateOptions.
#[derive(Debug, Clone, Default)]
pub struct AggregateOptionsBuilder {
    options: AggregateOptions,
}

impl AggregateOptionsBuilder {
    /// Return the full server reply instead of the document list.
    pub fn full_response(mut self, full_response: bool) -> Self {
        self.options.full_response = full_response;
        self
    }

    /// Set the first batch size.
    pub fn initial_batch_size(mut self, size: u32) -> Self {
        self.options.initial_batch_size = Some(size);
        self
    }

    /// Set the comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.options.comment = Some(comment.into());
        self
    }

    /// Set the server-side time budget.
    pub fn max_time_ms(mut self, ms: u64) -> Self {
        self.options.max_time_ms = Some(ms);
        self
    }

    /// Set the index hint.
    pub fn hint(mut self, hint: impl Into<Hint>) -> Self {
        self.options.hint = Some(hint.into());
        self
    }

    /// Allow disk use.
    pub fn allow_disk_use(mut self, allow: bool) -> Self {
        self.options.allow_disk_use = Some(allow);
        self
    }

    /// Set the collation.
    pub fn collation(mut self, collation: Document) -> Self {
        self.options.collation = Some(collation);
        self
    }

    /// Set pipeline variables.
    pub fn let_vars(mut self, vars: Document) -> Self {
        self.options.let_vars = Some(vars);
        self
    }

    /// Build the options.
    pub fn build(self) -> AggregateOptions {
        self.options
    }
}
