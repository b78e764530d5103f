//! Aggregation pipelines.

use crate::error::{MongoError, Result};
use bson::{Bson, Document};

/// An ordered list of aggregation stages.
///
/// Stage order is significant and is preserved verbatim on the wire. An empty
/// pipeline is valid and means "no transformation".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Document>,
}

impl Pipeline {
    /// Create a pipeline from stage documents.
    pub fn new(stages: impl IntoIterator<Item = Document>) -> Self {
        Self {
            stages: stages.into_iter().collect(),
        }
    }

    /// The stages, in order.
    pub fn stages(&self) -> &[Document] {
        &self.stages
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The stages as a BSON array for the command document.
    pub fn to_bson(&self) -> Bson {
        Bson::Array(self.stages.iter().cloned().map(Bson::Document).collect())
    }
}

impl From<Vec<Document>> for Pipeline {
    fn from(stages: Vec<Document>) -> Self {
        Self { stages }
    }
}

impl FromIterator<Document> for Pipeline {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl TryFrom<Bson> for Pipeline {
    type Error = MongoError;

    /// Accept only an array whose every element is a document.
    ///
    /// A lone document or a string is rejected even though both could be
    /// iterated over at a lower level.
    fn try_from(value: Bson) -> Result<Self> {
        let items = match value {
            Bson::Array(items) => items,
            other => {
                return Err(MongoError::invalid_argument(format!(
                    "pipeline must be an array of documents, got {:?}",
                    other.element_type()
                )))
            }
        };

        items
            .into_iter()
            .enumerate()
            .map(|(i, stage)| match stage {
                Bson::Document(stage) => Ok(stage),
                other => Err(MongoError::invalid_argument(format!(
                    "pipeline stage {} must be a document, got {:?}",
                    i,
                    other.element_type()
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(Pipeline::from)
    }
}
