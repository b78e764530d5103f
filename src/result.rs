//! Assembly of drained batches into the value handed back to callers.

use bson::{Bson, Document};

/// The outcome of an aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationResult {
    /// The documents, in server order.
    Documents(Vec<Document>),
    /// The initial reply's status fields with every document under `result`.
    FullResponse(Document),
}

impl AggregationResult {
    /// Assemble a result from the initial reply's metadata and every drained document.
    ///
    /// In full-response mode the cursor descriptor is replaced by a `result`
    /// array holding the complete drained list.
    pub fn assemble(metadata: Document, documents: Vec<Document>, full_response: bool) -> Self {
        if !full_response {
            return AggregationResult::Documents(documents);
        }
        let mut reply = metadata;
        reply.remove("cursor");
        reply.insert(
            "result",
            Bson::Array(documents.into_iter().map(Bson::Document).collect()),
        );
        AggregationResult::FullResponse(reply)
    }

    /// Whether this is a full response.
    pub fn is_full_response(&self) -> bool {
        matches!(self, AggregationResult::FullResponse(_))
    }

    /// Number of result documents.
    pub fn len(&self) -> usize {
        match self {
            AggregationResult::Documents(documents) => documents.len(),
            AggregationResult::FullResponse(reply) => {
                reply.get_array("result").map(|r| r.len()).unwrap_or(0)
            }
        }
    }

    /// Whether there are no result documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The full response document, if this is one.
    pub fn as_full_response(&self) -> Option<&Document> {
        match self {
            AggregationResult::FullResponse(reply) => Some(reply),
            AggregationResult::Documents(_) => None,
        }
    }

    /// The result documents, taken out of `result` for a full response.
    pub fn into_documents(self) -> Vec<Document> {
        match self {
            AggregationResult::Documents(documents) => documents,
            AggregationResult::FullResponse(mut reply) => match reply.remove("result") {
                Some(Bson::Array(items)) => items
                    .into_iter()
                    .filter_map(|item| match item {
                        Bson::Document(document) => Some(document),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            },
        }
    }
}

impl From<AggregationResult> for Vec<Document> {
    fn from(result: AggregationResult) -> Self {
        result.into_documents()
    }
}
