use crate::es_client::error::EsClientError;
use thiserror::Error;

/// Fatal pipeline failures. Purge and per-batch bulk-write errors are handled
/// at their call sites and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cardinality query failed: {0}")]
    Cardinality(#[source] EsClientError),

    #[error("Aggregation query failed for partition {partition}: {source}")]
    Aggregation {
        partition: u32,
        #[source]
        source: EsClientError,
    },

    #[error("Failed to encode bulk payload: {0}")]
    Encode(#[from] serde_json::Error),
}
