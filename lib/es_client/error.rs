use thiserror::Error;

#[derive(Error, Debug)]
pub enum EsClientError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}: {body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },

    #[error("Response parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),
}
