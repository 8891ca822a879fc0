//! Error kinds shared by the WMATA client and the sync pipeline.

#[derive(thiserror::Error, Debug)]
pub enum WmataError {
    #[error("API request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("error sending request to the WMATA API")]
    Connection(#[from] reqwest::Error),

    #[error("API rate limit exceeded. Please try again later.")]
    RateLimitExceeded,

    #[error("error parsing WMATA payload")]
    Mapping(#[from] serde_json::Error),

    #[error("line {0} not found")]
    LineNotFound(String),

    #[error("line {0} missing start or end station codes")]
    IncompletePath(String),
}
