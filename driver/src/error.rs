use thiserror::Error;

/// Failures of the model side of the pipeline.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("model endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("model endpoint rejected the credentials (status {status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("model endpoint returned status {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("model returned an empty completion")]
    EmptyCompletion,

    #[error("no api key configured for the model endpoint")]
    MissingApiKey,

    #[error("generation backend failed: {0}")]
    Backend(String),
}

/// Raised when an untrusted statement is refused by the active policy.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolicyError {
    #[error("statement could not be parsed for policy checks: {0}")]
    Unparsable(String),

    #[error("statement is not read-only: {0}")]
    NotReadOnly(String),

    #[error("expected exactly one statement, found {0}")]
    StatementCount(usize),
}
