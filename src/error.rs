use thiserror::Error;

/// Errors surfaced by the transcriber.
///
/// Only `MissingApiKey` reaches the caller (at construction). Decode errors
/// end the session attempt that produced them and are consumed by the
/// reconnect loop.
#[derive(Debug, Error)]
pub enum TranscriberError {
    #[error(
        "no Rev.ai API key: provide one in the config or set the REV_AI_API_KEY environment variable"
    )]
    MissingApiKey,
    #[error("malformed server message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("malformed server message: missing field `{0}`")]
    MissingField(&'static str),
}
