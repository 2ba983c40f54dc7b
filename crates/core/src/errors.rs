use thiserror::Error;

/// Request-level error taxonomy shared by the orchestration layer and the
/// HTTP surface.
///
/// Anything that can degrade gracefully (summary generation, video lookup)
/// never reaches this type; it is reported inside a structured payload
/// instead. What remains is either the caller's fault (4xx) or a failure of
/// a collaborator central to the primary response (5xx). Upstream calls are
/// attempted exactly once; there is no retry policy to encode here.
#[derive(Debug, Error)]
pub enum ChatApiError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("could not parse tool arguments: {0}")]
    InvalidToolArguments(String),
    #[error("upstream service failure: {0}")]
    Upstream(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl ChatApiError {
    /// HTTP status this error surfaces as at the request boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::UnknownTool(_) | Self::InvalidToolArguments(_) => 400,
            Self::Upstream(_) | Self::Storage(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
