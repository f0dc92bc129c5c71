use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelHandlerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid urn: {0}")]
    InvalidUrn(String),

    #[error("invalid language tag: {0}")]
    InvalidLanguage(String),

    #[error("request parse error: {0}")]
    ParseError(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("no route for {0}")]
    UnknownRoute(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Failures reported by the host's persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// No outbound message matches the status update.
    #[error("message not found")]
    MsgNotFound,

    #[error("contact not found: {0}")]
    ContactNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ChannelHandlerError {
    /// Whether the error stems from the request itself rather than the host.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            ChannelHandlerError::InvalidUrn(_)
                | ChannelHandlerError::InvalidLanguage(_)
                | ChannelHandlerError::ParseError(_)
                | ChannelHandlerError::ChannelNotFound(_)
                | ChannelHandlerError::Config(_)
        )
    }
}
