use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether the user can fix this by changing the input.
    pub fn is_user_error(&self) -> bool {
        self.kind == ApiErrorKind::InvalidInput
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Bad or missing URL; rejected locally or with a 400.
    InvalidInput,
    /// The requested job is not in the store.
    NotFound,
    /// Connection failure or unexpected status.
    Transport,
    Timeout,
    /// The store answered with a 5xx or refused the submission.
    Internal,
    /// The response body did not match the expected shape.
    Decode,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::InvalidInput => write!(f, "invalid input"),
            ApiErrorKind::NotFound => write!(f, "not found"),
            ApiErrorKind::Transport => write!(f, "transport failure"),
            ApiErrorKind::Timeout => write!(f, "timeout"),
            ApiErrorKind::Internal => write!(f, "server error"),
            ApiErrorKind::Decode => write!(f, "malformed response"),
        }
    }
}
