use std::fmt;

/// Why a plugin refused a request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The plugin's caches have not completed their initial sync. Callers may retry.
    #[error("{plugin}: not yet ready to handle request")]
    NotReady { plugin: &'static str },

    /// The request is well formed but violates a policy.
    #[error("{0}")]
    Forbidden(Rejection),

    /// The request is malformed or references something that does not exist.
    #[error("{0}")]
    Invalid(Rejection),

    /// A dependency failed. Never treated as an admission.
    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

/// A human-readable rejection reason, optionally pointing at the offending field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub field: Option<String>,
    pub message: String,
}

// === impl Error ===

impl Error {
    pub fn forbidden(message: impl fmt::Display) -> Self {
        Self::Forbidden(Rejection::new(None, message))
    }

    pub fn forbidden_field(field: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Forbidden(Rejection::new(Some(field.into()), message))
    }

    pub fn invalid(message: impl fmt::Display) -> Self {
        Self::Invalid(Rejection::new(None, message))
    }

    pub fn invalid_field(field: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Invalid(Rejection::new(Some(field.into()), message))
    }

    pub fn internal(error: impl Into<anyhow::Error>) -> Self {
        Self::Internal(error.into())
    }

    /// The HTTP status code that conveys this error to the API server.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotReady { .. } => 429,
            Self::Forbidden(_) => 403,
            Self::Invalid(_) => 422,
            Self::Internal(_) => 500,
        }
    }

    /// The machine-readable status reason.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotReady { .. } => "NotReady",
            Self::Forbidden(_) => "Forbidden",
            Self::Invalid(_) => "Invalid",
            Self::Internal(_) => "InternalError",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }
}

// === impl Rejection ===

impl Rejection {
    fn new(field: Option<String>, message: impl fmt::Display) -> Self {
        Self {
            field,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field.as_deref() {
            Some(field) => write!(f, "{field}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}
