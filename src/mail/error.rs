use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced by a [`MailClient`](crate::mail::MailClient).
#[derive(Debug, Error)]
pub enum MailError {
    /// Connection reset, TLS failure, timeout, or a status the provider
    /// documents as temporary. Retried after a transport reset.
    #[error("transient failure during {op}: {reason}")]
    Transient { op: String, reason: String },

    /// Any other non-success HTTP status (permission, not found, bad request).
    #[error("{op} returned HTTP {status}: {body}")]
    Status {
        op: String,
        status: StatusCode,
        body: String,
    },

    /// The response could not be decoded.
    #[error("malformed response for {op}: {reason}")]
    Malformed { op: String, reason: String },

    /// No access token could be obtained.
    #[error("authentication unavailable: {0}")]
    Auth(String),
}

impl MailError {
    pub fn transient(op: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transient {
            op: op.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(op: impl Into<String>, reason: impl ToString) -> Self {
        Self::Malformed {
            op: op.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Classify a reqwest failure that happened before a status was read.
    pub fn from_reqwest(op: &str, e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::malformed(op, e)
        } else {
            // connect / timeout / request / body: all transport-level
            Self::transient(op, e)
        }
    }

    pub fn from_status(op: &str, status: StatusCode, body: String) -> Self {
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            Self::transient(op, format!("HTTP {status}: {body}"))
        } else {
            Self::Status {
                op: op.to_string(),
                status,
                body,
            }
        }
    }
}
