//! Error types for talking to the task service and validating input.
//!
//! [`ApiError`] covers everything that can go wrong once a request is about
//! to leave the process. It carries messages rather than source errors so it
//! can be cloned into cache state and handed to several waiters.
//! [`ValidationError`] is raised before any request is made.

use std::collections::BTreeMap;

use crate::task::TaskId;

/// Generic message shown when the server rejects a request without details.
pub const GENERIC_REJECTION: &str = "Request failed. Please try again.";

/// Errors returned by the task service client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Transport-level failure (DNS, connect, TLS, reset).
    #[error("network error: {message}")]
    Network { message: String },

    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// No valid session; the user has to sign in.
    #[error("not signed in (run `taskdeck login`)")]
    Unauthorized,

    /// An id-addressed operation hit a task the server does not know.
    #[error("task {id} not found")]
    NotFound { id: TaskId },

    /// The server answered with a non-success status.
    #[error("server rejected the request ({status}): {}", rejection_summary(.title, .field_errors))]
    ServerRejection {
        status: u16,
        title: Option<String>,
        field_errors: BTreeMap<String, Vec<String>>,
    },

    /// The response body could not be decoded.
    #[error("unexpected response: {message}")]
    Decode { message: String },

    /// A pending fetch was cancelled before it produced a value.
    #[error("request cancelled")]
    Cancelled,

    /// The configured base URL could not be combined with a request path.
    #[error("invalid url: {message}")]
    InvalidUrl { message: String },
}

impl ApiError {
    /// Flatten field errors into display messages, falling back to the title.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ApiError::ServerRejection {
                title,
                field_errors,
                ..
            } => rejection_messages(title, field_errors),
            other => vec![other.to_string()],
        }
    }
}

fn rejection_messages(
    title: &Option<String>,
    field_errors: &BTreeMap<String, Vec<String>>,
) -> Vec<String> {
    let flattened: Vec<String> = field_errors.values().flatten().cloned().collect();
    if !flattened.is_empty() {
        flattened
    } else {
        vec![title.clone().unwrap_or_else(|| GENERIC_REJECTION.to_string())]
    }
}

fn rejection_summary(title: &Option<String>, field_errors: &BTreeMap<String, Vec<String>>) -> String {
    rejection_messages(title, field_errors).join("; ")
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode {
                message: err.to_string(),
            }
        } else {
            ApiError::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Input rejected on the client before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("title is required")]
    EmptyTitle,

    #[error("could not understand due date '{0}'")]
    InvalidDueDate(String),

    #[error("due date must be between {min} and {max}")]
    DueDateOutOfRange { min: String, max: String },

    #[error("could not understand time '{0}' (expected HH:MM)")]
    InvalidTime(String),

    #[error("a time needs a due date")]
    TimeWithoutDate,

    #[error("enter a valid email")]
    InvalidEmail,

    #[error("password is required")]
    PasswordRequired,

    #[error("passwords must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("include at least one lowercase, uppercase, digit, and non-alphanumeric character")]
    PasswordTooWeak,
}
