//! Error types for control-plane operations.
//!
//! Errors are categorized so callers can tell "could not ask" apart from
//! "asked and was refused", and so read calls know what is worth retrying.

use thiserror::Error;

/// Categories of control-plane errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Remote unreachable or client tool missing (transient or environmental)
    Unavailable,
    /// Credentials missing, expired or rejected
    Unauthenticated,
    /// The addressed scope or resource does not exist
    NotFound,
    /// The call exceeded its deadline
    Timeout,
    /// The remote answer could not be understood
    Parse,
    /// The remote understood the request and refused it
    Rejected,
    /// A required local setting is missing
    Misconfigured,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Timeout)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unavailable => "Remote control plane unavailable",
            Self::Unauthenticated => "Not authenticated",
            Self::NotFound => "Not found",
            Self::Timeout => "Timed out",
            Self::Parse => "Unreadable response",
            Self::Rejected => "Request rejected",
            Self::Misconfigured => "Missing configuration",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors that can occur while talking to a control plane.
#[derive(Debug, Error)]
pub enum Error {
    /// The client executable is not installed or not in PATH
    #[error("{tool} not found in PATH")]
    ToolNotFound { tool: String },

    /// Network or service failure
    #[error("{tool} could not reach the remote: {message}")]
    Unavailable { tool: String, message: String },

    /// Authentication failure
    #[error("{tool} is not authenticated: {message}")]
    Unauthenticated { tool: String, message: String },

    /// Scope or resource missing remotely
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Command killed after its deadline
    #[error("`{command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    /// Output could not be parsed
    #[error("could not parse {what}: {message}")]
    Parse { what: String, message: String },

    /// Command ran and failed
    #[error("{message}: {stderr}")]
    Rejected { message: String, stderr: String },

    /// A setting needed for this call is absent
    #[error("{setting} is not configured")]
    MissingSetting { setting: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ToolNotFound { .. } | Error::Unavailable { .. } => ErrorCategory::Unavailable,
            Error::Unauthenticated { .. } => ErrorCategory::Unauthenticated,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Parse { .. } => ErrorCategory::Parse,
            Error::Rejected { .. } => ErrorCategory::Rejected,
            Error::MissingSetting { .. } => ErrorCategory::Misconfigured,
            Error::Io(_) | Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    pub fn parse(what: impl Into<String>, message: impl ToString) -> Self {
        Error::Parse {
            what: what.into(),
            message: message.to_string(),
        }
    }

    /// Create an error from a failed CLI invocation.
    ///
    /// Analyzes stderr to categorize the error appropriately.
    pub fn from_cli_output(tool: &str, stderr: &str, subject: Option<&str>) -> Self {
        let stderr_lower = stderr.to_lowercase();
        let message = stderr.trim().to_string();

        // Authentication errors
        if stderr_lower.contains("unauthorized")
            || stderr_lower.contains("unable to authenticate")
            || stderr_lower.contains("access token")
            || stderr_lower.contains("not logged in")
            || stderr_lower.contains("auth init")
            || stderr_lower.contains("supabase login")
            || stderr_lower.contains("401")
            || stderr_lower.contains("403")
        {
            return Error::Unauthenticated {
                tool: tool.to_string(),
                message,
            };
        }

        // Network errors
        if stderr_lower.contains("could not resolve")
            || stderr_lower.contains("no such host")
            || stderr_lower.contains("connection refused")
            || stderr_lower.contains("connection reset")
            || stderr_lower.contains("timed out")
            || stderr_lower.contains("timeout")
            || stderr_lower.contains("network")
            || stderr_lower.contains("dial tcp")
            || stderr_lower.contains("tls")
            || stderr_lower.contains("503")
            || stderr_lower.contains("502")
        {
            return Error::Unavailable {
                tool: tool.to_string(),
                message,
            };
        }

        // Not found errors
        if stderr_lower.contains("not found")
            || stderr_lower.contains("404")
            || stderr_lower.contains("does not exist")
            || stderr_lower.contains("could not find")
        {
            return Error::NotFound {
                what: subject.unwrap_or(tool).to_string(),
            };
        }

        // Default to rejected
        Error::Rejected {
            message: format!(
                "{tool} command failed{}",
                subject.map(|s| format!(" for {s}")).unwrap_or_default()
            ),
            stderr: message,
        }
    }
}

/// Result type for control-plane operations.
pub type Result<T> = std::result::Result<T, Error>;
