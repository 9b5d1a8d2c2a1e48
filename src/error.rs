//! Error type shared by every layer of the adapter.
//!
//! Whatever goes wrong (bad arguments, a dropped connection, a non-2xx
//! status, a corrupt gzip stream) ends up as an [`AmplitudeError`]. Its
//! `Display` text is the single message handed back to the MCP client.

use thiserror::Error;

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, AmplitudeError>;

#[derive(Error, Debug)]
pub enum AmplitudeError {
    /// Arguments rejected before any request was built
    #[error("Validation error: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// DNS, connect, TLS or timeout failure talking to Amplitude
    #[error("{operation} request failed: {cause}")]
    Transport {
        operation: &'static str,
        cause: String,
    },

    /// Non-2xx response that has no more specific mapping
    #[error("API error: {message}")]
    Api { status: u16, message: String },

    /// Export returned 400: output for the window exceeds the export ceiling
    #[error(
        "Export failed (400): the requested time range produces more data than the Export API \
         allows (about 4GB). Reduce the time range between start and end and try again."
    )]
    ExportTooLarge,

    /// Export returned 504: the server gave up before streaming the data
    #[error(
        "Export timed out (504): the data volume is too large for the Export API. \
         Use Amplitude's bulk data destinations (Amazon S3 or Snowflake export) for large data."
    )]
    ExportTimeout,

    /// 2xx response whose body could not be decoded
    #[error("{operation}: failed to decode response: {reason}")]
    Decode {
        operation: &'static str,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AmplitudeError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AmplitudeError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        AmplitudeError::Config(msg.into())
    }

    /// Wrap a reqwest failure, keeping the whole cause chain in the message.
    pub fn transport(operation: &'static str, err: &reqwest::Error) -> Self {
        AmplitudeError::Transport {
            operation,
            cause: cause_chain(err),
        }
    }

    pub fn decode(operation: &'static str, reason: impl ToString) -> Self {
        AmplitudeError::Decode {
            operation,
            reason: reason.to_string(),
        }
    }

    /// HTTP status carried by the error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            AmplitudeError::Api { status, .. } => Some(*status),
            AmplitudeError::ExportTooLarge => Some(400),
            AmplitudeError::ExportTimeout => Some(504),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AmplitudeError::Validation { .. })
    }
}

fn cause_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = AmplitudeError::validation("start", "must match YYYYMMDD");
        assert_eq!(err.to_string(), "Validation error: start: must match YYYYMMDD");
        assert!(err.is_validation());
    }

    #[test]
    fn test_export_messages() {
        assert!(AmplitudeError::ExportTooLarge
            .to_string()
            .contains("Reduce the time range"));
        assert!(AmplitudeError::ExportTimeout
            .to_string()
            .contains("large data"));
        assert_eq!(AmplitudeError::ExportTimeout.status(), Some(504));
    }

    #[test]
    fn test_api_error_message() {
        let err = AmplitudeError::Api {
            status: 403,
            message: "Invalid API key".to_string(),
        };
        assert_eq!(err.to_string(), "API error: Invalid API key");
        assert_eq!(err.status(), Some(403));
    }
}
