//! Universal Downloader API - an HTTP front end for yt-dlp
//!
//! This library exposes endpoints that download audio or video from YouTube and the
//! other sites yt-dlp supports, search for media, dump metadata, and serve the
//! downloaded files back over HTTP.

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod extractors;
pub mod server;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use extractors::{ProcessRunner, ToolError, ToolOutput, ToolRunner, YtDlp};
pub use server::{build_router, AppState};

use axum::http::StatusCode;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Errors a request handler can answer with
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    MissingParameter(&'static str),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("Invalid filename")]
    InvalidFilename,

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Download Failed, File Path Not Found!")]
    OutputMissing,

    #[error("Download Failed, File Not Found")]
    FileNotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status reported both on the wire and inside the envelope
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingParameter(_)
            | ApiError::InvalidParameter(_)
            | ApiError::InvalidFilename => StatusCode::BAD_REQUEST,
            ApiError::Tool(ToolError::TimedOut { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Tool(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::OutputMissing | ApiError::FileNotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Envelope field carrying the error text.
    ///
    /// A download whose output vanished reports through `message`; everything
    /// else uses `error`.
    pub fn field(&self) -> &'static str {
        match self {
            ApiError::OutputMissing => "message",
            _ => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::MissingParameter("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidParameter("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::FileNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::OutputMissing.status_code(), StatusCode::NOT_FOUND);

        let failed = ToolError::Failed { code: Some(1), stderr: "ERROR: boom".into() };
        assert_eq!(ApiError::from(failed).status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let timed_out = ToolError::TimedOut { after: Duration::from_secs(3) };
        assert_eq!(ApiError::from(timed_out).status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_output_missing_uses_message_field() {
        assert_eq!(ApiError::OutputMissing.field(), "message");
        assert_eq!(ApiError::FileNotFound.field(), "error");
    }

    #[test]
    fn test_tool_failure_surfaces_stderr() {
        let err = ApiError::from(ToolError::Failed {
            code: Some(1),
            stderr: "ERROR: [youtube] abc: Video unavailable".into(),
        });
        assert_eq!(err.to_string(), "ERROR: [youtube] abc: Video unavailable");
    }
}
