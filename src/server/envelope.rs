//! The JSON envelope every endpoint answers with.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::extractors::{MediaDetails, SearchResult};
use crate::ApiError;

/// `{status, success, creator, ...}` with endpoint-specific fields flattened in
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: u16,
    pub success: bool,
    pub creator: String,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct DownloadPayload {
    pub thumbnail: Option<String>,
    pub download_url: String,
}

#[derive(Debug, Serialize)]
pub struct SearchPayload {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
pub struct DetailsPayload {
    pub result: MediaDetails,
}

/// Render a successful envelope; the HTTP status always matches the body's
pub fn success<T: Serialize>(creator: &str, data: T) -> Response {
    let envelope = Envelope {
        status: StatusCode::OK.as_u16(),
        success: true,
        creator: creator.to_string(),
        data,
    };

    (StatusCode::OK, Json(envelope)).into_response()
}

/// Render an error envelope
pub fn failure(creator: &str, error: &ApiError) -> Response {
    let status = error.status_code();
    if status.is_server_error() {
        tracing::error!(error = %error, status = status.as_u16(), "Request failed");
    } else {
        tracing::debug!(error = %error, status = status.as_u16(), "Request rejected");
    }

    let mut data = Map::new();
    data.insert(error.field().to_string(), Value::String(error.to_string()));

    let envelope = Envelope {
        status: status.as_u16(),
        success: false,
        creator: creator.to_string(),
        data,
    };

    (status, Json(envelope)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_flattens_payload() {
        let envelope = Envelope {
            status: 200,
            success: true,
            creator: "GiftedTech".to_string(),
            data: DownloadPayload {
                thumbnail: None,
                download_url: "http://localhost:5000/download/a.mp3".to_string(),
            },
        };

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "status": 200,
                "success": true,
                "creator": "GiftedTech",
                "thumbnail": null,
                "download_url": "http://localhost:5000/download/a.mp3"
            })
        );
    }

    #[test]
    fn test_failure_status_matches_body() {
        let response = failure("GiftedTech", &ApiError::MissingParameter("No URL provided"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = failure("GiftedTech", &ApiError::OutputMissing);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
