//! Serves downloaded files back as attachments.

use axum::{
    body::Body,
    extract::{rejection::PathRejection, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio_util::io::ReaderStream;

use super::{envelope, AppState};
use crate::extractors::formats::mime_for_extension;
use crate::utils::is_plain_file_name;
use crate::ApiError;

/// `GET /download/:filename` and `GET /downloads/:filename`
pub async fn serve_file(
    State(state): State<AppState>,
    filename: Result<Path<String>, PathRejection>,
) -> Response {
    let result = match filename {
        Ok(Path(filename)) => open_attachment(&state, &filename).await,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Rejected undecodable file name");
            Err(ApiError::InvalidFilename)
        }
    };

    match result {
        Ok(response) => response,
        Err(e) => envelope::failure(&state.config.creator, &e),
    }
}

async fn open_attachment(state: &AppState, filename: &str) -> Result<Response, ApiError> {
    let path = resolve(state.ytdlp.download_dir(), filename).await?;

    let file = fs::File::open(&path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => ApiError::FileNotFound,
        _ => ApiError::Internal(format!("failed to open {}: {}", path.display(), e)),
    })?;
    let metadata = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !metadata.is_file() {
        return Err(ApiError::FileNotFound);
    }

    let mime = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(mime_for_extension)
        .unwrap_or("application/octet-stream");

    tracing::debug!(path = %path.display(), size = metadata.len(), "Serving file");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime)
        .header(header::CONTENT_DISPOSITION, content_disposition(filename)?)
        .header(header::CONTENT_LENGTH, metadata.len())
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Resolve `filename` strictly inside `dir`
async fn resolve(dir: &std::path::Path, filename: &str) -> Result<PathBuf, ApiError> {
    if !is_plain_file_name(filename) {
        tracing::warn!(filename, "Rejected suspicious file name");
        return Err(ApiError::InvalidFilename);
    }

    let dir = fs::canonicalize(dir).await.map_err(|_| ApiError::FileNotFound)?;
    let path = fs::canonicalize(dir.join(filename)).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => ApiError::FileNotFound,
        _ => ApiError::Internal(e.to_string()),
    })?;

    // symlinks may still point elsewhere
    if !path.starts_with(&dir) {
        tracing::warn!(
            filename,
            target = %path.display(),
            "File resolves outside the download directory"
        );
        return Err(ApiError::InvalidFilename);
    }

    Ok(path)
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name
fn content_disposition(filename: &str) -> Result<HeaderValue, ApiError> {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    );

    HeaderValue::from_str(&value).map_err(|e| ApiError::Internal(e.to_string()))
}
