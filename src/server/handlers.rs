use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use super::envelope::{self, DetailsPayload, DownloadPayload, SearchPayload};
use super::AppState;
use crate::diagnostics::{self, Report};
use crate::extractors::formats::BEST_AUDIO;
use crate::extractors::{AudioQuality, MediaType, VideoFormat};
use crate::utils::format_duration;
use crate::ApiError;

/// Query string shared by the media endpoints
#[derive(Debug, Default, Deserialize)]
pub struct MediaQuery {
    pub url: Option<String>,
    pub quality: Option<String>,
    pub format: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticsPayload {
    pub message: &'static str,
    pub uptime: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub report: Report,
}

/// Query extraction that never bypasses the envelope
pub type QueryParams<T> = Result<Query<T>, QueryRejection>;

fn params<T>(query: QueryParams<T>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::InvalidParameter(rejection.body_text()))
}

/// Empty or blank parameters count as missing
fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, message: &'static str) -> Result<String, ApiError> {
    optional(value).ok_or(ApiError::MissingParameter(message))
}

/// `GET /api/ytmp3`
pub async fn ytmp3(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: QueryParams<MediaQuery>,
) -> Response {
    reply(&state, audio(&state, &headers, query).await)
}

async fn audio(
    state: &AppState,
    headers: &HeaderMap,
    query: QueryParams<MediaQuery>,
) -> Result<DownloadPayload, ApiError> {
    let query = params(query)?;
    let url = required(query.url, "Youtube URL(Link) is Required")?;
    let quality = AudioQuality::parse_or_default(optional(query.quality).as_deref());

    fetch(state, headers, &url, BEST_AUDIO, MediaType::Mp3, quality).await
}

/// `GET /api/ytmp4`
pub async fn ytmp4(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: QueryParams<MediaQuery>,
) -> Response {
    reply(&state, video(&state, &headers, query).await)
}

async fn video(
    state: &AppState,
    headers: &HeaderMap,
    query: QueryParams<MediaQuery>,
) -> Result<DownloadPayload, ApiError> {
    let query = params(query)?;
    let url = required(query.url, "No URL provided")?;
    let selector = VideoFormat::from_label(optional(query.format).as_deref()).selector();

    fetch(state, headers, &url, &selector, MediaType::Mp4, AudioQuality::default()).await
}

/// `GET /api/download`: `type` is mandatory here and never defaulted
pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: QueryParams<MediaQuery>,
) -> Response {
    reply(&state, download_by_type(&state, &headers, query).await)
}

async fn download_by_type(
    state: &AppState,
    headers: &HeaderMap,
    query: QueryParams<MediaQuery>,
) -> Result<DownloadPayload, ApiError> {
    let query = params(query)?;
    let url = required(query.url, "URL is Required")?;
    let kind = required(query.kind, "Type is Required (mp3 or mp4)")?;
    let media: MediaType = kind.parse().map_err(ApiError::InvalidParameter)?;

    match media {
        MediaType::Mp3 => {
            fetch(state, headers, &url, BEST_AUDIO, media, AudioQuality::default()).await
        }
        MediaType::Mp4 => {
            let selector = VideoFormat::from_label(None).selector();
            fetch(state, headers, &url, &selector, media, AudioQuality::default()).await
        }
    }
}

/// `GET /api/ytsearch`
pub async fn search(State(state): State<AppState>, query: QueryParams<SearchQuery>) -> Response {
    reply(&state, search_results(&state, query).await)
}

async fn search_results(
    state: &AppState,
    query: QueryParams<SearchQuery>,
) -> Result<SearchPayload, ApiError> {
    let query = required(params(query)?.query, "Search query is Required")?;
    let results = state.ytdlp.search(&query).await?;

    Ok(SearchPayload { results })
}

/// `GET /api/details`
pub async fn details(State(state): State<AppState>, query: QueryParams<MediaQuery>) -> Response {
    reply(&state, media_details(&state, query).await)
}

async fn media_details(
    state: &AppState,
    query: QueryParams<MediaQuery>,
) -> Result<DetailsPayload, ApiError> {
    let url = required(params(query)?.url, "URL is Required")?;
    let result = state.ytdlp.details(&url).await?;

    Ok(DetailsPayload { result })
}

/// `GET /`: never fails, problems show up as `warning`
pub async fn diagnostics(State(state): State<AppState>) -> Response {
    let report = diagnostics::collect(
        &state.http,
        &state.config.diagnostics.ip_info_url,
        Duration::from_secs(state.config.diagnostics.timeout_secs),
    )
    .await;

    let uptime = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    envelope::success(
        &state.config.creator,
        DiagnosticsPayload {
            message: "Universal Downloader API is running",
            uptime: format_duration(uptime),
            timestamp: Utc::now(),
            report,
        },
    )
}

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Download, then look up the thumbnail and build the link to the file
async fn fetch(
    state: &AppState,
    headers: &HeaderMap,
    url: &str,
    selector: &str,
    media: MediaType,
    quality: AudioQuality,
) -> Result<DownloadPayload, ApiError> {
    let downloaded = state.ytdlp.download(url, selector, media, quality).await?;
    let thumbnail = state.ytdlp.thumbnail(url).await;

    Ok(DownloadPayload {
        thumbnail,
        download_url: format!(
            "{}/download/{}",
            state.base_url(headers),
            urlencoding::encode(&downloaded.file_name)
        ),
    })
}

fn reply<T: Serialize>(state: &AppState, result: Result<T, ApiError>) -> Response {
    match result {
        Ok(data) => envelope::success(&state.config.creator, data),
        Err(e) => envelope::failure(&state.config.creator, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_treats_blank_as_missing() {
        assert!(matches!(required(None, "m"), Err(ApiError::MissingParameter("m"))));
        assert!(matches!(
            required(Some("  ".into()), "m"),
            Err(ApiError::MissingParameter("m"))
        ));
        assert_eq!(
            required(Some("https://youtu.be/x".into()), "m").unwrap(),
            "https://youtu.be/x"
        );
    }

    #[test]
    fn test_type_query_parameter_name() {
        let query: MediaQuery = parse_query("url=https%3A%2F%2Fyoutu.be%2Fx&type=mp3");
        assert_eq!(query.kind.as_deref(), Some("mp3"));
        assert_eq!(query.url.as_deref(), Some("https://youtu.be/x"));
    }

    #[test]
    fn test_optional_drops_blank_values() {
        assert_eq!(optional(Some(String::new())), None);
        assert_eq!(optional(Some(" ".into())), None);
        assert_eq!(optional(Some("1080p".into())).as_deref(), Some("1080p"));
    }

    #[test]
    fn test_malformed_query_is_an_invalid_parameter() {
        let uri: axum::http::Uri = "/api/ytmp3?url=a&url=b".parse().unwrap();
        let result = params(Query::<MediaQuery>::try_from_uri(&uri));
        assert!(matches!(result, Err(ApiError::InvalidParameter(_))));
    }

    fn parse_query(raw: &str) -> MediaQuery {
        let uri: axum::http::Uri = format!("/api/download?{}", raw).parse().unwrap();
        params(Query::<MediaQuery>::try_from_uri(&uri)).unwrap()
    }
}
