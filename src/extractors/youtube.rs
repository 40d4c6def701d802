use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::formats::{AudioQuality, MediaType, BEST_AUDIO};
use super::{ToolError, ToolRunner};
use crate::ApiError;

/// Number of results returned by a search
pub const SEARCH_LIMIT: usize = 10;

/// A file yt-dlp finished writing into the download directory
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedMedia {
    /// Canonical path of the file on disk
    pub path: PathBuf,

    /// Bare file name, as served under `/download/`
    pub file_name: String,
}

/// One search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub url: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub artist: Option<String>,
}

/// Metadata of a single video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaDetails {
    pub id: Option<String>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub uploader: Option<String>,
    /// Duration in seconds
    pub duration: Option<u64>,
    pub formats: Vec<FormatInfo>,
}

/// One downloadable stream listed by yt-dlp
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormatInfo {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    pub resolution: String,
    pub filesize: Option<u64>,
    pub vcodec: String,
    pub acodec: String,
    pub format_note: Option<String>,
}

/// yt-dlp client: shapes argument lists and reshapes the tool's output
pub struct YtDlp {
    runner: Arc<dyn ToolRunner>,
    download_dir: PathBuf,
    download_timeout: Duration,
    query_timeout: Duration,
}

impl YtDlp {
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        download_dir: impl Into<PathBuf>,
        download_timeout: Duration,
        query_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            download_dir: download_dir.into(),
            download_timeout,
            query_timeout,
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Download `url` into the shared directory and return the file yt-dlp reports.
    ///
    /// The path comes from `--print after_move:filepath`, so concurrent
    /// downloads never pick up each other's files.
    pub async fn download(
        &self,
        url: &str,
        selector: &str,
        media: MediaType,
        quality: AudioQuality,
    ) -> Result<DownloadedMedia, ApiError> {
        tracing::info!(
            program = %self.runner.program(),
            url,
            selector,
            media = %media,
            "Starting download"
        );

        let args = download_args(&self.download_dir, url, selector, media, quality);
        let output = self
            .runner
            .run(args, self.download_timeout)
            .await?
            .into_success()?;

        let printed = output.lines().last().map(str::to_string);
        let media = self.resolve_output(printed.as_deref(), media).await?;

        tracing::info!(file = %media.path.display(), "Download complete");
        Ok(media)
    }

    /// Audio download: always the best audio stream, converted to mp3
    pub async fn download_audio(
        &self,
        url: &str,
        quality: AudioQuality,
    ) -> Result<DownloadedMedia, ApiError> {
        self.download(url, BEST_AUDIO, MediaType::Mp3, quality).await
    }

    /// Thumbnail URL for `url`; any failure yields `None`
    pub async fn thumbnail(&self, url: &str) -> Option<String> {
        let args = vec![
            "--get-thumbnail".to_string(),
            "--no-playlist".to_string(),
            "--".to_string(),
            url.to_string(),
        ];

        let result = self
            .runner
            .run(args, self.query_timeout)
            .await
            .and_then(|output| output.into_success());

        match result {
            Ok(output) => output.lines().next().map(str::to_string),
            Err(e) => {
                tracing::warn!(url, error = %e, "Could not fetch thumbnail");
                None
            }
        }
    }

    /// List the first [`SEARCH_LIMIT`] matches for `query` without downloading
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ToolError> {
        tracing::debug!(query, "Searching");

        let args = vec![
            "--dump-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            "--".to_string(),
            format!("ytsearch{}:{}", SEARCH_LIMIT, query),
        ];

        let output = self.runner.run(args, self.query_timeout).await?.into_success()?;

        let mut results = Vec::new();
        for line in output.lines() {
            let entry: Value =
                serde_json::from_str(line).map_err(|e| ToolError::InvalidOutput(e.to_string()))?;
            if let Some(result) = project_search_result(&entry) {
                results.push(result);
            }
            if results.len() == SEARCH_LIMIT {
                break;
            }
        }

        Ok(results)
    }

    /// Dump the metadata of `url` without downloading
    pub async fn details(&self, url: &str) -> Result<MediaDetails, ToolError> {
        tracing::debug!(url, "Extracting video info");

        let args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--skip-download".to_string(),
            "--no-warnings".to_string(),
            "--".to_string(),
            url.to_string(),
        ];

        let output = self.runner.run(args, self.query_timeout).await?.into_success()?;
        let info: Value = serde_json::from_str(output.stdout.trim())
            .map_err(|e| ToolError::InvalidOutput(e.to_string()))?;

        Ok(project_details(&info))
    }

    /// Check the printed path really is a file of the expected type inside the download directory
    async fn resolve_output(
        &self,
        printed: Option<&str>,
        media: MediaType,
    ) -> Result<DownloadedMedia, ApiError> {
        let printed = printed.ok_or_else(|| {
            tracing::warn!("yt-dlp did not report an output path");
            ApiError::OutputMissing
        })?;

        let path = tokio::fs::canonicalize(printed).await.map_err(|e| {
            tracing::warn!(path = printed, error = %e, "Reported output path does not exist");
            ApiError::OutputMissing
        })?;
        let dir = tokio::fs::canonicalize(&self.download_dir)
            .await
            .map_err(|e| ApiError::Internal(format!("download directory unavailable: {}", e)))?;

        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);
        if !path.starts_with(&dir) || !is_file {
            tracing::warn!(
                path = %path.display(),
                "Reported output is not a file in the download directory"
            );
            return Err(ApiError::OutputMissing);
        }

        let matches_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(MediaType::from_extension)
            == Some(media);
        if !matches_type {
            tracing::warn!(
                path = %path.display(),
                expected = %media,
                "Output has an unexpected extension"
            );
            return Err(ApiError::OutputMissing);
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or(ApiError::OutputMissing)?;

        Ok(DownloadedMedia { path, file_name })
    }
}

/// Argument list for a download
pub fn download_args(
    download_dir: &Path,
    url: &str,
    selector: &str,
    media: MediaType,
    quality: AudioQuality,
) -> Vec<String> {
    let template = download_dir.join("%(title)s.%(ext)s");

    let mut args = vec![
        "-f".to_string(),
        selector.to_string(),
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
        "--no-playlist".to_string(),
        "--print".to_string(),
        "after_move:filepath".to_string(),
    ];

    match media {
        MediaType::Mp4 => {
            args.extend(["-S", "ext:mp4:m4a", "--merge-output-format", "mp4"].map(String::from));
        }
        MediaType::Mp3 => {
            args.extend(
                ["--extract-audio", "--audio-format", "mp3", "--audio-quality"].map(String::from),
            );
            args.push(quality.as_str().to_string());
        }
    }

    args.push("--".to_string());
    args.push(url.to_string());
    args
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value[key].as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

fn project_search_result(entry: &Value) -> Option<SearchResult> {
    let id = str_field(entry, "id")?;
    let title = str_field(entry, "title")?;

    let url = str_field(entry, "webpage_url")
        .or_else(|| str_field(entry, "url"))
        .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id));

    let thumbnail = str_field(entry, "thumbnail").or_else(|| {
        entry["thumbnails"]
            .as_array()
            .and_then(|thumbs| thumbs.iter().rev().find_map(|t| str_field(t, "url")))
    });

    let artist = str_field(entry, "artist")
        .or_else(|| str_field(entry, "uploader"))
        .or_else(|| str_field(entry, "channel"));

    Some(SearchResult {
        id,
        url,
        title,
        thumbnail,
        artist,
    })
}

fn project_details(info: &Value) -> MediaDetails {
    let formats = info["formats"]
        .as_array()
        .map(|formats| formats.iter().map(project_format).collect())
        .unwrap_or_default();

    MediaDetails {
        id: str_field(info, "id"),
        title: str_field(info, "title"),
        thumbnail: str_field(info, "thumbnail"),
        uploader: str_field(info, "uploader"),
        duration: info["duration"].as_f64().map(|d| d.round() as u64),
        formats,
    }
}

fn project_format(format: &Value) -> FormatInfo {
    FormatInfo {
        format_id: str_field(format, "format_id"),
        ext: str_field(format, "ext"),
        resolution: str_field(format, "resolution").unwrap_or_else(|| "audio".to_string()),
        filesize: format["filesize"]
            .as_u64()
            .or_else(|| format["filesize_approx"].as_u64()),
        vcodec: str_field(format, "vcodec").unwrap_or_else(|| "none".to_string()),
        acodec: str_field(format, "acodec").unwrap_or_else(|| "none".to_string()),
        format_note: str_field(format, "format_note"),
    }
}
