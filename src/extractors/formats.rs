use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Container the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Mp3,
    Mp4,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Mp3 => "mp3",
            MediaType::Mp4 => "mp4",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(MediaType::Mp3),
            "mp4" => Some(MediaType::Mp4),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mp3" => Ok(MediaType::Mp3),
            "mp4" => Ok(MediaType::Mp4),
            other => Err(format!("Invalid type '{}', expected mp3 or mp4", other)),
        }
    }
}

/// MIME type for a served file, guessed from its extension
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "opus" | "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// Bitrate handed to `--audio-quality`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioQuality {
    #[default]
    Kbps128,
    Kbps192,
    Kbps256,
    Kbps320,
}

impl AudioQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioQuality::Kbps128 => "128k",
            AudioQuality::Kbps192 => "192k",
            AudioQuality::Kbps256 => "256k",
            AudioQuality::Kbps320 => "320k",
        }
    }

    /// Parse a quality value; anything unrecognised (or absent) becomes 128k.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            Some("192k") => AudioQuality::Kbps192,
            Some("256k") => AudioQuality::Kbps256,
            Some("320k") => AudioQuality::Kbps320,
            _ => AudioQuality::Kbps128,
        }
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video format label as sent by clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoFormat {
    P360,
    P480,
    P720,
    P1080,
    Best,
    /// Unknown labels go to yt-dlp untouched
    Raw(String),
}

impl VideoFormat {
    pub const DEFAULT_LABEL: &'static str = "720p";

    /// Map a client label to a format; a blank label counts as absent.
    pub fn from_label(label: Option<&str>) -> Self {
        let label = label.map(str::trim).filter(|l| !l.is_empty());
        match label.unwrap_or(Self::DEFAULT_LABEL) {
            "360p" => VideoFormat::P360,
            "480p" => VideoFormat::P480,
            "720p" => VideoFormat::P720,
            "1080p" => VideoFormat::P1080,
            "best" => VideoFormat::Best,
            raw => VideoFormat::Raw(raw.to_string()),
        }
    }

    /// yt-dlp `-f` selector for this label
    pub fn selector(&self) -> String {
        match self {
            VideoFormat::P360 => "bestvideo[height<=360]+bestaudio".to_string(),
            VideoFormat::P480 => "bestvideo[height<=480]+bestaudio".to_string(),
            VideoFormat::P720 => "bestvideo[height<=720]+bestaudio".to_string(),
            VideoFormat::P1080 => "bestvideo[height<=1080]+bestaudio".to_string(),
            VideoFormat::Best => "bestvideo+bestaudio".to_string(),
            VideoFormat::Raw(raw) => raw.clone(),
        }
    }
}

/// Selector used for every audio request
pub const BEST_AUDIO: &str = "bestaudio";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_outside_set_defaults_to_128k() {
        for value in [None, Some(""), Some("64k"), Some("320"), Some("999k"), Some("320K")] {
            assert_eq!(AudioQuality::parse_or_default(value), AudioQuality::Kbps128, "{:?}", value);
        }
        assert_eq!(AudioQuality::parse_or_default(Some("192k")).as_str(), "192k");
        assert_eq!(AudioQuality::parse_or_default(Some("256k")).as_str(), "256k");
        assert_eq!(AudioQuality::parse_or_default(Some("320k")).as_str(), "320k");
    }

    #[test]
    fn test_known_labels_map_to_height_ceilings() {
        assert_eq!(
            VideoFormat::from_label(Some("1080p")).selector(),
            "bestvideo[height<=1080]+bestaudio"
        );
        assert_eq!(
            VideoFormat::from_label(Some("360p")).selector(),
            "bestvideo[height<=360]+bestaudio"
        );
        assert_eq!(VideoFormat::from_label(Some("best")).selector(), "bestvideo+bestaudio");
    }

    #[test]
    fn test_missing_label_defaults_to_720p() {
        assert_eq!(VideoFormat::from_label(None), VideoFormat::P720);
        assert_eq!(
            VideoFormat::from_label(None).selector(),
            "bestvideo[height<=720]+bestaudio"
        );
    }

    #[test]
    fn test_blank_label_defaults_to_720p() {
        assert_eq!(VideoFormat::from_label(Some("")), VideoFormat::P720);
        assert_eq!(VideoFormat::from_label(Some("   ")), VideoFormat::P720);
        assert_eq!(AudioQuality::parse_or_default(Some("")), AudioQuality::Kbps128);
    }

    #[test]
    fn test_unknown_label_passes_through() {
        let format = VideoFormat::from_label(Some("137+140"));
        assert_eq!(format, VideoFormat::Raw("137+140".to_string()));
        assert_eq!(format.selector(), "137+140");

        assert_eq!(VideoFormat::from_label(Some("worst")).selector(), "worst");
    }

    #[test]
    fn test_media_type_parsing_is_strict() {
        assert_eq!("mp3".parse::<MediaType>(), Ok(MediaType::Mp3));
        assert_eq!("mp4".parse::<MediaType>(), Ok(MediaType::Mp4));
        assert!("MP3".parse::<MediaType>().is_err());
        assert!("webm".parse::<MediaType>().is_err());
        assert!("".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for_extension("mp3"), "audio/mpeg");
        assert_eq!(mime_for_extension("MP4"), "video/mp4");
        assert_eq!(mime_for_extension("bin"), "application/octet-stream");
    }
}
