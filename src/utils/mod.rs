use std::path::Path;
use url::Url;

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Check that a requested file name is a single, visible path component.
///
/// Rejects separators, parent references and dotfiles before the name ever
/// touches the filesystem.
pub fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') {
        return false;
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    )
}

/// Base URL (scheme, host and optional port) used to build download links
pub fn normalize_base_url(url: &str) -> anyhow::Result<String> {
    let parsed = Url::parse(url).map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Check if the current environment has required tools
pub async fn check_dependencies(ytdlp_path: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(ytdlp_path).await {
        missing.push(format!(
            "{} - required for every download, search and details request",
            ytdlp_path
        ));
    }

    // ffmpeg: yt-dlp needs it to extract mp3 and merge mp4 streams
    if !check_command_available("ffmpeg").await {
        missing.push("ffmpeg - required for mp3 conversion and mp4 merging".to_string());
    }

    missing
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    // ffmpeg only understands -version
    let flag = if command.ends_with("ffmpeg") { "-version" } else { "--version" };

    Command::new(command)
        .arg(flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
        assert_eq!(format_file_size(16_777_216 * 1024), "16.0 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3661), "1h 1m 1s");
    }

    #[test]
    fn test_plain_file_names() {
        assert!(is_plain_file_name("Never Gonna Give You Up.mp3"));
        assert!(is_plain_file_name("a..b.mp4"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name(".hidden"));
        assert!(!is_plain_file_name("../secret.txt"));
        assert!(!is_plain_file_name("sub/file.mp3"));
        assert!(!is_plain_file_name("..\\win.ini"));
        assert!(!is_plain_file_name("/etc/passwd"));
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://api.example.com/").unwrap(),
            "https://api.example.com"
        );
        assert_eq!(normalize_base_url("http://localhost:5000").unwrap(), "http://localhost:5000");
        assert_eq!(
            normalize_base_url("https://example.com/media/").unwrap(),
            "https://example.com/media"
        );
        assert!(normalize_base_url("ftp://example.com").is_err());
        assert!(normalize_base_url("not-a-url").is_err());
    }

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        assert!(!check_command_available("definitely-not-installed-anywhere").await);
    }
}
