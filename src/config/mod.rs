use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Where downloaded files live
    pub storage: StorageConfig,

    /// External tool settings
    pub tool: ToolConfig,

    /// Diagnostics endpoint settings
    pub diagnostics: DiagnosticsConfig,

    /// Tag placed in the `creator` field of every response
    pub creator: String,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind: String,

    /// Port to listen on
    pub port: u16,

    /// Public base URL used in `download_url` links (derived from the Host header when unset)
    pub public_url: Option<String>,

    /// Allow cross-origin requests
    pub cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Shared download directory
    pub download_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolConfig {
    /// yt-dlp executable
    pub ytdlp_path: String,

    /// Deadline for a download, in seconds
    pub download_timeout_secs: u64,

    /// Deadline for search, details and thumbnail lookups, in seconds
    pub query_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// IP geolocation service queried by `GET /`
    pub ip_info_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON log lines
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            tool: ToolConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            creator: "GiftedTech".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
            public_url: None,
            cors: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("download"),
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            download_timeout_secs: 600,
            query_timeout_secs: 60,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            ip_info_url: "https://ipinfo.io/json".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Config {
    /// Load configuration from `explicit`, the local or user config file, or defaults,
    /// then apply environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Write the default configuration to `path` unless a file is already there.
    ///
    /// Returns whether a file was written.
    pub fn write_default(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }

        Self::default().save(path)?;
        Ok(true)
    }

    /// Get configuration file path
    pub fn config_path() -> Option<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir().map(|dir| dir.join("universal-downloader-api").join("config.yaml"))
    }

    /// Override settings from `DOWNLOADER_API_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = var("DOWNLOADER_API_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = var("DOWNLOADER_API_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(public_url) = var("DOWNLOADER_API_PUBLIC_URL") {
            self.server.public_url = Some(public_url);
        }
        if let Some(dir) = var("DOWNLOADER_API_DOWNLOAD_DIR") {
            self.storage.download_dir = PathBuf::from(dir);
        }
        if let Some(ytdlp) = var("DOWNLOADER_API_YTDLP") {
            self.tool.ytdlp_path = ytdlp;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }

        if self.tool.ytdlp_path.trim().is_empty() {
            anyhow::bail!("tool.ytdlp_path must be configured");
        }

        if self.tool.download_timeout_secs == 0 || self.tool.query_timeout_secs == 0 {
            anyhow::bail!("tool timeouts must be greater than zero");
        }

        if let Some(public_url) = &self.server.public_url {
            crate::utils::normalize_base_url(public_url).context("server.public_url is invalid")?;
        }

        Ok(())
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.tool.download_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.tool.query_timeout_secs)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen Address: {}", self.bind_address());
        if let Some(public_url) = &self.server.public_url {
            println!("  Public URL: {}", public_url);
        }
        println!("  Download Directory: {}", self.storage.download_dir.display());
        println!("  yt-dlp: {}", self.tool.ytdlp_path);
        println!("  Download Timeout: {}s", self.tool.download_timeout_secs);
        println!("  Query Timeout: {}s", self.tool.query_timeout_secs);
        println!("  IP Info Service: {}", self.diagnostics.ip_info_url);
        println!("  Creator: {}", self.creator);
    }
}
