use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "downloader-api",
    about = "Universal Downloader API - Download audio and video from YouTube and more over HTTP",
    version,
    long_about = "An HTTP API that downloads media through yt-dlp, searches YouTube, \
                  dumps video metadata and serves the downloaded files back to clients."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./config.yaml or the user config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind
        #[arg(short, long, value_name = "ADDR")]
        bind: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory where downloads are written and served from
        #[arg(short, long, value_name = "DIR")]
        download_dir: Option<PathBuf>,
    },

    /// Show or initialise the configuration
    Config {
        /// Show current configuration instead of writing the default file
        #[arg(short, long)]
        show: bool,
    },

    /// Check that yt-dlp and ffmpeg are installed
    Check,
}
