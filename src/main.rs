use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use universal_downloader_api::cli::{Cli, Commands};
use universal_downloader_api::config::Config;
use universal_downloader_api::{server, utils};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `config` without `--show` only writes defaults, so it never needs the effective config
    let writing_defaults = matches!(cli.command, Commands::Config { show: false });
    let mut config = if writing_defaults {
        Config::default()
    } else {
        Config::load(cli.config.as_deref())?
    };
    init_tracing(cli.verbose, cli.log_json || config.logging.json);

    match cli.command {
        Commands::Serve {
            bind,
            port,
            download_dir,
        } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(dir) = download_dir {
                config.storage.download_dir = dir;
            }
            config.validate()?;

            // Check for required external dependencies (non-fatal in Docker)
            let missing_deps = utils::check_dependencies(&config.tool.ytdlp_path).await;
            for dep in &missing_deps {
                tracing::warn!(dependency = %dep, "Dependency check warning (continuing anyway)");
            }

            server::serve(config).await?;
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = match cli.config {
                    Some(path) => path,
                    None => Config::config_path()
                        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?,
                };
                if Config::write_default(&path)? {
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("Configuration already exists at: {}", path.display());
                }
            }
        }
        Commands::Check => {
            let missing_deps = utils::check_dependencies(&config.tool.ytdlp_path).await;
            if missing_deps.is_empty() {
                println!("All dependencies available.");
            } else {
                println!("Missing dependencies:");
                for dep in &missing_deps {
                    println!("  • {}", dep);
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "universal_downloader_api=debug,tower_http=debug"
    } else {
        "universal_downloader_api=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
