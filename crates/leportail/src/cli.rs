// CLI Interface
//
// This module provides the command-line interface for dockerfile-ai.

use crate::config::{default_config_path, sample_config, AppConfig, ConfigOverrides};
use crate::logging::init_logging;
use crate::mcp::{run_stdio, McpServer, McpServerConfig, McpState};
use crate::review::{DockerfileReview, ReviewOptions, ReviewService};
use anyhow::{Context, Result as AnyhowResult};
use clap::{Parser, Subcommand};
use lerelais::{format_error, RelaisError};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// dockerfile-ai - AI review of Dockerfiles with a local Ollama model
#[derive(Parser, Debug)]
#[command(name = "dockerfile-ai")]
#[command(author = "dockerfile-ai Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Review Dockerfiles for security, best practices and size with a local LLM", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.dockerfileai.toml)
    #[arg(global = true, long = "config", short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(global = true, long = "verbose", short = 'v')]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a Dockerfile and suggest a corrected version
    Analyze {
        /// Path to the Dockerfile
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Model to use instead of the configured one
        #[arg(long = "model", short = 'm')]
        model: Option<String>,

        /// Print only the corrected Dockerfile
        #[arg(long = "copy")]
        copy: bool,

        /// Do not save the analysis or corrected Dockerfile
        #[arg(long = "no-save")]
        no_save: bool,

        /// Skip the connection and model checks
        #[arg(long = "skip-preflight")]
        skip_preflight: bool,
    },

    /// Start the MCP server over HTTP
    Serve {
        /// Host address to bind to
        #[arg(long = "host", default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long = "port", default_value = "3000")]
        port: u16,
    },

    /// Run the MCP server on stdin/stdout (for AI tool subprocess integration)
    Mcp,

    /// Inspect or create the configuration file
    Config {
        /// Configuration action
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `config` subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Write a commented sample configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long = "force")]
        force: bool,
    },
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
}

impl Cli {
    /// Run the CLI
    pub async fn run(self) -> AnyhowResult<()> {
        let config_path = self.config.clone().or_else(default_config_path);

        if let Commands::Config { action } = &self.command {
            return cmd_config_impl(action, config_path.as_deref());
        }

        let mut config = AppConfig::load(self.config.as_deref())?;
        let mut overrides = ConfigOverrides {
            verbose: self.verbose.then_some(true),
            ..Default::default()
        };
        if let Commands::Analyze {
            model,
            copy,
            no_save,
            ..
        } = &self.command
        {
            overrides.model = model.clone();
            overrides.copy_mode = copy.then_some(true);
            overrides.save_results = no_save.then_some(false);
        }
        config.apply_overrides(&overrides);
        config.validate()?;

        if let Some(log_file) = init_logging(&config.logging)? {
            debug!("Logging to {}", log_file.display());
        }

        match self.command {
            Commands::Analyze {
                path,
                skip_preflight,
                ..
            } => cmd_analyze_impl(&config, &path, skip_preflight).await,
            Commands::Serve { host, port } => cmd_serve_impl(&config, &host, port).await,
            Commands::Mcp => cmd_mcp_stdio_impl(&config).await,
            Commands::Config { .. } => Ok(()),
        }
    }
}

/// Analyze command implementation
async fn cmd_analyze_impl(config: &AppConfig, path: &Path, skip_preflight: bool) -> AnyhowResult<()> {
    let service = ReviewService::from_config(config)?;

    if skip_preflight {
        debug!("Skipping preflight checks");
    } else {
        service.client().preflight().await?;
    }

    let options = ReviewOptions {
        model: None,
        save: config.output.save_analysis || config.output.save_dockerfile,
    };
    let review = service.review(path, &options).await?;

    print_review(&review, config.output.copy_mode)?;
    Ok(())
}

fn print_review(review: &DockerfileReview, copy_mode: bool) -> AnyhowResult<()> {
    if copy_mode {
        let dockerfile = review.corrected_dockerfile.as_deref().ok_or_else(|| {
            RelaisError::validation_error("No corrected Dockerfile found in the analysis")
        })?;
        println!("{}", dockerfile);
    } else {
        println!("{}", review.analysis);
    }

    if let Some(path) = &review.saved.analysis {
        eprintln!("Analysis saved to: {}", path.display());
    }
    if let Some(path) = &review.saved.dockerfile {
        eprintln!("Corrected Dockerfile saved to: {}", path.display());
    }
    if review.corrected_dockerfile.is_none() {
        warn!("The analysis did not contain a corrected Dockerfile");
    }
    Ok(())
}

/// Serve command implementation
async fn cmd_serve_impl(config: &AppConfig, host: &str, port: u16) -> AnyhowResult<()> {
    let bind_address = resolve_bind_address(host, port).await?;

    let service = ReviewService::from_config(config)?;
    let server_config = McpServerConfig {
        bind_address,
        ..Default::default()
    };

    info!("Starting dockerfile-ai MCP server on http://{}", bind_address);
    McpServer::new(server_config, service).run().await
}

/// Resolve `host:port`, accepting IP literals and host names
pub async fn resolve_bind_address(host: &str, port: u16) -> AnyhowResult<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Invalid bind address {}:{}", host, port))?
        .next()
        .with_context(|| format!("No address found for {}:{}", host, port))
}

/// MCP stdio command implementation
async fn cmd_mcp_stdio_impl(config: &AppConfig) -> AnyhowResult<()> {
    let service = ReviewService::from_config(config)?;
    let timeout = Duration::from_secs(McpServerConfig::default().request_timeout_secs);
    let state = McpState::new(service, timeout);

    info!("dockerfile-ai MCP stdio server starting");
    run_stdio(&state).await
}

/// Config command implementation
fn cmd_config_impl(action: &ConfigAction, path: Option<&Path>) -> AnyhowResult<()> {
    let path = path.context("Cannot determine the home directory; pass --config")?;

    match action {
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Show => {
            let config = AppConfig::load(Some(path))?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
            println!("{}", rendered);
        }
        ConfigAction::Init { force } => {
            write_sample_config(path, *force)?;
            println!("Configuration written to {}", path.display());
        }
    }
    Ok(())
}

/// Write the sample configuration, refusing to overwrite unless `force`
pub fn write_sample_config(path: &Path, force: bool) -> AnyhowResult<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }
    fs::write(path, sample_config())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    Ok(())
}

/// Render an error for the terminal
///
/// Relay errors get their recovery suggestion; anything else prints its
/// context chain.
pub fn report_error(error: &anyhow::Error) -> String {
    match error.downcast_ref::<RelaisError>() {
        Some(relay) => format_error(relay),
        None => format!("Error: {:#}", error),
    }
}

/// Main entry point for the CLI
pub async fn main() -> AnyhowResult<()> {
    let cli = Cli::parse();
    cli.run().await
}
