//! CLI command definitions and dispatch.

pub mod config;
pub mod serve;
pub mod token;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use signalhub_core::config::AppConfig;
use signalhub_core::error::AppError;

/// SignalHub: real-time broadcast gateway
#[derive(Debug, Parser)]
#[command(name = "signalhub", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Environment overlay (e.g. `production` loads `config/production.toml`)
    #[arg(short, long)]
    pub env: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the SignalHub server
    Serve(serve::ServeArgs),
    /// Configuration management
    Config(config::ConfigArgs),
    /// Access token utilities
    Token(token::TokenArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let env = self.env.as_deref();
        match &self.command {
            Commands::Serve(args) => serve::execute(args, &self.config, env).await,
            Commands::Config(args) => config::execute(args, &self.config, env, self.format).await,
            Commands::Token(args) => token::execute(args, &self.config, env, self.format),
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str, env: Option<&str>) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path, env)
}
