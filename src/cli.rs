//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Authentication gateway for an LLM chat completion API
#[derive(Parser, Debug)]
#[command(name = "chat-auth-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "CHAT_GATEWAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// `.env` file to load before reading configuration
    #[arg(long, env = "CHAT_GATEWAY_ENV_FILE", default_value = ".env", global = true)]
    pub env_file: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "CHAT_GATEWAY_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "CHAT_GATEWAY_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "CHAT_GATEWAY_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "CHAT_GATEWAY_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gateway server (default)
    Serve,

    /// Verify a bearer token offline with the configured secret
    VerifyToken {
        /// The JWT (without the `Bearer ` prefix)
        #[arg(required = true)]
        token: String,
    },

    /// Register an account with the identity provider
    Signup {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(long, env = "CHAT_GATEWAY_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign in and send one message through the gateway
    Chat {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(long, env = "CHAT_GATEWAY_PASSWORD", hide_env_values = true)]
        password: String,

        /// Message to send
        #[arg(short, long)]
        message: String,

        /// Gateway base URL
        #[arg(long, env = "CHAT_GATEWAY_URL", default_value = "http://localhost:8000")]
        gateway_url: String,
    },
}
