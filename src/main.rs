//! Chat Auth Gateway - authentication gateway for an LLM chat completion API
//!
//! Verifies identity-provider bearer tokens and forwards chat messages.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{error, info};

use chat_auth_gateway::{
    auth::{TokenVerifier, token_from_input, unix_now},
    cli::{Cli, Command},
    client::{ChatClient, IdentityClient, SessionCache, SignUpOutcome},
    config::{self, Config},
    gateway::Gateway,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Before tracing so RUST_LOG from the file applies
    let env_file_result = config::load_env_file(&cli.env_file);

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = env_file_result {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Command::VerifyToken { token }) => run_verify_token(&config, &token),
        Some(Command::Signup { email, password }) => run_signup(&config, &email, &password).await,
        Some(Command::Chat {
            email,
            password,
            message,
            gateway_url,
        }) => run_chat(&config, &email, &password, &message, &gateway_url).await,
        Some(Command::Serve) | None => run_server(config).await,
    }
}

/// Verify a token offline and print its identity
fn run_verify_token(config: &Config, token: &str) -> ExitCode {
    let verifier = match TokenVerifier::from_config(config) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    match token_from_input(token).and_then(|token| verifier.verify(token)) {
        Ok(user) => {
            println!("✅ Token valid");
            println!("   Subject: {}", user.user_id);
            if let Some(ref email) = user.email {
                println!("   Email:   {email}");
            }
            if let Some(ref role) = user.role {
                println!("   Role:    {role}");
            }
            let remaining = user.expires_at.saturating_sub(unix_now());
            match i64::try_from(user.expires_at)
                .ok()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            {
                Some(at) => println!("   Expires: {} ({remaining}s remaining)", at.to_rfc3339()),
                None => println!("   Expires: {} ({remaining}s remaining)", user.expires_at),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Token rejected: {} ({})", e.public_message(), e.reason());
            ExitCode::FAILURE
        }
    }
}

/// Identity provider client for the client-side commands
fn identity_client(config: &Config) -> Option<IdentityClient> {
    match config
        .validate_client()
        .and_then(|()| IdentityClient::from_config(&config.identity))
    {
        Ok(c) => Some(c),
        Err(e) => {
            eprintln!("❌ {e}");
            None
        }
    }
}

/// Register an account
async fn run_signup(config: &Config, email: &str, password: &str) -> ExitCode {
    let Some(identity) = identity_client(config) else {
        return ExitCode::FAILURE;
    };

    match identity.sign_up(email, password).await {
        Ok(SignUpOutcome::SignedIn(session)) => {
            println!("✅ Account created and signed in");
            println!("   User ID: {}", session.user_id);
            ExitCode::SUCCESS
        }
        Ok(SignUpOutcome::ConfirmationRequired { user_id }) => {
            println!("✅ Account created");
            println!("   User ID: {user_id}");
            println!("   Check your email to confirm the account before signing in.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Sign-up failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Sign in, send one message, print the reply
async fn run_chat(
    config: &Config,
    email: &str,
    password: &str,
    message: &str,
    gateway_url: &str,
) -> ExitCode {
    let Some(identity) = identity_client(config) else {
        return ExitCode::FAILURE;
    };

    let session = Arc::new(SessionCache::new());
    match identity.sign_in_with_password(email, password).await {
        Ok(s) => session.set(s),
        Err(e) => {
            eprintln!("❌ Sign-in failed: {e}");
            return ExitCode::FAILURE;
        }
    }

    // Completion calls can take as long as the gateway's own upstream timeout
    let timeout = config.completion.timeout + Duration::from_secs(5);
    let chat = match ChatClient::new(gateway_url, Arc::clone(&session), timeout) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = chat.chat(message).await;
    session.clear();

    match result {
        Ok(reply) => {
            println!("{reply}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Chat failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the gateway server
async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        "Starting Chat Auth Gateway"
    );

    let gateway = match Gateway::new(config) {
        Ok(g) => g,
        Err(e) => {
            error!("Failed to create gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = gateway.run().await {
        error!("Gateway error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Gateway shutdown complete");
    ExitCode::SUCCESS
}
