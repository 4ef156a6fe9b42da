//! Configuration management

use std::{env, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// Prefix for gateway-specific environment variables (`CHAT_GATEWAY_SERVER__PORT`).
pub const ENV_PREFIX: &str = "CHAT_GATEWAY_";

/// Environment variable names used by existing deployments, mapped onto
/// configuration keys.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("SUPABASE_URL", "identity.url"),
    ("SUPABASE_KEY", "identity.public_key"),
    ("SUPABASE_JWT_SECRET", "auth.jwt_secret"),
    ("OPENAI_API_KEY", "completion.api_key"),
    ("ALLOWED_ORIGINS", "cors.allowed_origins"),
];

/// String-typed keys that must never go through `Env` value parsing.
const STRING_KEYS: &[&str] = &[
    "server.host",
    "identity.url",
    "identity.public_key",
    "auth.jwt_secret",
    "auth.audience",
    "auth.issuer",
    "completion.api_key",
    "completion.base_url",
    "completion.model",
    "completion.system_prompt",
];

/// Non-empty value of an environment variable
fn env_string(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.is_empty())
}

/// `auth.jwt_secret` -> `CHAT_GATEWAY_AUTH__JWT_SECRET`
fn prefixed_var(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace('.', "__").to_ascii_uppercase())
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Identity provider the clients sign in against
    pub identity: IdentityConfig,
    /// Token verification configuration
    pub auth: AuthConfig,
    /// Completion API configuration
    pub completion: CompletionConfig,
    /// Cross-origin request policy
    pub cors: CorsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_size: 64 * 1024,
        }
    }
}

/// Identity provider configuration.
///
/// The gateway never calls the provider itself; these values are handed to
/// the client library and used to derive the expected token issuer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    /// Provider base URL (e.g. `https://<project>.supabase.co`)
    pub url: Option<String>,
    /// Provider public (anon) key, sent as the `apikey` header.
    /// Supports literal value or `env:VAR_NAME`.
    pub public_key: Option<String>,
}

impl IdentityConfig {
    /// Resolve the public key (expand `env:` indirection)
    #[must_use]
    pub fn resolve_public_key(&self) -> Option<String> {
        resolve_secret(self.public_key.as_deref())
    }

    /// Provider URL without a trailing slash
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .filter(|u| !u.is_empty())
    }
}

/// Token verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HS256 signing secret.
    /// Supports literal value or `env:VAR_NAME`.
    pub jwt_secret: Option<String>,
    /// Audience every accepted token must carry
    pub audience: String,
    /// Expected `iss` claim. Unchecked when unset.
    pub issuer: Option<String>,
    /// Derive the expected issuer as `{identity.url}/auth/v1` when `issuer` is unset
    pub issuer_from_identity: bool,
    /// Clock skew tolerance applied to `exp`, in seconds
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            audience: "authenticated".to_string(),
            issuer: None,
            issuer_from_identity: false,
            leeway_secs: 0,
        }
    }
}

impl AuthConfig {
    /// Resolve the signing secret (expand `env:` indirection)
    #[must_use]
    pub fn resolve_jwt_secret(&self) -> Option<String> {
        resolve_secret(self.jwt_secret.as_deref())
    }
}

/// Completion API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// API credential. Supports literal value or `env:VAR_NAME`.
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    /// Model name
    pub model: String,
    /// System message prepended to every prompt
    pub system_prompt: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens in a reply
    pub max_tokens: u32,
    /// Outbound request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout: Duration::from_secs(60),
        }
    }
}

impl CompletionConfig {
    /// Resolve the API key (expand `env:` indirection)
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret(self.api_key.as_deref())
    }
}

/// Cross-origin request policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to call the API with credentials.
    /// Accepts a YAML list or a comma-separated string.
    #[serde(deserialize_with = "deserialize_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8000".to_string(),
            ],
        }
    }
}

fn deserialize_origins<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Origins {
        List(Vec<String>),
        Csv(String),
    }

    let raw = match Origins::deserialize(deserializer)? {
        Origins::List(list) => list,
        Origins::Csv(csv) => csv.split(',').map(str::to_string).collect(),
    };

    Ok(raw
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect())
}

/// Resolve a secret value: `env:VAR_NAME` reads the variable, anything else
/// is taken literally. Empty values resolve to `None`.
fn resolve_secret(value: Option<&str>) -> Option<String> {
    let value = value?;
    let resolved = match value.strip_prefix("env:") {
        Some(var_name) => env::var(var_name).ok()?,
        None => value.to_string(),
    };
    (!resolved.is_empty()).then_some(resolved)
}

impl Config {
    /// Load configuration from defaults, an optional YAML file and environment.
    ///
    /// Does not check that required values are present; see
    /// [`Config::validate_server`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = Self::figment(path)?;

        // First pass only to discover env_files; they may feed the second pass.
        let env_files: Vec<String> = base
            .extract_inner("env_files")
            .unwrap_or_default();
        load_env_files(&env_files);

        Self::figment(path)?
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Taken verbatim; `Env` would parse `1234567890` into an integer
        for &(var, key) in LEGACY_ENV_KEYS {
            if let Some(value) = env_string(var) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }

        // Prefixed variables win over legacy names
        figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .split("__")
                .filter(|k| !STRING_KEYS.iter().any(|s| k.as_str().eq_ignore_ascii_case(s))),
        );
        for key in STRING_KEYS {
            if let Some(value) = env_string(&prefixed_var(key)) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }

        Ok(figment)
    }

    /// Check everything `serve` needs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] listing every missing or invalid value.
    pub fn validate_server(&self) -> Result<()> {
        let mut problems = Vec::new();

        match self.identity.base_url() {
            None => problems.push("identity.url is required (SUPABASE_URL)".to_string()),
            Some(u) => {
                if let Err(e) = url::Url::parse(u) {
                    problems.push(format!("identity.url is not a valid URL: {e}"));
                }
            }
        }
        if self.identity.resolve_public_key().is_none() {
            problems.push("identity.public_key is required (SUPABASE_KEY)".to_string());
        }
        if self.auth.resolve_jwt_secret().is_none() {
            problems.push("auth.jwt_secret is required (SUPABASE_JWT_SECRET)".to_string());
        }
        if self.auth.audience.is_empty() {
            problems.push("auth.audience must not be empty".to_string());
        }
        if self.completion.resolve_api_key().is_none() {
            problems.push("completion.api_key is required (OPENAI_API_KEY)".to_string());
        }
        if let Err(e) = url::Url::parse(&self.completion.base_url) {
            problems.push(format!("completion.base_url is not a valid URL: {e}"));
        }
        for origin in &self.cors.allowed_origins {
            if origin == "*" {
                problems.push("cors.allowed_origins cannot contain '*'".to_string());
            } else if axum::http::HeaderValue::from_str(origin).is_err() {
                problems.push(format!("cors.allowed_origins contains invalid origin '{origin}'"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(problems.join("; ")))
        }
    }

    /// Check what the client commands need (identity provider access).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the identity URL or public key is missing.
    pub fn validate_client(&self) -> Result<()> {
        if self.identity.base_url().is_none() {
            return Err(Error::Config("identity.url is required (SUPABASE_URL)".to_string()));
        }
        if self.identity.resolve_public_key().is_none() {
            return Err(Error::Config(
                "identity.public_key is required (SUPABASE_KEY)".to_string(),
            ));
        }
        Ok(())
    }

    /// The issuer tokens must carry, if issuer checking is enabled
    #[must_use]
    pub fn expected_issuer(&self) -> Option<String> {
        if let Some(issuer) = self.auth.issuer.as_ref().filter(|i| !i.is_empty()) {
            return Some(issuer.clone());
        }
        if self.auth.issuer_from_identity {
            return self.identity.base_url().map(|u| format!("{u}/auth/v1"));
        }
        None
    }
}

/// Load a single `.env` file into the process environment.
///
/// Existing variables are not overridden.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file exists but cannot be parsed.
pub fn load_env_file(path: &Path) -> Result<bool> {
    if !path.exists() {
        tracing::debug!("Env file not found (skipped): {}", path.display());
        return Ok(false);
    }
    dotenvy::from_path(path)
        .map_err(|e| Error::Config(format!("Failed to load env file {}: {e}", path.display())))?;
    tracing::info!("Loaded env file: {}", path.display());
    Ok(true)
}

/// Load environment files into the process environment.
/// Supports ~ expansion. Files that don't exist or fail to parse are skipped.
fn load_env_files(paths: &[String]) {
    for path_str in paths {
        let expanded = expand_home(path_str);
        if let Err(e) = load_env_file(Path::new(&expanded)) {
            tracing::warn!("{e}");
        }
    }
}

fn expand_home(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.display().to_string(), 1);
        }
    }
    path.to_string()
}
