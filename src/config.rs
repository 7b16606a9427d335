//! Configuration manager for ouath.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;
use validator::{Validate, ValidationError};

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_NAME: &str = "ouath";
const DEFAULT_PORT: u16 = 8080;
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "OUATH_CONFIG";
/// Environment variable overriding the listening port.
pub const PORT_ENV: &str = "OUATH_PORT";
/// Environment variable overriding the issuer (`iss` claim).
pub const ISSUER_ENV: &str = "OUATH_ISSUER";

/// Errors that may occur during the configuration loading process.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("URL is invalid: {0}")]
    Url(#[from] url::ParseError),
    #[error("`OUATH_PORT` is not a valid port: {0}")]
    Port(#[from] std::num::ParseIntError),
    #[error("invalid client `{client}`: {errors}")]
    Client {
        client: String,
        errors: validator::ValidationErrors,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Issuer identifier, also the public base URL.
    pub url: String,
    /// TCP port to listen on.
    pub port: u16,
    #[serde(skip_deserializing)]
    pub version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to signing key configuration.
    #[serde(skip_serializing)]
    pub token: Token,
    /// Lifetimes of opaque credentials.
    pub ttl: Ttl,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
    /// Clients registered at startup.
    #[serde(skip_serializing)]
    pub clients: Vec<ClientConfig>,
    /// Resource owners allowed to log in.
    #[serde(skip_serializing)]
    pub users: Vec<UserConfig>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            url: String::default(),
            port: DEFAULT_PORT,
            version: VERSION.to_owned(),
            path: PathBuf::default(),
            token: Token::default(),
            ttl: Ttl::default(),
            argon2: None,
            clients: Vec::new(),
            users: Vec::new(),
        }
    }
}

/// Signing key configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    /// `kid` published on JWKS and set on every token header.
    pub key_id: String,
    /// RSA private key (PKCS#1 or PKCS#8 PEM). Generated at startup when
    /// absent.
    pub private_key_pem: Option<String>,
    /// Modulus size for generated keys.
    pub key_size: usize,
}

impl Default for Token {
    fn default() -> Self {
        Self {
            key_id: crate::key::DEFAULT_KID.to_owned(),
            private_key_pem: None,
            key_size: crate::key::DEFAULT_KEY_SIZE,
        }
    }
}

/// Lifetimes, in seconds.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Ttl {
    pub authorization_code: i64,
    pub refresh_token: i64,
}

impl Default for Ttl {
    fn default() -> Self {
        Self {
            authorization_code: 60 * 10,         // 10 minutes.
            refresh_token: 60 * 60 * 24 * 7, // 7 days.
        }
    }
}

impl Ttl {
    pub fn authorization_code(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.authorization_code)
    }

    pub fn refresh_token(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_token)
    }
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

fn validate_redirect_uris(uris: &[String]) -> Result<(), ValidationError> {
    for uri in uris {
        if Url::parse(uri).is_err() {
            return Err(ValidationError::new("redirect_uri")
                .with_message(format!("{uri:?} is not an absolute URL.").into()));
        }
    }

    Ok(())
}

/// Client seeded at startup.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ClientConfig {
    /// Public OAuth identifier. Generated when absent.
    #[validate(length(min = 1, max = 255))]
    pub client_id: Option<String>,
    /// Generated when absent.
    #[validate(length(min = 1))]
    pub client_secret: Option<String>,
    /// Display name shown on the login prompt.
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[validate(
        length(min = 1, message = "At least one redirect URI is required."),
        custom(function = "validate_redirect_uris")
    )]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

/// Resource owner seeded at startup.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    pub id: String,
    /// Argon2id PHC string, see `ouath-cli hash-password`.
    pub password_hash: String,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`). The trailing slash is dropped so the value can
    /// be used as `iss` verbatim.
    fn normalize_url(url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.as_str().trim_end_matches('/').to_owned())
    }

    /// Reads the `config.yaml` file from the specified path, `OUATH_CONFIG`
    /// or the default location, then applies environment overrides.
    pub fn read(self) -> Result<Arc<Self>, ConfigError> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            PathBuf::from(path)
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let config = match File::open(&file_path) {
            Ok(file) => match serde_yaml::from_reader(file) {
                Ok(config) => config,
                Err(err) => self.error(err),
            },
            Err(err) => self.error(err),
        };

        config
            .with_overrides(
                std::env::var(PORT_ENV).ok(),
                std::env::var(ISSUER_ENV).ok(),
            )
            .map(Arc::new)
    }

    /// Apply port/issuer overrides, fill the issuer fallback and validate
    /// seeded clients.
    pub fn with_overrides(
        mut self,
        port: Option<String>,
        issuer: Option<String>,
    ) -> Result<Self, ConfigError> {
        self.version = VERSION.to_owned();

        if let Some(port) = port {
            self.port = port.parse()?;
        }
        if let Some(issuer) = issuer {
            self.url = issuer;
        }
        if self.url.is_empty() {
            self.url = format!("http://localhost:{}", self.port);
        }
        self.url = Self::normalize_url(&self.url)?;

        for client in &self.clients {
            client.validate().map_err(|errors| ConfigError::Client {
                client: client.client_id.clone().unwrap_or(client.name.clone()),
                errors,
            })?;
        }

        Ok(self)
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found or invalid");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}
