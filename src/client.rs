//! Registered OAuth clients.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::config::ClientConfig;
use crate::crypto::{self, CryptoError, constant_time_eq};

const CLIENT_ID_BYTES: usize = 8;

/// OAuth client (third-party service).
#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    /// Internal identifier.
    pub id: String,
    /// Public OAuth `client_id`.
    pub client_id: String,
    pub client_secret: String,
    /// Display name on the login prompt.
    pub name: String,
    pub description: Option<String>,
    pub redirect_uris: BTreeSet<String>,
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Client {
    /// Create a client without identifiers, see [`ClientRegistry::register`].
    pub fn new<I, S>(name: impl Into<String>, redirect_uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: String::default(),
            client_id: String::default(),
            client_secret: String::default(),
            name: name.into(),
            description: None,
            redirect_uris: redirect_uris.into_iter().map(Into::into).collect(),
            owner_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    /// Exact string equality against the registered set. A prefix or
    /// substring match would let `https://app.com.evil.com` through.
    pub fn is_allowed_redirect(&self, candidate: &str) -> bool {
        self.redirect_uris.contains(candidate)
    }
}

impl From<ClientConfig> for Client {
    fn from(config: ClientConfig) -> Self {
        let mut client = Client::new(config.name, config.redirect_uris);
        client.client_id = config.client_id.unwrap_or_default();
        client.client_secret = config.client_secret.unwrap_or_default();
        client.description = config.description;
        client.owner_id = config.owner_id;
        client
    }
}

/// Errors raised by [`ClientRegistry`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("client `{0}` is already registered")]
    Duplicate(String),
    #[error("client registry lock poisoned")]
    Poisoned,
}

/// Clients keyed by `client_id`.
///
/// Lookups and authentication share a read lock; registration is exclusive.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, Arc<Client>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `client`, generating missing identifiers and secret.
    pub fn register(&self, mut client: Client) -> Result<Arc<Client>, RegistryError> {
        if client.client_id.is_empty() {
            client.client_id = format!("client-{}", crypto::random_hex(CLIENT_ID_BYTES)?);
        }
        if client.client_secret.is_empty() {
            client.client_secret = crypto::opaque_token()?;
        }
        if client.id.is_empty() {
            client.id = format!("client-{}", crypto::random_hex(CLIENT_ID_BYTES)?);
        }

        let mut clients = self.clients.write().map_err(|_| RegistryError::Poisoned)?;
        if clients.contains_key(&client.client_id) {
            return Err(RegistryError::Duplicate(client.client_id));
        }

        let client = Arc::new(client);
        clients.insert(client.client_id.clone(), Arc::clone(&client));
        tracing::info!(client_id = %client.client_id, name = %client.name, "client registered");

        Ok(client)
    }

    /// Find a client by its public identifier.
    pub fn lookup(&self, client_id: &str) -> Option<Arc<Client>> {
        self.clients.read().ok()?.get(client_id).cloned()
    }

    /// Resolve Basic credentials to a client. Unknown client and wrong
    /// secret are indistinguishable to the caller.
    pub fn authenticate(&self, client_id: &str, client_secret: &str) -> Option<Arc<Client>> {
        let client = self.lookup(client_id)?;

        if constant_time_eq(&client.client_secret, client_secret) {
            Some(client)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.clients.read().map(|c| c.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
