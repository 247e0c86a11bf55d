//! Registry of opened clients.

use crate::config::DialectConfig;
use crate::core::db::Client;
use crate::core::{Result, SqlbindError};
use std::collections::HashMap;
use tracing::{error, info};

/// Every client of a [`DialectConfig`], opened and addressable by name.
#[derive(Default)]
pub struct Databases {
    clients: HashMap<String, Client>,
}

impl Databases {
    /// Opens every configured client.
    ///
    /// Fails on the first client that cannot be opened; clients opened before
    /// it are closed again.
    pub fn open(config: &DialectConfig) -> Result<Databases> {
        let mut databases = Databases::default();
        for name in config.client_names() {
            let opened = config
                .resolve(name)
                .ok_or_else(|| SqlbindError::Config(format!("unknown client `{}`", name)))
                .and_then(|options| Client::open(name, &options));

            match opened {
                Ok(client) => databases.insert(client),
                Err(e) => {
                    error!(client = name, "failed to open client: {}", e);
                    // The opening error is the one worth reporting.
                    let _ = databases.close();
                    return Err(e);
                }
            }
        }
        Ok(databases)
    }

    /// Opens a single configured client.
    pub fn open_client(config: &DialectConfig, name: &str) -> Result<Client> {
        let options = config
            .resolve(name)
            .ok_or_else(|| SqlbindError::Config(format!("unknown client `{}`", name)))?;
        Client::open(name, &options)
    }

    /// Registers an already opened client under its name.
    pub fn insert(&mut self, client: Client) {
        self.clients.insert(client.name().to_string(), client);
    }

    pub fn client(&self, name: &str) -> Option<&Client> {
        self.clients.get(name)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Closes every client, stopping at the first failure.
    pub fn close(&mut self) -> Result<()> {
        for (name, client) in self.clients.drain() {
            if let Err(e) = client.close() {
                info!(client = %name, "close db error: {}", e);
                return Err(e);
            }
        }
        Ok(())
    }
}
