//! Wiring shared by every command: configuration, HTTP client, cache and
//! mutation coordinator, built once per process.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::debug;

use crate::api::{ApiClient, TaskApi};
use crate::cache::TaskCache;
use crate::config::Config;
use crate::mutation::MutationCoordinator;

pub struct AppContext {
    pub config: Config,
    pub client: Arc<ApiClient>,
    pub cache: TaskCache,
    pub mutations: MutationCoordinator,
}

impl AppContext {
    /// Build the client, restoring the saved session if there is one.
    pub fn new(config: Config) -> Result<Self> {
        let mut client = ApiClient::new(&config.api_url, config.timeout)
            .with_context(|| format!("Invalid API URL {}", config.api_url))?;
        if let Some(cookie) = config.load_session()? {
            debug!("restoring saved session");
            client = client.with_session_cookie(&cookie);
        }
        let client = Arc::new(client);
        let api: Arc<dyn TaskApi> = client.clone();
        let cache = TaskCache::new(Arc::clone(&api));
        let mutations = MutationCoordinator::new(api, cache.clone());
        Ok(Self {
            config,
            client,
            cache,
            mutations,
        })
    }

    /// Write the client's current session cookie to disk.
    ///
    /// Returns `false` when the server did not set a cookie.
    pub fn persist_session(&self) -> Result<bool> {
        match self.client.session_cookie() {
            Some(cookie) => {
                self.config.save_session(&cookie)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
