use std::sync::Arc;

use anyhow::Result;
use calhook_core::AppConfig;
use calhook_provider::ProviderClient;

/// Shared application state
///
/// Everything in here is read-only after startup, so concurrent webhook
/// deliveries need no locking; each one reads the config and issues its
/// own provider calls.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub client: ProviderClient,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = ProviderClient::new(&config)?;
        Ok(AppState {
            config: Arc::new(config),
            client,
        })
    }
}
