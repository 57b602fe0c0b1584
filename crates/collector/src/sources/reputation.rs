use std::collections::HashMap;

use serde::Deserialize;

use super::{http, HttpError};

/// Reputation of a single online provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderReputation {
    pub node_id: String,

    #[serde(default)]
    pub success_rate: Option<f64>,

    #[serde(default)]
    pub is_blacklisted_provider: bool,

    #[serde(default)]
    pub is_blacklisted_wallet: bool,
}

impl ProviderReputation {
    pub fn is_blacklisted(&self) -> bool {
        self.is_blacklisted_provider || self.is_blacklisted_wallet
    }
}

/// Provider reputation service client.
pub struct ReputationClient {
    client: reqwest::Client,
    url: String,
}

impl ReputationClient {
    pub fn new(client: reqwest::Client, config: &common::config::Reputation) -> Self {
        Self {
            client,
            url: config.url.clone(),
        }
    }

    /// Reputation of online providers, keyed by node identifier.
    pub async fn online(&self) -> Result<HashMap<String, ProviderReputation>, HttpError> {
        let providers: Vec<ProviderReputation> = http::json(self.client.get(&self.url)).await?;

        Ok(providers
            .into_iter()
            .map(|provider| (provider.node_id.clone(), provider))
            .collect())
    }
}
