use serde::Deserialize;

use super::{http, HttpError};

#[derive(Deserialize)]
struct TokenDetails {
    market_data: MarketData,
}

#[derive(Deserialize)]
struct MarketData {
    current_price: CurrentPrice,
}

#[derive(Deserialize)]
struct CurrentPrice {
    usd: f64,
}

/// GLM token price source.
pub struct ExchangeClient {
    client: reqwest::Client,
    url: String,
}

impl ExchangeClient {
    pub fn new(client: reqwest::Client, config: &common::config::Exchange) -> Self {
        Self {
            client,
            url: config.url.clone(),
        }
    }

    /// Current price of a single GLM, in USD.
    pub async fn glm_usd(&self) -> Result<f64, HttpError> {
        let details: TokenDetails = http::json(self.client.get(&self.url)).await?;

        Ok(details.market_data.current_price.usd)
    }
}
