use async_trait::async_trait;
use serde::Deserialize;

use super::{http, HttpError};
use crate::ledger::{Transfer, TransferFeed};

#[derive(Deserialize)]
struct TransferPage {
    #[serde(default)]
    transfers: Vec<Transfer>,
}

/// ERC-20 transfer statistics API client.
pub struct LedgerClient {
    client: reqwest::Client,
    url: String,
    chain: u64,
}

impl LedgerClient {
    pub fn new(client: reqwest::Client, config: &common::config::Ledger) -> Self {
        Self {
            client,
            url: config.url.clone(),
            chain: config.chain,
        }
    }
}

#[async_trait]
impl TransferFeed for LedgerClient {
    async fn transfers(&self, from: i64, to: i64) -> Result<Vec<Transfer>, HttpError> {
        let request = self.client.get(&self.url).query(&[
            ("chain", self.chain.to_string()),
            ("receiver", String::from("all")),
            ("from", from.to_string()),
            ("to", to.to_string()),
        ]);

        let page: TransferPage = http::json(request).await?;

        Ok(page.transfers)
    }
}
