//! Reference instance pricing catalog.
//!
//! Products are listed page by page and every product has its own price list
//! sub-resource. The catalog is rate limited, a `429` response carries the
//! reset time in the [`RATE_LIMIT_RESET`](super::http::RATE_LIMIT_RESET) header.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{http, HttpError, NotConfigured};
use crate::retry::RetryPolicy;

const SERVICE_ID: &str = "aws-ec2";

/// Upper limit of listed pages, guarding against cyclic `next` links.
const MAX_PAGES: usize = 1000;

#[derive(Debug, Deserialize)]
struct ProductPage {
    #[serde(default)]
    products: Vec<Product>,

    #[serde(default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Product {
    id: String,
    name: String,

    #[serde(default)]
    details: ProductDetails,
}

#[derive(Debug, Default, Deserialize)]
struct ProductDetails {
    vcpu: Option<Value>,
    memory: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PriceList {
    #[serde(default)]
    prices: Vec<Price>,
}

#[derive(Debug, Deserialize)]
struct Price {
    amount: Value,
}

/// Numeric catalog value, which may be encoded as a string.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(num) => num.as_f64(),
        Value::String(val) => val.trim().parse().ok(),
        _ => None,
    }
}

/// Priced catalog instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogInstance {
    pub name: String,
    pub vcpu: i32,
    pub memory: f64,
    pub price_usd: f64,
}

/// Lowest hourly price of a product price list.
fn lowest_price(prices: &[Price]) -> Option<f64> {
    prices
        .iter()
        .filter_map(|price| number(&price.amount))
        .filter(|price| *price > 0.0)
        .min_by(f64::total_cmp)
}

/// Reference pricing catalog client.
pub struct CatalogClient {
    client: reqwest::Client,
    url: String,
    key: String,
    retry: RetryPolicy,
}

impl CatalogClient {
    pub fn new(
        client: reqwest::Client,
        config: &common::config::Catalog,
        retry: RetryPolicy,
    ) -> Result<Self, NotConfigured> {
        let key = config
            .key
            .clone()
            .ok_or_else(|| NotConfigured::new("catalog"))?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_owned(),
            key,
            retry,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        self.retry
            .run(url, || {
                http::json(
                    self.client
                        .get(url)
                        .bearer_auth(&self.key)
                        .header(reqwest::header::ACCEPT, "application/json"),
                )
            })
            .await
    }

    /// List every priced catalog instance.
    ///
    /// Products without specification details or without prices are skipped.
    pub async fn instances(&self) -> Result<Vec<CatalogInstance>, HttpError> {
        let mut next = Some(format!("{}/products?service_id={SERVICE_ID}", self.url));
        let mut instances = Vec::new();
        let mut pages = 0;

        while let Some(url) = next.take() {
            let page: ProductPage = self.get(&url).await?;

            for product in page.products {
                let (Some(vcpu), Some(memory)) = (
                    product.details.vcpu.as_ref().and_then(number),
                    product.details.memory.as_ref().and_then(number),
                ) else {
                    debug!(product = %product.name, "skipping product without specification");
                    continue;
                };

                let prices: PriceList = self
                    .get(&format!("{}/products/{}/prices", self.url, product.id))
                    .await?;

                let Some(price_usd) = lowest_price(&prices.prices) else {
                    debug!(product = %product.name, "skipping product without prices");
                    continue;
                };

                instances.push(CatalogInstance {
                    name: product.name,
                    vcpu: vcpu as i32,
                    memory,
                    price_usd,
                });
            }

            pages += 1;

            if pages < MAX_PAGES {
                next = page.links.next;
            }
        }

        Ok(instances)
    }
}
