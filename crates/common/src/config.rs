use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

#[cfg(feature = "logging")]
use tracing_subscriber::filter::LevelFilter;

/// Database configuration.
#[derive(Deserialize)]
pub struct Database {
    /// Database URL string.
    pub url: String,
}

/// Implementation of [`serde`]'s deserializer for [`FromStr`] types.
#[cfg(feature = "logging")]
fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error,
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

/// Logging configuration.
#[cfg(feature = "logging")]
#[derive(Deserialize)]
pub struct Logging {
    /// Log level.
    #[serde(deserialize_with = "deserialize_from_str")]
    pub level: LevelFilter,
}

#[cfg(feature = "logging")]
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
        }
    }
}

/// Market API configuration of a local requestor daemon.
#[derive(Deserialize)]
pub struct Market {
    /// Base URL of the daemon REST API.
    #[serde(default = "default_market_url")]
    pub url: String,

    /// Application key used to authenticate against the daemon.
    ///
    /// Market scans are disabled when no key is provided.
    #[serde(default)]
    pub key: Option<String>,

    /// Subnets that are scanned for offers.
    #[serde(default = "default_subnets")]
    pub subnets: Vec<String>,

    /// Wall-clock limit of a single subnet scan, in seconds.
    #[serde(default = "default_scan_timeout")]
    pub timeout: u64,
}

impl Default for Market {
    fn default() -> Self {
        Self {
            url: default_market_url(),
            key: None,
            subnets: default_subnets(),
            timeout: default_scan_timeout(),
        }
    }
}

fn default_market_url() -> String {
    String::from("http://127.0.0.1:7465")
}

fn default_subnets() -> Vec<String> {
    vec![String::from("public")]
}

fn default_scan_timeout() -> u64 {
    60
}

/// Relay server configuration.
#[derive(Deserialize)]
pub struct Relay {
    /// Base URL used for node listing by hex prefix.
    #[serde(default = "default_relay_url")]
    pub url: String,

    /// Streaming endpoints that emit `new-node` and `lost-node` events.
    #[serde(default = "default_relay_events")]
    pub events: Vec<String>,

    /// Delay between reconnection attempts, in seconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect: u64,
}

impl Default for Relay {
    fn default() -> Self {
        Self {
            url: default_relay_url(),
            events: default_relay_events(),
            reconnect: default_reconnect_delay(),
        }
    }
}

fn default_relay_url() -> String {
    String::from("http://yacn2.dev.golem.network:9000")
}

fn default_relay_events() -> Vec<String> {
    vec![
        String::from("http://yacn2.dev.golem.network:9000/events"),
        String::from("http://yacn2a.dev.golem.network:9000/events"),
    ]
}

fn default_reconnect_delay() -> u64 {
    5
}

/// Reference instance catalog configuration.
#[derive(Deserialize)]
pub struct Catalog {
    /// Base URL of the catalog API.
    #[serde(default = "default_catalog_url")]
    pub url: String,

    /// Catalog API key.
    ///
    /// Catalog synchronization is disabled when no key is provided.
    #[serde(default)]
    pub key: Option<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            key: None,
        }
    }
}

fn default_catalog_url() -> String {
    String::from("https://api.vantage.sh/v2")
}

/// GLM exchange rate source configuration.
#[derive(Deserialize)]
pub struct Exchange {
    /// Token details URL, which must contain the current USD price.
    #[serde(default = "default_exchange_url")]
    pub url: String,
}

impl Default for Exchange {
    fn default() -> Self {
        Self {
            url: default_exchange_url(),
        }
    }
}

fn default_exchange_url() -> String {
    String::from(
        "https://api.coingecko.com/api/v3/coins/ethereum/contract/0x7DD9c5Cba05E151C895FDe1CF355C9A1D5DA6429",
    )
}

/// Provider reputation service configuration.
#[derive(Deserialize)]
pub struct Reputation {
    /// URL that lists reputation of all online providers.
    #[serde(default = "default_reputation_url")]
    pub url: String,
}

impl Default for Reputation {
    fn default() -> Self {
        Self {
            url: default_reputation_url(),
        }
    }
}

fn default_reputation_url() -> String {
    String::from("https://reputation.golem.network/stats/providers/online")
}

/// Network metrics backend configuration.
#[derive(Deserialize, Default)]
pub struct Metrics {
    /// Base URL of a Prometheus-compatible range query endpoint.
    ///
    /// Tasks that depend on network metrics are disabled when no URL is provided.
    #[serde(default)]
    pub url: Option<String>,
}

/// Transaction ledger configuration.
#[derive(Deserialize)]
pub struct Ledger {
    /// Transfer listing URL.
    #[serde(default = "default_ledger_url")]
    pub url: String,

    /// Chain identifier passed to the transfer listing.
    #[serde(default = "default_ledger_chain")]
    pub chain: u64,

    /// Unix timestamp from which historical backfill starts.
    #[serde(default = "default_ledger_start")]
    pub start: i64,

    /// Optional unix timestamp at which historical backfill stops.
    #[serde(default)]
    pub end: Option<i64>,

    /// Backfill window length, in seconds.
    #[serde(default = "default_ledger_window")]
    pub window: i64,

    /// Count of transactions written in a single database transaction.
    #[serde(default = "default_ledger_batch")]
    pub batch: usize,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            url: default_ledger_url(),
            chain: default_ledger_chain(),
            start: default_ledger_start(),
            end: None,
            window: default_ledger_window(),
            batch: default_ledger_batch(),
        }
    }
}

fn default_ledger_url() -> String {
    String::from("http://erc20-api/erc20/api/stats/transfers")
}

fn default_ledger_chain() -> u64 {
    137
}

fn default_ledger_start() -> i64 {
    1553165313
}

fn default_ledger_window() -> i64 {
    2592000
}

fn default_ledger_batch() -> usize {
    5000
}

/// Retry policy of upstream requests.
#[derive(Deserialize)]
pub struct Retry {
    /// Total count of attempts, including the first one.
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,

    /// Initial backoff delay, in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub delay: u64,

    /// Upper limit of a single backoff delay, in milliseconds.
    #[serde(default = "default_retry_ceiling")]
    pub ceiling: u64,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            delay: default_retry_delay(),
            ceiling: default_retry_ceiling(),
        }
    }
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    500
}

fn default_retry_ceiling() -> u64 {
    30000
}

/// General configuration.
#[derive(Deserialize)]
pub struct Config {
    /// General database configuration.
    pub database: Database,

    /// Logging configuration.
    #[cfg(feature = "logging")]
    #[serde(default)]
    pub logging: Logging,

    /// Market scanner configuration.
    #[serde(default)]
    pub market: Market,

    /// Relay monitor configuration.
    #[serde(default)]
    pub relay: Relay,

    /// Reference instance catalog configuration.
    #[serde(default)]
    pub catalog: Catalog,

    /// Exchange rate source configuration.
    #[serde(default)]
    pub exchange: Exchange,

    /// Reputation service configuration.
    #[serde(default)]
    pub reputation: Reputation,

    /// Network metrics configuration.
    #[serde(default)]
    pub metrics: Metrics,

    /// Transaction ledger configuration.
    #[serde(default)]
    pub ledger: Ledger,

    /// Upstream retry policy.
    #[serde(default)]
    pub retry: Retry,
}

impl Config {
    /// Create new config using default configuration file or environment variables.
    ///
    /// See [`Env`] for more details on how to use environment variables configuration.
    ///
    /// [`Env`]: figment::providers::Env
    pub fn new(path: Option<PathBuf>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.unwrap_or(PathBuf::from("Config.toml"))))
            .merge(Env::prefixed("CONFIG_").split("_"))
            .extract()
    }

    /// Create new config suitable for running unit tests.
    #[cfg(feature = "test-utils")]
    pub fn for_tests() -> Self {
        Self {
            database: Database {
                url: String::from("sqlite::memory:"),
            },
            #[cfg(feature = "logging")]
            logging: Logging::default(),
            market: Market::default(),
            relay: Relay::default(),
            catalog: Catalog::default(),
            exchange: Exchange::default(),
            reputation: Reputation::default(),
            metrics: Metrics::default(),
            ledger: Ledger::default(),
            retry: Retry::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use figment::Jail;

    use super::Config;

    #[test]
    fn defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "Config.toml",
                r#"
                [database]
                url = "sqlite::memory:"
                "#,
            )?;

            let config = Config::new(None)?;

            assert_eq!(config.database.url, "sqlite::memory:");
            assert_eq!(config.market.timeout, 60);
            assert_eq!(config.market.subnets, ["public"]);
            assert!(config.market.key.is_none());
            assert_eq!(config.relay.reconnect, 5);
            assert_eq!(config.relay.events.len(), 2);
            assert!(config.catalog.key.is_none());
            assert!(config.metrics.url.is_none());
            assert_eq!(config.ledger.start, 1553165313);
            assert_eq!(config.ledger.window, 2592000);
            assert_eq!(config.ledger.batch, 5000);
            assert_eq!(config.retry.attempts, 5);

            Ok(())
        });
    }

    #[test]
    fn environment_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "collector.toml",
                r#"
                [database]
                url = "postgres://localhost/stats"

                [catalog]
                key = "from-file"
                "#,
            )?;

            jail.set_env("CONFIG_CATALOG_KEY", "from-env");
            jail.set_env("CONFIG_MARKET_TIMEOUT", "30");

            let config = Config::new(Some(PathBuf::from("collector.toml")))?;

            assert_eq!(config.catalog.key.as_deref(), Some("from-env"));
            assert_eq!(config.market.timeout, 30);

            Ok(())
        });
    }
}
