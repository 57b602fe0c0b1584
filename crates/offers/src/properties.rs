//! Canonical offer properties.
//!
//! [`Properties`] keeps every flattened key as-is and exposes typed
//! accessors for the key families the collector understands: runtime,
//! hardware resources, GPU, linear pricing and payment platforms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::runtime::Runtime;

pub const RUNTIME_NAME: &str = "golem.runtime.name";
pub const NODE_NAME: &str = "golem.node.id.name";
pub const CPU_CORES: &str = "golem.inf.cpu.cores";
pub const CPU_THREADS: &str = "golem.inf.cpu.threads";
pub const CPU_VENDOR: &str = "golem.inf.cpu.vendor";
pub const CPU_ARCHITECTURE: &str = "golem.inf.cpu.architecture";
pub const MEMORY_GIB: &str = "golem.inf.mem.gib";
pub const STORAGE_GIB: &str = "golem.inf.storage.gib";
pub const USAGE_VECTOR: &str = "golem.com.usage.vector";
pub const PRICING_COEFFS: &str = "golem.com.pricing.model.linear.coeffs";
pub const GPU_MODEL: &str = "golem.!exp.gap-35.v1.inf.gpu.model";
pub const GPU_CUDA_CORES: &str = "golem.!exp.gap-35.v1.inf.gpu.cuda.cores";
pub const GPU_MEMORY_GIB: &str = "golem.!exp.gap-35.v1.inf.gpu.memory.total.gib";

/// Payment platforms whose address is used as the node wallet,
/// in order of preference.
pub const WALLET_PLATFORMS: &[&str] = &[
    "zksync-mainnet-glm",
    "zksync-rinkeby-tglm",
    "erc20-mainnet-glm",
    "erc20-polygon-glm",
    "erc20-goerli-tglm",
    "erc20-rinkeby-tglm",
    "polygon-polygon-glm",
    "erc20next-mainnet-glm",
    "erc20next-polygon-glm",
    "erc20next-goerli-tglm",
    "erc20next-rinkeby-tglm",
    "erc20-holesky-tglm",
    "erc20next-holesky-tglm",
];

/// Payment platforms that settle on a mainnet chain.
pub const MAINNET_PLATFORMS: &[&str] = &[
    "erc20-mainnet-glm",
    "erc20-polygon-glm",
    "erc20next-mainnet-glm",
    "erc20next-polygon-glm",
    "polygon-polygon-glm",
    "zksync-mainnet-glm",
];

const PAYMENT_PLATFORM_PREFIX: &str = "golem.com.payment.platform.";

fn platform_address_key(platform: &str) -> String {
    format!("{PAYMENT_PLATFORM_PREFIX}{platform}.address")
}

/// Hardware resources advertised by an offer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Resources {
    pub cores: i64,
    pub threads: i64,
    pub memory_gib: f64,
    pub storage_gib: f64,
}

/// GPU advertised through the experimental property group.
#[derive(Debug, Clone, PartialEq)]
pub struct Gpu {
    pub model: String,
    pub cuda_cores: i64,
    pub memory_gib: f64,
}

/// Payment network derived from advertised payment platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentNetwork {
    Mainnet,
    Testnet,
    Unknown,
}

/// Flattened offer properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, Value>);

impl From<BTreeMap<String, Value>> for Properties {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl Properties {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert properties into a JSON mapping suitable for storage.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }

    /// Restore properties previously stored with [`Properties::to_value`].
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(|map| {
            Self(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            )
        })
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Integer property, accepting integral floating point values.
    pub fn i64(&self, key: &str) -> Option<i64> {
        let value = self.get(key)?;

        value.as_i64().or_else(|| {
            value
                .as_f64()
                .filter(|val| val.fract() == 0.0)
                .map(|val| val as i64)
        })
    }

    pub fn runtime_name(&self) -> Option<&str> {
        self.str(RUNTIME_NAME)
    }

    pub fn runtime(&self) -> Option<Runtime> {
        self.runtime_name().map(Runtime::from)
    }

    pub fn node_name(&self) -> Option<&str> {
        self.str(NODE_NAME)
    }

    pub fn cpu_vendor(&self) -> Option<&str> {
        self.str(CPU_VENDOR)
    }

    pub fn cpu_architecture(&self) -> Option<&str> {
        self.str(CPU_ARCHITECTURE)
    }

    pub fn threads(&self) -> Option<i64> {
        self.i64(CPU_THREADS)
    }

    pub fn memory_gib(&self) -> Option<f64> {
        self.f64(MEMORY_GIB)
    }

    /// Advertised resources, with missing values treated as zero.
    pub fn resources(&self) -> Resources {
        Resources {
            cores: self.i64(CPU_CORES).unwrap_or_default(),
            threads: self.threads().unwrap_or_default(),
            memory_gib: self.memory_gib().unwrap_or_default(),
            storage_gib: self.f64(STORAGE_GIB).unwrap_or_default(),
        }
    }

    pub fn gpu(&self) -> Option<Gpu> {
        let model = self.str(GPU_MODEL).filter(|model| !model.is_empty())?;

        Some(Gpu {
            model: model.to_owned(),
            cuda_cores: self.i64(GPU_CUDA_CORES).unwrap_or_default(),
            memory_gib: self.f64(GPU_MEMORY_GIB).unwrap_or_default(),
        })
    }

    /// Ordered usage metric names of the linear pricing model.
    pub fn usage_vector(&self) -> Option<Vec<&str>> {
        self.get(USAGE_VECTOR)?
            .as_array()?
            .iter()
            .map(Value::as_str)
            .collect()
    }

    /// Linear pricing coefficients, with the flat start price as the last element.
    pub fn pricing_coeffs(&self) -> Option<Vec<f64>> {
        self.get(PRICING_COEFFS)?
            .as_array()?
            .iter()
            .map(Value::as_f64)
            .collect()
    }

    /// Wallet address, picked from the first advertised preferred payment platform.
    pub fn wallet(&self) -> Option<&str> {
        WALLET_PLATFORMS
            .iter()
            .find_map(|platform| self.str(&platform_address_key(platform)))
    }

    /// Non-empty string values of every payment platform property.
    pub fn payment_addresses(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(key, _)| key.starts_with(PAYMENT_PLATFORM_PREFIX))
            .filter_map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    pub fn payment_network(&self) -> PaymentNetwork {
        let mainnet = MAINNET_PLATFORMS
            .iter()
            .any(|platform| self.get(&platform_address_key(platform)).is_some());

        if mainnet {
            PaymentNetwork::Mainnet
        } else if self
            .0
            .keys()
            .any(|key| key.starts_with(PAYMENT_PLATFORM_PREFIX))
        {
            PaymentNetwork::Testnet
        } else {
            PaymentNetwork::Unknown
        }
    }

    /// Structural equality with a stored property mapping, ignoring
    /// the order of elements inside lists.
    pub fn same_as(&self, stored: &Value) -> bool {
        canonicalize(&self.to_value()) == canonicalize(stored)
    }
}

/// Recursively sort every list inside of a JSON value.
///
/// Mappings are already compared independently of key order,
/// so only lists need normalization.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(canonicalize).collect();
            items.sort_by_cached_key(|item| item.to_string());
            Value::Array(items)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), canonicalize(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}
