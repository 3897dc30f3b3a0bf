//! Network selection and chain access
//!
//! Tracks which Ethereum network the TimeNode runs against:
//! - Well-known networks keyed by chain id
//! - A user-supplied custom provider `{id, endpoint}`
//! - The chain client used for provider probes and DAY balance lookups

pub mod chain;
pub mod rpc;

pub use chain::{ChainClient, ChainError, DayBalance};
pub use rpc::JsonRpcChain;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{keys, KeyValueStore, StorageError};

/// Mainnet DAY token contract
pub const MAINNET_DAY_TOKEN: &str = "0xE814aeE960a85208C3dB542C53E7D4a6C8D5f60F";

/// A network the worker can be pointed at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDescriptor {
    /// Chain id
    pub id: u64,
    /// Human-readable name
    pub name: String,
    /// Default RPC endpoint
    pub endpoint: String,
    /// DAY token contract, absent on networks without one
    #[serde(default)]
    pub day_token_address: Option<String>,
    /// True when built from a custom provider rather than the known list
    #[serde(default)]
    pub custom: bool,
}

/// A custom provider selected by the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomProvider {
    pub id: u64,
    pub endpoint: String,
}

impl CustomProvider {
    /// Read the persisted provider. A missing or unparsable id means no
    /// custom provider.
    pub fn load(store: &dyn KeyValueStore) -> Result<Option<Self>, StorageError> {
        let id = store.load(keys::PROVIDER_ID)?;
        let endpoint = store.load(keys::PROVIDER_ENDPOINT)?;

        let (Some(id), Some(endpoint)) = (id, endpoint) else {
            return Ok(None);
        };

        match id.trim().parse::<u64>() {
            Ok(id) => Ok(Some(Self { id, endpoint })),
            Err(_) => {
                warn!(id = %id, "Ignoring persisted provider with unparsable id");
                Ok(None)
            }
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        store.save(keys::PROVIDER_ID, &self.id.to_string())?;
        store.save(keys::PROVIDER_ENDPOINT, &self.endpoint)
    }

    fn descriptor(&self) -> NetworkDescriptor {
        NetworkDescriptor {
            id: self.id,
            name: format!("Custom ({})", self.id),
            endpoint: self.endpoint.clone(),
            day_token_address: None,
            custom: true,
        }
    }
}

/// Known networks keyed by chain id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRegistry {
    networks: BTreeMap<u64, NetworkDescriptor>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::from_descriptors(vec![
            NetworkDescriptor {
                id: 1,
                name: "Mainnet".to_string(),
                endpoint: "https://mainnet.infura.io".to_string(),
                day_token_address: Some(MAINNET_DAY_TOKEN.to_string()),
                custom: false,
            },
            NetworkDescriptor {
                id: 3,
                name: "Ropsten".to_string(),
                endpoint: "https://ropsten.infura.io".to_string(),
                day_token_address: None,
                custom: false,
            },
            NetworkDescriptor {
                id: 42,
                name: "Kovan".to_string(),
                endpoint: "https://kovan.infura.io".to_string(),
                day_token_address: None,
                custom: false,
            },
        ])
    }
}

impl NetworkRegistry {
    pub fn from_descriptors(descriptors: Vec<NetworkDescriptor>) -> Self {
        Self {
            networks: descriptors.into_iter().map(|n| (n.id, n)).collect(),
        }
    }

    pub fn descriptors(&self) -> Vec<NetworkDescriptor> {
        self.networks.values().cloned().collect()
    }

    pub fn get(&self, id: u64) -> Option<&NetworkDescriptor> {
        self.networks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Pick the network the worker should use.
    ///
    /// The custom provider's id takes precedence over the connected chain id.
    /// An id with no known network resolves to the custom provider itself, or
    /// to an ad-hoc descriptor for the connected endpoint.
    pub fn resolve(
        &self,
        custom: Option<&CustomProvider>,
        connected_id: u64,
        connected_endpoint: &str,
    ) -> NetworkDescriptor {
        let current = custom.map(|c| c.id).unwrap_or(connected_id);

        if let Some(known) = self.networks.get(&current) {
            return known.clone();
        }

        match custom {
            Some(provider) => provider.descriptor(),
            None => CustomProvider {
                id: connected_id,
                endpoint: connected_endpoint.to_string(),
            }
            .descriptor(),
        }
    }
}
