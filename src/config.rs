use std::{path::Path, sync::Arc};

use alloy_json_abi::JsonAbi;
use alloy_primitives::{address, Address};
use serde::Deserialize;

use crate::{contract::ChatInterface, error::Result};

/// Compiled artifact of the chat contract shipped with the client.
pub const BUNDLED_ARTIFACT: &str = include_str!("../abi/BlockchainChat.json");

/// Where the chat contract is deployed.
pub const DEFAULT_CONTRACT_ADDRESS: Address = address!("0xD99f113cAd1fe2eeebe0E7383415B586704DB5a3");

/// The part of a compiler artifact we read. Everything else is ignored.
#[derive(Deserialize)]
struct Artifact {
    abi: JsonAbi,
}

/// Which contract the client talks to and how.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub contract_address: Address,
    pub interface: Arc<ChatInterface>,
}

impl ChatConfig {
    pub fn new(contract_address: Address, interface: ChatInterface) -> Self {
        Self {
            contract_address,
            interface: Arc::new(interface),
        }
    }

    /// The bundled `BlockchainChat` artifact at its default deployment.
    pub fn bundled() -> Result<Self> {
        Self::from_artifact_json(DEFAULT_CONTRACT_ADDRESS, BUNDLED_ARTIFACT)
    }

    /// Parse a compiler artifact (`{"abi": [...], ...}`) for the contract at
    /// `contract_address`.
    pub fn from_artifact_json(contract_address: Address, json: &str) -> Result<Self> {
        let artifact: Artifact = serde_json::from_str(json)?;
        let interface = ChatInterface::from_abi(artifact.abi)?;
        Ok(Self::new(contract_address, interface))
    }

    /// Read an artifact from disk.
    pub fn from_artifact_file(contract_address: Address, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        tracing::debug!("loaded contract artifact from {}", path.display());
        Self::from_artifact_json(contract_address, &json)
    }

    /// Same interface, another deployment.
    pub fn with_address(mut self, contract_address: Address) -> Self {
        self.contract_address = contract_address;
        self
    }
}
