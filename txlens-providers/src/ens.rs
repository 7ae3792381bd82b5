//! Reverse ENS resolution, used to label externally owned addresses.

use crate::node::NodeProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;
use txlens_core::{
    types::{Address, H160, H256},
    utils::{keccak256, strip_0x},
};

/// ENS registry address (`0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e`)
pub const ENS_ADDRESS: Address = H160([
    0, 0, 0, 0, 0, 12, 46, 7, 78, 198, 154, 13, 251, 41, 151, 186, 108, 125, 46, 30,
]);

const ENS_REVERSE_REGISTRAR_DOMAIN: &str = "addr.reverse";

/// resolver(bytes32)
const RESOLVER_SELECTOR: &str = "0x0178b8bf";

/// name(bytes32)
const NAME_SELECTOR: &str = "0x691f3431";

/// Resolves addresses to human-readable names.
#[async_trait]
pub trait NameProvider: Send + Sync {
    /// The primary name of an address, if it has one.
    async fn name(&self, chain_id: &str, address: Address) -> Option<String>;
}

/// A provider that never knows a name; useful where ENS is unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNames;

#[async_trait]
impl NameProvider for NoopNames {
    async fn name(&self, _chain_id: &str, _address: Address) -> Option<String> {
        None
    }
}

/// Returns the ENS namehash as specified in [EIP-137](https://eips.ethereum.org/EIPS/eip-137)
pub fn namehash(name: &str) -> H256 {
    if name.is_empty() {
        return H256::zero()
    }

    // iterate in reverse
    name.rsplit('.')
        .fold([0u8; 32], |node, label| keccak256([node, keccak256(label.as_bytes())].concat()))
        .into()
}

/// The reverse-registrar name of an address: `<hex>.addr.reverse`.
pub fn reverse_address(address: Address) -> String {
    format!("{:x}.{ENS_REVERSE_REGISTRAR_DOMAIN}", address)
}

/// Reverse resolver backed by the ENS registry contract on chain.
#[derive(Clone)]
pub struct EnsClient {
    node: Arc<dyn NodeProvider>,
}

impl EnsClient {
    pub fn new(node: Arc<dyn NodeProvider>) -> Self {
        Self { node }
    }

    async fn resolve(&self, chain_id: &str, address: Address) -> Option<String> {
        let node_hash = namehash(&reverse_address(address));
        let node_hex = format!("{node_hash:x}");

        let resolver_data = format!("{RESOLVER_SELECTOR}{node_hex}");
        let resolver_word = self.node.call(chain_id, ENS_ADDRESS, &resolver_data).await.ok()?;
        let resolver_hex = strip_0x(&resolver_word);
        if resolver_hex.len() < 40 {
            return None
        }
        let resolver_bytes = hex::decode(&resolver_hex[resolver_hex.len() - 40..]).ok()?;
        let resolver = Address::from_slice(&resolver_bytes);
        if resolver.is_zero() {
            return None
        }

        let name_data = format!("{NAME_SELECTOR}{node_hex}");
        let result = self.node.call(chain_id, resolver, &name_data).await.ok()?;
        match txlens_core::abi::decode_struct(
            strip_0x(&result),
            &[txlens_core::semantics::ParameterSemantics::new("name", "string").dynamic()],
        )
        .0
        .into_iter()
        .next()?
        .value
        {
            txlens_core::decoded::Value::String(name) if !name.is_empty() => Some(name),
            _ => None,
        }
    }
}

#[async_trait]
impl NameProvider for EnsClient {
    async fn name(&self, chain_id: &str, address: Address) -> Option<String> {
        let name = self.resolve(chain_id, address).await;
        if let Some(name) = &name {
            trace!(target: "ens", %address, %name, "reverse resolved");
        }
        name
    }
}
