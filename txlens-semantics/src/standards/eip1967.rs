//! EIP-1967 proxy storage slot probes.

use once_cell::sync::Lazy;
use tracing::trace;
use txlens_core::{
    types::{Address, U256},
    utils::{keccak256, strip_0x},
};
use txlens_providers::NodeProvider;

/// implementation()
const IMPLEMENTATION_SELECTOR: &str = "0x5c60da1b";

/// `keccak256("eip1967.proxy.implementation") - 1`
pub static IMPLEMENTATION_SLOT: Lazy<String> =
    Lazy::new(|| slot_for("eip1967.proxy.implementation"));

/// `keccak256("eip1967.proxy.beacon") - 1`
pub static BEACON_SLOT: Lazy<String> = Lazy::new(|| slot_for("eip1967.proxy.beacon"));

fn slot_for(label: &str) -> String {
    let hash = U256::from_big_endian(&keccak256(label.as_bytes()));
    format!("0x{:064x}", hash - U256::one())
}

fn address_from_word(word: &str) -> Option<Address> {
    let hex = strip_0x(word);
    if hex.len() < 40 {
        return None
    }
    let bytes = hex::decode(&hex[hex.len() - 40..]).ok()?;
    Some(Address::from_slice(&bytes))
}

/// Checks whether `delegator` stores `delegate` in the EIP-1967
/// implementation slot.
pub async fn is_eip1967_proxy(
    node: &dyn NodeProvider,
    chain_id: &str,
    delegator: Address,
    delegate: Address,
) -> bool {
    let Ok(word) = node.get_storage_at(chain_id, delegator, IMPLEMENTATION_SLOT.as_str()).await
    else {
        return false
    };
    address_from_word(&word).map(|implementation| implementation == delegate).unwrap_or(false)
}

/// Checks whether `delegator` points at a beacon whose `implementation()`
/// resolves to `delegate`.
pub async fn is_eip1967_beacon_proxy(
    node: &dyn NodeProvider,
    chain_id: &str,
    delegator: Address,
    delegate: Address,
) -> bool {
    let Ok(word) = node.get_storage_at(chain_id, delegator, BEACON_SLOT.as_str()).await else {
        return false
    };
    let Some(beacon) = address_from_word(&word).filter(|beacon| !beacon.is_zero()) else {
        return false
    };
    trace!(target: "proxies", ?beacon, "probing beacon implementation");

    let Ok(result) = node.call(chain_id, beacon, IMPLEMENTATION_SELECTOR).await else {
        return false
    };
    address_from_word(&result).map(|implementation| implementation == delegate).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_the_standard_slots() {
        assert_eq!(
            *IMPLEMENTATION_SLOT,
            "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc"
        );
        assert_eq!(
            *BEACON_SLOT,
            "0xa3f0ad74e5423aebfd80d3ef4346578335a9a72aeaee59ff6cb3582b35133d50"
        );
    }

    #[test]
    fn extracts_addresses_from_storage_words() {
        let word = format!("0x{}{}", "0".repeat(24), "cd".repeat(20));
        assert_eq!(address_from_word(&word).unwrap(), Address::from_slice(&[0xcd; 20]));
        assert!(address_from_word("0x12").is_none());
    }
}
