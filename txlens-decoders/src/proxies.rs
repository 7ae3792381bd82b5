//! Delegatecall discovery and proxy classification.

use std::collections::{HashMap, VecDeque};
use txlens_core::{
    decoded::{Proxy, ProxyKind},
    types::{address_to_hex, Address, Call, CallType},
};
use txlens_providers::NodeProvider;
use txlens_semantics::{
    standards::eip1967::{is_eip1967_beacon_proxy, is_eip1967_proxy},
    SemanticsRepository,
};

/// Proxies discovered in a transaction, keyed by delegator address.
pub type ProxyMap = HashMap<Address, Proxy>;

/// Walks the call tree and collects, per delegating contract, the
/// delegate addresses in first-seen order.
pub fn get_delegations(root_call: &Call) -> Vec<(Address, Vec<Address>)> {
    let mut order: Vec<Address> = vec![];
    let mut delegations: HashMap<Address, Vec<Address>> = HashMap::new();

    let mut queue = VecDeque::from([root_call]);
    while let Some(call) = queue.pop_front() {
        queue.extend(call.subcalls.iter());

        if call.call_type == CallType::DelegateCall {
            if let Some(to_address) = call.to_address {
                let delegates = delegations.entry(call.from_address).or_insert_with(|| {
                    order.push(call.from_address);
                    vec![]
                });
                if !delegates.contains(&to_address) {
                    delegates.push(to_address);
                }
            }
        }
    }

    order
        .into_iter()
        .map(|delegator| {
            let delegates = delegations.remove(&delegator).unwrap_or_default();
            (delegator, delegates)
        })
        .collect()
}

/// Classifies each delegator and attaches the semantics of its delegates,
/// promoting ERC-20 metadata from the first token-classified delegate.
pub async fn get_proxies(
    repository: &SemanticsRepository,
    node: &dyn NodeProvider,
    delegations: &[(Address, Vec<Address>)],
    chain_id: &str,
) -> ProxyMap {
    let mut proxies = ProxyMap::new();

    for (delegator, delegates) in delegations {
        let Some(first_delegate) = delegates.first() else { continue };

        let delegator_semantics = repository.get_semantics(chain_id, *delegator).await;

        let (kind, fallback_name) =
            if is_eip1967_proxy(node, chain_id, *delegator, *first_delegate).await {
                (ProxyKind::Eip1967Proxy, "EIP1967_Proxy")
            } else if is_eip1967_beacon_proxy(node, chain_id, *delegator, *first_delegate).await {
                (ProxyKind::Eip1967Beacon, "EIP1967_BeaconProxy")
            } else {
                (ProxyKind::Generic, "Proxy")
            };

        let mut semantics = Vec::with_capacity(delegates.len());
        for delegate in delegates {
            semantics.push(repository.get_semantics(chain_id, *delegate).await);
        }

        let token = delegator_semantics.erc20.clone().or_else(|| {
            semantics.iter().find_map(|delegate| delegate.erc20.clone())
        });

        let name = if delegator_semantics.name != address_to_hex(delegator) {
            delegator_semantics.name.clone()
        } else {
            fallback_name.to_string()
        };

        proxies.insert(
            *delegator,
            Proxy { address: *delegator, name, kind, semantics, token },
        );
    }

    proxies
}

#[cfg(test)]
mod tests {
    use super::*;
    use txlens_core::types::U256;

    fn call(
        call_type: CallType,
        from: Address,
        to: Option<Address>,
        subcalls: Vec<Call>,
    ) -> Call {
        Call {
            call_type,
            from_address: from,
            to_address: to,
            call_value: U256::zero(),
            call_data: "0x".to_string(),
            return_value: "0x".to_string(),
            call_gas: None,
            gas_used: None,
            status: true,
            error: None,
            subcalls,
        }
    }

    fn address(byte: u8) -> Address {
        Address::from_slice(&[byte; 20])
    }

    #[test]
    fn collects_delegations_in_first_seen_order() {
        let root = call(
            CallType::Call,
            address(1),
            Some(address(2)),
            vec![
                call(CallType::DelegateCall, address(2), Some(address(3)), vec![]),
                call(
                    CallType::Call,
                    address(2),
                    Some(address(4)),
                    vec![call(CallType::DelegateCall, address(4), Some(address(5)), vec![])],
                ),
                call(CallType::DelegateCall, address(2), Some(address(6)), vec![]),
                call(CallType::DelegateCall, address(2), Some(address(3)), vec![]),
            ],
        );

        let delegations = get_delegations(&root);
        assert_eq!(delegations.len(), 2);
        assert_eq!(delegations[0].0, address(2));
        assert_eq!(delegations[0].1, vec![address(3), address(6)]);
        assert_eq!(delegations[1].0, address(4));
        assert_eq!(delegations[1].1, vec![address(5)]);
    }

    #[test]
    fn ignores_plain_calls() {
        let root = call(CallType::Call, address(1), Some(address(2)), vec![]);
        assert!(get_delegations(&root).is_empty());
    }
}
