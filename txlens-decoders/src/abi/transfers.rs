//! Extraction of ETH and token transfers from the decoded artifacts.

use super::{AbiDecoder, RECURSION_LIMIT};
use crate::{error::DecodeError, proxies::ProxyMap};
use tracing::warn;
use txlens_core::{
    decoded::{AddressInfo, DecodedCall, DecodedEvent, DecodedTransfer, Value},
    types::Event,
    utils::{format_units, parse_address, u256_to_f64},
};
use txlens_semantics::standards::{erc1155, erc20};

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

impl AbiDecoder {
    /// Emits ETH transfers from the call tree (preorder) followed by token
    /// transfers from the events (log order). `raw_events` parallels
    /// `events` and supplies the indexed-topic counts.
    pub async fn decode_transfers(
        &self,
        call: Option<&DecodedCall>,
        events: &[DecodedEvent],
        raw_events: &[Event],
        proxies: &ProxyMap,
        chain_id: &str,
    ) -> Result<Vec<DecodedTransfer>, DecodeError> {
        let mut transfers = vec![];

        if let Some(call) = call {
            collect_ether_transfers(call, 0, &mut transfers)?;
        }

        for (i, event) in events.iter().enumerate() {
            let indexed_topics = raw_events
                .get(i)
                .map(|raw| raw.topics.len().saturating_sub(1))
                .unwrap_or_default();
            if let Some(transfer) =
                self.decode_token_transfer(event, indexed_topics, proxies, chain_id).await
            {
                transfers.push(transfer);
            }
        }

        Ok(transfers)
    }

    async fn decode_token_transfer(
        &self,
        event: &DecodedEvent,
        indexed_topics: usize,
        proxies: &ProxyMap,
        chain_id: &str,
    ) -> Option<DecodedTransfer> {
        let signature = event.event_signature.as_deref()?;

        let is_transfer = signature == erc20::TRANSFER_EVENT_TOPIC;
        let is_transfer_single = signature == erc1155::TRANSFER_SINGLE_EVENT_TOPIC;
        if !is_transfer && !is_transfer_single {
            return None
        }

        // Transfer carries from/to/amount-or-id, TransferSingle prepends the
        // operator and splits id from value
        let (from_index, to_index, id_index, value_index, minimum) =
            if is_transfer { (0, 1, 2, 2, 3) } else { (1, 2, 3, 4, 5) };
        if event.parameters.len() < minimum {
            warn!(
                target: "decoders",
                signature, "transfer event with too few parameters, skipping"
            );
            return None
        }

        let from_address = event.parameters[from_index].value.as_address_string()?;
        let to_address = event.parameters[to_index].value.as_address_string()?;
        let token_id = &event.parameters[id_index].value;
        let raw_value = &event.parameters[value_index].value;

        let from_name = self
            .repository
            .get_address_label(chain_id, parse_address(&from_address), Some(proxies))
            .await;
        let to_name = self
            .repository
            .get_address_label(chain_id, parse_address(&to_address), Some(proxies))
            .await;

        let contract_address = parse_address(
            event.contract.address.as_deref().unwrap_or_default(),
        )?;
        let standard = self.repository.get_standard(chain_id, contract_address).await;
        let token_data =
            self.repository.get_token_data(chain_id, contract_address, Some(proxies)).await;

        // the indexed-topic count decides between the fungible and the NFT
        // reading, regardless of how the emitter was classified
        let fungible = is_transfer && indexed_topics == 2;

        let transfer = if fungible {
            let value = raw_value
                .as_u256()
                .map(|value| format_units(value, token_data.decimals))
                .unwrap_or(0.0);
            DecodedTransfer {
                from_address: AddressInfo::new(from_address, from_name),
                to_address: AddressInfo::new(to_address, to_name),
                token_address: event.contract.address.clone(),
                token_symbol: token_data.symbol,
                token_standard: standard.map(|standard| standard.to_string()),
                value: Value::Float(value),
            }
        } else {
            let value = if is_transfer {
                1.0
            } else {
                raw_value.as_u256().map(u256_to_f64).unwrap_or(0.0)
            };

            let symbol =
                if token_data.symbol == "Unknown" { "NFT".to_string() } else { token_data.symbol };
            let token_id = token_id.display_string();
            let token_symbol = if token_id.len() > 8 {
                format!("{symbol} {}...{}", &token_id[..6], &token_id[token_id.len() - 2..])
            } else {
                format!("{symbol} {token_id}")
            };
            let token_address = event
                .contract
                .address
                .as_ref()
                .map(|contract| format!("{contract}?a={token_id}#inventory"));

            DecodedTransfer {
                from_address: AddressInfo::new(from_address, from_name),
                to_address: AddressInfo::new(to_address, to_name),
                token_address,
                token_symbol,
                token_standard: standard.map(|standard| standard.to_string()),
                value: Value::Float(value),
            }
        };

        Some(transfer)
    }
}

/// Preorder walk emitting a transfer for every successful call moving ether.
fn collect_ether_transfers(
    call: &DecodedCall,
    depth: usize,
    transfers: &mut Vec<DecodedTransfer>,
) -> Result<(), DecodeError> {
    if depth > RECURSION_LIMIT {
        return Err(DecodeError::RecursionLimit("transfer extraction"))
    }

    if call.status && call.value != 0.0 {
        if let Some(to_address) = &call.to_address {
            transfers.push(DecodedTransfer {
                from_address: call.from_address.clone(),
                to_address: to_address.clone(),
                token_address: Some(ZERO_ADDRESS.to_string()),
                token_symbol: "ETH".to_string(),
                token_standard: Some("ETH".to_string()),
                value: Value::Float(call.value),
            });
        }
    }

    for sub_call in &call.subcalls {
        collect_ether_transfers(sub_call, depth + 1, transfers)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use txlens_core::{
        decoded::Badge,
        types::{timestamp_from_secs, CallType},
    };

    fn eth_call(value: f64, status: bool, subcalls: Vec<DecodedCall>) -> DecodedCall {
        DecodedCall {
            chain_id: "mainnet".to_string(),
            tx_hash: "0xabc".to_string(),
            timestamp: timestamp_from_secs(0),
            call_id: String::new(),
            call_type: CallType::Call,
            from_address: AddressInfo::new("0xaa", "0xaa").with_badge(Some(Badge::Sender)),
            to_address: Some(AddressInfo::new("0xbb", "0xbb")),
            value,
            function_signature: String::new(),
            function_name: "fallback".to_string(),
            arguments: vec![],
            outputs: vec![],
            gas_used: None,
            error: None,
            status,
            indent: 0,
            subcalls,
            function_guessed: false,
        }
    }

    #[test]
    fn emits_ether_transfers_for_successful_calls() {
        let tree = eth_call(0.01, true, vec![eth_call(0.5, false, vec![])]);
        let mut transfers = vec![];
        collect_ether_transfers(&tree, 0, &mut transfers).unwrap();

        // the failed subcall moves nothing
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].token_symbol, "ETH");
        assert_eq!(transfers[0].token_address.as_deref(), Some(ZERO_ADDRESS));
        assert_eq!(transfers[0].value, Value::Float(0.01));
    }

    #[test]
    fn guards_pathological_depth() {
        let mut tree = eth_call(0.0, true, vec![]);
        for _ in 0..(RECURSION_LIMIT + 2) {
            tree = eth_call(0.0, true, vec![tree]);
        }
        let mut transfers = vec![];
        let result = collect_ether_transfers(&tree, 0, &mut transfers);
        assert!(matches!(result, Err(DecodeError::RecursionLimit(_))));
    }

}
