//! ABI decoding of log entries.

use super::AbiDecoder;
use crate::proxies::ProxyMap;
use txlens_core::{
    abi::decode_event_parameters,
    decoded::{AddressInfo, DecodedEvent},
    semantics::EventSemantics,
    types::{address_to_hex, h256_to_hex, BlockMetadata, Event, TransactionMetadata},
};
use txlens_semantics::standards::{erc20::ERC20_EVENTS, erc721::ERC721_EVENTS};

impl AbiDecoder {
    /// Decodes every log in order.
    pub async fn decode_events(
        &self,
        events: &[Event],
        block: &BlockMetadata,
        transaction: &TransactionMetadata,
        proxies: &ProxyMap,
        chain_id: &str,
    ) -> Vec<DecodedEvent> {
        let mut decoded = Vec::with_capacity(events.len());
        for event in events {
            decoded.push(self.decode_event(event, block, transaction, proxies, chain_id).await);
        }
        decoded
    }

    /// Decodes one log: resolves its semantics through the contract ABI, the
    /// unique anonymous event, delegate contracts and the token standards.
    pub async fn decode_event(
        &self,
        event: &Event,
        block: &BlockMetadata,
        transaction: &TransactionMetadata,
        proxies: &ProxyMap,
        chain_id: &str,
    ) -> DecodedEvent {
        let event_signature = event.topics.first().map(h256_to_hex);
        let mut anonymous = false;
        let mut guessed = false;

        let mut event_abi = match &event_signature {
            Some(signature) => {
                self.repository.get_event_abi(chain_id, event.contract, signature).await
            }
            None => None,
        };

        if event_abi.is_none() {
            // an unknown topic may still be the contract's one anonymous
            // event (e.g. Maker's LogNote)
            event_abi = self.repository.get_anonymous_event_abi(chain_id, event.contract).await;
            anonymous = event_abi.is_some();
        }

        if event_abi.is_none() {
            if let (Some(signature), Some(proxy)) = (&event_signature, proxies.get(&event.contract))
            {
                event_abi = proxy
                    .semantics
                    .iter()
                    .find_map(|delegate| delegate.contract.events.get(signature).cloned());
            }
        }

        if event_abi.is_none() {
            if let Some(signature) = &event_signature {
                event_abi = standard_event_with_matching_topics(signature, &event.topics);
            }
        }

        let contract_name = self
            .repository
            .get_address_label(chain_id, Some(event.contract), Some(proxies))
            .await;

        let mut event_name = match (&event_abi, &event_signature) {
            (Some(abi), _) => abi.name.clone(),
            (None, Some(signature)) => signature.clone(),
            (None, None) => "Anonymous".to_string(),
        };

        let topics: Vec<String> = event.topics.iter().map(h256_to_hex).collect();
        let parameters =
            decode_event_parameters(&event.log_data, &topics, event_abi.as_ref(), anonymous);

        if event_name.starts_with("0x") && event_name.len() > 2 {
            let (was_guessed, name) = self.repository.guess_event_name(&event_name).await;
            guessed = was_guessed;
            event_name = name;
        }

        DecodedEvent {
            chain_id: chain_id.to_string(),
            tx_hash: transaction.tx_hash.clone(),
            timestamp: block.timestamp,
            contract: AddressInfo::new(address_to_hex(&event.contract), contract_name),
            index: event.log_index,
            call_id: event.call_id.clone(),
            event_signature,
            event_name,
            parameters,
            event_guessed: guessed,
        }
    }
}

/// The ERC-20 or ERC-721 reading of a shared topic hash, chosen by whether
/// the log's indexed-topic count matches the table entry. This is what tells
/// `Transfer(address,address,uint256)` apart between the two standards.
fn standard_event_with_matching_topics(
    signature: &str,
    topics: &[txlens_core::types::H256],
) -> Option<EventSemantics> {
    let indexed_topics = topics.len().saturating_sub(1);

    for table in [&ERC20_EVENTS, &ERC721_EVENTS] {
        if let Some(event) = table.get(signature) {
            let indexed_parameters =
                event.parameters.iter().filter(|parameter| parameter.indexed).count();
            if indexed_parameters == indexed_topics {
                return Some(event.clone())
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use txlens_core::types::H256;
    use txlens_semantics::standards::erc20::TRANSFER_EVENT_TOPIC;

    fn topic(byte: u8) -> H256 {
        H256::from_slice(&[byte; 32])
    }

    fn transfer_topic() -> H256 {
        let bytes = hex::decode(&TRANSFER_EVENT_TOPIC[2..]).unwrap();
        H256::from_slice(&bytes)
    }

    #[test]
    fn indexed_topic_count_selects_the_standard() {
        // 2 indexed topics: the ERC-20 Transfer with a data-borne value
        let erc20_topics = vec![transfer_topic(), topic(0xaa), topic(0xbb)];
        let event =
            standard_event_with_matching_topics(TRANSFER_EVENT_TOPIC, &erc20_topics).unwrap();
        assert!(!event.parameters[2].indexed);

        // 3 indexed topics: the ERC-721 Transfer with an indexed token id
        let erc721_topics = vec![transfer_topic(), topic(0xaa), topic(0xbb), topic(0xcc)];
        let event =
            standard_event_with_matching_topics(TRANSFER_EVENT_TOPIC, &erc721_topics).unwrap();
        assert!(event.parameters[2].indexed);
        assert_eq!(event.parameters[2].name, "tokenId");

        // 1 indexed topic matches neither table entry
        assert!(standard_event_with_matching_topics(
            TRANSFER_EVENT_TOPIC,
            &[transfer_topic(), topic(0xaa)]
        )
        .is_none());
    }
}
