//! Semantic decoding of transaction metadata.

use super::SemanticDecoder;
use txlens_core::{
    decoded::{AddressInfo, Badge, DecodedTransactionMetadata},
    types::{address_to_hex, h256_to_hex, BlockMetadata, TransactionMetadata},
    utils::u256_to_f64,
};

impl SemanticDecoder {
    /// Labels the endpoints and converts the gas price to gwei.
    pub async fn decode_metadata(
        &self,
        block_metadata: &BlockMetadata,
        tx_metadata: &TransactionMetadata,
        chain_id: &str,
    ) -> DecodedTransactionMetadata {
        let sender_name = self
            .repository
            .get_address_label(chain_id, Some(tx_metadata.from_address), None)
            .await;
        let sender = AddressInfo::new(address_to_hex(&tx_metadata.from_address), sender_name)
            .with_badge(Some(Badge::Sender));

        let receiver = match tx_metadata.to_address {
            Some(to_address) => {
                let name =
                    self.repository.get_address_label(chain_id, Some(to_address), None).await;
                Some(
                    AddressInfo::new(address_to_hex(&to_address), name)
                        .with_badge(Some(Badge::Receiver)),
                )
            }
            None => None,
        };

        DecodedTransactionMetadata {
            chain_id: chain_id.to_string(),
            tx_hash: tx_metadata.tx_hash.clone(),
            block_number: block_metadata.block_number,
            block_hash: h256_to_hex(&block_metadata.block_hash),
            timestamp: block_metadata.timestamp,
            gas_price: u256_to_f64(tx_metadata.gas_price) / 1e9,
            sender,
            receiver,
            tx_index: tx_metadata.tx_index,
            tx_value: tx_metadata.tx_value,
            gas_limit: tx_metadata.gas_limit,
            gas_used: tx_metadata.gas_used,
            success: tx_metadata.success,
        }
    }
}
