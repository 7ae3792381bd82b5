//! Stage one: ABI decoding of calls, events, transfers and balances.

mod balances;
mod calls;
mod events;
mod transfers;

pub use calls::prune_delegates;
pub use transfers::ZERO_ADDRESS;

use crate::proxies::ProxyMap;
use std::sync::Arc;
use tracing::error;
use txlens_core::{
    decoded::{AddressInfo, Badge, DecodedTransaction, DecodedTransactionMetadata},
    types::{address_to_hex, h256_to_hex, BlockMetadata, Transaction, TransactionMetadata},
    utils::u256_to_f64,
};
use txlens_semantics::SemanticsRepository;

/// Decodes one transaction's raw artifacts against the semantics repository.
pub struct AbiDecoder {
    pub(crate) repository: Arc<SemanticsRepository>,
}

impl AbiDecoder {
    pub fn new(repository: Arc<SemanticsRepository>) -> Self {
        Self { repository }
    }

    /// Runs every ABI stage. A failing stage is logged and yields partial
    /// results with `status` unset rather than an error; only the orchestrator
    /// treats anything as fatal.
    pub async fn decode_transaction(
        &self,
        block: &BlockMetadata,
        transaction: &Transaction,
        proxies: &ProxyMap,
        chain_id: &str,
    ) -> DecodedTransaction {
        let tx_hash = transaction.metadata.tx_hash.as_str();
        let mut status = true;

        let events = self
            .decode_events(&transaction.events, block, &transaction.metadata, proxies, chain_id)
            .await;

        let calls = match self
            .decode_calls(&transaction.root_call, block, &transaction.metadata, proxies, chain_id)
            .await
        {
            Ok(calls) => Some(calls),
            Err(err) => {
                error!(target: "decoders", tx_hash, chain_id, %err, "ABI decoding of calls failed");
                status = false;
                None
            }
        };

        let transfers = match self
            .decode_transfers(calls.as_ref(), &events, &transaction.events, proxies, chain_id)
            .await
        {
            Ok(transfers) => transfers,
            Err(err) => {
                error!(target: "decoders", tx_hash, chain_id, %err, "ABI decoding of transfers failed");
                status = false;
                vec![]
            }
        };

        let balances = self.decode_balances(&transfers);

        DecodedTransaction {
            block_metadata: block.clone(),
            metadata: initial_metadata(chain_id, block, &transaction.metadata),
            events,
            calls,
            transfers,
            balances,
            status,
        }
    }
}

/// Metadata before semantic labeling: addresses carry their bare hex as the
/// name, the gas price is already in gwei.
pub fn initial_metadata(
    chain_id: &str,
    block: &BlockMetadata,
    metadata: &TransactionMetadata,
) -> DecodedTransactionMetadata {
    let sender_hex = address_to_hex(&metadata.from_address);
    let receiver = metadata.to_address.map(|to_address| {
        let hex = address_to_hex(&to_address);
        AddressInfo::new(hex.clone(), hex).with_badge(Some(Badge::Receiver))
    });

    DecodedTransactionMetadata {
        chain_id: chain_id.to_string(),
        tx_hash: metadata.tx_hash.clone(),
        block_number: metadata.block_number,
        block_hash: h256_to_hex(&block.block_hash),
        timestamp: block.timestamp,
        gas_price: u256_to_f64(metadata.gas_price) / 1e9,
        sender: AddressInfo::new(sender_hex.clone(), sender_hex).with_badge(Some(Badge::Sender)),
        receiver,
        tx_index: metadata.tx_index,
        tx_value: metadata.tx_value,
        gas_limit: metadata.gas_limit,
        gas_used: metadata.gas_used,
        success: metadata.success,
    }
}

pub(crate) use calls::RECURSION_LIMIT;
