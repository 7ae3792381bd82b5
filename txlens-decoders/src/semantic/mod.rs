//! Stage two: semantic enrichment of an ABI-decoded transaction.

pub mod context;
pub mod expr;

mod balances;
mod calls;
mod events;
mod metadata;
mod transfers;

pub use context::{get_badge, TransformationContext};
pub use expr::{Evaluator, ExprError};

use crate::proxies::ProxyMap;
use std::sync::Arc;
use tracing::error;
use txlens_core::{
    decoded::DecodedTransaction,
    types::{BlockMetadata, TransactionMetadata},
};
use txlens_semantics::SemanticsRepository;

/// Applies transformations, badges and formatting on top of the ABI stage.
pub struct SemanticDecoder {
    pub(crate) repository: Arc<SemanticsRepository>,
}

impl SemanticDecoder {
    pub fn new(repository: Arc<SemanticsRepository>) -> Self {
        Self { repository }
    }

    /// Enriches metadata, events, calls, transfers and balances, in that
    /// order. A failing stage keeps its ABI-stage output and unsets
    /// `status`.
    pub async fn decode_transaction(
        &self,
        block: &BlockMetadata,
        raw_metadata: &TransactionMetadata,
        mut transaction: DecodedTransaction,
        proxies: &ProxyMap,
        chain_id: &str,
    ) -> DecodedTransaction {
        let metadata = self.decode_metadata(block, raw_metadata, chain_id).await;

        transaction.events = self.decode_events(transaction.events, &metadata, proxies).await;

        transaction.calls = match transaction.calls {
            Some(calls) => match self.decode_calls(calls.clone(), &metadata, proxies).await {
                Ok(decoded) => Some(decoded),
                Err(err) => {
                    error!(
                        target: "decoders",
                        tx_hash = %metadata.tx_hash, chain_id, %err,
                        "semantic decoding of calls failed"
                    );
                    transaction.status = false;
                    Some(calls)
                }
            },
            None => None,
        };

        transaction.transfers = self.decode_transfers(transaction.transfers, &metadata);
        transaction.balances = self.decode_balances(transaction.balances, &metadata);
        transaction.metadata = metadata;
        transaction
    }
}
