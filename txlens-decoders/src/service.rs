//! The per-transaction orchestrator.

use crate::{
    abi::{prune_delegates, AbiDecoder},
    error::DecodeError,
    proxies::{get_delegations, get_proxies},
    semantic::SemanticDecoder,
};
use std::{sync::Arc, time::Duration};
use tracing::info;
use txlens_core::decoded::DecodedTransaction;
use txlens_providers::NodeProvider;
use txlens_semantics::SemanticsRepository;

/// Wires the decoders, the repository and the node into the per-transaction
/// pipeline: fetch raw → resolve proxies → ABI decode → semantic decode.
pub struct DecoderService {
    abi_decoder: AbiDecoder,
    semantic_decoder: SemanticDecoder,
    node: Arc<dyn NodeProvider>,
    repository: Arc<SemanticsRepository>,
    default_chain: String,
    decode_timeout: Duration,
}

impl DecoderService {
    pub fn new(
        repository: Arc<SemanticsRepository>,
        node: Arc<dyn NodeProvider>,
        default_chain: impl Into<String>,
        decode_timeout: Duration,
    ) -> Self {
        Self {
            abi_decoder: AbiDecoder::new(Arc::clone(&repository)),
            semantic_decoder: SemanticDecoder::new(Arc::clone(&repository)),
            node,
            repository,
            default_chain: default_chain.into(),
            decode_timeout,
        }
    }

    pub fn repository(&self) -> &Arc<SemanticsRepository> {
        &self.repository
    }

    /// Decodes one transaction end to end. A decode that exceeds the
    /// configured wall-clock budget is abandoned; its partial state is
    /// dropped.
    pub async fn decode_transaction(
        &self,
        chain_id: Option<&str>,
        tx_hash: &str,
    ) -> Result<DecodedTransaction, DecodeError> {
        let tx_hash = normalize_tx_hash(tx_hash)?;
        let chain_id = chain_id.unwrap_or(&self.default_chain).to_string();

        tokio::time::timeout(self.decode_timeout, self.decode_inner(&chain_id, &tx_hash))
            .await
            .map_err(|_| DecodeError::Timeout)?
    }

    async fn decode_inner(
        &self,
        chain_id: &str,
        tx_hash: &str,
    ) -> Result<DecodedTransaction, DecodeError> {
        self.repository.record();

        let transaction = self.node.get_full_transaction(chain_id, tx_hash).await?;
        let block = self.node.get_block(chain_id, transaction.metadata.block_number).await?;

        // delegatecall targets first, so the ABI fallbacks can see through
        // proxies
        let delegations = get_delegations(&transaction.root_call);
        let proxies =
            get_proxies(&self.repository, self.node.as_ref(), &delegations, chain_id).await;

        let mut decoded =
            self.abi_decoder.decode_transaction(&block, &transaction, &proxies, chain_id).await;
        decoded.calls = decoded.calls.map(prune_delegates);

        let decoded = self
            .semantic_decoder
            .decode_transaction(&block, &transaction.metadata, decoded, &proxies, chain_id)
            .await;

        let used = self.repository.end_record();
        info!(
            target: "decoders",
            tx_hash, chain_id,
            semantics_used = used.len(),
            "transaction decoded"
        );

        Ok(decoded)
    }
}

/// Validates a transaction hash and normalizes it to its `0x`-prefixed form.
pub fn normalize_tx_hash(tx_hash: &str) -> Result<String, DecodeError> {
    let digits = tx_hash.strip_prefix("0x").unwrap_or(tx_hash);
    if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DecodeError::InvalidTransactionHash(tx_hash.to_string()))
    }
    Ok(format!("0x{digits}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_and_normalizes_tx_hashes() {
        let digits = "ab".repeat(32);

        assert_eq!(normalize_tx_hash(&format!("0x{digits}")).unwrap(), format!("0x{digits}"));
        assert_eq!(normalize_tx_hash(&digits).unwrap(), format!("0x{digits}"));

        assert!(normalize_tx_hash("notahash").is_err());
        assert!(normalize_tx_hash(&"ab".repeat(31)).is_err());
        assert!(normalize_tx_hash(&format!("0x{}zz", "ab".repeat(31))).is_err());
    }
}
