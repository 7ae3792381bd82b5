//! # txlens
//!
//! A semantic decoder for Ethereum transactions. Given a transaction hash,
//! txlens fetches the raw transaction, its receipt and its traced call tree,
//! resolves contract semantics from a write-through repository, ABI-decodes
//! every call and log, extracts ETH and token transfers with per-holder
//! balance deltas, and applies per-parameter semantic transformations.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use txlens::{Txlens, TxlensConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut nodes = HashMap::new();
//! nodes.insert("mainnet".to_string(), "http://localhost:8545".parse()?);
//! let mut sources = HashMap::new();
//! sources.insert("mainnet".to_string(), "https://api.etherscan.io/api".parse()?);
//!
//! let txlens = Txlens::new(TxlensConfig {
//!     nodes,
//!     etherscan_urls: sources,
//!     etherscan_api_key: None,
//!     ..TxlensConfig::default()
//! });
//!
//! let decoded = txlens
//!     .decode_transaction(None, "0xd7701a0fc05593aee3a16f20cab605db7183f752ae942cc75fd0975feaf1072e")
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&decoded)?);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code, rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use txlens_core as core;
pub use txlens_decoders as decoders;
pub use txlens_providers as providers;
pub use txlens_semantics as semantics;

/// Easy imports of the most common types.
pub mod prelude {
    pub use super::{Txlens, TxlensConfig};
    pub use txlens_core::{
        decoded::{DecodedCall, DecodedEvent, DecodedTransaction, DecodedTransfer, Value},
        semantics::{AddressSemantics, ContractSemantics, TokenStandard},
        types::{Address, H256, U256},
    };
    pub use txlens_decoders::{DecodeError, DecoderService};
    pub use txlens_semantics::{MemoryDatabase, SemanticsDatabase, SemanticsRepository};
}

use std::{collections::HashMap, sync::Arc, time::Duration};
use txlens_core::decoded::DecodedTransaction;
use txlens_decoders::{DecodeError, DecoderService};
use txlens_providers::{
    EnsClient, EtherscanClient, FourByteClient, NodeClient, NodeProvider,
};
use txlens_semantics::{MemoryDatabase, SemanticsDatabase, SemanticsRepository};
use url::Url;

/// Connection and behavior settings for a [`Txlens`] instance.
#[derive(Clone, Debug)]
pub struct TxlensConfig {
    /// JSON-RPC endpoint per chain id.
    pub nodes: HashMap<String, Url>,
    /// Verified-source API endpoint per chain id.
    pub etherscan_urls: HashMap<String, Url>,
    pub etherscan_api_key: Option<String>,
    /// Signature directory API; `None` uses 4byte.directory.
    pub signature_directory: Option<Url>,
    pub default_chain: String,
    /// Re-resolve ENS names of stored EOAs that only carry their hex as a
    /// name.
    pub refresh_ens: bool,
    /// Wall-clock budget for a single decode.
    pub decode_timeout: Duration,
}

impl Default for TxlensConfig {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            etherscan_urls: HashMap::new(),
            etherscan_api_key: None,
            signature_directory: None,
            default_chain: "mainnet".to_string(),
            refresh_ens: true,
            decode_timeout: Duration::from_secs(180),
        }
    }
}

/// The assembled decoding stack.
pub struct Txlens {
    repository: Arc<SemanticsRepository>,
    service: DecoderService,
}

impl Txlens {
    /// Builds the full stack with an in-memory semantics database.
    pub fn new(config: TxlensConfig) -> Self {
        Self::with_database(config, Arc::new(MemoryDatabase::new()))
    }

    /// Builds the full stack on top of a custom semantics database.
    pub fn with_database(config: TxlensConfig, database: Arc<dyn SemanticsDatabase>) -> Self {
        let node: Arc<dyn NodeProvider> = Arc::new(NodeClient::new(config.nodes));
        let source = Arc::new(EtherscanClient::new(
            config.etherscan_urls,
            config.etherscan_api_key,
        ));
        let signatures = Arc::new(
            config.signature_directory.map(FourByteClient::new).unwrap_or_default(),
        );
        let names = Arc::new(EnsClient::new(Arc::clone(&node)));

        let repository = Arc::new(SemanticsRepository::new(
            database,
            source,
            Arc::clone(&node),
            names,
            signatures,
            config.refresh_ens,
        ));

        let service = DecoderService::new(
            Arc::clone(&repository),
            node,
            config.default_chain,
            config.decode_timeout,
        );

        Self { repository, service }
    }

    /// Decodes one transaction on the given chain (or the configured
    /// default).
    pub async fn decode_transaction(
        &self,
        chain_id: Option<&str>,
        tx_hash: &str,
    ) -> Result<DecodedTransaction, DecodeError> {
        self.service.decode_transaction(chain_id, tx_hash).await
    }

    /// The shared semantics repository, for embedders that want to inspect
    /// or pre-warm it.
    pub fn repository(&self) -> &Arc<SemanticsRepository> {
        &self.repository
    }
}
