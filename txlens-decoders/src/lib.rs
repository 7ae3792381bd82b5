//! The txlens decoding pipeline: ABI decoding of calls and events, transfer
//! and balance synthesis, proxy resolution, semantic transformations and the
//! per-transaction orchestrator.

#![deny(unsafe_code, rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod abi;
pub use abi::{initial_metadata, prune_delegates, AbiDecoder};

mod error;
pub use error::DecodeError;

pub mod proxies;
pub use proxies::{get_delegations, get_proxies, ProxyMap};

pub mod semantic;
pub use semantic::{Evaluator, ExprError, SemanticDecoder, TransformationContext};

mod service;
pub use service::{normalize_tx_hash, DecoderService};
