//! External collaborators of the decoding pipeline: the node, the
//! verified-source API, the signature directory and the name service.
//!
//! Every provider is a trait with an HTTP-backed default implementation, so
//! tests and embedders can substitute their own sources.

#![deny(unsafe_code, rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod errors;
pub use errors::{ProviderError, SourceError};

pub mod rpc;
pub use rpc::{Http, JsonRpcError};

pub mod node;
pub use node::{
    get_code_hash, get_erc20_token, guess_erc20_proxy, guess_erc20_token, CallFrame, NodeClient,
    NodeProvider, CALL_TRACER,
};

pub mod etherscan;
pub use etherscan::{EtherscanClient, SourceProvider, VerifiedContract};

pub mod fourbyte;
pub use fourbyte::{FourByteClient, SignatureProvider, SignatureText};

pub mod ens;
pub use ens::{namehash, EnsClient, NameProvider, NoopNames};
