//! Primitive and raw object types.

pub use ethereum_types::{Address, H160, H256, U256, U64};

mod i256;
pub use i256::I256;

mod objects;
pub use objects::{
    address_to_hex, h256_to_hex, timestamp_from_secs, BlockMetadata, Call, CallType, Event,
    Transaction, TransactionMetadata,
};

/// A function selector: the first 4 bytes of the Keccak-256 hash of the
/// canonical signature.
pub type Selector = [u8; 4];
