//! Persistence boundary of the repository.
//!
//! Three logical collections: `addresses` keyed by `(chain_id, address)`,
//! `contracts` keyed by code hash, and `signatures` keyed by
//! `(hash, argument shape)`; several signatures may share a hash.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::Mutex,
};
use txlens_core::{
    semantics::{ContractSemantics, Erc20Semantics, Signature, TokenStandard},
    types::Address,
};

/// The `addresses` collection row: the contract is stored as a code-hash
/// reference, never inline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub chain_id: String,
    pub address: Address,
    pub name: String,
    pub is_contract: bool,
    /// Code hash referencing the `contracts` collection.
    pub contract: String,
    #[serde(default)]
    pub standard: Option<TokenStandard>,
    #[serde(default)]
    pub erc20: Option<Erc20Semantics>,
}

/// Key-value store behind the semantics repository.
///
/// Implementations must make [`upsert_signature`](Self::upsert_signature)
/// atomic per `(hash, argument shape)`: concurrent observations of the same
/// signature may not lose count increments or the guessed-flag promotion.
#[async_trait]
pub trait SemanticsDatabase: Send + Sync {
    async fn get_address(&self, chain_id: &str, address: Address) -> Option<AddressRecord>;
    async fn insert_address(&self, record: AddressRecord);

    async fn get_contract(&self, code_hash: &str) -> Option<ContractSemantics>;
    async fn insert_contract(&self, contract: ContractSemantics);

    async fn get_signatures(&self, signature_hash: &str) -> Vec<Signature>;

    /// Inserts the signature, or bumps the count of the stored row with the
    /// same name and argument shape. A row re-observed from a verified source
    /// loses its `guessed` mark, and placeholder argument names (`arg_<i>`)
    /// are replaced by the observed ones.
    async fn upsert_signature(&self, signature: Signature);
}

#[derive(Default)]
struct Collections {
    addresses: HashMap<(String, Address), AddressRecord>,
    contracts: HashMap<String, ContractSemantics>,
    signatures: HashMap<String, Vec<Signature>>,
}

/// In-memory database, used in tests and by embedders without persistence.
#[derive(Default)]
pub struct MemoryDatabase {
    collections: Mutex<Collections>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SemanticsDatabase for MemoryDatabase {
    async fn get_address(&self, chain_id: &str, address: Address) -> Option<AddressRecord> {
        let collections = self.collections.lock().expect("collections lock");
        collections.addresses.get(&(chain_id.to_string(), address)).cloned()
    }

    async fn insert_address(&self, record: AddressRecord) {
        let mut collections = self.collections.lock().expect("collections lock");
        collections.addresses.insert((record.chain_id.clone(), record.address), record);
    }

    async fn get_contract(&self, code_hash: &str) -> Option<ContractSemantics> {
        let collections = self.collections.lock().expect("collections lock");
        collections.contracts.get(code_hash).cloned()
    }

    async fn insert_contract(&self, contract: ContractSemantics) {
        let mut collections = self.collections.lock().expect("collections lock");
        collections.contracts.insert(contract.code_hash.clone(), contract);
    }

    async fn get_signatures(&self, signature_hash: &str) -> Vec<Signature> {
        let collections = self.collections.lock().expect("collections lock");
        collections.signatures.get(signature_hash).cloned().unwrap_or_default()
    }

    async fn upsert_signature(&self, signature: Signature) {
        // single locked section: the compare-and-update is atomic
        let mut collections = self.collections.lock().expect("collections lock");
        let rows = collections.signatures.entry(signature.signature_hash.clone()).or_default();

        for row in rows.iter_mut() {
            if row.name == signature.name && row.args.len() == signature.args.len() {
                let placeholders = row.args.iter().any(|arg| arg.name.starts_with("arg_"));
                if placeholders && !signature.args.is_empty() {
                    row.args = signature.args.clone();
                }
                row.count += 1;
                if !signature.guessed {
                    row.guessed = false;
                }
                return
            }
        }

        rows.push(signature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txlens_core::semantics::SignatureArg;

    fn signature(name: &str, guessed: bool) -> Signature {
        Signature {
            signature_hash: "0xa9059cbb".to_string(),
            name: name.to_string(),
            args: vec![
                SignatureArg { name: "arg_0".to_string(), arg_type: "address".to_string() },
                SignatureArg { name: "arg_1".to_string(), arg_type: "uint256".to_string() },
            ],
            count: 1,
            tuple: false,
            guessed,
        }
    }

    #[tokio::test]
    async fn upsert_increments_and_promotes() {
        let database = MemoryDatabase::new();
        database.upsert_signature(signature("transfer", true)).await;
        database.upsert_signature(signature("transfer", true)).await;

        let rows = database.get_signatures("0xa9059cbb").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 2);
        assert!(rows[0].guessed);

        // observed from a verified source: promoted
        database.upsert_signature(signature("transfer", false)).await;
        let rows = database.get_signatures("0xa9059cbb").await;
        assert_eq!(rows[0].count, 3);
        assert!(!rows[0].guessed);
    }

    #[tokio::test]
    async fn different_shapes_share_a_hash() {
        let database = MemoryDatabase::new();
        database.upsert_signature(signature("transfer", true)).await;
        let mut other = signature("transfer", true);
        other.args.pop();
        database.upsert_signature(other).await;

        assert_eq!(database.get_signatures("0xa9059cbb").await.len(), 2);
    }

    #[tokio::test]
    async fn placeholder_argument_names_get_replaced() {
        let database = MemoryDatabase::new();
        database.upsert_signature(signature("transfer", true)).await;

        let mut named = signature("transfer", false);
        named.args[0].name = "recipient".to_string();
        named.args[1].name = "amount".to_string();
        database.upsert_signature(named).await;

        let rows = database.get_signatures("0xa9059cbb").await;
        assert_eq!(rows[0].args[0].name, "recipient");
    }

    #[tokio::test]
    async fn address_records_round_trip() {
        let database = MemoryDatabase::new();
        let record = AddressRecord {
            chain_id: "mainnet".to_string(),
            address: Address::from_slice(&[1u8; 20]),
            name: "Dai".to_string(),
            is_contract: true,
            contract: "0xc0de".to_string(),
            standard: Some(TokenStandard::Erc20),
            erc20: None,
        };
        database.insert_address(record.clone()).await;
        let loaded =
            database.get_address("mainnet", Address::from_slice(&[1u8; 20])).await.unwrap();
        assert_eq!(loaded, record);
        assert!(database.get_address("goerli", record.address).await.is_none());
    }
}
