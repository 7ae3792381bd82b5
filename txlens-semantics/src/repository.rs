//! The semantics repository: a caching, write-through store answering every
//! "what does this address mean" question the decoders ask.

use crate::{
    amendments::amend_contract_semantics,
    database::{AddressRecord, SemanticsDatabase},
    precompiles::precompiled,
    standards::{
        erc20::{ERC20_EVENTS, ERC20_FUNCTIONS},
        erc721::{ERC721_EVENTS, ERC721_FUNCTIONS},
    },
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};
use tracing::{info, warn};
use txlens_core::{
    decoded::Proxy,
    semantics::{
        AddressSemantics, ContractSemantics, Erc20Semantics, EventSemantics, FunctionSemantics,
        ParameterSemantics, Signature, SignatureArg, TokenStandard, TransformationMap,
    },
    types::{address_to_hex, Address},
};
use txlens_providers::{
    get_code_hash, get_erc20_token, guess_erc20_proxy, guess_erc20_token, NameProvider,
    NodeProvider, SignatureProvider, SignatureText, SourceProvider,
};

/// Keccak-256 of empty bytecode: the code hash of every externally owned
/// account.
pub const EMPTY_CODE_HASH: &str =
    "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470";

/// Token metadata served to the transfer decoders.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenData {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub standard: &'static str,
}

type Cache = HashMap<(String, Address), Arc<AddressSemantics>>;

/// Shared, read-mostly semantics store.
///
/// Returned records are [`Arc`] snapshots: once handed out they stay stable
/// for the duration of a decode, regardless of concurrent writes.
pub struct SemanticsRepository {
    database: Arc<dyn SemanticsDatabase>,
    source: Arc<dyn SourceProvider>,
    node: Arc<dyn NodeProvider>,
    names: Arc<dyn NameProvider>,
    signatures: Arc<dyn SignatureProvider>,
    refresh_ens: bool,
    cache: RwLock<Cache>,
    records: Mutex<Option<Vec<Address>>>,
}

impl SemanticsRepository {
    pub fn new(
        database: Arc<dyn SemanticsDatabase>,
        source: Arc<dyn SourceProvider>,
        node: Arc<dyn NodeProvider>,
        names: Arc<dyn NameProvider>,
        signatures: Arc<dyn SignatureProvider>,
        refresh_ens: bool,
    ) -> Self {
        Self {
            database,
            source,
            node,
            names,
            signatures,
            refresh_ens,
            cache: RwLock::new(HashMap::new()),
            records: Mutex::new(None),
        }
    }

    /// Starts recording which addresses a decode touches, for logging.
    pub fn record(&self) {
        *self.records.lock().expect("records lock") = Some(vec![]);
    }

    /// Stops recording and returns the touched addresses.
    pub fn end_record(&self) -> Vec<Address> {
        self.records.lock().expect("records lock").take().unwrap_or_default()
    }

    fn note_usage(&self, address: Address) {
        if let Some(records) = self.records.lock().expect("records lock").as_mut() {
            records.push(address);
        }
    }

    /// The semantics of an address, from cache, database or external
    /// sources in that order. Never fails: unreachable sources degrade into
    /// an unlabeled record that is cached but not persisted.
    pub async fn get_semantics(&self, chain_id: &str, address: Address) -> Arc<AddressSemantics> {
        let key = (chain_id.to_string(), address);
        if let Some(semantics) = self.cache.read().expect("semantics cache").get(&key) {
            self.note_usage(address);
            return Arc::clone(semantics)
        }

        let (mut semantics, persist) = match self.read_stored(chain_id, address).await {
            Some(semantics) => (semantics, false),
            None => self.create_address_semantics(chain_id, address).await,
        };

        if persist {
            self.update_semantics(&semantics).await;
        }

        // amend the in-memory copy only; the persisted record stays canonical
        let mut contract =
            Arc::try_unwrap(semantics.contract).unwrap_or_else(|shared| (*shared).clone());
        amend_contract_semantics(&mut contract);
        semantics.contract = Arc::new(contract);

        let semantics = Arc::new(semantics);
        self.cache.write().expect("semantics cache").insert(key, Arc::clone(&semantics));
        self.note_usage(address);
        semantics
    }

    async fn read_stored(&self, chain_id: &str, address: Address) -> Option<AddressSemantics> {
        let record = self.database.get_address(chain_id, address).await?;
        let contract = match self.database.get_contract(&record.contract).await {
            Some(contract) => contract,
            None => ContractSemantics::named(record.contract.clone(), record.name.clone()),
        };

        let mut semantics = AddressSemantics {
            chain_id: record.chain_id,
            address: record.address,
            name: record.name,
            is_contract: record.is_contract,
            contract: Arc::new(contract),
            standard: record.standard,
            erc20: record.erc20,
        };

        // a lone hex name on an EOA may have gained a reverse record since
        if self.refresh_ens &&
            !semantics.is_contract &&
            semantics.name == address_to_hex(&address)
        {
            if let Some(name) = self.names.name(chain_id, address).await {
                semantics.name = name;
                self.update_semantics(&semantics).await;
            }
        }

        Some(semantics)
    }

    /// Builds semantics for a never-seen address. Returns the record and
    /// whether it is trustworthy enough to persist.
    async fn create_address_semantics(
        &self,
        chain_id: &str,
        address: Address,
    ) -> (AddressSemantics, bool) {
        let address_name = address_to_hex(&address);

        let code_hash = match get_code_hash(self.node.as_ref(), chain_id, address).await {
            Ok(code_hash) => code_hash,
            Err(err) => {
                warn!(target: "semantics", %address, %err, "bytecode fetch failed");
                let semantics = AddressSemantics {
                    chain_id: chain_id.to_string(),
                    address,
                    name: address_name.clone(),
                    is_contract: false,
                    contract: Arc::new(ContractSemantics::named("", address_name)),
                    standard: None,
                    erc20: None,
                };
                return (semantics, false)
            }
        };

        if code_hash == EMPTY_CODE_HASH {
            // externally owned account
            let name =
                self.names.name(chain_id, address).await.unwrap_or_else(|| address_name.clone());
            let semantics = AddressSemantics {
                chain_id: chain_id.to_string(),
                address,
                name,
                is_contract: false,
                contract: Arc::new(ContractSemantics::named(EMPTY_CODE_HASH, "EOA")),
                standard: None,
                erc20: None,
            };
            return (semantics, true)
        }

        match self.source.get_contract(chain_id, address).await {
            Ok(Some(verified)) => {
                let (standard, standard_erc20) = self
                    .decode_standard_semantics(
                        chain_id,
                        address,
                        &verified.name,
                        &verified.events,
                        &verified.functions,
                    )
                    .await;
                let erc20 = match (standard, standard_erc20) {
                    (Some(TokenStandard::Erc20), semantics) => semantics,
                    _ => guess_erc20_proxy(self.node.as_ref(), chain_id, address).await,
                };

                let contract = ContractSemantics {
                    code_hash: code_hash.clone(),
                    name: verified.name.clone(),
                    events: verified.events,
                    functions: verified.functions,
                    transformations: HashMap::new(),
                };
                let semantics = AddressSemantics {
                    chain_id: chain_id.to_string(),
                    address,
                    name: verified.name,
                    is_contract: true,
                    contract: Arc::new(contract),
                    standard,
                    erc20,
                };
                (semantics, true)
            }
            verified => {
                if let Err(err) = verified {
                    warn!(target: "semantics", %address, %err, "verified source lookup failed");
                }
                // not verified: the bytecode may still reveal a token
                let erc20 = guess_erc20_token(self.node.as_ref(), chain_id, address).await;
                let standard = erc20.as_ref().map(|_| TokenStandard::Erc20);
                let semantics = AddressSemantics {
                    chain_id: chain_id.to_string(),
                    address,
                    name: address_name.clone(),
                    is_contract: true,
                    contract: Arc::new(ContractSemantics::named(code_hash, address_name)),
                    standard,
                    erc20,
                };
                (semantics, true)
            }
        }
    }

    /// Classifies a verified contract by signature-set membership.
    async fn decode_standard_semantics(
        &self,
        chain_id: &str,
        address: Address,
        name: &str,
        events: &HashMap<String, EventSemantics>,
        functions: &HashMap<String, FunctionSemantics>,
    ) -> (Option<TokenStandard>, Option<Erc20Semantics>) {
        let has_all = |required_events: &HashMap<String, EventSemantics>,
                       required_functions: &HashMap<String, FunctionSemantics>| {
            required_events.keys().all(|topic| events.contains_key(topic)) &&
                required_functions.keys().all(|selector| functions.contains_key(selector))
        };

        if has_all(&ERC20_EVENTS, &ERC20_FUNCTIONS) {
            let erc20 =
                get_erc20_token(self.node.as_ref(), chain_id, address, name, functions).await;
            (Some(TokenStandard::Erc20), Some(erc20))
        } else if has_all(&ERC721_EVENTS, &ERC721_FUNCTIONS) {
            (Some(TokenStandard::Erc721), None)
        } else {
            (None, None)
        }
    }

    /// Write-through: the contract by code hash, the address record by
    /// `(chain_id, address)`, and the contract's selectors into the
    /// signature index.
    async fn update_semantics(&self, semantics: &AddressSemantics) {
        self.database.insert_contract((*semantics.contract).clone()).await;
        self.database
            .insert_address(AddressRecord {
                chain_id: semantics.chain_id.clone(),
                address: semantics.address,
                name: semantics.name.clone(),
                is_contract: semantics.is_contract,
                contract: semantics.contract.code_hash.clone(),
                standard: semantics.standard,
                erc20: semantics.erc20.clone(),
            })
            .await;
        self.insert_contract_signatures(&semantics.contract).await;
    }

    async fn insert_contract_signatures(&self, contract: &ContractSemantics) {
        for function in contract.functions.values() {
            if !function.signature.starts_with("0x") {
                continue
            }

            let args: Vec<SignatureArg> =
                if function.inputs.len() == 1 && function.inputs[0].parameter_type == "tuple" {
                    function.inputs[0]
                        .components
                        .iter()
                        .map(|parameter| SignatureArg {
                            name: parameter.name.clone(),
                            arg_type: parameter.parameter_type.clone(),
                        })
                        .collect()
                } else {
                    function
                        .inputs
                        .iter()
                        .map(|parameter| SignatureArg {
                            name: parameter.name.clone(),
                            arg_type: parameter.parameter_type.clone(),
                        })
                        .collect()
                };

            self.database
                .upsert_signature(Signature::new(&function.signature, &function.name, args))
                .await;
        }
    }

    pub async fn get_event_abi(
        &self,
        chain_id: &str,
        address: Address,
        signature: &str,
    ) -> Option<EventSemantics> {
        self.get_semantics(chain_id, address).await.contract.events.get(signature).cloned()
    }

    /// The contract's unique anonymous event, the only reading an unknown
    /// topic can get (e.g. Maker's LogNote).
    pub async fn get_anonymous_event_abi(
        &self,
        chain_id: &str,
        address: Address,
    ) -> Option<EventSemantics> {
        self.get_semantics(chain_id, address).await.contract.unique_anonymous_event().cloned()
    }

    pub async fn get_function_abi(
        &self,
        chain_id: &str,
        address: Address,
        signature: &str,
    ) -> Option<FunctionSemantics> {
        self.get_semantics(chain_id, address).await.contract.functions.get(signature).cloned()
    }

    pub async fn get_constructor_abi(
        &self,
        chain_id: &str,
        address: Address,
    ) -> Option<FunctionSemantics> {
        let mut constructor = self
            .get_semantics(chain_id, address)
            .await
            .contract
            .functions
            .get("constructor")
            .cloned()?;
        constructor.outputs.push(
            ParameterSemantics::new("__create_output__", "ignore").dynamic(),
        );
        Some(constructor)
    }

    pub async fn get_transformations(
        &self,
        chain_id: &str,
        address: Address,
        signature: &str,
    ) -> Option<TransformationMap> {
        self.get_semantics(chain_id, address)
            .await
            .contract
            .transformations
            .get(signature)
            .cloned()
    }

    /// The best label for an address: token symbol, proxy name, stored name
    /// or the bare hex.
    pub async fn get_address_label(
        &self,
        chain_id: &str,
        address: Option<Address>,
        proxies: Option<&HashMap<Address, Proxy>>,
    ) -> String {
        let Some(address) = address else { return String::new() };

        if precompiled(&address).is_some() {
            return "Precompiled".to_string()
        }

        let semantics = self.get_semantics(chain_id, address).await;
        if let Some(erc20) = &semantics.erc20 {
            return erc20.symbol.clone()
        }
        if let Some(proxy) = proxies.and_then(|proxies| proxies.get(&address)) {
            return proxy.name.clone()
        }
        if semantics.name.is_empty() {
            address_to_hex(&address)
        } else {
            semantics.name.clone()
        }
    }

    pub async fn check_is_contract(&self, chain_id: &str, address: Address) -> bool {
        self.get_semantics(chain_id, address).await.is_contract
    }

    pub async fn get_standard(&self, chain_id: &str, address: Address) -> Option<TokenStandard> {
        self.get_semantics(chain_id, address).await.standard
    }

    /// Token metadata with listing-style fallbacks (symbol `Unknown`,
    /// 18 decimals).
    pub async fn get_token_data(
        &self,
        chain_id: &str,
        address: Address,
        proxies: Option<&HashMap<Address, Proxy>>,
    ) -> TokenData {
        let semantics = self.get_semantics(chain_id, address).await;
        if let Some(erc20) = &semantics.erc20 {
            return TokenData {
                name: erc20.name.clone(),
                symbol: erc20.symbol.clone(),
                decimals: erc20.decimals,
                standard: "ERC20",
            }
        }
        if let Some(token) = proxies
            .and_then(|proxies| proxies.get(&address))
            .and_then(|proxy| proxy.token.as_ref())
        {
            return TokenData {
                name: token.name.clone(),
                symbol: token.symbol.clone(),
                decimals: token.decimals,
                standard: "ERC20",
            }
        }
        TokenData {
            name: address_to_hex(&address),
            symbol: "Unknown".to_string(),
            decimals: 18,
            standard: "ERC20",
        }
    }

    /// The best local reading of a selector: non-guessed entries first, most
    /// observed first.
    pub async fn get_most_used_signature(&self, signature_hash: &str) -> Option<Signature> {
        let mut signatures = self.database.get_signatures(signature_hash).await;
        signatures.sort_by_key(|signature| (signature.guessed, std::cmp::Reverse(signature.count)));
        signatures.into_iter().next()
    }

    pub async fn update_or_insert_signature(&self, signature: Signature) {
        self.database.upsert_signature(signature).await;
    }

    /// Candidate function readings for a selector missing from the contract
    /// ABI: the local index first, then the external directory. Each
    /// candidate carries its `guessed` flag.
    pub async fn guess_function(&self, signature_hash: &str) -> Vec<(bool, FunctionSemantics)> {
        if let Some(known) = self.get_most_used_signature(signature_hash).await {
            info!(
                target: "semantics",
                signature = signature_hash, name = %known.name,
                "selector resolved from the local index"
            );
            let inputs = prepare_parameters(&known.args, known.tuple);
            return vec![(
                known.guessed,
                FunctionSemantics {
                    signature: signature_hash.to_string(),
                    name: known.name,
                    inputs,
                    outputs: vec![],
                },
            )]
        }

        self.signatures
            .get_function(signature_hash)
            .await
            .into_iter()
            .map(|text| (true, function_from_text(signature_hash, &text)))
            .collect()
    }

    /// Remembers an externally guessed function reading.
    pub async fn persist_guessed_function(&self, function: &FunctionSemantics) {
        info!(
            target: "semantics",
            signature = %function.signature, name = %function.name,
            "selector guessed from the signature directory"
        );
        let args = function
            .inputs
            .iter()
            .enumerate()
            .map(|(i, parameter)| SignatureArg {
                name: format!("arg_{i}"),
                arg_type: parameter.parameter_type.clone(),
            })
            .collect();
        let mut signature = Signature::new(&function.signature, &function.name, args);
        signature.guessed = true;
        self.database.upsert_signature(signature).await;
    }

    /// A better name for an unknown event topic, from the external
    /// directory. Returns `(guessed, name)`.
    pub async fn guess_event_name(&self, signature_hash: &str) -> (bool, String) {
        for event in self.signatures.get_event(signature_hash).await {
            if !event.name.is_empty() {
                info!(
                    target: "semantics",
                    signature = signature_hash, name = %event.name,
                    "event guessed from the signature directory"
                );
                return (true, event.name)
            }
        }
        (false, signature_hash.to_string())
    }
}

/// Parameter semantics for a signature-index argument list; tuple-shaped
/// signatures wrap their arguments into one `params` tuple.
fn prepare_parameters(args: &[SignatureArg], tuple: bool) -> Vec<ParameterSemantics> {
    let components: Vec<ParameterSemantics> = args
        .iter()
        .map(|arg| ParameterSemantics::new(&arg.name, &arg.arg_type))
        .collect();

    if tuple && !components.is_empty() {
        vec![ParameterSemantics::new("params", "tuple").with_components(components)]
    } else {
        components
    }
}

fn function_from_text(signature_hash: &str, text: &SignatureText) -> FunctionSemantics {
    let args: Vec<SignatureArg> = text
        .args
        .iter()
        .enumerate()
        .map(|(i, arg_type)| SignatureArg { name: format!("arg_{i}"), arg_type: arg_type.clone() })
        .collect();
    FunctionSemantics {
        signature: signature_hash.to_string(),
        name: text.name.clone(),
        inputs: prepare_parameters(&args, text.tuple),
        outputs: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDatabase;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use txlens_core::types::{BlockMetadata, Transaction};
    use txlens_providers::{ProviderError, SourceError, VerifiedContract};

    #[derive(Default)]
    struct CountingNode {
        code: HashMap<Address, String>,
        code_calls: AtomicUsize,
    }

    #[async_trait]
    impl NodeProvider for CountingNode {
        async fn get_block(&self, _: &str, _: u64) -> Result<BlockMetadata, ProviderError> {
            Err(ProviderError::InvalidResponse("not used".into()))
        }
        async fn get_full_transaction(&self, _: &str, _: &str) -> Result<Transaction, ProviderError> {
            Err(ProviderError::InvalidResponse("not used".into()))
        }
        async fn get_code(&self, _: &str, address: Address) -> Result<String, ProviderError> {
            self.code_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.code.get(&address).cloned().unwrap_or_else(|| "0x".to_string()))
        }
        async fn get_storage_at(
            &self,
            _: &str,
            _: Address,
            _: &str,
        ) -> Result<String, ProviderError> {
            Ok(format!("0x{}", "0".repeat(64)))
        }
        async fn call(&self, _: &str, _: Address, _: &str) -> Result<String, ProviderError> {
            Err(ProviderError::InvalidResponse("execution reverted".into()))
        }
    }

    struct NoSource;

    #[async_trait]
    impl SourceProvider for NoSource {
        async fn get_contract(
            &self,
            _: &str,
            _: Address,
        ) -> Result<Option<VerifiedContract>, SourceError> {
            Ok(None)
        }
    }

    struct NoSignatures;

    #[async_trait]
    impl SignatureProvider for NoSignatures {
        async fn get_function(&self, _: &str) -> Vec<SignatureText> {
            vec![]
        }
        async fn get_event(&self, _: &str) -> Vec<SignatureText> {
            vec![]
        }
    }

    fn repository(node: CountingNode) -> (SemanticsRepository, Arc<CountingNode>) {
        let node = Arc::new(node);
        let repository = SemanticsRepository::new(
            Arc::new(MemoryDatabase::new()),
            Arc::new(NoSource),
            Arc::clone(&node) as Arc<dyn NodeProvider>,
            Arc::new(txlens_providers::NoopNames),
            Arc::new(NoSignatures),
            false,
        );
        (repository, node)
    }

    #[tokio::test]
    async fn classifies_eoas_and_caches_them() {
        let (repository, node) = repository(CountingNode::default());
        let address = Address::from_slice(&[7u8; 20]);

        let first = repository.get_semantics("mainnet", address).await;
        assert!(!first.is_contract);
        assert_eq!(first.contract.code_hash, EMPTY_CODE_HASH);
        assert_eq!(first.name, address_to_hex(&address));

        let second = repository.get_semantics("mainnet", address).await;
        assert_eq!(first, second);
        // the bytecode was fetched exactly once
        assert_eq!(node.code_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn classifies_contracts_by_code() {
        let address = Address::from_slice(&[9u8; 20]);
        let mut node = CountingNode::default();
        node.code.insert(address, "0x6080604052".to_string());
        let (repository, _) = repository(node);

        let semantics = repository.get_semantics("mainnet", address).await;
        assert!(semantics.is_contract);
        assert_ne!(semantics.contract.code_hash, EMPTY_CODE_HASH);
        assert!(semantics.standard.is_none());
    }

    #[tokio::test]
    async fn label_falls_back_to_hex() {
        let (repository, _) = repository(CountingNode::default());
        let address = Address::from_slice(&[7u8; 20]);
        let label = repository.get_address_label("mainnet", Some(address), None).await;
        assert_eq!(label, address_to_hex(&address));
        assert_eq!(repository.get_address_label("mainnet", None, None).await, "");
    }

    #[tokio::test]
    async fn precompiles_are_labeled() {
        let (repository, _) = repository(CountingNode::default());
        let mut bytes = [0u8; 20];
        bytes[19] = 2;
        let label =
            repository.get_address_label("mainnet", Some(Address::from_slice(&bytes)), None).await;
        assert_eq!(label, "Precompiled");
    }

    #[tokio::test]
    async fn most_used_signature_prefers_non_guessed() {
        let (repository, _) = repository(CountingNode::default());

        let mut guessed = Signature::new("0xaabbccdd", "guessed", vec![]);
        guessed.guessed = true;
        guessed.count = 10;
        repository.update_or_insert_signature(guessed).await;

        // separate shape so it stays a distinct row
        let verified = Signature::new(
            "0xaabbccdd",
            "verified",
            vec![SignatureArg { name: "a".into(), arg_type: "uint256".into() }],
        );
        repository.update_or_insert_signature(verified).await;

        let best = repository.get_most_used_signature("0xaabbccdd").await.unwrap();
        assert_eq!(best.name, "verified");
    }

    #[tokio::test]
    async fn guessing_uses_local_index_first() {
        let (repository, _) = repository(CountingNode::default());
        let signature = Signature::new(
            "0xa9059cbb",
            "transfer",
            vec![
                SignatureArg { name: "recipient".into(), arg_type: "address".into() },
                SignatureArg { name: "amount".into(), arg_type: "uint256".into() },
            ],
        );
        repository.update_or_insert_signature(signature).await;

        let candidates = repository.guess_function("0xa9059cbb").await;
        assert_eq!(candidates.len(), 1);
        let (guessed, function) = &candidates[0];
        assert!(!guessed);
        assert_eq!(function.name, "transfer");
        assert_eq!(function.inputs.len(), 2);
    }

    #[test]
    fn tuple_signatures_wrap_parameters() {
        let args = vec![
            SignatureArg { name: "a".into(), arg_type: "address".into() },
            SignatureArg { name: "b".into(), arg_type: "uint256".into() },
        ];
        let parameters = prepare_parameters(&args, true);
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameters[0].parameter_type, "tuple");
        assert_eq!(parameters[0].components.len(), 2);
    }
}
