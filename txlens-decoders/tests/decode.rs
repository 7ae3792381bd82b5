//! End-to-end decoding of a synthetic ERC-20 transfer over mock providers.

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc, time::Duration};
use txlens_core::{
    abi::{encode_struct, parse_abi, RawAbi},
    decoded::{Badge, Value},
    semantics::TokenStandard,
    types::{
        timestamp_from_secs, Address, BlockMetadata, Call, CallType, Event, Transaction,
        TransactionMetadata, H256, U256,
    },
    utils::{keccak256, strip_0x},
};
use txlens_decoders::{DecodeError, DecoderService};
use txlens_providers::{
    NodeProvider, NoopNames, ProviderError, SignatureProvider, SignatureText, SourceProvider,
    SourceError, VerifiedContract,
};
use txlens_semantics::{MemoryDatabase, SemanticsRepository};

const CHAIN: &str = "mainnet";
const TRANSFER_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

fn sender() -> Address {
    Address::from_slice(&[0x11; 20])
}

fn token() -> Address {
    Address::from_slice(&[0x22; 20])
}

fn recipient() -> Address {
    Address::from_slice(&[0x33; 20])
}

fn tx_hash() -> String {
    format!("0x{}", "ab".repeat(32))
}

fn padded_topic(address: Address) -> H256 {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(address.as_bytes());
    H256::from_slice(&bytes)
}

fn encode_string_result(text: &str) -> String {
    let parameter =
        txlens_core::semantics::ParameterSemantics::new("", "string").dynamic();
    let encoded =
        encode_struct(std::slice::from_ref(&parameter), &[Value::String(text.to_string())])
            .expect("encodable");
    format!("0x{encoded}")
}

/// The verified Dai-style token: the full ERC-20 surface plus metadata
/// getters.
fn verified_token() -> VerifiedContract {
    let abi = r#"[
        {"type":"function","name":"transfer","inputs":[{"name":"recipient","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
        {"type":"function","name":"transferFrom","inputs":[{"name":"sender","type":"address"},{"name":"recipient","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
        {"type":"function","name":"approve","inputs":[{"name":"spender","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
        {"type":"function","name":"balanceOf","inputs":[{"name":"holder","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
        {"type":"function","name":"totalSupply","inputs":[],"outputs":[{"name":"","type":"uint256"}]},
        {"type":"function","name":"name","inputs":[],"outputs":[{"name":"","type":"string"}]},
        {"type":"function","name":"symbol","inputs":[],"outputs":[{"name":"","type":"string"}]},
        {"type":"function","name":"decimals","inputs":[],"outputs":[{"name":"","type":"uint8"}]},
        {"type":"event","name":"Transfer","anonymous":false,"inputs":[{"name":"src","type":"address","indexed":true},{"name":"dst","type":"address","indexed":true},{"name":"value","type":"uint256","indexed":false}]},
        {"type":"event","name":"Approval","anonymous":false,"inputs":[{"name":"src","type":"address","indexed":true},{"name":"dst","type":"address","indexed":true},{"name":"value","type":"uint256","indexed":false}]}
    ]"#;
    let raw: RawAbi = serde_json::from_str(abi).expect("valid abi");
    let (events, functions) = parse_abi(&raw);
    VerifiedContract { name: "Dai".to_string(), events, functions }
}

struct MockNode;

#[async_trait]
impl NodeProvider for MockNode {
    async fn get_block(&self, _: &str, block_number: u64) -> Result<BlockMetadata, ProviderError> {
        Ok(BlockMetadata {
            block_number,
            block_hash: H256::from_slice(&[0xbb; 32]),
            timestamp: timestamp_from_secs(1_600_000_000),
            parent_hash: H256::from_slice(&[0xcc; 32]),
            miner: Address::zero(),
            gas_limit: 30_000_000,
            gas_used: 21_000,
            tx_count: 1,
        })
    }

    async fn get_full_transaction(
        &self,
        _: &str,
        tx_hash: &str,
    ) -> Result<Transaction, ProviderError> {
        // transfer(recipient, 1_000_000) moving 0.01 ETH along the way
        let call_data = format!(
            "0xa9059cbb{:0>64}{:064x}",
            format!("{:x}", recipient()),
            1_000_000u64
        );

        let metadata = TransactionMetadata {
            tx_hash: tx_hash.to_string(),
            block_number: 100,
            gas_price: U256::from(20_000_000_000u64),
            from_address: sender(),
            to_address: Some(token()),
            tx_index: 0,
            tx_value: U256::from(10_000_000_000_000_000u64),
            gas_limit: 100_000,
            gas_used: 60_000,
            success: true,
        };

        let root_call = Call {
            call_type: CallType::Call,
            from_address: sender(),
            to_address: Some(token()),
            call_value: U256::from(10_000_000_000_000_000u64),
            call_data,
            return_value: format!("0x{:064x}", 1),
            call_gas: Some(100_000),
            gas_used: Some(60_000),
            status: true,
            error: None,
            subcalls: vec![],
        };

        let transfer_topic =
            H256::from_slice(&hex::decode(strip_0x(TRANSFER_TOPIC)).expect("topic hex"));
        let events = vec![Event {
            contract: token(),
            topics: vec![transfer_topic, padded_topic(sender()), padded_topic(recipient())],
            log_data: format!("0x{:064x}", 1_000_000u64),
            log_index: Some(0),
            call_id: None,
        }];

        Ok(Transaction { metadata, root_call, events })
    }

    async fn get_code(&self, _: &str, address: Address) -> Result<String, ProviderError> {
        if address == token() {
            Ok("0x6080604052".to_string())
        } else {
            Ok("0x".to_string())
        }
    }

    async fn get_storage_at(&self, _: &str, _: Address, _: &str) -> Result<String, ProviderError> {
        Ok(format!("0x{}", "0".repeat(64)))
    }

    async fn call(&self, _: &str, to: Address, data: &str) -> Result<String, ProviderError> {
        assert_eq!(to, token(), "only the token gets probed");
        match &data[..10.min(data.len())] {
            "0x06fdde03" => Ok(encode_string_result("Dai Stablecoin")),
            "0x95d89b41" => Ok(encode_string_result("DAI")),
            "0x313ce567" => Ok(format!("0x{:064x}", 6)),
            _ => Err(ProviderError::InvalidResponse("execution reverted".to_string())),
        }
    }
}

struct MockSource;

#[async_trait]
impl SourceProvider for MockSource {
    async fn get_contract(
        &self,
        _: &str,
        address: Address,
    ) -> Result<Option<VerifiedContract>, SourceError> {
        Ok((address == token()).then(verified_token))
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

fn service() -> DecoderService {
    let node = Arc::new(MockNode);
    let repository = Arc::new(SemanticsRepository::new(
        Arc::new(MemoryDatabase::new()),
        Arc::new(MockSource),
        node.clone(),
        Arc::new(NoopNames),
        Arc::new(NoSignatures),
        false,
    ));
    DecoderService::new(repository, node, CHAIN, Duration::from_secs(30))
}

#[tokio::test]
async fn rejects_malformed_hashes() {
    let service = service();
    let result = service.decode_transaction(None, "notahash").await;
    assert!(matches!(result, Err(DecodeError::InvalidTransactionHash(_))));
}

#[tokio::test]
async fn decodes_an_erc20_transfer_end_to_end() {
    let service = service();
    let decoded = service.decode_transaction(None, &tx_hash()).await.expect("decodes");

    assert!(decoded.status);

    // metadata: labeled endpoints, gwei gas price
    assert_eq!(decoded.metadata.gas_price, 20.0);
    assert_eq!(decoded.metadata.sender.badge, Some(Badge::Sender));
    assert_eq!(decoded.metadata.receiver.as_ref().unwrap().name, "DAI");

    // the call resolves against the verified ABI
    let call = decoded.calls.as_ref().expect("call tree");
    assert_eq!(call.function_signature, "0xa9059cbb");
    assert_eq!(call.function_name, "transfer");
    assert!(!call.function_guessed);
    assert_eq!(call.call_id, "");
    assert_eq!(call.value, 0.01);

    // semantic stage: the recipient is an enriched address, the amount is
    // scaled by the probed decimals
    let recipient_arg = &call.arguments[0];
    match &recipient_arg.value {
        Value::Address(info) => {
            assert_eq!(info.address.as_deref(), Some(format!("0x{}", "33".repeat(20)).as_str()))
        }
        other => panic!("expected an address, got {other:?}"),
    }
    assert_eq!(call.arguments[1].value, Value::Float(1.0));

    // the event resolves to Transfer with enriched endpoints
    assert_eq!(decoded.events.len(), 1);
    let event = &decoded.events[0];
    assert_eq!(event.event_name, "Transfer");
    assert!(!event.event_guessed);
    match &event.parameters[0].value {
        Value::Address(info) => assert_eq!(info.badge, Some(Badge::Sender)),
        other => panic!("expected an address, got {other:?}"),
    }
    assert_eq!(event.parameters[2].value, Value::Float(1.0));

    // transfers: 0.01 ETH from the call, 1 DAI from the event, both
    // formatted
    assert_eq!(decoded.transfers.len(), 2);
    assert_eq!(decoded.transfers[0].token_symbol, "ETH");
    assert_eq!(decoded.transfers[0].value, Value::String("0.0100".to_string()));
    assert_eq!(decoded.transfers[1].token_symbol, "DAI");
    assert_eq!(decoded.transfers[1].token_standard.as_deref(), Some("ERC20"));
    assert_eq!(decoded.transfers[1].value, Value::String("1.0000".to_string()));

    // balances conserve: sender pays ETH and DAI, the token contract and
    // the recipient gain them
    assert_eq!(decoded.balances.len(), 3);
    let sender_hex = format!("0x{}", "11".repeat(20));
    let sender_balance = decoded
        .balances
        .iter()
        .find(|balance| balance.holder.address.as_deref() == Some(sender_hex.as_str()))
        .expect("sender balance");
    assert_eq!(sender_balance.holder.badge, Some(Badge::Sender));
    assert!(sender_balance
        .tokens
        .iter()
        .any(|token| token.balance == Value::String("-1.0000".to_string())));
}

#[tokio::test]
async fn repository_stays_idempotent_across_decodes() {
    let service = service();
    let first = service.decode_transaction(None, &tx_hash()).await.expect("decodes");
    let second = service.decode_transaction(None, &tx_hash()).await.expect("decodes");
    assert_eq!(first, second);

    let semantics = service.repository().get_semantics(CHAIN, token()).await;
    assert_eq!(semantics.standard, Some(TokenStandard::Erc20));
    assert_eq!(semantics.erc20.as_ref().unwrap().decimals, 6);
    assert_eq!(
        semantics.contract.code_hash,
        format!("0x{}", hex::encode(keccak256(hex::decode(strip_0x("0x6080604052")).unwrap())))
    );
}
