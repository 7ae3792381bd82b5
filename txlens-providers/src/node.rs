//! Node access: raw blocks, transactions, receipts and call traces, plus the
//! `eth_call` probes used to recognize tokens.

use crate::{errors::ProviderError, rpc::Http};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::warn;
use txlens_core::{
    abi::{decode_struct, encode_call},
    decoded::Value,
    semantics::{Erc20Semantics, FunctionSemantics, ParameterSemantics},
    types::{
        address_to_hex, timestamp_from_secs, Address, BlockMetadata, Call, CallType, Event,
        Transaction, TransactionMetadata, H256, U256, U64,
    },
    utils::{keccak256, strip_0x},
};
use url::Url;

/// The custom tracer script sent along with `debug_traceTransaction`.
pub const CALL_TRACER: &str = include_str!("static/tracer.js");

/// Well-known ERC-20 selectors and topics used for bytecode probing.
const ERC20_PROBE_SELECTORS: [&str; 3] = ["a9059cbb", "23b872dd", "095ea7b3"];
const ERC20_PROBE_TOPICS: [&str; 2] = [
    "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef",
    "8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925",
];

type Result<T, E = ProviderError> = std::result::Result<T, E>;

/// Supplies the raw artifacts a decode needs. The only I/O boundary of the
/// pipeline besides the semantic sources.
#[async_trait]
pub trait NodeProvider: Send + Sync {
    /// Block header data by number.
    async fn get_block(&self, chain_id: &str, block_number: u64) -> Result<BlockMetadata>;

    /// The transaction, its receipt and its traced call tree.
    async fn get_full_transaction(&self, chain_id: &str, tx_hash: &str) -> Result<Transaction>;

    /// Deployed bytecode as a `0x`-prefixed hex string.
    async fn get_code(&self, chain_id: &str, address: Address) -> Result<String>;

    /// A raw storage word.
    async fn get_storage_at(&self, chain_id: &str, address: Address, slot: &str) -> Result<String>;

    /// `eth_call` against the latest state, returning the raw result hex.
    async fn call(&self, chain_id: &str, to: Address, data: &str) -> Result<String>;
}

/// JSON-RPC node client, one endpoint per chain.
#[derive(Debug)]
pub struct NodeClient {
    endpoints: HashMap<String, Http>,
}

impl NodeClient {
    pub fn new(nodes: HashMap<String, Url>) -> Self {
        let endpoints =
            nodes.into_iter().map(|(chain_id, url)| (chain_id, Http::new(url))).collect();
        Self { endpoints }
    }

    fn endpoint(&self, chain_id: &str) -> Result<&Http> {
        self.endpoints.get(chain_id).ok_or_else(|| ProviderError::UnknownChain(chain_id.into()))
    }
}

#[async_trait]
impl NodeProvider for NodeClient {
    async fn get_block(&self, chain_id: &str, block_number: u64) -> Result<BlockMetadata> {
        let raw: RawBlock = self
            .endpoint(chain_id)?
            .request("eth_getBlockByNumber", json!([format!("0x{block_number:x}"), false]))
            .await?;
        Ok(raw.into_metadata())
    }

    async fn get_full_transaction(&self, chain_id: &str, tx_hash: &str) -> Result<Transaction> {
        let endpoint = self.endpoint(chain_id)?;

        let transaction: RawTransaction =
            endpoint.request("eth_getTransactionByHash", json!([tx_hash])).await?;
        let receipt: Option<RawReceipt> =
            endpoint.request("eth_getTransactionReceipt", json!([tx_hash])).await?;
        let receipt = receipt
            .ok_or_else(|| ProviderError::InvalidResponse(format!("missing receipt for {tx_hash}")))?;
        let frame: CallFrame = endpoint
            .request("debug_traceTransaction", json!([tx_hash, { "tracer": CALL_TRACER }]))
            .await?;

        assemble_transaction(tx_hash, transaction, receipt, frame)
    }

    async fn get_code(&self, chain_id: &str, address: Address) -> Result<String> {
        self.endpoint(chain_id)?
            .request("eth_getCode", json!([address_to_hex(&address), "latest"]))
            .await
    }

    async fn get_storage_at(&self, chain_id: &str, address: Address, slot: &str) -> Result<String> {
        self.endpoint(chain_id)?
            .request("eth_getStorageAt", json!([address_to_hex(&address), slot, "latest"]))
            .await
    }

    async fn call(&self, chain_id: &str, to: Address, data: &str) -> Result<String> {
        self.endpoint(chain_id)?
            .request("eth_call", json!([{ "to": address_to_hex(&to), "data": data }, "latest"]))
            .await
    }
}

/// One frame of the tracer output, exactly as the tracer emits it.
#[derive(Clone, Debug, Deserialize)]
pub struct CallFrame {
    #[serde(rename = "type")]
    pub typ: String,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: Option<U256>,
    #[serde(default)]
    pub gas: Option<U64>,
    #[serde(default, rename = "gasUsed")]
    pub gas_used: Option<U64>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub calls: Vec<CallFrame>,
}

impl CallFrame {
    /// Normalizes the frame into the raw call model.
    pub fn into_call(self) -> Call {
        let call_type = self.typ.parse::<CallType>().unwrap_or_else(|err| {
            warn!(target: "node", "{err}, defaulting to call");
            CallType::Call
        });
        Call {
            call_type,
            from_address: self.from,
            to_address: self.to,
            call_value: self.value.unwrap_or_default(),
            call_data: self.input.unwrap_or_else(|| "0x".to_string()),
            return_value: self.output.unwrap_or_else(|| "0x".to_string()),
            call_gas: self.gas.map(|gas| gas.as_u64()),
            gas_used: self.gas_used.map(|gas| gas.as_u64()),
            status: self.error.is_none(),
            error: self.error,
            subcalls: self.calls.into_iter().map(CallFrame::into_call).collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlock {
    number: U64,
    hash: H256,
    parent_hash: H256,
    timestamp: U256,
    #[serde(default)]
    miner: Option<Address>,
    gas_limit: U256,
    gas_used: U256,
    #[serde(default)]
    transactions: Vec<serde_json::Value>,
}

impl RawBlock {
    fn into_metadata(self) -> BlockMetadata {
        BlockMetadata {
            block_number: self.number.as_u64(),
            block_hash: self.hash,
            timestamp: timestamp_from_secs(self.timestamp.low_u64()),
            parent_hash: self.parent_hash,
            miner: self.miner.unwrap_or_default(),
            gas_limit: self.gas_limit.low_u64(),
            gas_used: self.gas_used.low_u64(),
            tx_count: self.transactions.len(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransaction {
    #[serde(default)]
    block_number: Option<U64>,
    from: Address,
    #[serde(default)]
    to: Option<Address>,
    #[serde(default)]
    gas_price: Option<U256>,
    gas: U256,
    #[serde(default)]
    transaction_index: Option<U64>,
    value: U256,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    gas_used: U256,
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    logs: Vec<RawLog>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLog {
    address: Address,
    #[serde(default)]
    topics: Vec<H256>,
    data: String,
    #[serde(default)]
    log_index: Option<U64>,
}

fn assemble_transaction(
    tx_hash: &str,
    transaction: RawTransaction,
    receipt: RawReceipt,
    frame: CallFrame,
) -> Result<Transaction> {
    let block_number = transaction
        .block_number
        .ok_or_else(|| ProviderError::InvalidResponse(format!("{tx_hash} is not mined")))?
        .as_u64();

    let metadata = TransactionMetadata {
        tx_hash: tx_hash.to_string(),
        block_number,
        gas_price: transaction.gas_price.unwrap_or_default(),
        from_address: transaction.from,
        to_address: transaction.to,
        tx_index: transaction.transaction_index.unwrap_or_default().as_u64(),
        tx_value: transaction.value,
        gas_limit: transaction.gas.low_u64(),
        gas_used: receipt.gas_used.low_u64(),
        success: receipt.status.map(|status| !status.is_zero()).unwrap_or(true),
    };

    let events = receipt
        .logs
        .into_iter()
        .map(|log| Event {
            contract: log.address,
            topics: log.topics,
            log_data: log.data,
            log_index: log.log_index.map(|index| index.as_u64()),
            call_id: None,
        })
        .collect();

    Ok(Transaction { metadata, root_call: frame.into_call(), events })
}

/// Keccak-256 of the deployed bytecode, as a `0x`-prefixed hex string.
pub async fn get_code_hash(
    node: &dyn NodeProvider,
    chain_id: &str,
    address: Address,
) -> Result<String> {
    let code = node.get_code(chain_id, address).await?;
    let bytes = hex::decode(strip_0x(&code)).unwrap_or_default();
    Ok(format!("0x{}", hex::encode(keccak256(bytes))))
}

/// Decodes a single-value `eth_call` result of the given type.
fn decode_single(result: &str, parameter_type: &str) -> Option<Value> {
    let mut parameter = ParameterSemantics::new("", parameter_type);
    parameter.dynamic = matches!(parameter_type, "string" | "bytes");
    let (arguments, _) = decode_struct(strip_0x(result), std::slice::from_ref(&parameter));
    arguments.into_iter().next().map(|argument| argument.value)
}

/// Text results come back either as a dynamic `string` or as a NUL-padded
/// `bytes32`, depending on the token's vintage.
fn decode_text_result(result: &str, parameter_type: &str) -> Option<String> {
    let value = if parameter_type == "string" {
        decode_single(result, "string")?
    } else {
        txlens_core::abi::decode_static_argument(strip_0x(result), "string32")
    };
    match value {
        Value::String(text) if !text.is_empty() => Some(text),
        _ => None,
    }
}

async fn probe_text(
    node: &dyn NodeProvider,
    chain_id: &str,
    address: Address,
    selector: &str,
    parameter_type: &str,
) -> Option<String> {
    let data = encode_call(selector, &[], &[]).ok()?;
    let result = node.call(chain_id, address, &data).await.ok()?;
    decode_text_result(&result, parameter_type)
}

async fn probe_decimals(node: &dyn NodeProvider, chain_id: &str, address: Address) -> Option<u32> {
    let data = encode_call("0x313ce567", &[], &[]).ok()?;
    let result = node.call(chain_id, address, &data).await.ok()?;
    decode_single(&result, "uint8")?.as_u256().map(|value| value.low_u32())
}

/// Reads ERC-20 metadata from a contract already known to be a token,
/// honoring the output types its ABI declares. Falls back to the contract
/// name and 18 decimals, as listings conventionally do.
pub async fn get_erc20_token(
    node: &dyn NodeProvider,
    chain_id: &str,
    address: Address,
    contract_name: &str,
    functions: &HashMap<String, FunctionSemantics>,
) -> Erc20Semantics {
    let mut name_type = None;
    let mut symbol_type = None;
    let mut has_decimals = false;

    for function in functions.values() {
        if function.inputs.is_empty() && function.outputs.len() == 1 {
            match function.name.as_str() {
                "name" => name_type = Some(function.outputs[0].parameter_type.clone()),
                "symbol" => symbol_type = Some(function.outputs[0].parameter_type.clone()),
                "decimals" | "dec" => has_decimals = true,
                _ => {}
            }
        }
    }

    let name = match name_type {
        Some(parameter_type) => probe_text(node, chain_id, address, "0x06fdde03", &parameter_type)
            .await
            .unwrap_or_else(|| contract_name.to_string()),
        None => contract_name.to_string(),
    };
    let symbol = match symbol_type {
        Some(parameter_type) => probe_text(node, chain_id, address, "0x95d89b41", &parameter_type)
            .await
            .unwrap_or_else(|| contract_name.to_string()),
        None => contract_name.to_string(),
    };
    let decimals = if has_decimals {
        probe_decimals(node, chain_id, address).await.unwrap_or(18)
    } else {
        18
    };

    Erc20Semantics { name, symbol, decimals }
}

/// Guesses whether an unverified contract is an ERC-20 token by scanning its
/// bytecode for the standard selectors (as `PUSH4` arguments) and event
/// topics, then probing its metadata.
pub async fn guess_erc20_token(
    node: &dyn NodeProvider,
    chain_id: &str,
    address: Address,
) -> Option<Erc20Semantics> {
    let code = node.get_code(chain_id, address).await.ok()?;
    let code = strip_0x(&code);

    let has_selectors =
        ERC20_PROBE_SELECTORS.iter().all(|selector| code.contains(&format!("63{selector}")));
    let has_topics = ERC20_PROBE_TOPICS.iter().all(|topic| code.contains(topic));
    if !has_selectors || !has_topics {
        return None
    }

    probe_erc20_metadata(node, chain_id, address).await
}

/// Probes an address for ERC-20 metadata without inspecting its bytecode;
/// used for proxies whose implementation carries the token logic.
pub async fn guess_erc20_proxy(
    node: &dyn NodeProvider,
    chain_id: &str,
    address: Address,
) -> Option<Erc20Semantics> {
    probe_erc20_metadata(node, chain_id, address).await
}

async fn probe_erc20_metadata(
    node: &dyn NodeProvider,
    chain_id: &str,
    address: Address,
) -> Option<Erc20Semantics> {
    let name = probe_text(node, chain_id, address, "0x06fdde03", "string").await?;
    let symbol = probe_text(node, chain_id, address, "0x95d89b41", "string").await?;
    let decimals = probe_decimals(node, chain_id, address).await?;
    Some(Erc20Semantics { name, symbol, decimals })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_frame_normalizes_into_call() {
        let frame: CallFrame = serde_json::from_str(
            r#"{
                "type": "CALL",
                "from": "0x00000000000000000000000000000000000000aa",
                "to": "0x00000000000000000000000000000000000000bb",
                "value": "0x2386f26fc10000",
                "gas": "0x5208",
                "gasUsed": "0x5208",
                "input": "0xa9059cbb",
                "output": "0x",
                "calls": [
                    {"type": "DELEGATECALL",
                     "from": "0x00000000000000000000000000000000000000bb",
                     "to": "0x00000000000000000000000000000000000000cc",
                     "input": "0x",
                     "error": "execution reverted"}
                ]
            }"#,
        )
        .unwrap();

        let call = frame.into_call();
        assert_eq!(call.call_type, CallType::Call);
        assert_eq!(call.call_value, U256::from(10_000_000_000_000_000u64));
        assert!(call.status);
        assert_eq!(call.subcalls.len(), 1);
        assert_eq!(call.subcalls[0].call_type, CallType::DelegateCall);
        assert!(!call.subcalls[0].status);
        assert_eq!(call.subcalls[0].return_value, "0x");
    }

    #[test]
    fn tracer_script_is_embedded() {
        assert!(CALL_TRACER.contains("callstack"));
        assert!(CALL_TRACER.contains("result:"));
    }

    #[test]
    fn decodes_string_and_bytes32_text_results() {
        let dynamic = format!(
            "0x{:064x}{:064x}{:0<64}",
            0x20,
            3,
            hex::encode("DAI")
        );
        assert_eq!(decode_text_result(&dynamic, "string").unwrap(), "DAI");

        let padded = format!("0x{:0<64}", hex::encode("MKR"));
        assert_eq!(decode_text_result(&padded, "bytes32").unwrap(), "MKR");
    }

    #[test]
    fn missing_receipt_is_fatal() {
        let transaction = RawTransaction {
            block_number: None,
            from: Address::zero(),
            to: None,
            gas_price: None,
            gas: U256::zero(),
            transaction_index: None,
            value: U256::zero(),
        };
        let receipt = RawReceipt { gas_used: U256::zero(), status: None, logs: vec![] };
        let frame = CallFrame {
            typ: "call".into(),
            from: Address::zero(),
            to: None,
            value: None,
            gas: None,
            gas_used: None,
            input: None,
            output: None,
            error: None,
            calls: vec![],
        };
        assert!(assemble_transaction("0xabc", transaction, receipt, frame).is_err());
    }
}
