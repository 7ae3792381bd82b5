//! The decoded model: the human-readable output of the pipeline.

use crate::{
    semantics::{AddressSemantics, Erc20Semantics},
    types::{Address, CallType, I256, U256},
};
use chrono::{DateTime, Utc};
use serde::{ser::SerializeStruct, Serialize, Serializer};
use std::{fmt, sync::Arc};

/// The role an address plays relative to the transaction's sender/receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    Sender,
    Receiver,
}

/// A raw address enriched with the best available label and its badge.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AddressInfo {
    pub address: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<Badge>,
}

impl AddressInfo {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self { address: Some(address.into()), name: name.into(), badge: None }
    }

    pub fn with_badge(mut self, badge: Option<Badge>) -> Self {
        self.badge = badge;
        self
    }
}

/// A call decoded inline from a `bytes` parameter that itself encodes a
/// function invocation (e.g. Maker's `LogNote.data`).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InlineCall {
    pub contract: AddressInfo,
    pub function_name: String,
    pub arguments: Vec<Argument>,
}

/// A decoded parameter value.
///
/// The tagged sum replaces the dynamic typing an ABI decoder naturally wants:
/// every decode and every transformation produces one of these.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Uint(U256),
    Int(I256),
    Float(f64),
    Bool(bool),
    /// A decoded UTF-8 string (NULs stripped, invalid sequences replaced).
    String(String),
    /// Raw bytes kept as a `0x`-prefixed hex string.
    Hex(String),
    Address(AddressInfo),
    /// An NFT reference produced by `decode_nft`.
    Nft { address: String, name: String },
    Call(Box<InlineCall>),
    Array(Vec<Value>),
    Tuple(Vec<Argument>),
    /// Array of tuples; each element keeps its named components.
    TupleArray(Vec<Vec<Argument>>),
    None,
}

impl Value {
    /// The value as a `U256` where it has a natural unsigned reading.
    pub fn as_u256(&self) -> Option<U256> {
        match self {
            Value::Uint(value) => Some(*value),
            Value::Int(value) if !value.is_negative() => Some(value.into_raw()),
            Value::Hex(raw) => crate::utils::parse_u256(raw),
            Value::String(raw) => crate::utils::parse_u256(raw),
            _ => None,
        }
    }

    /// The value as a lowercase `0x` + 40 hex char address string, taking the
    /// last 20 bytes of longer hex payloads (topic-style encoding).
    pub fn as_address_string(&self) -> Option<String> {
        let raw = match self {
            Value::Hex(raw) | Value::String(raw) => raw.as_str(),
            Value::Address(info) => return info.address.clone(),
            _ => return None,
        };
        let hex = crate::utils::strip_0x(raw);
        if hex.len() < 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None
        }
        Some(format!("0x{}", hex[hex.len() - 40..].to_ascii_lowercase()))
    }

    /// Display form used when a value is interpolated into labels.
    pub fn display_string(&self) -> String {
        match self {
            Value::Uint(value) => value.to_string(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::Bool(value) => value.to_string(),
            Value::String(value) | Value::Hex(value) => value.clone(),
            Value::Address(info) => info.address.clone().unwrap_or_else(|| info.name.clone()),
            Value::Nft { name, .. } => name.clone(),
            Value::Call(call) => call.function_name.clone(),
            Value::Array(_) => "[...]".to_string(),
            Value::Tuple(_) | Value::TupleArray(_) => "(...)".to_string(),
            Value::None => String::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // word-sized integers exceed every JSON number type; emit decimal
            // strings
            Value::Uint(value) => serializer.serialize_str(&value.to_string()),
            Value::Int(value) => serializer.serialize_str(&value.to_string()),
            Value::Float(value) => serializer.serialize_f64(*value),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::String(value) | Value::Hex(value) => serializer.serialize_str(value),
            Value::Address(info) => info.serialize(serializer),
            Value::Nft { address, name } => {
                let mut state = serializer.serialize_struct("Nft", 2)?;
                state.serialize_field("address", address)?;
                state.serialize_field("name", name)?;
                state.end()
            }
            Value::Call(call) => call.serialize(serializer),
            Value::Array(values) => values.serialize(serializer),
            Value::Tuple(arguments) => arguments.serialize(serializer),
            Value::TupleArray(tuples) => tuples.serialize(serializer),
            Value::None => serializer.serialize_none(),
        }
    }
}

/// A named, typed, decoded parameter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: String,
    pub value: Value,
}

impl Argument {
    pub fn new(name: impl Into<String>, arg_type: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), arg_type: arg_type.into(), value }
    }
}

/// A decoded log entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecodedEvent {
    pub chain_id: String,
    pub tx_hash: String,
    pub timestamp: DateTime<Utc>,
    pub contract: AddressInfo,
    pub index: Option<u64>,
    pub call_id: Option<String>,
    pub event_signature: Option<String>,
    pub event_name: String,
    pub parameters: Vec<Argument>,
    pub event_guessed: bool,
}

/// A decoded call-tree node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecodedCall {
    pub chain_id: String,
    pub tx_hash: String,
    pub timestamp: DateTime<Utc>,
    /// Dot-free path label: the root is empty, its i-th child is `<i>`, and
    /// deeper children append `_<NNNN>` with a four-digit index.
    pub call_id: String,
    pub call_type: CallType,
    pub from_address: AddressInfo,
    pub to_address: Option<AddressInfo>,
    /// Transferred value in ether.
    pub value: f64,
    pub function_signature: String,
    pub function_name: String,
    pub arguments: Vec<Argument>,
    pub outputs: Vec<Argument>,
    pub gas_used: Option<u64>,
    pub error: Option<String>,
    pub status: bool,
    pub indent: u32,
    pub subcalls: Vec<DecodedCall>,
    pub function_guessed: bool,
}

/// A single ETH or token transfer extracted from the calls and events.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecodedTransfer {
    pub from_address: AddressInfo,
    pub to_address: AddressInfo,
    pub token_address: Option<String>,
    pub token_symbol: String,
    pub token_standard: Option<String>,
    /// `Float` after ABI decoding, replaced by a formatted `String` during
    /// semantic decoding.
    pub value: Value,
}

/// One token position of one holder's balance sheet.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BalanceEntry {
    pub token_address: Option<String>,
    pub token_symbol: String,
    pub token_standard: Option<String>,
    pub balance: Value,
}

/// Net balance changes for a single holder.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecodedBalance {
    pub holder: AddressInfo,
    pub tokens: Vec<BalanceEntry>,
}

/// Transaction metadata after decoding.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecodedTransactionMetadata {
    pub chain_id: String,
    pub tx_hash: String,
    pub block_number: u64,
    pub block_hash: String,
    pub timestamp: DateTime<Utc>,
    /// Gas price in gwei.
    pub gas_price: f64,
    pub sender: AddressInfo,
    pub receiver: Option<AddressInfo>,
    pub tx_index: u64,
    pub tx_value: U256,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub success: bool,
}

/// The fully decoded transaction returned by the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecodedTransaction {
    pub block_metadata: crate::types::BlockMetadata,
    pub metadata: DecodedTransactionMetadata,
    pub events: Vec<DecodedEvent>,
    pub calls: Option<DecodedCall>,
    pub transfers: Vec<DecodedTransfer>,
    pub balances: Vec<DecodedBalance>,
    pub status: bool,
}

/// How a delegating contract forwards to its implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ProxyKind {
    #[serde(rename = "EIP1967Proxy")]
    Eip1967Proxy,
    #[serde(rename = "EIP1967Beacon")]
    Eip1967Beacon,
    #[serde(rename = "GenericProxy")]
    Generic,
}

/// A delegating contract together with the semantics of its delegates.
#[derive(Clone, Debug)]
pub struct Proxy {
    pub address: Address,
    pub name: String,
    pub kind: ProxyKind,
    pub semantics: Vec<Arc<AddressSemantics>>,
    pub token: Option<Erc20Semantics>,
}
