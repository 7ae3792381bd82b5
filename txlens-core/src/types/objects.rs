//! Raw transaction artifacts, normalized from node responses.
//!
//! These types mirror what the node hands back (block header fields, receipt
//! logs, call-trace frames) with quantities already parsed, before any ABI or
//! semantic interpretation happens.

use chrono::{DateTime, TimeZone, Utc};
use ethereum_types::{Address, H256, U256};
use serde::Serialize;
use std::{fmt, str::FromStr};

/// Converts a unix timestamp into a UTC datetime, clamping invalid values to
/// the epoch.
pub fn timestamp_from_secs(secs: u64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs as i64, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap())
}

/// Formats an address as a lowercase `0x`-prefixed hex string.
pub fn address_to_hex(address: &Address) -> String {
    format!("{address:#x}")
}

/// Formats a 32-byte hash as a lowercase `0x`-prefixed hex string.
pub fn h256_to_hex(hash: &H256) -> String {
    format!("{hash:#x}")
}

/// The frame type of a traced call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    Create,
    Create2,
    SelfDestruct,
}

impl FromStr for CallType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "call" => Ok(Self::Call),
            "callcode" => Ok(Self::CallCode),
            "delegatecall" => Ok(Self::DelegateCall),
            "staticcall" => Ok(Self::StaticCall),
            "create" => Ok(Self::Create),
            "create2" => Ok(Self::Create2),
            "selfdestruct" | "suicide" => Ok(Self::SelfDestruct),
            other => Err(format!("unknown call type: {other}")),
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Call => "call",
            Self::CallCode => "callcode",
            Self::DelegateCall => "delegatecall",
            Self::StaticCall => "staticcall",
            Self::Create => "create",
            Self::Create2 => "create2",
            Self::SelfDestruct => "selfdestruct",
        };
        f.write_str(name)
    }
}

/// Header data of the block a transaction was mined in.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlockMetadata {
    pub block_number: u64,
    pub block_hash: H256,
    pub timestamp: DateTime<Utc>,
    pub parent_hash: H256,
    pub miner: Address,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub tx_count: usize,
}

/// Transaction-level data combined from the transaction body and its receipt.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransactionMetadata {
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_price: U256,
    pub from_address: Address,
    pub to_address: Option<Address>,
    pub tx_index: u64,
    pub tx_value: U256,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub success: bool,
}

/// A single log entry from the transaction receipt.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    pub contract: Address,
    pub topics: Vec<H256>,
    /// Log payload as a `0x`-prefixed hex string.
    pub log_data: String,
    pub log_index: Option<u64>,
    pub call_id: Option<String>,
}

/// One frame of the traced call tree.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Call {
    pub call_type: CallType,
    pub from_address: Address,
    pub to_address: Option<Address>,
    pub call_value: U256,
    /// Input bytes as a `0x`-prefixed hex string; the first 4 bytes are the
    /// function selector for regular contract calls.
    pub call_data: String,
    /// Return bytes as a `0x`-prefixed hex string.
    pub return_value: String,
    pub call_gas: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: bool,
    pub error: Option<String>,
    pub subcalls: Vec<Call>,
}

impl Call {
    /// The `0x` + 8 hex character function selector of this frame, if the
    /// input carries one.
    pub fn function_signature(&self) -> Option<&str> {
        (self.call_data.len() >= 10).then(|| &self.call_data[..10])
    }
}

/// Everything needed to decode one transaction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transaction {
    pub metadata: TransactionMetadata,
    pub root_call: Call,
    pub events: Vec<Event>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_type_round_trip() {
        for raw in ["CALL", "delegatecall", "STATICCALL", "Create2", "SELFDESTRUCT"] {
            let parsed: CallType = raw.parse().unwrap();
            assert_eq!(parsed.to_string(), raw.to_ascii_lowercase());
        }
        assert!("blorp".parse::<CallType>().is_err());
    }

    #[test]
    fn function_signature_needs_four_bytes() {
        let mut call = Call {
            call_type: CallType::Call,
            from_address: Address::zero(),
            to_address: Some(Address::zero()),
            call_value: U256::zero(),
            call_data: "0xa9059cbb000000".to_string(),
            return_value: "0x".to_string(),
            call_gas: None,
            gas_used: None,
            status: true,
            error: None,
            subcalls: vec![],
        };
        assert_eq!(call.function_signature(), Some("0xa9059cbb"));
        call.call_data = "0xa9".to_string();
        assert_eq!(call.function_signature(), None);
    }

    #[test]
    fn addresses_format_lowercase() {
        let address = Address::from_slice(&[0xAB; 20]);
        assert_eq!(address_to_hex(&address), format!("0x{}", "ab".repeat(20)));
    }
}
