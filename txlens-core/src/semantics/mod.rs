//! The semantics model: everything the repository knows about addresses,
//! contracts, their ABIs and per-parameter transformations.

use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, sync::Arc};

/// Describes a single ABI parameter, possibly nested for tuples.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSemantics {
    pub name: String,
    #[serde(rename = "type")]
    pub parameter_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ParameterSemantics>,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub dynamic: bool,
}

impl ParameterSemantics {
    pub fn new(name: impl Into<String>, parameter_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameter_type: parameter_type.into(),
            components: vec![],
            indexed: false,
            dynamic: false,
        }
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    pub fn with_components(mut self, components: Vec<ParameterSemantics>) -> Self {
        self.components = components;
        self
    }
}

/// An event ABI entry, keyed in [`ContractSemantics`] by its 32-byte topic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventSemantics {
    pub signature: String,
    pub anonymous: bool,
    pub name: String,
    pub parameters: Vec<ParameterSemantics>,
}

/// A function ABI entry, keyed in [`ContractSemantics`] by its 4-byte
/// selector (or the `"constructor"` / `"fallback"` pseudo-selectors).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionSemantics {
    pub signature: String,
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<ParameterSemantics>,
    #[serde(default)]
    pub outputs: Vec<ParameterSemantics>,
}

/// A rule rewriting one decoded parameter: optional rename and retype plus an
/// expression evaluated in the sandboxed transformation context.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformationSemantics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformed_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformed_type: Option<String>,
    #[serde(default)]
    pub transformation: String,
}

impl TransformationSemantics {
    pub fn expression(transformation: impl Into<String>) -> Self {
        Self { transformation: transformation.into(), ..Default::default() }
    }

    pub fn retype(transformed_type: impl Into<String>) -> Self {
        Self { transformed_type: Some(transformed_type.into()), ..Default::default() }
    }

    pub fn retype_with(
        transformed_type: impl Into<String>,
        transformation: impl Into<String>,
    ) -> Self {
        Self {
            transformed_type: Some(transformed_type.into()),
            transformation: transformation.into(),
            ..Default::default()
        }
    }
}

/// Transformations for one function or event, keyed by parameter name or by
/// the positional `__input<i>__` / `__output<i>__` keys.
pub type TransformationMap = HashMap<String, TransformationSemantics>;

/// ERC-20 token metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Erc20Semantics {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
}

/// The token interface a contract satisfies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStandard {
    #[serde(rename = "ERC20")]
    Erc20,
    #[serde(rename = "ERC721")]
    Erc721,
    #[serde(rename = "ERC1155")]
    Erc1155,
}

impl fmt::Display for TokenStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Erc20 => "ERC20",
            Self::Erc721 => "ERC721",
            Self::Erc1155 => "ERC1155",
        };
        f.write_str(name)
    }
}

/// Everything known about a deployed bytecode, shared between all addresses
/// carrying that code. Keyed by the Keccak-256 hash of the code.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractSemantics {
    pub code_hash: String,
    pub name: String,
    #[serde(default)]
    pub events: HashMap<String, EventSemantics>,
    #[serde(default)]
    pub functions: HashMap<String, FunctionSemantics>,
    #[serde(default)]
    pub transformations: HashMap<String, TransformationMap>,
}

impl ContractSemantics {
    pub fn named(code_hash: impl Into<String>, name: impl Into<String>) -> Self {
        Self { code_hash: code_hash.into(), name: name.into(), ..Default::default() }
    }

    /// The contract's unique anonymous event, if exactly one is declared.
    pub fn unique_anonymous_event(&self) -> Option<&EventSemantics> {
        let mut anonymous = self.events.values().filter(|event| event.anonymous);
        match (anonymous.next(), anonymous.next()) {
            (Some(event), None) => Some(event),
            _ => None,
        }
    }
}

/// Chain-scoped knowledge about one address. The referenced
/// [`ContractSemantics`] is shared by all addresses with identical bytecode.
#[derive(Clone, Debug, PartialEq)]
pub struct AddressSemantics {
    pub chain_id: String,
    pub address: Address,
    pub name: String,
    pub is_contract: bool,
    pub contract: Arc<ContractSemantics>,
    pub standard: Option<TokenStandard>,
    pub erc20: Option<Erc20Semantics>,
}

/// One argument of a 4-byte signature directory entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignatureArg {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: String,
}

/// A 4-byte selector index entry. Several entries may share a hash; lookups
/// prefer the most used non-guessed one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub signature_hash: String,
    pub name: String,
    pub args: Vec<SignatureArg>,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub tuple: bool,
    #[serde(default)]
    pub guessed: bool,
}

fn default_count() -> u32 {
    1
}

impl Signature {
    pub fn new(signature_hash: impl Into<String>, name: impl Into<String>, args: Vec<SignatureArg>) -> Self {
        Self {
            signature_hash: signature_hash.into(),
            name: name.into(),
            args,
            count: 1,
            tuple: false,
            guessed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(signature: &str, anonymous: bool) -> EventSemantics {
        EventSemantics {
            signature: signature.to_string(),
            anonymous,
            name: "LogNote".to_string(),
            parameters: vec![],
        }
    }

    #[test]
    fn unique_anonymous_event_requires_exactly_one() {
        let mut contract = ContractSemantics::named("0x01", "Test");
        assert!(contract.unique_anonymous_event().is_none());

        contract.events.insert("0xaa".into(), event("0xaa", true));
        contract.events.insert("0xbb".into(), event("0xbb", false));
        assert_eq!(contract.unique_anonymous_event().unwrap().signature, "0xaa");

        contract.events.insert("0xcc".into(), event("0xcc", true));
        assert!(contract.unique_anonymous_event().is_none());
    }

    #[test]
    fn parameter_builders() {
        let param = ParameterSemantics::new("data", "bytes").dynamic();
        assert!(param.dynamic && !param.indexed);
        let tuple = ParameterSemantics::new("pair", "tuple")
            .with_components(vec![ParameterSemantics::new("a", "uint256")]);
        assert_eq!(tuple.components.len(), 1);
    }

    #[test]
    fn token_standard_serde_names() {
        assert_eq!(serde_json::to_string(&TokenStandard::Erc20).unwrap(), "\"ERC20\"");
        let parsed: TokenStandard = serde_json::from_str("\"ERC1155\"").unwrap();
        assert_eq!(parsed, TokenStandard::Erc1155);
    }
}
