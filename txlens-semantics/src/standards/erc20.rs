//! Canonical ERC-20 event, function and transformation semantics.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use txlens_core::semantics::{
    EventSemantics, FunctionSemantics, ParameterSemantics, TransformationMap,
    TransformationSemantics,
};

pub const TRANSFER_EVENT_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
pub const APPROVAL_EVENT_TOPIC: &str =
    "0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925";

pub const TRANSFER_SELECTOR: &str = "0xa9059cbb";
pub const TRANSFER_FROM_SELECTOR: &str = "0x23b872dd";
pub const APPROVE_SELECTOR: &str = "0x095ea7b3";
pub const BALANCE_OF_SELECTOR: &str = "0x70a08231";
pub const TOTAL_SUPPLY_SELECTOR: &str = "0x18160ddd";

fn scale_by_decimals(key: &str) -> TransformationMap {
    HashMap::from([(
        key.to_string(),
        TransformationSemantics::expression(format!(
            "{key} / 10**token_decimals(__contract__)"
        )),
    )])
}

pub static ERC20_EVENTS: Lazy<HashMap<String, EventSemantics>> = Lazy::new(|| {
    HashMap::from([
        (
            TRANSFER_EVENT_TOPIC.to_string(),
            EventSemantics {
                signature: TRANSFER_EVENT_TOPIC.to_string(),
                anonymous: false,
                name: "Transfer".to_string(),
                parameters: vec![
                    ParameterSemantics::new("src", "address").indexed(),
                    ParameterSemantics::new("dst", "address").indexed(),
                    ParameterSemantics::new("value", "uint256"),
                ],
            },
        ),
        (
            APPROVAL_EVENT_TOPIC.to_string(),
            EventSemantics {
                signature: APPROVAL_EVENT_TOPIC.to_string(),
                anonymous: false,
                name: "Approval".to_string(),
                parameters: vec![
                    ParameterSemantics::new("src", "address").indexed(),
                    ParameterSemantics::new("dst", "address").indexed(),
                    ParameterSemantics::new("value", "uint256"),
                ],
            },
        ),
    ])
});

pub static ERC20_FUNCTIONS: Lazy<HashMap<String, FunctionSemantics>> = Lazy::new(|| {
    HashMap::from([
        (
            TRANSFER_SELECTOR.to_string(),
            FunctionSemantics {
                signature: TRANSFER_SELECTOR.to_string(),
                name: "transfer".to_string(),
                inputs: vec![
                    ParameterSemantics::new("recipient", "address"),
                    ParameterSemantics::new("amount", "uint256"),
                ],
                outputs: vec![ParameterSemantics::new("", "bool")],
            },
        ),
        (
            TRANSFER_FROM_SELECTOR.to_string(),
            FunctionSemantics {
                signature: TRANSFER_FROM_SELECTOR.to_string(),
                name: "transferFrom".to_string(),
                inputs: vec![
                    ParameterSemantics::new("sender", "address"),
                    ParameterSemantics::new("recipient", "address"),
                    ParameterSemantics::new("amount", "uint256"),
                ],
                outputs: vec![ParameterSemantics::new("", "bool")],
            },
        ),
        (
            APPROVE_SELECTOR.to_string(),
            FunctionSemantics {
                signature: APPROVE_SELECTOR.to_string(),
                name: "approve".to_string(),
                inputs: vec![
                    ParameterSemantics::new("spender", "address"),
                    ParameterSemantics::new("amount", "uint256"),
                ],
                outputs: vec![ParameterSemantics::new("", "bool")],
            },
        ),
        (
            BALANCE_OF_SELECTOR.to_string(),
            FunctionSemantics {
                signature: BALANCE_OF_SELECTOR.to_string(),
                name: "balanceOf".to_string(),
                inputs: vec![ParameterSemantics::new("holder", "address")],
                outputs: vec![ParameterSemantics::new("", "uint256")],
            },
        ),
        (
            TOTAL_SUPPLY_SELECTOR.to_string(),
            FunctionSemantics {
                signature: TOTAL_SUPPLY_SELECTOR.to_string(),
                name: "totalSupply".to_string(),
                inputs: vec![],
                outputs: vec![ParameterSemantics::new("", "uint256")],
            },
        ),
    ])
});

/// Default transformations: scale token amounts by the contract's decimals.
pub static ERC20_TRANSFORMATIONS: Lazy<HashMap<String, TransformationMap>> = Lazy::new(|| {
    HashMap::from([
        (TRANSFER_EVENT_TOPIC.to_string(), scale_by_decimals("__input2__")),
        (APPROVAL_EVENT_TOPIC.to_string(), scale_by_decimals("__input2__")),
        (TRANSFER_SELECTOR.to_string(), scale_by_decimals("__input1__")),
        (TRANSFER_FROM_SELECTOR.to_string(), scale_by_decimals("__input2__")),
        (APPROVE_SELECTOR.to_string(), scale_by_decimals("__input1__")),
        (BALANCE_OF_SELECTOR.to_string(), scale_by_decimals("__output0__")),
        (TOTAL_SUPPLY_SELECTOR.to_string(), scale_by_decimals("__output0__")),
    ])
});

#[cfg(test)]
mod tests {
    use super::*;
    use txlens_core::utils::{event_topic, selector_hex};

    #[test]
    fn table_keys_match_canonical_signatures() {
        assert_eq!(event_topic("Transfer(address,address,uint256)"), TRANSFER_EVENT_TOPIC);
        assert_eq!(event_topic("Approval(address,address,uint256)"), APPROVAL_EVENT_TOPIC);
        assert_eq!(selector_hex("transfer(address,uint256)"), TRANSFER_SELECTOR);
        assert_eq!(selector_hex("approve(address,uint256)"), APPROVE_SELECTOR);
        assert_eq!(selector_hex("balanceOf(address)"), BALANCE_OF_SELECTOR);
        assert_eq!(selector_hex("totalSupply()"), TOTAL_SUPPLY_SELECTOR);
    }

    #[test]
    fn transfer_event_has_two_indexed_parameters() {
        let event = &ERC20_EVENTS[TRANSFER_EVENT_TOPIC];
        assert_eq!(event.parameters.iter().filter(|p| p.indexed).count(), 2);
    }

    #[test]
    fn every_table_entry_has_matching_transformation() {
        for selector in ERC20_FUNCTIONS.keys() {
            assert!(ERC20_TRANSFORMATIONS.contains_key(selector), "missing for {selector}");
        }
    }
}
