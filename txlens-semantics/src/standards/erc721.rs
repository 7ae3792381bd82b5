//! Canonical ERC-721 event, function and transformation semantics.
//!
//! `Transfer` and `Approval` share their topic hashes with ERC-20; the
//! indexed-topic count disambiguates them at decode time.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use txlens_core::semantics::{
    EventSemantics, FunctionSemantics, ParameterSemantics, TransformationMap,
    TransformationSemantics,
};

pub const TRANSFER_EVENT_TOPIC: &str = super::erc20::TRANSFER_EVENT_TOPIC;
pub const APPROVAL_EVENT_TOPIC: &str = super::erc20::APPROVAL_EVENT_TOPIC;
pub const APPROVAL_FOR_ALL_EVENT_TOPIC: &str =
    "0x17307eab39ab6107e8899845ad3d59bd9653f200f220920489ca2b5937696c31";

pub const BALANCE_OF_SELECTOR: &str = "0x70a08231";
pub const OWNER_OF_SELECTOR: &str = "0x6352211e";
pub const TRANSFER_FROM_SELECTOR: &str = "0x23b872dd";
pub const SAFE_TRANSFER_FROM_SELECTOR: &str = "0x42842e0e";
pub const APPROVE_SELECTOR: &str = "0x095ea7b3";
pub const SET_APPROVAL_FOR_ALL_SELECTOR: &str = "0xa22cb465";

fn decode_nft(key: &str) -> TransformationMap {
    HashMap::from([(
        key.to_string(),
        TransformationSemantics::retype_with("nft", format!("decode_nft({key})")),
    )])
}

pub static ERC721_EVENTS: Lazy<HashMap<String, EventSemantics>> = Lazy::new(|| {
    HashMap::from([
        (
            TRANSFER_EVENT_TOPIC.to_string(),
            EventSemantics {
                signature: TRANSFER_EVENT_TOPIC.to_string(),
                anonymous: false,
                name: "Transfer".to_string(),
                parameters: vec![
                    ParameterSemantics::new("from", "address").indexed(),
                    ParameterSemantics::new("to", "address").indexed(),
                    ParameterSemantics::new("tokenId", "uint256").indexed(),
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
                    ParameterSemantics::new("owner", "address").indexed(),
                    ParameterSemantics::new("approved", "address").indexed(),
                    ParameterSemantics::new("tokenId", "uint256").indexed(),
                ],
            },
        ),
        (
            APPROVAL_FOR_ALL_EVENT_TOPIC.to_string(),
            EventSemantics {
                signature: APPROVAL_FOR_ALL_EVENT_TOPIC.to_string(),
                anonymous: false,
                name: "ApprovalForAll".to_string(),
                parameters: vec![
                    ParameterSemantics::new("owner", "address").indexed(),
                    ParameterSemantics::new("operator", "address").indexed(),
                    ParameterSemantics::new("approved", "bool"),
                ],
            },
        ),
    ])
});

pub static ERC721_FUNCTIONS: Lazy<HashMap<String, FunctionSemantics>> = Lazy::new(|| {
    HashMap::from([
        (
            BALANCE_OF_SELECTOR.to_string(),
            FunctionSemantics {
                signature: BALANCE_OF_SELECTOR.to_string(),
                name: "balanceOf".to_string(),
                inputs: vec![ParameterSemantics::new("owner", "address")],
                outputs: vec![ParameterSemantics::new("", "uint256")],
            },
        ),
        (
            OWNER_OF_SELECTOR.to_string(),
            FunctionSemantics {
                signature: OWNER_OF_SELECTOR.to_string(),
                name: "ownerOf".to_string(),
                inputs: vec![ParameterSemantics::new("tokenId", "uint256")],
                outputs: vec![ParameterSemantics::new("", "address")],
            },
        ),
        (
            TRANSFER_FROM_SELECTOR.to_string(),
            FunctionSemantics {
                signature: TRANSFER_FROM_SELECTOR.to_string(),
                name: "transferFrom".to_string(),
                inputs: vec![
                    ParameterSemantics::new("from", "address"),
                    ParameterSemantics::new("to", "address"),
                    ParameterSemantics::new("tokenId", "uint256"),
                ],
                outputs: vec![],
            },
        ),
        (
            SAFE_TRANSFER_FROM_SELECTOR.to_string(),
            FunctionSemantics {
                signature: SAFE_TRANSFER_FROM_SELECTOR.to_string(),
                name: "safeTransferFrom".to_string(),
                inputs: vec![
                    ParameterSemantics::new("from", "address"),
                    ParameterSemantics::new("to", "address"),
                    ParameterSemantics::new("tokenId", "uint256"),
                ],
                outputs: vec![],
            },
        ),
        (
            APPROVE_SELECTOR.to_string(),
            FunctionSemantics {
                signature: APPROVE_SELECTOR.to_string(),
                name: "approve".to_string(),
                inputs: vec![
                    ParameterSemantics::new("approved", "address"),
                    ParameterSemantics::new("tokenId", "uint256"),
                ],
                outputs: vec![],
            },
        ),
        (
            SET_APPROVAL_FOR_ALL_SELECTOR.to_string(),
            FunctionSemantics {
                signature: SET_APPROVAL_FOR_ALL_SELECTOR.to_string(),
                name: "setApprovalForAll".to_string(),
                inputs: vec![
                    ParameterSemantics::new("operator", "address"),
                    ParameterSemantics::new("approved", "bool"),
                ],
                outputs: vec![],
            },
        ),
    ])
});

/// Default transformations: render token ids as NFT references.
pub static ERC721_TRANSFORMATIONS: Lazy<HashMap<String, TransformationMap>> = Lazy::new(|| {
    HashMap::from([
        (TRANSFER_EVENT_TOPIC.to_string(), decode_nft("__input2__")),
        (APPROVAL_EVENT_TOPIC.to_string(), decode_nft("__input2__")),
        (OWNER_OF_SELECTOR.to_string(), decode_nft("__input0__")),
        (TRANSFER_FROM_SELECTOR.to_string(), decode_nft("__input2__")),
        (SAFE_TRANSFER_FROM_SELECTOR.to_string(), decode_nft("__input2__")),
        (APPROVE_SELECTOR.to_string(), decode_nft("__input1__")),
    ])
});

#[cfg(test)]
mod tests {
    use super::*;
    use txlens_core::utils::{event_topic, selector_hex};

    #[test]
    fn table_keys_match_canonical_signatures() {
        assert_eq!(
            event_topic("ApprovalForAll(address,address,bool)"),
            APPROVAL_FOR_ALL_EVENT_TOPIC
        );
        assert_eq!(selector_hex("ownerOf(uint256)"), OWNER_OF_SELECTOR);
        assert_eq!(
            selector_hex("safeTransferFrom(address,address,uint256)"),
            SAFE_TRANSFER_FROM_SELECTOR
        );
        assert_eq!(selector_hex("setApprovalForAll(address,bool)"), SET_APPROVAL_FOR_ALL_SELECTOR);
    }

    #[test]
    fn transfer_event_has_three_indexed_parameters() {
        let event = &ERC721_EVENTS[TRANSFER_EVENT_TOPIC];
        assert_eq!(event.parameters.iter().filter(|p| p.indexed).count(), 3);
    }
}
