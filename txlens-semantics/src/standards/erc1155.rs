//! Canonical ERC-1155 event, function and transformation semantics.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use txlens_core::semantics::{
    EventSemantics, FunctionSemantics, ParameterSemantics, TransformationMap,
    TransformationSemantics,
};

pub const TRANSFER_SINGLE_EVENT_TOPIC: &str =
    "0xc3d58168c5ae7397731d063d5bbf3d657854427343f4c083240f7aacaa2d0f62";
pub const TRANSFER_BATCH_EVENT_TOPIC: &str =
    "0x4a39dc06d4c0dbc64b70af90fd698a233a518aa5d07e595d983b8c0526c8f7fb";
pub const APPROVAL_FOR_ALL_EVENT_TOPIC: &str = super::erc721::APPROVAL_FOR_ALL_EVENT_TOPIC;
pub const URI_EVENT_TOPIC: &str =
    "0x6bb7ff708619ba0610cba295a58592e0451dee2622938c8755667688daf3529b";

pub const BALANCE_OF_SELECTOR: &str = "0x00fdd58e";
pub const BALANCE_OF_BATCH_SELECTOR: &str = "0x4e1273f4";
pub const SAFE_TRANSFER_FROM_SELECTOR: &str = "0xf242432a";
pub const SAFE_BATCH_TRANSFER_FROM_SELECTOR: &str = "0x2eb2c2d6";

fn decode_nft(key: &str) -> TransformationMap {
    HashMap::from([(
        key.to_string(),
        TransformationSemantics::retype_with("nft", format!("decode_nft({key})")),
    )])
}

pub static ERC1155_EVENTS: Lazy<HashMap<String, EventSemantics>> = Lazy::new(|| {
    HashMap::from([
        (
            TRANSFER_SINGLE_EVENT_TOPIC.to_string(),
            EventSemantics {
                signature: TRANSFER_SINGLE_EVENT_TOPIC.to_string(),
                anonymous: false,
                name: "TransferSingle".to_string(),
                parameters: vec![
                    ParameterSemantics::new("operator", "address").indexed(),
                    ParameterSemantics::new("from", "address").indexed(),
                    ParameterSemantics::new("to", "address").indexed(),
                    ParameterSemantics::new("id", "uint256"),
                    ParameterSemantics::new("value", "uint256"),
                ],
            },
        ),
        (
            TRANSFER_BATCH_EVENT_TOPIC.to_string(),
            EventSemantics {
                signature: TRANSFER_BATCH_EVENT_TOPIC.to_string(),
                anonymous: false,
                name: "TransferBatch".to_string(),
                parameters: vec![
                    ParameterSemantics::new("operator", "address").indexed(),
                    ParameterSemantics::new("from", "address").indexed(),
                    ParameterSemantics::new("to", "address").indexed(),
                    ParameterSemantics::new("ids", "uint256[]").dynamic(),
                    ParameterSemantics::new("values", "uint256[]").dynamic(),
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
        (
            URI_EVENT_TOPIC.to_string(),
            EventSemantics {
                signature: URI_EVENT_TOPIC.to_string(),
                anonymous: false,
                name: "URI".to_string(),
                parameters: vec![
                    ParameterSemantics::new("value", "string").dynamic(),
                    ParameterSemantics::new("id", "uint256").indexed(),
                ],
            },
        ),
    ])
});

pub static ERC1155_FUNCTIONS: Lazy<HashMap<String, FunctionSemantics>> = Lazy::new(|| {
    HashMap::from([
        (
            BALANCE_OF_SELECTOR.to_string(),
            FunctionSemantics {
                signature: BALANCE_OF_SELECTOR.to_string(),
                name: "balanceOf".to_string(),
                inputs: vec![
                    ParameterSemantics::new("owner", "address"),
                    ParameterSemantics::new("id", "uint256"),
                ],
                outputs: vec![ParameterSemantics::new("", "uint256")],
            },
        ),
        (
            BALANCE_OF_BATCH_SELECTOR.to_string(),
            FunctionSemantics {
                signature: BALANCE_OF_BATCH_SELECTOR.to_string(),
                name: "balanceOfBatch".to_string(),
                inputs: vec![
                    ParameterSemantics::new("owners", "address[]").dynamic(),
                    ParameterSemantics::new("ids", "uint256[]").dynamic(),
                ],
                outputs: vec![ParameterSemantics::new("", "uint256[]").dynamic()],
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
                    ParameterSemantics::new("id", "uint256"),
                    ParameterSemantics::new("value", "uint256"),
                    ParameterSemantics::new("data", "bytes").dynamic(),
                ],
                outputs: vec![],
            },
        ),
        (
            SAFE_BATCH_TRANSFER_FROM_SELECTOR.to_string(),
            FunctionSemantics {
                signature: SAFE_BATCH_TRANSFER_FROM_SELECTOR.to_string(),
                name: "safeBatchTransferFrom".to_string(),
                inputs: vec![
                    ParameterSemantics::new("from", "address"),
                    ParameterSemantics::new("to", "address"),
                    ParameterSemantics::new("ids", "uint256[]").dynamic(),
                    ParameterSemantics::new("values", "uint256[]").dynamic(),
                    ParameterSemantics::new("data", "bytes").dynamic(),
                ],
                outputs: vec![],
            },
        ),
    ])
});

/// Default transformations: render token ids as NFT references.
pub static ERC1155_TRANSFORMATIONS: Lazy<HashMap<String, TransformationMap>> = Lazy::new(|| {
    HashMap::from([
        (TRANSFER_SINGLE_EVENT_TOPIC.to_string(), decode_nft("__input3__")),
        (TRANSFER_BATCH_EVENT_TOPIC.to_string(), decode_nft("__input3__")),
        (URI_EVENT_TOPIC.to_string(), decode_nft("__input1__")),
        (SAFE_TRANSFER_FROM_SELECTOR.to_string(), decode_nft("__input2__")),
        (SAFE_BATCH_TRANSFER_FROM_SELECTOR.to_string(), decode_nft("__input2__")),
    ])
});

#[cfg(test)]
mod tests {
    use super::*;
    use txlens_core::utils::{event_topic, selector_hex};

    #[test]
    fn table_keys_match_canonical_signatures() {
        assert_eq!(
            event_topic("TransferSingle(address,address,address,uint256,uint256)"),
            TRANSFER_SINGLE_EVENT_TOPIC
        );
        assert_eq!(
            event_topic("TransferBatch(address,address,address,uint256[],uint256[])"),
            TRANSFER_BATCH_EVENT_TOPIC
        );
        assert_eq!(selector_hex("balanceOf(address,uint256)"), BALANCE_OF_SELECTOR);
        assert_eq!(
            selector_hex("safeTransferFrom(address,address,uint256,uint256,bytes)"),
            SAFE_TRANSFER_FROM_SELECTOR
        );
        assert_eq!(
            selector_hex("safeBatchTransferFrom(address,address,uint256[],uint256[],bytes)"),
            SAFE_BATCH_TRANSFER_FROM_SELECTOR
        );
    }
}
