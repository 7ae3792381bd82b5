//! Static per-contract semantics overlays.
//!
//! Applied to a [`ContractSemantics`] at the moment of retrieval; the
//! persisted record stays untouched. This is how well-known anonymous events
//! and protocol-specific quirks get described without a verified ABI.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::warn;
use txlens_core::semantics::{
    ContractSemantics, EventSemantics, ParameterSemantics, TransformationMap,
    TransformationSemantics,
};

/// A partial update layered over a contract's semantics.
#[derive(Clone, Debug, Default)]
pub struct SemanticsOverlay {
    pub name: Option<String>,
    pub events: Vec<EventSemantics>,
    pub transformations: HashMap<String, TransformationMap>,
}

const LOGNOTE_V1_TOPIC: &str =
    "0xd3ff30f94bb4ebb4f3d773ea26b6efc7328b9766f99f19dff6f01392138be46d";
const LOGNOTE_V2_TOPIC: &str =
    "0xd3d8bec38a91a5f4411247483bc030a174e77cda9c0351924c759f41453aa5e8";
const LOGNOTE_V3_TOPIC: &str =
    "0x644843f351d3fba4abcd60109eaff9f54bac8fb8ccf0bab941009c21df21cf31";
const LOG_CALL_TOPIC: &str =
    "0x25fce1fe01d9b241fda40b2152ddd6f4ba063fcfb3c2c81dddf84ee20d3f341f";

/// DSProxy deployed bytecode hash.
const DS_PROXY_CODE_HASH: &str =
    "0x27c02a1a822222c2ad6a9a01021c98abf05dbe6d19540035756ef97697ed41d0";
/// Canonical WETH9 deployed bytecode hash.
const WETH_CODE_HASH: &str =
    "0xd0a06b12ac47863b5c7be4185c2deaad1c61557033f56c7d4ea74429cbb25e23";

fn ignore(name: &str) -> (String, TransformationSemantics) {
    (name.to_string(), TransformationSemantics::retype("ignore"))
}

fn inline_call(name: &str) -> (String, TransformationSemantics) {
    (
        name.to_string(),
        TransformationSemantics::retype_with("call", format!("decode_call(__contract__, {name})")),
    )
}

/// Transformations for well-known topic hashes whose events decode into an
/// embedded call (Maker's `LogNote` family, Balancer's `LOG_CALL`). Keyed by
/// topic; consulted by the semantic event decoder as a fallback.
pub static ANONYMOUS_EVENTS: Lazy<HashMap<String, TransformationMap>> = Lazy::new(|| {
    HashMap::from([
        (
            LOGNOTE_V1_TOPIC.to_string(),
            HashMap::from([
                ignore("sig"),
                ignore("arg1"),
                ignore("arg2"),
                ignore("arg3"),
                inline_call("data"),
            ]),
        ),
        (
            LOGNOTE_V2_TOPIC.to_string(),
            HashMap::from([ignore("sig"), ignore("arg1"), ignore("arg2"), inline_call("data")]),
        ),
        (
            LOGNOTE_V3_TOPIC.to_string(),
            HashMap::from([
                ignore("sig"),
                ignore("foo"),
                ignore("bar"),
                ("wad".to_string(), TransformationSemantics::expression("wad / 10**18")),
                inline_call("fax"),
            ]),
        ),
        (
            LOG_CALL_TOPIC.to_string(),
            HashMap::from([ignore("sig"), inline_call("data")]),
        ),
    ])
});

/// Per-code-hash overlays for contracts whose verified ABIs undersell their
/// logs.
static OVERLAYS: Lazy<HashMap<String, SemanticsOverlay>> = Lazy::new(|| {
    HashMap::from([
        (
            DS_PROXY_CODE_HASH.to_string(),
            SemanticsOverlay {
                name: None,
                events: vec![lognote_v2()],
                transformations: HashMap::from([(
                    "0x1cff79cd".to_string(),
                    HashMap::from([(
                        "_data".to_string(),
                        TransformationSemantics::retype_with(
                            "call",
                            "decode_call(_target, _data)",
                        ),
                    )]),
                )]),
            },
        ),
        (
            WETH_CODE_HASH.to_string(),
            SemanticsOverlay {
                name: None,
                events: vec![],
                transformations: HashMap::from([
                    (
                        // Deposit
                        "0xe1fffcc4923d04b559f4d29a8bfc6cda04eb5b0d3c460751c2402c5c5cc9109c"
                            .to_string(),
                        HashMap::from([(
                            "wad".to_string(),
                            TransformationSemantics::expression("wad / 10**18"),
                        )]),
                    ),
                    (
                        // Withdrawal
                        "0x7fcf532c15f0a6db0bd6d0e038bea71d30d808c7d98cb3bf7268a95bf5081b65"
                            .to_string(),
                        HashMap::from([(
                            "wad".to_string(),
                            TransformationSemantics::expression("wad / 10**18"),
                        )]),
                    ),
                    (
                        // withdraw
                        "0x2e1a7d4d".to_string(),
                        HashMap::from([(
                            "wad".to_string(),
                            TransformationSemantics::expression("wad / 10**18"),
                        )]),
                    ),
                ]),
            },
        ),
    ])
});

fn lognote_v2() -> EventSemantics {
    EventSemantics {
        signature: LOGNOTE_V2_TOPIC.to_string(),
        anonymous: true,
        name: "LogNote".to_string(),
        parameters: vec![
            ParameterSemantics::new("sig", "bytes4").indexed(),
            ParameterSemantics::new("user", "address").indexed(),
            ParameterSemantics::new("arg1", "bytes32").indexed(),
            ParameterSemantics::new("arg2", "bytes32").indexed(),
            ParameterSemantics::new("data", "bytes").dynamic(),
        ],
    }
}

/// Injects the overlay matching `semantics.code_hash`, if any.
pub fn amend_contract_semantics(semantics: &mut ContractSemantics) {
    let Some(overlay) = OVERLAYS.get(&semantics.code_hash) else { return };

    if let Some(name) = &overlay.name {
        semantics.name = name.clone();
    }
    for event in &overlay.events {
        if semantics.events.insert(event.signature.clone(), event.clone()).is_some() {
            warn!(target: "semantics", signature = %event.signature, "overlay replaced an event");
        }
    }
    for (signature, transformation) in &overlay.transformations {
        semantics.transformations.insert(signature.clone(), transformation.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amends_ds_proxy_semantics() {
        let mut contract = ContractSemantics::named(DS_PROXY_CODE_HASH, "DSProxy");
        amend_contract_semantics(&mut contract);
        assert!(contract.transformations.contains_key("0x1cff79cd"));
        assert!(contract.events.values().any(|event| event.anonymous));
    }

    #[test]
    fn leaves_unknown_code_hashes_alone() {
        let mut contract = ContractSemantics::named("0xbeef", "Other");
        amend_contract_semantics(&mut contract);
        assert!(contract.transformations.is_empty());
        assert!(contract.events.is_empty());
    }

    #[test]
    fn anonymous_event_patterns_ignore_noise_parameters() {
        let lognote = &ANONYMOUS_EVENTS[LOGNOTE_V3_TOPIC];
        assert_eq!(lognote["sig"].transformed_type.as_deref(), Some("ignore"));
        assert_eq!(lognote["fax"].transformed_type.as_deref(), Some("call"));
        assert_eq!(lognote["wad"].transformation, "wad / 10**18");
    }
}
