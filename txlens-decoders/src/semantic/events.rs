//! Semantic enrichment of decoded events.

use super::{
    context::{get_badge, transform_parameter, TransformationContext},
    Evaluator, SemanticDecoder,
};
use crate::proxies::ProxyMap;
use tracing::warn;
use txlens_core::{
    decoded::{Argument, DecodedEvent, DecodedTransactionMetadata, Value},
    semantics::{TokenStandard, TransformationMap},
    utils::{event_topic, parse_address},
};
use txlens_semantics::{
    standards::{
        erc20::{ERC20_EVENTS, ERC20_TRANSFORMATIONS},
        erc721::{ERC721_EVENTS, ERC721_TRANSFORMATIONS},
    },
    ANONYMOUS_EVENTS,
};

impl SemanticDecoder {
    pub async fn decode_events(
        &self,
        events: Vec<DecodedEvent>,
        tx_metadata: &DecodedTransactionMetadata,
        proxies: &ProxyMap,
    ) -> Vec<DecodedEvent> {
        let mut decoded = Vec::with_capacity(events.len());
        for event in events {
            decoded.push(self.decode_event(event, tx_metadata, proxies).await);
        }
        decoded
    }

    pub async fn decode_event(
        &self,
        mut event: DecodedEvent,
        tx_metadata: &DecodedTransactionMetadata,
        proxies: &ProxyMap,
    ) -> DecodedEvent {
        // anonymous events decode under a borrowed name; recompute the topic
        // their resolved shape would have
        let calculated_signature = match &event.event_signature {
            Some(signature) if event.event_name == *signature => signature.clone(),
            _ => event_topic(format!(
                "{}{}",
                event.event_name,
                parameters_canonical(&event.parameters)
            )),
        };

        if let Some(signature) = &event.event_signature {
            if event.event_name != *signature &&
                calculated_signature != *signature &&
                !ANONYMOUS_EVENTS.contains_key(&calculated_signature) &&
                !event.event_guessed
            {
                warn!(
                    target: "decoders",
                    calculated = %calculated_signature, actual = %signature,
                    "event signature mismatch"
                );
            }
        }

        let chain_id = event.chain_id.clone();
        let contract_address = event.contract.address.as_deref().and_then(parse_address);

        let transformations = match contract_address {
            Some(address) => self
                .repository
                .get_transformations(&chain_id, address, &calculated_signature)
                .await,
            None => None,
        };
        let transformations = transformations
            .or_else(|| ANONYMOUS_EVENTS.get(&calculated_signature).cloned())
            .unwrap_or_default();

        let mut standard = match contract_address {
            Some(address) => self.repository.get_standard(&chain_id, address).await,
            None => None,
        };
        if standard.is_none() {
            // a proxy fronting a token behaves like the token
            let proxied_token = contract_address
                .and_then(|address| proxies.get(&address))
                .and_then(|proxy| proxy.token.as_ref());
            if proxied_token.is_some() {
                standard = Some(TokenStandard::Erc20);
            }
        }

        let evaluator = Evaluator {
            repository: self.repository.as_ref(),
            proxies: Some(proxies),
            chain_id: &chain_id,
            transaction: tx_metadata,
        };
        let contract_hex = event.contract.address.clone().unwrap_or_default();
        let ctx = TransformationContext::new(contract_hex, &event.parameters, &[]);

        apply_transformations(&evaluator, &mut event.parameters, &transformations, &ctx).await;

        if transformations.is_empty() {
            if let Some(signature) = &event.event_signature {
                let fallback = match standard {
                    Some(TokenStandard::Erc20) if ERC20_EVENTS.contains_key(signature) => {
                        ERC20_TRANSFORMATIONS.get(signature)
                    }
                    Some(TokenStandard::Erc721) if ERC721_EVENTS.contains_key(signature) => {
                        ERC721_TRANSFORMATIONS.get(signature)
                    }
                    _ => None,
                };
                if let Some(fallback) = fallback {
                    apply_transformations(&evaluator, &mut event.parameters, fallback, &ctx).await;
                }
            }
        }

        event.contract.badge = get_badge(event.contract.address.as_deref(), tx_metadata);
        event.parameters.retain(|parameter| parameter.arg_type != "ignore");

        event
    }
}

async fn apply_transformations(
    evaluator: &Evaluator<'_>,
    parameters: &mut [Argument],
    transformations: &TransformationMap,
    ctx: &TransformationContext,
) {
    for (i, parameter) in parameters.iter_mut().enumerate() {
        transform_parameter(evaluator, parameter, format!("__input{i}__"), transformations, ctx)
            .await;
    }
}

/// The canonical `(type1,type2,…)` string of decoded parameters, recursing
/// into tuples.
fn parameters_canonical(parameters: &[Argument]) -> String {
    let types: Vec<String> = parameters
        .iter()
        .map(|parameter| {
            if parameter.arg_type == "tuple" {
                match &parameter.value {
                    Value::Tuple(components) => parameters_canonical(components),
                    _ => parameter.arg_type.clone(),
                }
            } else {
                parameter.arg_type.clone()
            }
        })
        .collect();
    format!("({})", types.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use txlens_core::types::U256;

    #[test]
    fn canonical_parameter_types_recurse_into_tuples() {
        let parameters = vec![
            Argument::new("src", "address", Value::Hex("0xaa".to_string())),
            Argument::new(
                "pair",
                "tuple",
                Value::Tuple(vec![
                    Argument::new("a", "uint256", Value::Uint(U256::zero())),
                    Argument::new("b", "bool", Value::Bool(true)),
                ]),
            ),
        ];
        assert_eq!(parameters_canonical(&parameters), "(address,(uint256,bool))");
    }

    #[test]
    fn canonical_signature_matches_known_topics() {
        let parameters = vec![
            Argument::new("src", "address", Value::Hex("0xaa".to_string())),
            Argument::new("dst", "address", Value::Hex("0xbb".to_string())),
            Argument::new("value", "uint256", Value::Uint(U256::zero())),
        ];
        let topic = event_topic(format!("Transfer{}", parameters_canonical(&parameters)));
        assert_eq!(
            topic,
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }
}
