//! The per-call transformation context and the parameter rewrite pass.

use crate::semantic::expr::Evaluator;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use tracing::warn;
use txlens_core::{
    decoded::{AddressInfo, Argument, Badge, DecodedTransactionMetadata, Value},
    semantics::TransformationMap,
    utils::parse_address,
};

/// The variables a transformation expression can read: every parameter by
/// name and by positional key, plus the contract address.
pub struct TransformationContext {
    variables: HashMap<String, Value>,
    /// The contract address the transformed call or event belongs to.
    pub contract: String,
}

impl TransformationContext {
    pub fn new(contract: impl Into<String>, inputs: &[Argument], outputs: &[Argument]) -> Self {
        let contract = contract.into();
        let mut variables = HashMap::new();

        for (i, parameter) in inputs.iter().enumerate() {
            if !parameter.name.is_empty() {
                variables.insert(parameter.name.clone(), parameter.value.clone());
            }
            variables.insert(format!("__input{i}__"), parameter.value.clone());
        }
        for (i, parameter) in outputs.iter().enumerate() {
            if !parameter.name.is_empty() {
                variables.insert(parameter.name.clone(), parameter.value.clone());
            }
            variables.insert(format!("__output{i}__"), parameter.value.clone());
        }

        variables.insert("__contract__".to_string(), Value::Hex(contract.clone()));

        Self { variables, contract }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}

/// The badge of an address relative to the transaction endpoints.
pub fn get_badge(address: Option<&str>, metadata: &DecodedTransactionMetadata) -> Option<Badge> {
    let address = address?;
    if metadata.sender.address.as_deref() == Some(address) {
        return Some(Badge::Sender)
    }
    if metadata
        .receiver
        .as_ref()
        .and_then(|receiver| receiver.address.as_deref()) ==
        Some(address)
    {
        return Some(Badge::Receiver)
    }
    None
}

/// Applies one parameter's transformation, wraps addresses, shortens long
/// byte strings and recurses into tuples. Expression failures keep the
/// original value.
pub fn transform_parameter<'a>(
    evaluator: &'a Evaluator<'a>,
    parameter: &'a mut Argument,
    indexed_name: String,
    transformations: &'a TransformationMap,
    ctx: &'a TransformationContext,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let transformation =
            transformations.get(&parameter.name).or_else(|| transformations.get(&indexed_name));

        if let Some(transformation) = transformation {
            if let Some(name) = &transformation.transformed_name {
                parameter.name = name.clone();
            }
            if let Some(transformed_type) = &transformation.transformed_type {
                parameter.arg_type = transformed_type.clone();
            }
            if !transformation.transformation.is_empty() {
                match evaluator.evaluate(&transformation.transformation, ctx).await {
                    Ok(value) => parameter.value = value,
                    Err(err) => warn!(
                        target: "decoders",
                        expression = %transformation.transformation, %err,
                        "transformation failed"
                    ),
                }
            }
        }

        if parameter.arg_type == "address" && !matches!(parameter.value, Value::Address(_)) {
            if let Some(address) = parameter.value.as_address_string() {
                let name = evaluator
                    .repository
                    .get_address_label(evaluator.chain_id, parse_address(&address), evaluator.proxies)
                    .await;
                let badge = get_badge(Some(&address), evaluator.transaction);
                parameter.value =
                    Value::Address(AddressInfo::new(address, name).with_badge(badge));
            }
        } else if parameter.arg_type == "bytes" {
            if let Value::Hex(raw) = &parameter.value {
                if raw.len() > 66 {
                    parameter.value =
                        Value::Hex(format!("{}...{}", &raw[..60], &raw[raw.len() - 6..]));
                }
            }
        } else if parameter.arg_type == "tuple" {
            if let Value::Tuple(components) = &mut parameter.value {
                for (i, component) in components.iter_mut().enumerate() {
                    transform_parameter(
                        evaluator,
                        component,
                        format!("__input{i}__"),
                        transformations,
                        ctx,
                    )
                    .await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use txlens_core::types::{timestamp_from_secs, U256};

    fn metadata() -> DecodedTransactionMetadata {
        DecodedTransactionMetadata {
            chain_id: "mainnet".to_string(),
            tx_hash: "0xabc".to_string(),
            block_number: 1,
            block_hash: "0xdef".to_string(),
            timestamp: timestamp_from_secs(0),
            gas_price: 1.0,
            sender: AddressInfo::new("0xaaaa", "sender").with_badge(Some(Badge::Sender)),
            receiver: Some(AddressInfo::new("0xbbbb", "receiver").with_badge(Some(Badge::Receiver))),
            tx_index: 0,
            tx_value: U256::zero(),
            gas_limit: 21_000,
            gas_used: 21_000,
            success: true,
        }
    }

    #[test]
    fn context_exposes_named_and_positional_keys() {
        let inputs = vec![Argument::new("wad", "uint256", Value::Uint(U256::from(5u64)))];
        let outputs = vec![Argument::new("", "bool", Value::Bool(true))];
        let ctx = TransformationContext::new("0xcc", &inputs, &outputs);

        assert_eq!(ctx.get("wad"), Some(&Value::Uint(U256::from(5u64))));
        assert_eq!(ctx.get("__input0__"), Some(&Value::Uint(U256::from(5u64))));
        assert_eq!(ctx.get("__output0__"), Some(&Value::Bool(true)));
        assert_eq!(ctx.get("__contract__"), Some(&Value::Hex("0xcc".to_string())));
        assert!(ctx.get("missing").is_none());
    }

    #[test]
    fn badges_match_transaction_endpoints() {
        let metadata = metadata();
        assert_eq!(get_badge(Some("0xaaaa"), &metadata), Some(Badge::Sender));
        assert_eq!(get_badge(Some("0xbbbb"), &metadata), Some(Badge::Receiver));
        assert_eq!(get_badge(Some("0xcccc"), &metadata), None);
        assert_eq!(get_badge(None, &metadata), None);
    }
}
