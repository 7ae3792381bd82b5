//! Turns a raw JSON ABI into keyed event and function semantics.

use super::raw::{Component, RawAbi};
use crate::{
    semantics::{EventSemantics, FunctionSemantics, ParameterSemantics},
    utils::{event_topic, selector_hex},
};
use std::collections::HashMap;

/// Events keyed by topic hash and functions keyed by selector (plus the
/// `"constructor"` / `"fallback"` pseudo-selectors).
pub type ParsedAbi = (HashMap<String, EventSemantics>, HashMap<String, FunctionSemantics>);

/// Parses ABI items into semantics, computing canonical signatures and the
/// `dynamic` flag bottom-up.
pub fn parse_abi(abi: &RawAbi) -> ParsedAbi {
    let mut events = HashMap::new();
    let mut functions = HashMap::new();

    for item in abi.iter() {
        match item.type_field.as_str() {
            "constructor" => {
                let (_, inputs) = parse_components(&item.inputs);
                functions.insert(
                    "constructor".to_string(),
                    FunctionSemantics {
                        signature: "constructor".to_string(),
                        name: "constructor".to_string(),
                        inputs,
                        outputs: vec![],
                    },
                );
            }
            "fallback" => {
                functions.insert(
                    "fallback".to_string(),
                    FunctionSemantics {
                        signature: "fallback".to_string(),
                        name: "fallback".to_string(),
                        inputs: vec![],
                        outputs: vec![],
                    },
                );
            }
            "function" => {
                let Some(name) = item.name.as_deref() else { continue };
                let (canonical, inputs) = parse_components(&item.inputs);
                let (_, outputs) = parse_components(&item.outputs);
                let signature = selector_hex(format!("{name}{canonical}"));
                functions.insert(
                    signature.clone(),
                    FunctionSemantics { signature, name: name.to_string(), inputs, outputs },
                );
            }
            "event" => {
                let Some(name) = item.name.as_deref() else { continue };
                let (canonical, parameters) = parse_components(&item.inputs);
                let signature = event_topic(format!("{name}{canonical}"));
                events.insert(
                    signature.clone(),
                    EventSemantics {
                        signature,
                        anonymous: item.anonymous.unwrap_or(false),
                        name: name.to_string(),
                        parameters,
                    },
                );
            }
            _ => {}
        }
    }

    (events, functions)
}

/// Builds the canonical type list of a parameter set and its semantics,
/// recursing into tuple components.
fn parse_components(components: &[Component]) -> (String, Vec<ParameterSemantics>) {
    let mut canonical = String::from("(");
    let mut parameters = Vec::with_capacity(components.len());

    for (i, component) in components.iter().enumerate() {
        let type_field = component.type_field.as_str();
        let mut parameter = ParameterSemantics::new(&component.name, type_field);

        if let Some(suffix) = type_field.strip_prefix("tuple") {
            let (sub_canonical, sub_components) = parse_components(&component.components);
            canonical.push_str(&sub_canonical);
            canonical.push_str(suffix);
            parameter.components = sub_components;
        } else {
            canonical.push_str(type_field);
        }

        parameter.dynamic = is_dynamic(type_field, &parameter.components);
        parameter.indexed = component.indexed.unwrap_or(false);

        if i < components.len() - 1 {
            canonical.push(',');
        }
        parameters.push(parameter);
    }

    canonical.push(')');
    (canonical, parameters)
}

/// `string`, `bytes` and `T[]` are dynamic; a tuple is dynamic when any of
/// its components is.
fn is_dynamic(type_field: &str, components: &[ParameterSemantics]) -> bool {
    if type_field == "string" || type_field == "bytes" || type_field.ends_with("[]") {
        true
    } else if type_field == "tuple" {
        components.iter().any(|component| component.dynamic)
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ParsedAbi {
        parse_abi(&serde_json::from_str::<RawAbi>(json).unwrap())
    }

    #[test]
    fn computes_function_selectors() {
        let (_, functions) = parse(
            r#"[{"type":"function","name":"transfer","inputs":[
                {"name":"recipient","type":"address"},{"name":"amount","type":"uint256"}],
                "outputs":[{"name":"","type":"bool"}]}]"#,
        );
        let transfer = &functions["0xa9059cbb"];
        assert_eq!(transfer.name, "transfer");
        assert_eq!(transfer.inputs.len(), 2);
        assert_eq!(transfer.outputs[0].parameter_type, "bool");
    }

    #[test]
    fn computes_event_topics_and_indexed() {
        let (events, _) = parse(
            r#"[{"type":"event","name":"Transfer","anonymous":false,"inputs":[
                {"name":"src","type":"address","indexed":true},
                {"name":"dst","type":"address","indexed":true},
                {"name":"value","type":"uint256","indexed":false}]}]"#,
        );
        let transfer =
            &events["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"];
        assert!(transfer.parameters[0].indexed);
        assert!(!transfer.parameters[2].indexed);
    }

    #[test]
    fn canonical_signature_recurses_into_tuples() {
        let (_, functions) = parse(
            r#"[{"type":"function","name":"swap","inputs":[
                {"name":"order","type":"tuple","components":[
                    {"name":"maker","type":"address"},
                    {"name":"amounts","type":"uint256[]"}]}],
                "outputs":[]}]"#,
        );
        let expected = selector_hex("swap((address,uint256[]))");
        let function = &functions[&expected];
        assert!(function.inputs[0].dynamic, "tuple with dynamic member is dynamic");
        assert_eq!(function.inputs[0].components[1].parameter_type, "uint256[]");
    }

    #[test]
    fn constructor_and_fallback_pseudo_selectors() {
        let (_, functions) = parse(
            r#"[{"type":"constructor","inputs":[{"name":"owner","type":"address"}]},
                {"type":"fallback"}]"#,
        );
        assert!(functions.contains_key("constructor"));
        assert_eq!(functions["fallback"].name, "fallback");
        assert_eq!(functions["constructor"].inputs.len(), 1);
    }

    #[test]
    fn static_fixed_arrays_are_not_dynamic() {
        let (_, functions) = parse(
            r#"[{"type":"function","name":"fill","inputs":[
                {"name":"words","type":"bytes32[4]"}],"outputs":[]}]"#,
        );
        let function = functions.values().next().unwrap();
        assert!(!function.inputs[0].dynamic);
    }
}
