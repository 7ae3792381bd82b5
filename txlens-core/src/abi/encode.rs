//! ABI v2 encoding, the mirror of the decoder.
//!
//! Used by the node client to build `eth_call` payloads for token metadata
//! and proxy probes, and by tests to assert decode round-trips.

use super::error::AbiError;
use crate::{
    decoded::Value,
    semantics::ParameterSemantics,
    utils::strip_0x,
};

type Result<T, E = AbiError> = std::result::Result<T, E>;

/// Encodes `values` against `parameters` into hex (without `0x`).
pub fn encode_struct(parameters: &[ParameterSemantics], values: &[Value]) -> Result<String> {
    if parameters.len() != values.len() {
        return Err(AbiError::TypeMismatch("argument count".to_string()))
    }

    let head_slots: usize = parameters.iter().map(head_size).sum();

    let mut head = String::with_capacity(head_slots * 64);
    let mut tail = String::new();

    for (parameter, value) in parameters.iter().zip(values) {
        if is_dynamic(parameter) {
            let offset = (head_slots + tail.len() / 64) * 32;
            head.push_str(&format!("{offset:064x}"));
            tail.push_str(&encode_tail(parameter, value)?);
        } else {
            head.push_str(&encode_static(parameter, value)?);
        }
    }

    head.push_str(&tail);
    Ok(head)
}

/// Encodes a full call payload: selector plus encoded arguments.
pub fn encode_call(
    selector: &str,
    parameters: &[ParameterSemantics],
    values: &[Value],
) -> Result<String> {
    Ok(format!("0x{}{}", strip_0x(selector), encode_struct(parameters, values)?))
}

fn is_dynamic(parameter: &ParameterSemantics) -> bool {
    let ty = parameter.parameter_type.as_str();
    parameter.dynamic ||
        ty == "bytes" ||
        ty == "string" ||
        ty.ends_with("[]") ||
        (ty == "tuple" && parameter.components.iter().any(is_dynamic))
}

/// Head slots occupied by a parameter: dynamic values use one offset slot.
fn head_size(parameter: &ParameterSemantics) -> usize {
    if is_dynamic(parameter) {
        return 1
    }
    let ty = parameter.parameter_type.as_str();
    if ty == "tuple" {
        parameter.components.iter().map(head_size).sum()
    } else if let Some(size) = fixed_array_size(ty) {
        size
    } else {
        1
    }
}

fn fixed_array_size(ty: &str) -> Option<usize> {
    ty.strip_suffix(']')?.rsplit_once('[')?.1.parse().ok()
}

fn encode_static(parameter: &ParameterSemantics, value: &Value) -> Result<String> {
    let ty = parameter.parameter_type.as_str();

    if ty == "tuple" {
        let components = match value {
            Value::Tuple(arguments) => arguments.iter().map(|a| a.value.clone()).collect::<Vec<_>>(),
            Value::Array(values) => values.clone(),
            _ => return Err(AbiError::TypeMismatch(ty.to_string())),
        };
        return encode_struct(&parameter.components, &components)
    }

    if fixed_array_size(ty).is_some() {
        let element_type = ty.split('[').next().unwrap_or_default();
        let element = ParameterSemantics::new("", element_type);
        let Value::Array(values) = value else { return Err(AbiError::TypeMismatch(ty.to_string())) };
        let mut encoded = String::new();
        for value in values {
            encoded.push_str(&encode_static(&element, value)?);
        }
        return Ok(encoded)
    }

    encode_word(ty, value)
}

/// Encodes one primitive value into a 32-byte word.
fn encode_word(ty: &str, value: &Value) -> Result<String> {
    match ty {
        "address" => {
            let address = value
                .as_address_string()
                .ok_or_else(|| AbiError::TypeMismatch(ty.to_string()))?;
            Ok(format!("{:0>64}", strip_0x(&address)))
        }
        "bool" => match value {
            Value::Bool(b) => Ok(format!("{:064x}", *b as u8)),
            _ => Err(AbiError::TypeMismatch(ty.to_string())),
        },
        _ if ty.starts_with("uint") => {
            let number = value.as_u256().ok_or_else(|| AbiError::TypeMismatch(ty.to_string()))?;
            Ok(format!("{number:064x}"))
        }
        _ if ty.starts_with("int") => match value {
            Value::Int(number) => Ok(format!("{:064x}", number.into_raw())),
            _ => {
                let number =
                    value.as_u256().ok_or_else(|| AbiError::TypeMismatch(ty.to_string()))?;
                Ok(format!("{number:064x}"))
            }
        },
        _ if ty.starts_with("bytes") => match value {
            Value::Hex(raw) => Ok(format!("{:0<64}", strip_0x(raw))),
            _ => Err(AbiError::TypeMismatch(ty.to_string())),
        },
        other => Err(AbiError::UnsupportedType(other.to_string())),
    }
}

fn encode_tail(parameter: &ParameterSemantics, value: &Value) -> Result<String> {
    let ty = parameter.parameter_type.as_str();

    if ty == "bytes" || ty == "string" {
        let bytes = match (ty, value) {
            ("string", Value::String(text)) => text.as_bytes().to_vec(),
            (_, Value::Hex(raw)) => hex::decode(strip_0x(raw))?,
            (_, Value::String(text)) => text.as_bytes().to_vec(),
            _ => return Err(AbiError::TypeMismatch(ty.to_string())),
        };
        let mut encoded = format!("{:064x}", bytes.len());
        encoded.push_str(&hex::encode(&bytes));
        let padding = (64 - encoded.len() % 64) % 64;
        encoded.push_str(&"0".repeat(padding));
        return Ok(encoded)
    }

    if let Some(element_type) = ty.strip_suffix("[]") {
        let Value::Array(values) = value else { return Err(AbiError::TypeMismatch(ty.to_string())) };
        let element = ParameterSemantics::new("", element_type);
        let mut encoded = format!("{:064x}", values.len());
        if element_type == "bytes" || element_type == "string" {
            let mut heads = String::new();
            let mut tails = String::new();
            for value in values {
                let offset = (values.len() + tails.len() / 64) * 32;
                heads.push_str(&format!("{offset:064x}"));
                tails.push_str(&encode_tail(&element, value)?);
            }
            encoded.push_str(&heads);
            encoded.push_str(&tails);
        } else {
            for value in values {
                encoded.push_str(&encode_static(&element, value)?);
            }
        }
        return Ok(encoded)
    }

    if ty == "tuple" {
        let components = match value {
            Value::Tuple(arguments) => arguments.iter().map(|a| a.value.clone()).collect::<Vec<_>>(),
            Value::Array(values) => values.clone(),
            _ => return Err(AbiError::TypeMismatch(ty.to_string())),
        };
        return encode_struct(&parameter.components, &components)
    }

    Err(AbiError::UnsupportedType(ty.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{abi::codec::decode_struct, decoded::Argument, types::{I256, U256}};

    fn parameter(name: &str, ty: &str) -> ParameterSemantics {
        let mut parameter = ParameterSemantics::new(name, ty);
        parameter.dynamic = matches!(ty, "bytes" | "string") || ty.ends_with("[]");
        parameter
    }

    #[test]
    fn encodes_no_arguments() {
        assert_eq!(encode_call("0x18160ddd", &[], &[]).unwrap(), "0x18160ddd");
    }

    #[test]
    fn static_round_trip() {
        let parameters = vec![
            parameter("to", "address"),
            parameter("amount", "uint256"),
            parameter("flag", "bool"),
            parameter("delta", "int256"),
        ];
        let values = vec![
            Value::Hex(format!("0x{}", "ab".repeat(20))),
            Value::Uint(U256::from(1_000_000u64)),
            Value::Bool(true),
            Value::Int(I256::from(-2i64)),
        ];
        let encoded = encode_struct(&parameters, &values).unwrap();
        assert_eq!(encoded.len(), 4 * 64);

        let (decoded, slots) = decode_struct(&encoded, &parameters);
        assert_eq!(slots, 4);
        let decoded_values: Vec<Value> =
            decoded.into_iter().map(|argument| argument.value).collect();
        assert_eq!(decoded_values, values);
    }

    #[test]
    fn string_round_trip() {
        let parameters = vec![parameter("note", "string"), parameter("n", "uint8")];
        let values = vec![Value::String("hello".to_string()), Value::Uint(U256::from(7u64))];
        let encoded = encode_struct(&parameters, &values).unwrap();
        let (decoded, _) = decode_struct(&encoded, &parameters);
        assert_eq!(decoded[0].value, values[0]);
        assert_eq!(decoded[1].value, values[1]);
    }

    #[test]
    fn dynamic_array_round_trip() {
        let parameters = vec![parameter("ids", "uint256[]")];
        let values =
            vec![Value::Array(vec![Value::Uint(U256::from(1u64)), Value::Uint(U256::from(2u64))])];
        let encoded = encode_struct(&parameters, &values).unwrap();
        let (decoded, _) = decode_struct(&encoded, &parameters);
        assert_eq!(decoded[0].value, values[0]);
    }

    #[test]
    fn static_tuple_round_trip() {
        let tuple = ParameterSemantics::new("pair", "tuple").with_components(vec![
            parameter("a", "uint256"),
            parameter("b", "bool"),
        ]);
        let values = vec![Value::Tuple(vec![
            Argument::new("a", "uint256", Value::Uint(U256::from(5u64))),
            Argument::new("b", "bool", Value::Bool(false)),
        ])];
        let encoded = encode_struct(std::slice::from_ref(&tuple), &values).unwrap();
        let (decoded, slots) = decode_struct(&encoded, std::slice::from_ref(&tuple));
        assert_eq!(slots, 2);
        assert_eq!(decoded[0].value, values[0]);
    }

    #[test]
    fn rejects_mismatched_values() {
        let parameters = vec![parameter("amount", "uint256")];
        assert!(encode_struct(&parameters, &[Value::Bool(true)]).is_err());
        assert!(encode_struct(&parameters, &[]).is_err());
    }
}
