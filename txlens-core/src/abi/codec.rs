//! ABI v2 wire-format decoding.
//!
//! The decoder operates on hex strings and never fails outright: malformed
//! payloads degrade into `unknown`-typed raw arguments so that one bad
//! parameter cannot sink a whole transaction.

use crate::{
    decoded::{Argument, Value},
    semantics::{EventSemantics, FunctionSemantics, ParameterSemantics},
    types::{timestamp_from_secs, I256},
    utils::{parse_u256, strip_0x},
};
use tracing::warn;

/// Selector of the well-known `Error(string)` revert payload.
pub const ERROR_SELECTOR: &str = "0x08c379a0";

/// Clamped slicing; hex payloads are ASCII so byte indexing is safe.
fn chunk(data: &str, start: usize, end: usize) -> &str {
    let len = data.len();
    let start = start.min(len);
    let end = end.min(len).max(start);
    &data[start..end]
}

/// The 32-byte head slot at `slot`, possibly truncated on short data.
fn slot_at(data: &str, slot: usize) -> &str {
    chunk(data, slot * 64, (slot + 1) * 64)
}

/// Parses a head slot as a small unsigned quantity (offset or length).
/// Out-of-range words are rejected rather than truncated.
fn parse_quantity(raw: &str) -> Option<usize> {
    parse_u256(raw)
        .filter(|value| *value <= crate::types::U256::from(u32::MAX))
        .map(|value| value.as_u64() as usize)
}

/// Reads a head slot as a tail offset and returns the tail, empty when the
/// offset is unreadable or out of range.
fn tail_at<'a>(data: &'a str, raw_offset: &str) -> &'a str {
    let offset = parse_quantity(raw_offset).map(|offset| offset * 2).unwrap_or(usize::MAX);
    chunk(data, offset, data.len())
}

/// Decodes one static 32-byte slot according to the expected type.
pub fn decode_static_argument(raw_value: &str, argument_type: &str) -> Value {
    let raw = strip_0x(raw_value);
    if raw.is_empty() {
        return Value::Hex("0x".to_string())
    }

    match argument_type {
        "address" => {
            if raw.len() >= 40 {
                Value::Hex(format!("0x{}", raw[raw.len() - 40..].to_ascii_lowercase()))
            } else {
                Value::Hex(format!("0x{raw}"))
            }
        }
        "bool" => match parse_u256(raw) {
            Some(value) => Value::Bool(!value.is_zero()),
            None => Value::Hex(format!("0x{raw}")),
        },
        "bytes" => Value::Hex(format!("0x{raw}")),
        "byte" => Value::Hex(format!("0x{}", chunk(raw, 0, 2))),
        "string" | "string32" => match hex::decode(raw) {
            Ok(bytes) => Value::String(String::from_utf8_lossy(&bytes).replace('\0', "")),
            Err(_) => Value::Hex(format!("0x{raw}")),
        },
        "timestamp" => match parse_u256(raw) {
            Some(secs) if secs <= u64::MAX.into() => Value::String(
                timestamp_from_secs(secs.as_u64()).format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            _ => Value::Hex(format!("0x{raw}")),
        },
        "hashmap" => Value::String("[...]".to_string()),
        "tuple" => Value::String("(...)".to_string()),
        "tuple[]" => Value::String("(...)[]".to_string()),
        _ if argument_type.starts_with("uint") => match parse_u256(raw) {
            Some(value) => Value::Uint(value),
            None => Value::Hex(format!("0x{raw}")),
        },
        _ if argument_type.starts_with("int") => match parse_u256(raw) {
            Some(value) => Value::Int(I256::from_raw(value)),
            None => Value::Hex(format!("0x{raw}")),
        },
        _ if argument_type.starts_with("bytes") => {
            let size: usize = argument_type[5..].parse().unwrap_or(32);
            Value::Hex(format!("0x{}", chunk(raw, 0, size * 2)))
        }
        _ => Value::Hex(format!("0x{raw}")),
    }
}

/// Decodes a length-prefixed dynamic argument (`bytes` or `string`).
fn decode_dynamic_argument(argument_bytes: &str, argument_type: &str) -> Value {
    if argument_bytes.is_empty() {
        return if argument_type == "string" {
            Value::String(String::new())
        } else {
            Value::Hex("0x".to_string())
        }
    }

    let length = parse_quantity(slot_at(argument_bytes, 0)).map(|length| length * 2).unwrap_or(0);
    let value = chunk(argument_bytes, 64, 64 + length);

    if argument_type == "string" {
        match hex::decode(value) {
            Ok(bytes) => Value::String(String::from_utf8_lossy(&bytes).replace('\0', "")),
            Err(_) => Value::Hex(format!("0x{value}")),
        }
    } else {
        Value::Hex(format!("0x{value}"))
    }
}

/// Decodes a length-prefixed array of `array_type` elements.
fn decode_dynamic_array(data: &str, array_type: &str) -> Value {
    let count = parse_quantity(slot_at(data, 0)).unwrap_or(0);
    let sub_data = chunk(data, 64, data.len());

    let mut decoded = Vec::with_capacity(count.min(1024));
    for i in 0..count {
        if i * 64 >= sub_data.len() {
            break
        }
        let value = if array_type == "bytes" || array_type == "string" {
            decode_dynamic_argument(tail_at(sub_data, slot_at(sub_data, i)), array_type)
        } else {
            decode_static_argument(slot_at(sub_data, i), array_type)
        };
        decoded.push(value);
    }

    Value::Array(decoded)
}

/// Decodes a tuple value or a dynamic array of tuples.
fn decode_tuple(data: &str, components: &[ParameterSemantics], is_list: bool) -> (Value, usize) {
    if is_list {
        let count = parse_quantity(slot_at(data, 0)).unwrap_or(0);
        let data = chunk(data, 64, data.len());
        let inner_offsets = components.iter().any(|component| component.dynamic);

        let mut tuples = Vec::with_capacity(count.min(1024));
        let mut slots = 0;
        let mut cursor = 0;
        for i in 0..count {
            let sub_data = if inner_offsets {
                tail_at(data, slot_at(data, i))
            } else {
                chunk(data, cursor * 64, data.len())
            };
            if sub_data.is_empty() {
                break
            }
            let (decoded, consumed) = decode_struct(sub_data, components);
            tuples.push(decoded);
            slots += consumed;
            cursor += consumed;
        }
        (Value::TupleArray(tuples), slots)
    } else {
        let (decoded, slots) = decode_struct(data, components);
        (Value::Tuple(decoded), slots)
    }
}

/// Decodes an ABI-encoded struct: a flat sequence of head slots with
/// out-of-band tails for dynamic members. Returns the decoded arguments and
/// the number of head slots consumed.
pub fn decode_struct(data: &str, arguments_abi: &[ParameterSemantics]) -> (Vec<Argument>, usize) {
    let count =
        if arguments_abi.is_empty() { (data.len() + 63) / 64 } else { arguments_abi.len() };

    let mut arguments = Vec::with_capacity(count);
    let mut slot = 0;

    for i in 0..count {
        let raw_value = slot_at(data, slot);

        let (name, argument_type, value) = match arguments_abi.get(i) {
            Some(parameter) => {
                let argument_type = parameter.parameter_type.as_str();

                let value = if let Some(suffix) = argument_type.strip_prefix("tuple") {
                    let has_offset = parameter.dynamic ||
                        parameter.components.iter().any(|component| component.dynamic);
                    let sub_data = if has_offset {
                        tail_at(data, raw_value)
                    } else {
                        chunk(data, slot * 64, data.len())
                    };
                    let (value, slots) =
                        decode_tuple(sub_data, &parameter.components, suffix == "[]");
                    slot += if has_offset { 1 } else { slots };
                    value
                } else if argument_type == "bytes" || argument_type == "string" {
                    let value = decode_dynamic_argument(tail_at(data, raw_value), argument_type);
                    slot += 1;
                    value
                } else if argument_type.ends_with("[]") {
                    let array_type = argument_type.split('[').next().unwrap_or_default();
                    let value = decode_dynamic_array(tail_at(data, raw_value), array_type);
                    slot += 1;
                    value
                } else if argument_type.ends_with(']') {
                    let array_type = argument_type.split('[').next().unwrap_or_default();
                    let array_size: usize = argument_type
                        .trim_end_matches(']')
                        .rsplit('[')
                        .next()
                        .and_then(|size| size.parse().ok())
                        .unwrap_or(0);
                    let mut values = Vec::with_capacity(array_size);
                    for _ in 0..array_size {
                        values.push(decode_static_argument(slot_at(data, slot), array_type));
                        slot += 1;
                    }
                    Value::Array(values)
                } else {
                    let value = decode_static_argument(raw_value, argument_type);
                    slot += 1;
                    value
                };

                (parameter.name.clone(), argument_type.to_string(), value)
            }
            None => {
                slot += 1;
                (format!("arg_{}", i + 1), "unknown".to_string(), Value::Hex(format!("0x{raw_value}")))
            }
        };

        // skip padding artifacts of unknown payloads
        if argument_type != "unknown" || value != Value::Hex("0x".to_string()) {
            arguments.push(Argument { name, arg_type: argument_type, value });
        }
    }

    (arguments, slot)
}

/// Decodes the parameters of a log entry, merging indexed (topic) and
/// non-indexed (data) parameters back into ABI declaration order.
pub fn decode_event_parameters(
    log_data: &str,
    topics: &[String],
    abi: Option<&EventSemantics>,
    anonymous: bool,
) -> Vec<Argument> {
    // for anonymous events the first topic is already a parameter
    let mut amended_topics: Vec<Option<&str>> = Vec::with_capacity(topics.len() + 1);
    if anonymous {
        amended_topics.push(None);
    }
    amended_topics.extend(topics.iter().map(|topic| Some(topic.as_str())));

    let data = strip_0x(log_data);
    let parameters_abi = abi.map(|abi| abi.parameters.as_slice()).unwrap_or_default();

    if !parameters_abi.is_empty() {
        let mut topic_parameters = Vec::new();
        for (i, parameter) in parameters_abi.iter().filter(|parameter| parameter.indexed).enumerate()
        {
            // topic parameters can only be static
            match amended_topics.get(i + 1).copied().flatten() {
                Some(topic) => {
                    let (argument_type, value) = if parameter.parameter_type.is_empty() {
                        ("unknown".to_string(), Value::Hex(topic.to_string()))
                    } else {
                        (
                            parameter.parameter_type.clone(),
                            decode_static_argument(topic, &parameter.parameter_type),
                        )
                    };
                    topic_parameters.push(Argument {
                        name: parameter.name.clone(),
                        arg_type: argument_type,
                        value,
                    });
                }
                None => {
                    warn!(target: "abi", "topics length mismatch");
                    return vec![]
                }
            }
        }

        let data_parameters: Vec<Argument> = if data.is_empty() {
            vec![]
        } else {
            let not_indexed: Vec<ParameterSemantics> = parameters_abi
                .iter()
                .filter(|parameter| !parameter.indexed)
                .cloned()
                .collect();
            decode_struct(data, &not_indexed).0
        };

        // store parameters in original ABI order
        let mut topic_iter = topic_parameters.into_iter();
        let mut data_iter = data_parameters.into_iter();
        let mut event_parameters = Vec::with_capacity(parameters_abi.len());
        for parameter in parameters_abi {
            let next = if parameter.indexed { topic_iter.next() } else { data_iter.next() };
            if let Some(argument) = next {
                event_parameters.push(argument);
            }
        }
        event_parameters
    } else {
        let mut event_parameters = Vec::new();
        for topic in amended_topics.iter().skip(1) {
            let Some(topic) = topic else { break };
            event_parameters.push(Argument {
                name: String::new(),
                arg_type: "unknown".to_string(),
                value: Value::Hex(topic.to_string()),
            });
        }
        for i in 0..data.len() / 64 {
            event_parameters.push(Argument {
                name: String::new(),
                arg_type: "unknown".to_string(),
                value: Value::Hex(format!("0x{}", slot_at(data, i))),
            });
        }
        event_parameters
    }
}

/// Decodes call input and output against a function ABI.
///
/// `strip_selector` is disabled for precompile invocations whose payload has
/// no leading selector.
pub fn decode_function_parameters(
    call_data: &str,
    return_value: &str,
    abi: Option<&FunctionSemantics>,
    status: bool,
    strip_selector: bool,
) -> (Vec<Argument>, Vec<Argument>) {
    let stripped_input = if strip_selector && call_data.len() >= 10 {
        &call_data[10..]
    } else {
        strip_0x(call_data)
    };

    let input_parameters = match abi {
        Some(abi) => {
            if abi.inputs.len() == 1 && abi.inputs[0].parameter_type == "raw" {
                vec![Argument {
                    name: abi.inputs[0].name.clone(),
                    arg_type: "bytes".to_string(),
                    value: Value::Hex(call_data.to_string()),
                }]
            } else {
                decode_struct(stripped_input, &abi.inputs).0
            }
        }
        None if !stripped_input.is_empty() => vec![Argument {
            name: "call_data".to_string(),
            arg_type: "bytes".to_string(),
            value: Value::Hex(format!("0x{stripped_input}")),
        }],
        None => vec![],
    };

    let output_parameters = if !status && return_value.starts_with(ERROR_SELECTOR) {
        let error_abi = ParameterSemantics::new("Error", "string").dynamic();
        decode_struct(&return_value[10..], std::slice::from_ref(&error_abi)).0
    } else {
        match abi {
            Some(abi) => {
                if !abi.outputs.is_empty() && status && return_value == "0x" {
                    warn!(target: "abi", "missing output data");
                    vec![]
                } else if return_value != "0x" && !return_value.is_empty() {
                    if abi.outputs.len() == 1 && abi.outputs[0].parameter_type == "raw" {
                        vec![Argument {
                            name: abi.outputs[0].name.clone(),
                            arg_type: "bytes".to_string(),
                            value: Value::Hex(return_value.to_string()),
                        }]
                    } else {
                        decode_struct(strip_0x(return_value), &abi.outputs).0
                    }
                } else {
                    vec![]
                }
            }
            None if return_value != "0x" && !return_value.is_empty() => vec![Argument {
                name: "output_data".to_string(),
                arg_type: "bytes".to_string(),
                value: Value::Hex(return_value.to_string()),
            }],
            None => vec![],
        }
    };

    (input_parameters, output_parameters)
}

/// Interprets plain call data sent to an EOA as a UTF-8 graffiti message.
pub fn decode_graffiti_parameters(input_data: &str) -> Vec<Argument> {
    if input_data.len() <= 2 {
        return vec![]
    }
    hex::decode(strip_0x(input_data))
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .map(|message| {
            vec![Argument {
                name: "message".to_string(),
                arg_type: "string".to_string(),
                value: Value::String(message),
            }]
        })
        .unwrap_or_default()
}
