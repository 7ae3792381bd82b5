//! Function semantics of the Ethereum precompiled contracts (0x01..0x08).

use once_cell::sync::Lazy;
use std::collections::HashMap;
use txlens_core::{
    semantics::{FunctionSemantics, ParameterSemantics},
    types::Address,
};

fn precompile(name: &str, inputs: Vec<ParameterSemantics>, output_type: &str) -> FunctionSemantics {
    FunctionSemantics {
        signature: String::new(),
        name: name.to_string(),
        inputs,
        outputs: vec![ParameterSemantics::new("", output_type)],
    }
}

pub static PRECOMPILES: Lazy<HashMap<u64, FunctionSemantics>> = Lazy::new(|| {
    HashMap::from([
        (
            1,
            precompile(
                "ecrecover",
                vec![
                    ParameterSemantics::new("hash", "bytes32"),
                    ParameterSemantics::new("v", "bytes8"),
                    ParameterSemantics::new("r", "bytes32"),
                    ParameterSemantics::new("s", "bytes32"),
                ],
                "address",
            ),
        ),
        (2, precompile("sha256", vec![ParameterSemantics::new("data", "raw")], "bytes32")),
        (3, precompile("ripemd160", vec![ParameterSemantics::new("data", "raw")], "bytes32")),
        (4, precompile("datacopy", vec![ParameterSemantics::new("data", "raw")], "raw")),
        (
            5,
            precompile(
                "bigModExp",
                vec![
                    ParameterSemantics::new("base", "bytes32"),
                    ParameterSemantics::new("exp", "bytes32"),
                    ParameterSemantics::new("mod", "bytes32"),
                ],
                "bytes32",
            ),
        ),
        (
            6,
            precompile(
                "bn256Add",
                vec![
                    ParameterSemantics::new("ax", "bytes32"),
                    ParameterSemantics::new("ay", "bytes32"),
                    ParameterSemantics::new("bx", "bytes32"),
                    ParameterSemantics::new("by", "bytes32"),
                ],
                "bytes32[2]",
            ),
        ),
        (
            7,
            precompile(
                "bn256ScalarMul",
                vec![
                    ParameterSemantics::new("x", "bytes32"),
                    ParameterSemantics::new("y", "bytes32"),
                    ParameterSemantics::new("scalar", "bytes32"),
                ],
                "bytes32[2]",
            ),
        ),
        (8, precompile("bn256Pairing", vec![ParameterSemantics::new("input", "raw")], "bytes32")),
    ])
});

/// The precompile semantics for an address, if it is one of 0x01..0x08.
pub fn precompiled(address: &Address) -> Option<&'static FunctionSemantics> {
    let bytes = address.as_bytes();
    if bytes[..19].iter().any(|byte| *byte != 0) {
        return None
    }
    PRECOMPILES.get(&(bytes[19] as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_precompiled_addresses() {
        let mut bytes = [0u8; 20];
        bytes[19] = 1;
        assert_eq!(precompiled(&Address::from_slice(&bytes)).unwrap().name, "ecrecover");
        bytes[19] = 8;
        assert_eq!(precompiled(&Address::from_slice(&bytes)).unwrap().name, "bn256Pairing");
        bytes[19] = 9;
        assert!(precompiled(&Address::from_slice(&bytes)).is_none());
        assert!(precompiled(&Address::from_slice(&[0x11; 20])).is_none());
    }

    #[test]
    fn raw_typed_inputs_skip_selector_stripping() {
        assert_eq!(PRECOMPILES[&2].inputs[0].parameter_type, "raw");
    }
}
