//! Hashing and hex helpers shared by the codec and the providers.

mod hash;
pub use hash::{event_topic, id, keccak256, selector_hex};

use ethereum_types::{Address, U256};

/// 1 Ether = 1e18 Wei == 0x0de0b6b3a7640000 Wei
pub const WEI_IN_ETHER: U256 = U256([0x0de0b6b3a7640000, 0x0, 0x0, 0x0]);

/// Strips an optional `0x` prefix from a hex string.
pub fn strip_0x(value: &str) -> &str {
    value.strip_prefix("0x").unwrap_or(value)
}

/// Parses a 20-byte hex address (with or without `0x`).
pub fn parse_address(value: &str) -> Option<Address> {
    let hex = strip_0x(value);
    if hex.len() != 40 {
        return None
    }
    hex::decode(hex).ok().map(|bytes| Address::from_slice(&bytes))
}

/// Parses a hex string (with or without `0x`) into a [`U256`].
///
/// Strings longer than one word keep their last 32 bytes, mirroring how
/// topics and slots are read. Returns `None` for non-hex input.
pub fn parse_u256(value: &str) -> Option<U256> {
    let hex = strip_0x(value);
    if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None
    }
    let hex = if hex.len() > 64 { &hex[hex.len() - 64..] } else { hex };
    let padded = if hex.len() % 2 == 1 { format!("0{hex}") } else { hex.to_string() };
    let bytes = hex::decode(padded).ok()?;
    Some(U256::from_big_endian(&bytes))
}

/// Lossy conversion of a [`U256`] into an `f64`.
///
/// Token amounts routinely exceed `u128`, and the decoded output is a
/// human-readable report, so the usual float caveats apply and are accepted.
pub fn u256_to_f64(value: U256) -> f64 {
    let limbs = value.0;
    let mut result = 0f64;
    for (i, limb) in limbs.iter().enumerate() {
        result += (*limb as f64) * 2f64.powi(64 * i as i32);
    }
    result
}

/// Divides `amount` by `10^decimals`, the display convention for token values.
pub fn format_units(amount: U256, decimals: u32) -> f64 {
    u256_to_f64(amount) / 10f64.powi(decimals as i32)
}

/// Converts `wei` into ether.
pub fn format_ether(amount: U256) -> f64 {
    format_units(amount, 18)
}
