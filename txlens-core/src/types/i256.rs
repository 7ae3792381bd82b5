use ethereum_types::U256;
use serde::{Serialize, Serializer};
use std::fmt;

/// 256-bit signed integer stored as its two's complement representation.
///
/// Decoded `int<K>` parameters are sign-extended from the slot's top bit, so a
/// single word-sized wrapper covers every signed width.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct I256(U256);

impl I256 {
    /// Creates an `I256` from a raw two's complement word.
    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    /// Returns the raw two's complement word.
    pub const fn into_raw(self) -> U256 {
        self.0
    }

    /// `true` when the sign bit (bit 255) is set.
    pub fn is_negative(&self) -> bool {
        self.0.bit(255)
    }

    /// The magnitude of the value as an unsigned word.
    pub fn unsigned_abs(&self) -> U256 {
        if self.is_negative() {
            (!self.0).overflowing_add(U256::one()).0
        } else {
            self.0
        }
    }

    /// Lossy conversion to `f64`, for display arithmetic.
    pub fn to_f64(&self) -> f64 {
        let magnitude = crate::utils::u256_to_f64(self.unsigned_abs());
        if self.is_negative() {
            -magnitude
        } else {
            magnitude
        }
    }
}

impl From<i64> for I256 {
    fn from(value: i64) -> Self {
        if value < 0 {
            Self((!U256::from(value.unsigned_abs())).overflowing_add(U256::one()).0)
        } else {
            Self(U256::from(value as u64))
        }
    }
}

impl fmt::Display for I256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-{}", self.unsigned_abs())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Debug for I256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for I256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extension_round_trip() {
        let minus_one = I256::from(-1i64);
        assert_eq!(minus_one.into_raw(), U256::MAX);
        assert_eq!(minus_one.to_string(), "-1");
        assert_eq!(minus_one.unsigned_abs(), U256::one());
    }

    #[test]
    fn positive_values() {
        let forty_two = I256::from(42i64);
        assert!(!forty_two.is_negative());
        assert_eq!(forty_two.to_string(), "42");
        assert_eq!(forty_two.to_f64(), 42.0);
    }

    #[test]
    fn negative_to_f64() {
        assert_eq!(I256::from(-12_345i64).to_f64(), -12_345.0);
    }
}
