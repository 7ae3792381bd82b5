//! Badge stamping and display formatting of transfers.

use super::{context::get_badge, SemanticDecoder};
use txlens_core::decoded::{DecodedTransactionMetadata, DecodedTransfer, Value};

impl SemanticDecoder {
    pub fn decode_transfers(
        &self,
        mut transfers: Vec<DecodedTransfer>,
        tx_metadata: &DecodedTransactionMetadata,
    ) -> Vec<DecodedTransfer> {
        for transfer in &mut transfers {
            transfer.from_address.badge =
                get_badge(transfer.from_address.address.as_deref(), tx_metadata);
            transfer.to_address.badge =
                get_badge(transfer.to_address.address.as_deref(), tx_metadata);

            if let Value::Float(value) = transfer.value {
                transfer.value = Value::String(format_decimal(value));
            }
        }
        transfers
    }
}

/// Thousands-separated fixed-point rendering, e.g. `1,234.5678`.
pub(crate) fn format_decimal(value: f64) -> String {
    let formatted = format!("{:.4}", value.abs());
    let (integer, fraction) = formatted.split_once('.').unwrap_or((formatted.as_str(), "0000"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{fraction}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_thousands_separators() {
        assert_eq!(format_decimal(0.01), "0.0100");
        assert_eq!(format_decimal(1.0), "1.0000");
        assert_eq!(format_decimal(1234.5678), "1,234.5678");
        assert_eq!(format_decimal(1_000_000.0), "1,000,000.0000");
        assert_eq!(format_decimal(-1234.5), "-1,234.5000");
    }
}
