//! Badge stamping and display formatting of balance sheets.

use super::{context::get_badge, transfers::format_decimal, SemanticDecoder};
use txlens_core::decoded::{DecodedBalance, DecodedTransactionMetadata, Value};

impl SemanticDecoder {
    pub fn decode_balances(
        &self,
        mut balances: Vec<DecodedBalance>,
        tx_metadata: &DecodedTransactionMetadata,
    ) -> Vec<DecodedBalance> {
        for balance in &mut balances {
            balance.holder.badge = get_badge(balance.holder.address.as_deref(), tx_metadata);

            for token in &mut balance.tokens {
                if let Value::Float(value) = token.balance {
                    token.balance = Value::String(format_decimal(value));
                }
            }
        }
        balances
    }
}
