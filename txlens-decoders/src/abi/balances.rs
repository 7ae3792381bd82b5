//! Aggregation of transfers into per-holder balance deltas.

use super::AbiDecoder;
use crate::abi::transfers::ZERO_ADDRESS;
use std::collections::HashMap;
use txlens_core::decoded::{
    AddressInfo, BalanceEntry, DecodedBalance, DecodedTransfer, Value,
};

impl AbiDecoder {
    /// Builds the signed balance sheet: every transfer debits its sender and
    /// credits its receiver; the zero address mints and burns without a
    /// balance of its own. Zero net positions are dropped.
    pub fn decode_balances(&self, transfers: &[DecodedTransfer]) -> Vec<DecodedBalance> {
        decode_balances(transfers)
    }
}

pub(crate) fn decode_balances(transfers: &[DecodedTransfer]) -> Vec<DecodedBalance> {
    // holders in first-seen order, so output is deterministic
    let mut holder_order: Vec<String> = vec![];
    let mut holder_names: HashMap<String, String> = HashMap::new();
    let mut token_order: Vec<Option<String>> = vec![];
    let mut token_info: HashMap<Option<String>, (Option<String>, String)> = HashMap::new();

    let mut note_holder =
        |order: &mut Vec<String>, names: &mut HashMap<String, String>, info: &AddressInfo| {
            let Some(address) = &info.address else { return };
            if address == ZERO_ADDRESS {
                return
            }
            if !names.contains_key(address) {
                order.push(address.clone());
                names.insert(address.clone(), info.name.clone());
            }
        };

    for transfer in transfers {
        note_holder(&mut holder_order, &mut holder_names, &transfer.from_address);
        note_holder(&mut holder_order, &mut holder_names, &transfer.to_address);
        if !token_info.contains_key(&transfer.token_address) {
            token_order.push(transfer.token_address.clone());
            token_info.insert(
                transfer.token_address.clone(),
                (transfer.token_standard.clone(), transfer.token_symbol.clone()),
            );
        }
    }

    let mut sheet: HashMap<(String, Option<String>), f64> = HashMap::new();
    for transfer in transfers {
        let value = match transfer.value {
            Value::Float(value) => value,
            _ => continue,
        };
        if let Some(from) = &transfer.from_address.address {
            if from != ZERO_ADDRESS {
                *sheet.entry((from.clone(), transfer.token_address.clone())).or_default() -= value;
            }
        }
        if let Some(to) = &transfer.to_address.address {
            if to != ZERO_ADDRESS {
                *sheet.entry((to.clone(), transfer.token_address.clone())).or_default() += value;
            }
        }
    }

    let mut balances = vec![];
    for holder in holder_order {
        let mut tokens = vec![];
        for token_address in &token_order {
            let Some(balance) =
                sheet.get(&(holder.clone(), token_address.clone())).copied()
            else {
                continue
            };
            if balance == 0.0 {
                continue
            }
            let (token_standard, token_symbol) = token_info[token_address].clone();
            tokens.push(BalanceEntry {
                token_address: token_address.clone(),
                token_symbol,
                token_standard,
                balance: Value::Float(balance),
            });
        }
        if !tokens.is_empty() {
            let name = holder_names[&holder].clone();
            balances.push(DecodedBalance { holder: AddressInfo::new(holder, name), tokens });
        }
    }

    balances
}
