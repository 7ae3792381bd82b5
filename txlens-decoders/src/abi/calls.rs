//! ABI decoding of the call tree.

use super::AbiDecoder;
use crate::{error::DecodeError, proxies::ProxyMap};
use futures_util::future::BoxFuture;
use txlens_core::{
    abi::{decode_function_parameters, decode_graffiti_parameters},
    decoded::{AddressInfo, DecodedCall},
    semantics::TokenStandard,
    types::{address_to_hex, BlockMetadata, Call, CallType, TransactionMetadata},
    utils::format_ether,
};
use txlens_semantics::{
    precompiled,
    standards::{erc20::ERC20_FUNCTIONS, erc721::ERC721_FUNCTIONS},
};

/// Untrusted call trees get a hard depth ceiling.
pub(crate) const RECURSION_LIMIT: usize = 2000;

impl AbiDecoder {
    /// Decodes the whole call tree. The delegatecall pruning pass is left to
    /// the orchestrator.
    pub async fn decode_calls(
        &self,
        root_call: &Call,
        block: &BlockMetadata,
        transaction: &TransactionMetadata,
        proxies: &ProxyMap,
        chain_id: &str,
    ) -> Result<DecodedCall, DecodeError> {
        self.decode_tree(root_call, block, transaction, String::new(), 0, true, proxies, chain_id, 0)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_tree<'a>(
        &'a self,
        call: &'a Call,
        block: &'a BlockMetadata,
        transaction: &'a TransactionMetadata,
        call_id: String,
        indent: u32,
        status: bool,
        proxies: &'a ProxyMap,
        chain_id: &'a str,
        depth: usize,
    ) -> BoxFuture<'a, Result<DecodedCall, DecodeError>> {
        Box::pin(async move {
            if depth > RECURSION_LIMIT {
                return Err(DecodeError::RecursionLimit("call decoding"))
            }

            let mut decoded = self
                .decode_call(call, block, transaction, call_id, indent, status, proxies, chain_id)
                .await;

            for (i, sub_call) in call.subcalls.iter().enumerate() {
                let child = self
                    .decode_tree(
                        sub_call,
                        block,
                        transaction,
                        sub_call_id(&decoded.call_id, i),
                        indent + 1,
                        decoded.status,
                        proxies,
                        chain_id,
                        depth + 1,
                    )
                    .await?;
                decoded.subcalls.push(child);
            }

            Ok(decoded)
        })
    }

    /// Decodes a single call frame: resolves the function ABI through the
    /// repository, proxies, standards and the guessing path, then decodes
    /// inputs and outputs.
    #[allow(clippy::too_many_arguments)]
    async fn decode_call(
        &self,
        call: &Call,
        block: &BlockMetadata,
        transaction: &TransactionMetadata,
        call_id: String,
        indent: u32,
        status: bool,
        proxies: &ProxyMap,
        chain_id: &str,
    ) -> DecodedCall {
        let mut guessed = false;
        let mut function_signature =
            call.function_signature().map(str::to_string).unwrap_or_default();

        let from_name = self
            .repository
            .get_address_label(chain_id, Some(call.from_address), Some(proxies))
            .await;
        let to_name =
            self.repository.get_address_label(chain_id, call.to_address, Some(proxies)).await;

        let mut error = call.error.clone();
        let mut function_name;
        let mut function_input = vec![];
        let mut function_output = vec![];

        let is_contract = match call.to_address {
            Some(to_address) => self.repository.check_is_contract(chain_id, to_address).await,
            None => false,
        };

        if call.call_type == CallType::SelfDestruct {
            function_name = call.call_type.to_string();
        } else if matches!(call.call_type, CallType::Create | CallType::Create2) {
            // constructor arguments live in the trailing creation bytecode
            function_name = "new".to_string();
        } else if let Some(to_address) = call.to_address.filter(|_| is_contract) {
            let standard = self.repository.get_standard(chain_id, to_address).await;

            let mut function_abi = self
                .repository
                .get_function_abi(chain_id, to_address, &function_signature)
                .await;

            if function_abi.is_none() {
                if let Some(proxy) = proxies.get(&to_address) {
                    // try to find the selector in delegate-called contracts
                    function_abi = proxy
                        .semantics
                        .iter()
                        .find_map(|delegate| {
                            delegate.contract.functions.get(&function_signature).cloned()
                        });
                }
            }

            if function_abi.is_none() {
                function_abi = match standard {
                    Some(TokenStandard::Erc20) => ERC20_FUNCTIONS.get(&function_signature).cloned(),
                    Some(TokenStandard::Erc721) => {
                        ERC721_FUNCTIONS.get(&function_signature).cloned()
                    }
                    _ => None,
                };
            }

            function_name = function_abi
                .as_ref()
                .map(|abi| abi.name.clone())
                .unwrap_or_else(|| function_signature.clone());

            let (inputs, outputs) = decode_function_parameters(
                &call.call_data,
                &call.return_value,
                function_abi.as_ref(),
                call.status,
                true,
            );
            function_input = inputs;
            function_output = outputs;

            if function_name.starts_with("0x") && function_signature.len() > 2 {
                // candidates in order of preference; the first that fits the
                // payload wins
                for (candidate_guessed, candidate) in
                    self.repository.guess_function(&function_signature).await
                {
                    let (inputs, outputs) = decode_function_parameters(
                        &call.call_data,
                        &call.return_value,
                        Some(&candidate),
                        call.status,
                        true,
                    );
                    if !decodes_cleanly(&inputs) {
                        continue
                    }
                    if candidate_guessed {
                        self.repository.persist_guessed_function(&candidate).await;
                    }
                    guessed = candidate_guessed;
                    function_name = candidate.name.clone();
                    function_input = inputs;
                    function_output = outputs;
                    break
                }
            }

            if !call.status && function_output.first().map_or(false, |output| output.name == "Error")
            {
                let reason = function_output.remove(0);
                error = Some(format!("Failed with \"{}\"", reason.value));
            }
        } else if let Some(precompile) =
            call.to_address.as_ref().and_then(precompiled)
        {
            function_name = precompile.name.clone();
            let (inputs, outputs) = decode_function_parameters(
                &call.call_data,
                &call.return_value,
                Some(precompile),
                call.status,
                false,
            );
            function_input = inputs;
            function_output = outputs;
        } else {
            function_name = "fallback".to_string();
            function_input = decode_graffiti_parameters(&call.call_data);
        }

        if !call.call_data.is_empty() && call.call_data != "0x" && function_signature.is_empty() {
            function_signature = call.call_data.clone();
        }

        DecodedCall {
            chain_id: chain_id.to_string(),
            tx_hash: transaction.tx_hash.clone(),
            timestamp: block.timestamp,
            call_id,
            call_type: call.call_type,
            from_address: AddressInfo {
                address: Some(address_to_hex(&call.from_address)),
                name: from_name,
                badge: None,
            },
            to_address: call.to_address.map(|to_address| AddressInfo {
                address: Some(address_to_hex(&to_address)),
                name: to_name,
                badge: None,
            }),
            value: format_ether(call.call_value),
            function_signature,
            function_name,
            arguments: function_input,
            outputs: function_output,
            gas_used: call.gas_used,
            error,
            status: status && call.status,
            indent,
            subcalls: vec![],
            function_guessed: guessed,
        }
    }

}

/// A guessed ABI "fits" when no decoded slot came up empty, the telltale of
/// an argument list longer than the payload.
fn decodes_cleanly(arguments: &[txlens_core::decoded::Argument]) -> bool {
    use txlens_core::decoded::Value;
    arguments.iter().all(|argument| argument.value != Value::Hex("0x".to_string()))
}

/// Path label of the i-th child: `<i>` under the root, `<parent>_<NNNN>`
/// below.
fn sub_call_id(parent_id: &str, i: usize) -> String {
    if parent_id.is_empty() {
        i.to_string()
    } else {
        format!("{parent_id}_{i:04}")
    }
}

/// Collapses chains of single delegatecalls: a node with exactly one
/// `delegatecall` child is replaced by that child, which inherits the
/// parent's ether value. Returns the new root.
pub fn prune_delegates(mut call: DecodedCall) -> DecodedCall {
    while call.subcalls.len() == 1 && call.subcalls[0].call_type == CallType::DelegateCall {
        let value = call.value;
        call = call.subcalls.remove(0);
        call.value = value;
    }

    call.subcalls = call.subcalls.into_iter().map(prune_delegates).collect();
    call
}

#[cfg(test)]
mod tests {
    use super::*;
    use txlens_core::{
        decoded::AddressInfo,
        types::timestamp_from_secs,
    };

    fn decoded(call_type: CallType, value: f64, subcalls: Vec<DecodedCall>) -> DecodedCall {
        DecodedCall {
            chain_id: "mainnet".to_string(),
            tx_hash: "0xabc".to_string(),
            timestamp: timestamp_from_secs(0),
            call_id: String::new(),
            call_type,
            from_address: AddressInfo::new("0xaa", "0xaa"),
            to_address: None,
            value,
            function_signature: String::new(),
            function_name: "fallback".to_string(),
            arguments: vec![],
            outputs: vec![],
            gas_used: None,
            error: None,
            status: true,
            indent: 0,
            subcalls,
            function_guessed: false,
        }
    }

    #[test]
    fn prunes_single_delegatecall_chains() {
        // root(value=5) -> delegatecall X(value=0) -> [call Y, call Z]
        let tree = decoded(
            CallType::Call,
            5.0,
            vec![decoded(
                CallType::DelegateCall,
                0.0,
                vec![decoded(CallType::Call, 0.0, vec![]), decoded(CallType::Call, 0.0, vec![])],
            )],
        );

        let pruned = prune_delegates(tree);
        assert_eq!(pruned.call_type, CallType::DelegateCall);
        assert_eq!(pruned.value, 5.0);
        assert_eq!(pruned.subcalls.len(), 2);
    }

    #[test]
    fn pruning_is_idempotent() {
        let tree = decoded(
            CallType::Call,
            1.0,
            vec![decoded(
                CallType::DelegateCall,
                0.0,
                vec![decoded(CallType::DelegateCall, 0.0, vec![])],
            )],
        );

        let once = prune_delegates(tree);
        let twice = prune_delegates(once.clone());
        assert_eq!(once, twice);

        fn check(call: &DecodedCall) {
            assert!(
                !(call.subcalls.len() == 1 && call.subcalls[0].call_type == CallType::DelegateCall)
            );
            call.subcalls.iter().for_each(check);
        }
        check(&twice);
    }

    #[test]
    fn call_ids_concatenate_along_the_path() {
        assert_eq!(sub_call_id("", 0), "0");
        assert_eq!(sub_call_id("", 12), "12");
        assert_eq!(sub_call_id("3", 7), "3_0007");
        assert_eq!(sub_call_id("3_0007", 42), "3_0007_0042");
    }

    #[test]
    fn keeps_multi_child_nodes() {
        let tree = decoded(
            CallType::Call,
            1.0,
            vec![
                decoded(CallType::DelegateCall, 0.0, vec![]),
                decoded(CallType::Call, 0.0, vec![]),
            ],
        );
        let pruned = prune_delegates(tree.clone());
        assert_eq!(pruned, tree);
    }
}
