//! Semantic enrichment of the decoded call tree.

use super::{
    context::{get_badge, transform_parameter, TransformationContext},
    Evaluator, SemanticDecoder,
};
use crate::{abi::RECURSION_LIMIT, error::DecodeError, proxies::ProxyMap};
use futures_util::future::BoxFuture;
use txlens_core::{
    decoded::{DecodedCall, DecodedTransactionMetadata},
    semantics::{TokenStandard, TransformationMap},
    utils::parse_address,
};
use txlens_semantics::standards::{
    erc20::ERC20_TRANSFORMATIONS, erc721::ERC721_TRANSFORMATIONS,
};

impl SemanticDecoder {
    /// Transforms every parameter of every call, stamps badges and prunes
    /// ignored parameters, recursively.
    pub async fn decode_calls(
        &self,
        call: DecodedCall,
        tx_metadata: &DecodedTransactionMetadata,
        proxies: &ProxyMap,
    ) -> Result<DecodedCall, DecodeError> {
        self.decode_call_tree(call, tx_metadata, proxies, 0).await
    }

    fn decode_call_tree<'a>(
        &'a self,
        mut call: DecodedCall,
        tx_metadata: &'a DecodedTransactionMetadata,
        proxies: &'a ProxyMap,
        depth: usize,
    ) -> BoxFuture<'a, Result<DecodedCall, DecodeError>> {
        Box::pin(async move {
            if depth > RECURSION_LIMIT {
                return Err(DecodeError::RecursionLimit("semantic call decoding"))
            }

            let chain_id = call.chain_id.clone();
            let to_address = call
                .to_address
                .as_ref()
                .and_then(|info| info.address.as_deref())
                .and_then(parse_address);

            let (standard, transformations) = match to_address {
                Some(to_address) => (
                    self.repository.get_standard(&chain_id, to_address).await,
                    self.repository
                        .get_transformations(&chain_id, to_address, &call.function_signature)
                        .await
                        .unwrap_or_default(),
                ),
                None => (None, TransformationMap::default()),
            };

            let evaluator = Evaluator {
                repository: self.repository.as_ref(),
                proxies: Some(proxies),
                chain_id: &chain_id,
                transaction: tx_metadata,
            };
            let contract = call
                .to_address
                .as_ref()
                .and_then(|info| info.address.clone())
                .unwrap_or_default();
            let ctx = TransformationContext::new(contract, &call.arguments, &call.outputs);

            apply_transformations(&evaluator, &mut call, &transformations, &ctx).await;

            // contracts without their own rules still get the standard ones
            if transformations.is_empty() {
                let fallback = match standard {
                    Some(TokenStandard::Erc20) => {
                        ERC20_TRANSFORMATIONS.get(&call.function_signature)
                    }
                    Some(TokenStandard::Erc721) => {
                        ERC721_TRANSFORMATIONS.get(&call.function_signature)
                    }
                    _ => None,
                };
                if let Some(fallback) = fallback {
                    apply_transformations(&evaluator, &mut call, fallback, &ctx).await;
                }
            }

            call.from_address.badge =
                get_badge(call.from_address.address.as_deref(), tx_metadata);
            if let Some(to_address) = &mut call.to_address {
                to_address.badge = get_badge(to_address.address.as_deref(), tx_metadata);
            }

            call.arguments.retain(|parameter| parameter.arg_type != "ignore");
            call.outputs.retain(|parameter| parameter.arg_type != "ignore");

            let subcalls = std::mem::take(&mut call.subcalls);
            for sub_call in subcalls {
                call.subcalls
                    .push(self.decode_call_tree(sub_call, tx_metadata, proxies, depth + 1).await?);
            }

            Ok(call)
        })
    }
}

async fn apply_transformations(
    evaluator: &Evaluator<'_>,
    call: &mut DecodedCall,
    transformations: &TransformationMap,
    ctx: &TransformationContext,
) {
    for (i, parameter) in call.arguments.iter_mut().enumerate() {
        transform_parameter(evaluator, parameter, format!("__input{i}__"), transformations, ctx)
            .await;
    }
    for (i, parameter) in call.outputs.iter_mut().enumerate() {
        transform_parameter(evaluator, parameter, format!("__output{i}__"), transformations, ctx)
            .await;
    }
}
