//! Verified contract sources via an Etherscan-compatible API.

use crate::errors::SourceError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use std::{borrow::Cow, collections::HashMap};
use tracing::{error, trace};
use txlens_core::{
    abi::{parse_abi, RawAbi},
    semantics::{EventSemantics, FunctionSemantics},
    types::{address_to_hex, Address},
};
use url::Url;

type Result<T, E = SourceError> = std::result::Result<T, E>;

/// The name and parsed ABI of a verified contract.
#[derive(Clone, Debug, Default)]
pub struct VerifiedContract {
    pub name: String,
    pub events: HashMap<String, EventSemantics>,
    pub functions: HashMap<String, FunctionSemantics>,
}

/// Serves verified ABIs by address; `Ok(None)` means the source exists but
/// the contract is not verified.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn get_contract(
        &self,
        chain_id: &str,
        address: Address,
    ) -> Result<Option<VerifiedContract>>;
}

/// Etherscan-style API client, one endpoint per chain.
#[derive(Clone, Debug)]
pub struct EtherscanClient {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoints: HashMap<String, Url>,
}

#[derive(Deserialize)]
struct Response<T> {
    status: String,
    message: String,
    result: T,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseData<T> {
    Success(Response<T>),
    Error { message: String, result: Option<String> },
}

#[derive(Deserialize)]
struct SourceEntry {
    #[serde(rename = "ContractName", default)]
    contract_name: String,
    #[serde(rename = "ABI", default)]
    abi: String,
}

impl EtherscanClient {
    pub fn new(endpoints: HashMap<String, Url>, api_key: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key, endpoints }
    }

    fn endpoint(&self, chain_id: &str) -> Result<&Url> {
        self.endpoints.get(chain_id).ok_or_else(|| SourceError::UnknownChain(chain_id.into()))
    }

    /// Execute a GET request with parameters, retrying transient non-200
    /// replies a few times.
    async fn get_json<T: DeserializeOwned>(
        &self,
        chain_id: &str,
        query: &[(&str, Cow<'_, str>)],
    ) -> Result<Response<T>> {
        let url = self.endpoint(chain_id)?.clone();
        trace!(target: "etherscan", "GET {url}");

        let mut last_status = 0;
        for _ in 0..3 {
            let response = self
                .client
                .get(url.clone())
                .header(reqwest::header::ACCEPT, "application/json")
                .query(query)
                .send()
                .await?;
            last_status = response.status().as_u16();
            if last_status != 200 {
                continue
            }
            let text = response.text().await?;
            return self.sanitize_response(&text)
        }
        Err(SourceError::BadStatusCode(last_status))
    }

    /// Perform sanity checks on a response and deserialize it.
    fn sanitize_response<T: DeserializeOwned>(&self, text: &str) -> Result<Response<T>> {
        let data: ResponseData<T> = serde_json::from_str(text).map_err(|err| {
            error!(target: "etherscan", %err, "failed to deserialize response");
            SourceError::Serde(err)
        })?;
        match data {
            ResponseData::Success(response) => Ok(response),
            ResponseData::Error { message, result } => Err(SourceError::ErrorResponse {
                message,
                result: result.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl SourceProvider for EtherscanClient {
    async fn get_contract(
        &self,
        chain_id: &str,
        address: Address,
    ) -> Result<Option<VerifiedContract>> {
        let address_hex = address_to_hex(&address);
        let mut query: Vec<(&str, Cow<'_, str>)> = vec![
            ("module", Cow::Borrowed("contract")),
            ("action", Cow::Borrowed("getsourcecode")),
            ("address", Cow::Borrowed(address_hex.as_str())),
        ];
        if let Some(api_key) = &self.api_key {
            query.push(("apikey", Cow::Borrowed(api_key.as_str())));
        }

        let response: Response<Vec<SourceEntry>> = self.get_json(chain_id, &query).await?;
        if response.status != "1" || response.message != "OK" {
            return Ok(None)
        }

        let Some(entry) = response.result.into_iter().next() else { return Ok(None) };
        let Ok(raw_abi) = serde_json::from_str::<RawAbi>(&entry.abi) else {
            // "Contract source code not verified" and other non-ABI payloads
            return Ok(None)
        };

        let (events, functions) = parse_abi(&raw_abi);
        Ok(Some(VerifiedContract { name: entry.contract_name, events, functions }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_success_and_error_responses() {
        let client = EtherscanClient::new(HashMap::new(), None);

        let ok: Response<Vec<SourceEntry>> = client
            .sanitize_response(
                r#"{"status":"1","message":"OK","result":[{"ContractName":"Dai","ABI":"[]"}]}"#,
            )
            .unwrap();
        assert_eq!(ok.result[0].contract_name, "Dai");

        let err = client.sanitize_response::<Vec<SourceEntry>>(
            r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#,
        );
        assert!(matches!(err, Err(SourceError::ErrorResponse { .. })));
    }

    #[test]
    fn unverified_abi_text_is_not_an_abi() {
        assert!(serde_json::from_str::<RawAbi>("Contract source code not verified").is_err());
    }
}
