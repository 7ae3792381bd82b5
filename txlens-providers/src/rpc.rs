//! A low-level JSON-RPC client over HTTP.

use crate::errors::ProviderError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use url::Url;

/// A JSON-RPC 2.0 request.
#[derive(Serialize)]
struct Request<'a, T> {
    id: u64,
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
}

impl<'a, T> Request<'a, T> {
    fn new(id: u64, method: &'a str, params: T) -> Self {
        Self { id, jsonrpc: "2.0", method, params }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize, Error)]
#[error("(code: {code}, message: {message}, data: {data:?})")]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Response {
    Success { result: serde_json::Value },
    Error { error: JsonRpcError },
}

/// An HTTP JSON-RPC endpoint with monotonically increasing request ids.
#[derive(Debug)]
pub struct Http {
    id: AtomicU64,
    client: reqwest::Client,
    url: Url,
}

impl Http {
    /// Initializes a new HTTP transport for the given endpoint.
    pub fn new(url: Url) -> Self {
        Self::new_with_client(url, reqwest::Client::new())
    }

    /// Initializes the transport with a shared [`reqwest::Client`].
    pub fn new_with_client(url: Url, client: reqwest::Client) -> Self {
        Self { id: AtomicU64::new(1), client, url }
    }

    /// The endpoint this transport talks to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends one request and deserializes the `result` field.
    pub async fn request<T: Serialize + Send + Sync, R: DeserializeOwned>(
        &self,
        method: &str,
        params: T,
    ) -> Result<R, ProviderError> {
        let next_id = self.id.fetch_add(1, Ordering::SeqCst);
        let payload = Request::new(next_id, method, params);

        let res = self.client.post(self.url.as_ref()).json(&payload).send().await?;
        let body = res.bytes().await?;

        let raw = match serde_json::from_slice(&body) {
            Ok(Response::Success { result }) => result,
            Ok(Response::Error { error }) => return Err(error.into()),
            Err(err) => {
                return Err(ProviderError::SerdeJson {
                    err,
                    text: String::from_utf8_lossy(&body).to_string(),
                })
            }
        };

        serde_json::from_value(raw.clone())
            .map_err(|err| ProviderError::SerdeJson { err, text: raw.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_and_error_responses() {
        let success: Response = serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#)
            .expect("success response");
        assert!(matches!(success, Response::Success { .. }));

        let error: Response = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}}"#,
        )
        .expect("error response");
        match error {
            Response::Error { error } => assert_eq!(error.code, -32000),
            _ => panic!("expected error response"),
        }
    }

    #[test]
    fn serializes_request_envelope() {
        let request = Request::new(7, "eth_getCode", ["0x00", "latest"]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "eth_getCode");
        assert_eq!(json["id"], 7);
    }
}
