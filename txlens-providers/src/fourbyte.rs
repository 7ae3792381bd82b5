//! Signature directory lookups for unknown selectors and topics.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;
use url::Url;

/// A candidate reading of an unknown selector: `name(type1,type2,…)`.
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureText {
    pub name: String,
    pub args: Vec<String>,
    /// `true` when the argument list was a single nested tuple.
    pub tuple: bool,
}

/// Supplies candidate names for unknown 4-byte selectors and 32-byte topics.
///
/// Lookups are best effort: network failures surface as empty candidate
/// lists, never as decode failures.
#[async_trait]
pub trait SignatureProvider: Send + Sync {
    async fn get_function(&self, signature: &str) -> Vec<SignatureText>;
    async fn get_event(&self, signature: &str) -> Vec<SignatureText>;
}

/// Client for a 4byte.directory-compatible API.
#[derive(Clone, Debug)]
pub struct FourByteClient {
    client: reqwest::Client,
    api_url: Url,
}

const FUNCTION_ENDPOINT: &str = "signatures";
const EVENT_ENDPOINT: &str = "event-signatures";

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<Entry>,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(default)]
    text_signature: String,
    #[serde(default)]
    hex_signature: String,
}

impl Default for FourByteClient {
    fn default() -> Self {
        Self::new("https://www.4byte.directory/api/v1/".parse().expect("static url"))
    }
}

impl FourByteClient {
    pub fn new(api_url: Url) -> Self {
        Self { client: reqwest::Client::new(), api_url }
    }

    async fn get_all(&self, endpoint: &str, signature: &str) -> Vec<Entry> {
        let Ok(url) = self.api_url.join(&format!("{endpoint}/")) else { return vec![] };

        let mut results = Vec::new();
        let mut page = 1u32;
        loop {
            let request = self
                .client
                .get(url.clone())
                .query(&[("hex_signature", signature), ("page", &page.to_string())]);
            let response = match request.send().await.and_then(|r| r.error_for_status()) {
                Ok(response) => response,
                Err(err) => {
                    warn!(target: "fourbyte", %err, "could not reach signature directory");
                    return results
                }
            };
            let parsed: Page = match response.json().await {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(target: "fourbyte", %err, "unexpected signature directory payload");
                    return results
                }
            };
            results.extend(parsed.results);
            if parsed.next.is_none() {
                break
            }
            page += 1;
        }
        results
    }

    async fn lookup(&self, endpoint: &str, signature: &str) -> Vec<SignatureText> {
        if signature.is_empty() || signature == "0x" {
            return vec![]
        }
        let entries = self.get_all(endpoint, signature).await;
        // newest entries come first; prefer the earliest submissions
        entries.iter().rev().filter_map(parse_text_signature).collect()
    }
}

#[async_trait]
impl SignatureProvider for FourByteClient {
    async fn get_function(&self, signature: &str) -> Vec<SignatureText> {
        self.lookup(FUNCTION_ENDPOINT, signature).await
    }

    async fn get_event(&self, signature: &str) -> Vec<SignatureText> {
        self.lookup(EVENT_ENDPOINT, signature).await
    }
}

/// Parses a `name(type1,type2,…)` text signature; a single level of tuple
/// nesting is accepted, anything deeper is rejected.
fn parse_text_signature(entry: &Entry) -> Option<SignatureText> {
    let text = entry.text_signature.as_str();
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    if close < open {
        return None
    }

    let name = &text[..open];
    let types = &text[open + 1..close];
    if name.is_empty() && types.is_empty() {
        return None
    }

    if let Some(inner_open) = types.find('(') {
        let inner_close = types.rfind(')')?;
        if inner_close < inner_open {
            return None
        }
        let args: Vec<String> =
            types[inner_open + 1..inner_close].split(',').map(str::to_string).collect();
        if args.iter().any(|arg| arg.contains('(')) {
            warn!(
                target: "fourbyte",
                "could not parse {} signature: {}", entry.hex_signature, entry.text_signature
            );
            return None
        }
        return Some(SignatureText { name: name.to_string(), args, tuple: true })
    }

    let args = types.split(',').map(str::to_string).filter(|arg| !arg.is_empty()).collect();
    Some(SignatureText { name: name.to_string(), args, tuple: false })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> Entry {
        Entry { text_signature: text.to_string(), hex_signature: "0xdeadbeef".to_string() }
    }

    #[test]
    fn parses_flat_signatures() {
        let parsed = parse_text_signature(&entry("transfer(address,uint256)")).unwrap();
        assert_eq!(parsed.name, "transfer");
        assert_eq!(parsed.args, vec!["address", "uint256"]);
        assert!(!parsed.tuple);
    }

    #[test]
    fn parses_no_arg_signatures() {
        let parsed = parse_text_signature(&entry("totalSupply()")).unwrap();
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn parses_single_tuple_signatures() {
        let parsed = parse_text_signature(&entry("fill((address,uint256,bytes32))")).unwrap();
        assert!(parsed.tuple);
        assert_eq!(parsed.args, vec!["address", "uint256", "bytes32"]);
    }

    #[test]
    fn rejects_nested_tuples_and_garbage() {
        assert!(parse_text_signature(&entry("fill((address,(uint256,uint256)))")).is_none());
        assert!(parse_text_signature(&entry("not a signature")).is_none());
        assert!(parse_text_signature(&entry("()")).is_none());
    }
}
