//! Minimal JSON-RPC client for the chain node. Constructed at startup so a
//! bad endpoint fails fast; the ingest pipeline itself never calls out.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid rpc url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error("rpc transport failure: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("rpc response carried neither result nor error")]
    EmptyResponse,
    #[error("rpc response is not valid JSON-RPC: {0}")]
    Decode(String),
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, T> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: T,
}

impl<'a, T> JsonRpcRequest<'a, T> {
    fn new(method: &'a str, params: T) -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

impl<T> JsonRpcResponse<T> {
    fn into_result(self) -> Result<T, RpcError> {
        if let Some(err) = self.error {
            return Err(RpcError::Remote {
                code: err.code,
                message: err.message,
            });
        }
        self.result.ok_or(RpcError::EmptyResponse)
    }
}

#[derive(Debug, Clone)]
pub struct ChainRpcClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl ChainRpcClient {
    /// Validates the endpoint and prepares the HTTP client. Performs no I/O.
    pub fn new(url: &str) -> Result<Self, RpcError> {
        let endpoint = Url::parse(url).map_err(|err| RpcError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(RpcError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme `{}`", endpoint.scheme()),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| RpcError::Client(err.to_string()))?;

        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Current slot as seen by the node. Reserved for direct-chain queries;
    /// webhook ingestion does not call it.
    pub async fn get_slot(&self) -> Result<u64, RpcError> {
        self.call("getSlot", Vec::<()>::new()).await
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, RpcError>
    where
        P: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let body = self
            .http
            .post(self.endpoint.clone())
            .json(&JsonRpcRequest::new(method, params))
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|err| RpcError::Transport(err.to_string()))?
            .bytes()
            .await
            .map_err(|err| RpcError::Transport(err.to_string()))?;

        decode_response(&body)
    }
}

fn decode_response<R>(body: &[u8]) -> Result<R, RpcError>
where
    R: for<'de> Deserialize<'de>,
{
    serde_json::from_slice::<JsonRpcResponse<R>>(body)
        .map_err(|err| RpcError::Decode(err.to_string()))?
        .into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https_endpoints() {
        let client = ChainRpcClient::new("https://api.mainnet-beta.solana.com").unwrap();
        assert_eq!(client.endpoint().host_str(), Some("api.mainnet-beta.solana.com"));
        assert!(ChainRpcClient::new("http://127.0.0.1:8899").is_ok());
    }

    #[test]
    fn rejects_unparseable_or_foreign_scheme() {
        assert!(matches!(
            ChainRpcClient::new("not a url"),
            Err(RpcError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ChainRpcClient::new("ftp://node.example"),
            Err(RpcError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn request_serializes_as_json_rpc_2() {
        let request = JsonRpcRequest::new("getSlot", Vec::<()>::new());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "getSlot", "params": [] })
        );
    }

    #[test]
    fn response_prefers_error_over_result() {
        let slot: u64 = decode_response(br#"{"jsonrpc":"2.0","id":1,"result":42}"#).unwrap();
        assert_eq!(slot, 42);

        let failed = decode_response::<u64>(
            br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#,
        );
        assert!(matches!(failed, Err(RpcError::Remote { code: -32601, .. })));

        let empty = decode_response::<u64>(br#"{"jsonrpc":"2.0","id":1}"#);
        assert!(matches!(empty, Err(RpcError::EmptyResponse)));
    }

    #[test]
    fn non_json_or_mistyped_response_is_a_decode_error() {
        assert!(matches!(
            decode_response::<u64>(b"<html>bad gateway</html>"),
            Err(RpcError::Decode(_))
        ));
        assert!(matches!(
            decode_response::<u64>(br#"{"jsonrpc":"2.0","id":1,"result":"forty-two"}"#),
            Err(RpcError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_node_surfaces_as_transport_error() {
        // Port 1 is reserved and refuses connections on loopback.
        let client = ChainRpcClient::new("http://127.0.0.1:1").unwrap();
        assert!(matches!(client.get_slot().await, Err(RpcError::Transport(_))));
    }
}
