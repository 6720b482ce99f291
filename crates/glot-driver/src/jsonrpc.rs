//! JSON-RPC 2.0 message types exchanged with drivers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const VERSION: &str = "2.0";

/// Outgoing request.
#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: i64,
    method: &'a str,
    params: &'a P,
}

impl<'a, P: Serialize> RpcRequest<'a, P> {
    pub(crate) const fn new(id: i64, method: &'a str, params: &'a P) -> Self {
        Self {
            jsonrpc: VERSION,
            id,
            method,
            params,
        }
    }
}

/// Outgoing notification.
#[derive(Debug, Serialize)]
pub(crate) struct RpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
}

impl<'a> RpcNotification<'a> {
    pub(crate) const fn new(method: &'a str) -> Self {
        Self {
            jsonrpc: VERSION,
            method,
        }
    }
}

/// Incoming response.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub(crate) id: Option<i64>,
    #[serde(default)]
    pub(crate) result: Option<Value>,
    #[serde(default)]
    pub(crate) error: Option<RpcError>,
}

/// Error object carried by a response.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcError {
    pub(crate) code: i64,
    pub(crate) message: String,
}

/// Any message a driver may write.
#[derive(Debug)]
pub(crate) enum RpcMessage {
    Response(RpcResponse),
    Notification { method: String },
    Request { id: Value, method: String },
}

impl RpcMessage {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let mut value: Value = serde_json::from_slice(bytes)?;
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_owned);
        match (method, value.get_mut("id").map(Value::take)) {
            (Some(method), Some(id)) => Ok(Self::Request { id, method }),
            (Some(method), None) => Ok(Self::Notification { method }),
            (None, _) => serde_json::from_slice(bytes).map(Self::Response),
        }
    }
}
