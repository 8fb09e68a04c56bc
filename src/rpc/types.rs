use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "1.1";

/// Signed JSON-RPC 1.1 request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub version: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: u64,
    pub hmac: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    /// `None` only when the field is absent; `"result": null` is a valid result
    #[serde(default, deserialize_with = "deserialize_present")]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

pub(crate) fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
