//! The slice of JSON-RPC 2.0 that [`HttpChainClient`](crate::HttpChainClient)
//! speaks: positional params out, `result` or `error` back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(crate) struct Call<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

impl<'a> Call<'a> {
    pub(crate) fn new(id: u64, method: &'a str, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NodeError {
    code: i64,
    message: String,
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node error {}: {}", self.code, self.message)
    }
}

/// Only the fields the client reads; `jsonrpc` and `id` are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct Reply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<NodeError>,
}

impl Reply {
    /// The result value (`Null` if absent) or the node's error.
    pub(crate) fn into_result(self) -> Result<Value, NodeError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_body_is_positional() {
        let call = Call::new(
            7,
            "eth_getBlockByNumber",
            vec![Value::String("latest".into()), Value::Bool(false)],
        );
        assert_eq!(
            serde_json::to_value(&call).unwrap(),
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "eth_getBlockByNumber",
                "params": ["latest", false]
            })
        );
    }

    #[test]
    fn null_result_is_ok_null() {
        let reply: Reply =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert_eq!(reply.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn node_error_wins_over_result() {
        let reply: Reply = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":"a","error":{"code":-32000,"message":"header not found"}}"#,
        )
        .unwrap();
        let err = reply.into_result().unwrap_err();
        assert_eq!(err.to_string(), "node error -32000: header not found");
    }
}
