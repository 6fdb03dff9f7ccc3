//! JSON envelope codec shared by both transports.
//!
//! Wire format:
//! ```text
//! Request:  { "method": "<namespace>:<method>", "id": <int>, "params": [...] }
//! Response: { "res_id": <int>, "result": <value|null>, "error": <string|null> }
//! ```
//!
//! A body that does not parse into [`Response`] is a protocol violation.
//! A body that parses but carries `error` is the peer telling us the call
//! itself failed; the two are kept apart so only the former triggers
//! transport fallback.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RpcError};

/// What to invoke on the peer, independent of transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    namespace: String,
    method: String,
    args: Vec<Value>,
}

impl Call {
    pub fn new(namespace: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            namespace: namespace.into(),
            method: method.into(),
            args,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// `namespace:method`, as it appears on the wire.
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.namespace, self.method)
    }
}

/// Wire-level request.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub method: String,
    pub id: u8,
    pub params: &'a [Value],
}

impl<'a> Envelope<'a> {
    pub fn new(call: &'a Call, id: u8) -> Self {
        Self {
            method: call.qualified(),
            id,
            params: call.args(),
        }
    }
}

/// Wire-level response.
///
/// `id` is accepted as an alias of `res_id`; the device firmware names its
/// reply id that way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(alias = "id")]
    pub res_id: u8,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Response {
    /// A void call: neither result nor error.
    pub fn is_void(&self) -> bool {
        self.result.is_none() && self.error.is_none()
    }

    /// Turn a peer-side `error` into [`RpcError::PeerReported`].
    pub fn into_result(self, method: &str) -> Result<Option<Value>> {
        match self.error {
            Some(message) => Err(RpcError::PeerReported {
                method: method.to_string(),
                message,
            }),
            None => Ok(self.result),
        }
    }
}

/// Serialize `call` with request id `id`.
pub fn encode_request(call: &Call, id: u8) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&Envelope::new(call, id))
}

/// Parse a response body received from either transport.
pub fn decode_response(bytes: &[u8]) -> serde_json::Result<Response> {
    serde_json::from_slice(bytes)
}
