//! Request and Response message types.
//!
//! Defines the RPC lines exchanged after the handshake.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::Ticket;

// ============================================================================
// Request
// ============================================================================

/// An RPC call from local end to the SL4A server.
///
/// # Format
///
/// ```json
/// {"id": 0, "method": "wifiGetConnectionInfo", "params": []}
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Ticket for request/response correlation.
    pub id: Ticket,

    /// Facade method name.
    pub method: String,

    /// Positional parameters.
    pub params: Vec<Value>,
}

impl Request {
    /// Creates a new request.
    #[inline]
    #[must_use]
    pub fn new(id: Ticket, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from the SL4A server.
///
/// # Format
///
/// Success:
/// ```json
/// {"id": 0, "result": {"SSID": "lab"}, "error": null}
/// ```
///
/// Error, either as a plain string or JSON-RPC 2.0 object:
/// ```json
/// {"id": 0, "result": null, "error": "Unknown RPC."}
/// {"id": 0, "result": null, "error": {"code": 3, "message": "Bad state", "data": {}}}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Should match the request ticket.
    #[serde(default)]
    pub id: Value,

    /// Result data.
    #[serde(default)]
    pub result: Value,

    /// Error (string or object) if the call failed.
    #[serde(default)]
    pub error: Option<Value>,
}

impl Response {
    /// Returns `true` if the server reported an error.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result value for the call `method` sent with `ticket`.
    ///
    /// # Errors
    ///
    /// - [`Error::Api`] if the server reported an error
    /// - [`Error::MismatchedId`] if the response belongs to another ticket
    pub fn into_result(self, method: &str, ticket: Ticket) -> Result<Value> {
        if let Some(error) = self.error {
            return Err(api_error(method, error));
        }

        if self.id.as_u64() != Some(ticket.as_u64()) {
            return Err(Error::mismatched_id(ticket, self.id));
        }

        Ok(self.result)
    }
}

/// Converts the `error` member of a response into [`Error::Api`].
fn api_error(method: &str, error: Value) -> Error {
    match error {
        Value::Object(mut object) => {
            let message = match object.remove("message") {
                Some(Value::String(message)) => message,
                Some(other) => other.to_string(),
                None => String::new(),
            };
            let code = object.get("code").and_then(Value::as_i64).unwrap_or(-1);
            let data = object.remove("data").unwrap_or(Value::Null);
            Error::api(method, message, code, data)
        }
        Value::String(message) => Error::api(method, message, -1, Value::Null),
        other => Error::api(method, other.to_string(), -1, Value::Null),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = Request::new(Ticket::new(2), "wifiToggleState", vec![json!(true)]);
        let json = serde_json::to_string(&request).expect("serialize");
        assert_eq!(json, r#"{"id":2,"method":"wifiToggleState","params":[true]}"#);
    }

    #[test]
    fn test_success_response() {
        let response: Response =
            serde_json::from_str(r#"{"id": 1, "result": {"SSID": "lab"}, "error": null}"#)
                .expect("parse");
        assert!(!response.is_error());

        let result = response
            .into_result("wifiGetConnectionInfo", Ticket::new(1))
            .expect("should succeed");
        assert_eq!(result["SSID"], "lab");
    }

    #[test]
    fn test_missing_result_is_null() {
        let response: Response = serde_json::from_str(r#"{"id": 0}"#).expect("parse");
        let result = response
            .into_result("wakeUpNow", Ticket::new(0))
            .expect("should succeed");
        assert!(result.is_null());
    }

    #[test]
    fn test_string_error() {
        let response: Response =
            serde_json::from_str(r#"{"id": 0, "result": null, "error": "Unknown RPC."}"#)
                .expect("parse");

        match response.into_result("noSuchCall", Ticket::new(0)) {
            Err(Error::Api {
                rpc_name,
                message,
                code,
                ..
            }) => {
                assert_eq!(rpc_name, "noSuchCall");
                assert_eq!(message, "Unknown RPC.");
                assert_eq!(code, -1);
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_object_error() {
        let response: Response = serde_json::from_str(
            r#"{"id": 0, "error": {"code": 3, "message": "Bad state", "data": {"x": 1}}}"#,
        )
        .expect("parse");

        match response.into_result("bleStartAdvertising", Ticket::new(0)) {
            Err(Error::Api {
                message,
                code,
                data,
                ..
            }) => {
                assert_eq!(message, "Bad state");
                assert_eq!(code, 3);
                assert_eq!(data, json!({"x": 1}));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_takes_precedence_over_id_check() {
        let response: Response =
            serde_json::from_str(r#"{"id": 9, "error": "boom"}"#).expect("parse");
        let err = response.into_result("x", Ticket::new(0)).unwrap_err();
        assert!(err.is_api_error());
    }

    #[test]
    fn test_mismatched_id() {
        let response: Response =
            serde_json::from_str(r#"{"id": 5, "result": 1, "error": null}"#).expect("parse");
        let err = response.into_result("x", Ticket::new(4)).unwrap_err();
        assert!(matches!(err, Error::MismatchedId { .. }));
    }
}
