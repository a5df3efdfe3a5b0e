//! JSON-RPC 2.0 message shapes and the handler signature
//!
//! Requests are parsed leniently on `params` (absent means `null`) and strictly on
//! `method`. Any `id` value is accepted and echoed back verbatim. Responses carry exactly one of `result` or `error`, which the
//! `Outcome` enum makes impossible to violate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{HandlerError, RequestError};

pub const JSONRPC_VERSION: &str = "2.0";

pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INTERNAL_ERROR: i32 = -32603;

/// A method implementation: takes the request `params` and produces a result.
///
/// Any `Fn(&Value) -> Result<Value, HandlerError>` that is `Send + Sync` qualifies.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, params: &Value) -> Result<Value, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&Value) -> Result<Value, HandlerError> + Send + Sync + 'static,
{
    fn call(&self, params: &Value) -> Result<Value, HandlerError> {
        self(params)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
    pub id: Value,
}

/// Why a payload was rejected, plus the id the error response should carry.
#[derive(Debug)]
pub struct ParseFailure {
    pub id: Value,
    pub error: RequestError,
}

impl ParseFailure {
    fn unidentified(error: RequestError) -> Self {
        Self {
            id: Value::Null,
            error,
        }
    }
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }

    pub fn parse(payload: &[u8]) -> Result<Self, ParseFailure> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|err| ParseFailure::unidentified(RequestError::InvalidJson(err)))?;
        let Value::Object(object) = value else {
            return Err(ParseFailure::unidentified(RequestError::NotAnObject));
        };

        Self::from_object(object)
    }

    fn from_object(mut object: Map<String, Value>) -> Result<Self, ParseFailure> {
        let id = object.remove("id");
        let reply_id = id.clone().unwrap_or(Value::Null);
        let reject = |error| ParseFailure {
            id: reply_id.clone(),
            error,
        };

        match object.remove("jsonrpc") {
            None => {}
            Some(Value::String(version)) if version == JSONRPC_VERSION => {}
            Some(other) => return Err(reject(RequestError::UnsupportedVersion(other.to_string()))),
        }

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => return Err(reject(RequestError::MethodNotString)),
            None => return Err(reject(RequestError::MissingMethod)),
        };

        let Some(id) = id else {
            return Err(reject(RequestError::MissingId));
        };

        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method,
            params: object.remove("params").unwrap_or(Value::Null),
            id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn method_not_found() -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: "Method not found".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(RpcError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    jsonrpc: &'static str,
    #[serde(flatten)]
    outcome: Outcome,
    id: Value,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            outcome: Outcome::Result(result),
            id,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            outcome: Outcome::Error(error),
            id,
        }
    }

    pub fn id(&self) -> &Value {
        &self.id
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RpcError> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(error) => Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    /// Serializes the response as a single newline-terminated line.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_well_formed_request() {
        let request =
            RpcRequest::parse(br#"{"jsonrpc":"2.0","method":"echo","params":[42],"id":1}"#)
                .expect("request should parse");

        assert_eq!(request, RpcRequest::new("echo", json!([42]), json!(1)));
    }

    #[test]
    fn missing_params_default_to_null() {
        let request = RpcRequest::parse(br#"{"jsonrpc":"2.0","method":"ping","id":"a"}"#)
            .expect("request should parse");

        assert_eq!(request.params, Value::Null);
        assert_eq!(request.id, json!("a"));
    }

    #[test]
    fn missing_version_is_tolerated() {
        let request = RpcRequest::parse(br#"{"method":"ping","id":null}"#)
            .expect("request should parse");

        assert_eq!(request.jsonrpc, "2.0");
        assert_eq!(request.id, Value::Null);
    }

    #[test]
    fn invalid_json_has_null_id() {
        let failure = RpcRequest::parse(b"not json").expect_err("must fail");

        assert_eq!(failure.id, Value::Null);
        assert!(matches!(failure.error, RequestError::InvalidJson(_)));
        assert!(failure.error.to_string().starts_with("parse error"));
    }

    #[test]
    fn non_object_is_rejected() {
        let failure = RpcRequest::parse(b"[1,2,3]").expect_err("must fail");

        assert!(matches!(failure.error, RequestError::NotAnObject));
    }

    #[test]
    fn missing_method_keeps_recoverable_id() {
        let failure = RpcRequest::parse(br#"{"jsonrpc":"2.0","id":7}"#).expect_err("must fail");

        assert_eq!(failure.id, json!(7));
        assert!(matches!(failure.error, RequestError::MissingMethod));
    }

    #[test]
    fn missing_id_is_rejected() {
        let failure =
            RpcRequest::parse(br#"{"jsonrpc":"2.0","method":"echo"}"#).expect_err("must fail");

        assert_eq!(failure.id, Value::Null);
        assert!(matches!(failure.error, RequestError::MissingId));
    }

    #[test]
    fn boolean_id_is_kept() {
        let request = RpcRequest::parse(br#"{"jsonrpc":"2.0","method":"echo","id":true}"#)
            .expect("request should parse");

        assert_eq!(request.id, json!(true));
    }

    #[test]
    fn structured_id_is_kept() {
        let request =
            RpcRequest::parse(br#"{"jsonrpc":"2.0","method":"echo","id":{"trace":[1,2]}}"#)
                .expect("request should parse");

        assert_eq!(request.id, json!({"trace": [1, 2]}));
    }

    #[test]
    fn structured_id_is_echoed_on_parse_failure() {
        let failure = RpcRequest::parse(br#"{"jsonrpc":"2.0","method":7,"id":[1]}"#)
            .expect_err("must fail");

        assert_eq!(failure.id, json!([1]));
        assert!(matches!(failure.error, RequestError::MethodNotString));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let failure = RpcRequest::parse(br#"{"jsonrpc":"1.0","method":"echo","id":1}"#)
            .expect_err("must fail");

        assert_eq!(failure.id, json!(1));
        assert!(matches!(failure.error, RequestError::UnsupportedVersion(_)));
    }

    #[test]
    fn non_string_method_is_rejected() {
        let failure =
            RpcRequest::parse(br#"{"jsonrpc":"2.0","method":5,"id":1}"#).expect_err("must fail");

        assert!(matches!(failure.error, RequestError::MethodNotString));
    }

    #[test]
    fn success_serializes_in_wire_order() {
        let response = RpcResponse::success(json!(1), json!(42));

        assert_eq!(
            serde_json::to_string(&response).expect("serialize"),
            r#"{"jsonrpc":"2.0","result":42,"id":1}"#
        );
        assert_eq!(response.result(), Some(&json!(42)));
        assert!(response.error().is_none());
    }

    #[test]
    fn error_serializes_without_result() {
        let response = RpcResponse::failure(json!(3), RpcError::method_not_found());

        assert_eq!(
            serde_json::to_string(&response).expect("serialize"),
            r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":3}"#
        );
        assert!(response.is_error());
        assert!(response.result().is_none());
    }

    #[test]
    fn null_result_is_still_a_result() {
        let response = RpcResponse::success(json!(1), Value::Null);

        assert_eq!(
            serde_json::to_string(&response).expect("serialize"),
            r#"{"jsonrpc":"2.0","result":null,"id":1}"#
        );
    }

    #[test]
    fn to_line_appends_single_newline() {
        let line = RpcResponse::success(json!("x"), json!([1]))
            .to_line()
            .expect("serialize");

        assert_eq!(line.last(), Some(&b'\n'));
        assert_eq!(line.iter().filter(|byte| **byte == b'\n').count(), 1);
    }

    #[test]
    fn closures_are_handlers() {
        let handler = |params: &Value| -> Result<Value, HandlerError> { Ok(params.clone()) };

        assert_eq!(handler.call(&json!([1])).expect("call"), json!([1]));
    }
}
