//! Sample methods served by the binary.

use serde_json::Value;

use crate::{
    errors::{HandlerError, ServerError},
    server::RpcServer,
};

pub fn register_builtin_methods(server: &mut RpcServer) -> Result<(), ServerError> {
    server.register_handler("echo", echo)?;
    server.register_handler("add", add)?;
    Ok(())
}

/// Returns the first positional parameter unchanged.
pub fn echo(params: &Value) -> Result<Value, HandlerError> {
    positional(params, "echo")?
        .first()
        .cloned()
        .ok_or_else(|| HandlerError::invalid_params("echo expects at least one parameter"))
}

/// Sums integer positional parameters. No parameters sum to zero.
pub fn add(params: &Value) -> Result<Value, HandlerError> {
    let mut sum = 0_i64;
    for (index, item) in positional(params, "add")?.iter().enumerate() {
        let value = item.as_i64().ok_or_else(|| {
            HandlerError::invalid_params(format!("add parameter {index} is not an integer"))
        })?;
        sum = sum
            .checked_add(value)
            .ok_or_else(|| HandlerError::failed("integer overflow while adding parameters"))?;
    }
    Ok(Value::from(sum))
}

fn positional<'a>(params: &'a Value, method: &str) -> Result<&'a Vec<Value>, HandlerError> {
    params
        .as_array()
        .ok_or_else(|| HandlerError::invalid_params(format!("{method} expects positional parameters")))
}
