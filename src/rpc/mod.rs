//! JSON-RPC 2.0 core shared by every transport front-end
//!
//! Message shapes, the dispatch table, and the request pipeline that maps each
//! payload to exactly one response.

pub mod dispatch;
pub mod message;
pub mod processor;

pub use dispatch::DispatchTable;
pub use message::{Handler, RpcError, RpcRequest, RpcResponse};
