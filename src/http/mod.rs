//! HTTP front-end for the JSON-RPC core
//!
//! Wraps the same request pipeline in a minimal HTTP envelope.

pub mod handlers;
