//! Line-delimited TCP front-end
//!
//! Each accepted connection carries exactly one newline-terminated request and
//! receives exactly one newline-terminated response before it is closed.

pub mod connection;
pub mod listener;

pub use listener::Listener;
