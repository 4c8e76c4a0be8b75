//! Default transport for agents deployed behind a DIAL-compatible
//! chat-completion endpoint.
//!
//! Authentication and HTTP settings live here so the aggregation and history
//! logic stay transport-agnostic.
mod adapter;
mod config;
pub(crate) mod transport;

pub use adapter::DialTransport;
pub use config::DialClientConfig;
