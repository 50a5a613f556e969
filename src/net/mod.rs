//! Outbound HTTP: the gateway pipeline, refresh coordination, and the wire
//! envelope they share.

pub mod error;
pub mod gateway;
pub mod refresh;
pub mod wire;
