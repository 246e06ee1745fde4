//! HTTP persistence gateway.
//!
//! Talks to the favorites API over JSON. See [`client::HttpGateway`].

pub mod client;

pub use client::{HttpGateway, HttpGatewayConfig};
