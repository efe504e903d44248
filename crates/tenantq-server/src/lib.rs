//! tenantq server and client library.
//!
//! Serves the logs, users and groups repositories of `tenantq-core` over a
//! local Unix socket using a JSON-lines protocol, so several processes can
//! page through the same store.

pub mod client;
pub mod error;
pub mod protocol;
pub mod seed;
pub mod server;
pub mod service;

pub use client::TenantqClient;
pub use server::TenantqServer;
pub use service::Service;
