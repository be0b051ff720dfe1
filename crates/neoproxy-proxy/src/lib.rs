//! Neoproxy Proxy - MITM engine adapter for the interception pipeline.
//!
//! This crate binds [`neoproxy_core::Interceptor`] to hudsucker. Every HTTP
//! exchange passing through the proxy is wrapped in a flow adapter and
//! handed to the pipeline, which may answer it locally, rewrite it, or let
//! it through untouched.
//!
//! ## Features
//!
//! - Generates a root CA certificate on first run
//! - Creates per-host certificates on the fly
//! - Buffers response bodies only for URLs the pipeline inspects
//! - Fails open: any pipeline miss forwards the original traffic
//!
//! ## Architecture
//!
//! ```text
//! Client Request → Proxy → FlowHandler::handle_request → Interceptor::on_request
//!                                                              │
//!                      ┌──────────────┬──────────────┬─────────┴─────┐
//!                      ▼              ▼              ▼               ▼
//!                 Local SWF      Cached reply   Rewritten URL   Pass-through
//!                                                    │               │
//!                                                    └───────┬───────┘
//!                                                            ▼
//!                                 Origin → FlowHandler::handle_response → Interceptor::on_response
//! ```

mod ca;
mod error;
mod handler;
mod proxy;

pub use ca::{CaManager, CaManagerError};
pub use error::{ProxyError, Result};
pub use handler::FlowHandler;
pub use proxy::{ProxyConfig, ProxyHandle, ProxyServer};

/// Default proxy port.
pub const DEFAULT_PROXY_PORT: u16 = 8080;

/// Platform directories shared by the CA store and the log files.
pub fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "neoproxy", "Neoproxy")
}
