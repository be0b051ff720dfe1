//! Neoproxy Core - flow classification and content substitution.
//!
//! This crate holds everything the proxy decides per request and per
//! response, independent of the proxy engine that carries the traffic.
//!
//! ## Components
//!
//! - [`classifier`]: URL shape predicates and ID extraction
//! - [`registry`]: games seen this session and their scraped names
//! - [`cache`]: exact-URL response cache for play-flash deduplication
//! - [`assets`]: substitute SWF lookup under `<root>/<name>/<file>`
//! - [`metadata`]: game name extraction from page HTML
//! - [`rewrite`]: host redirection with cache busting
//! - [`pipeline`]: the [`Interceptor`] tying the above together
//!
//! Engines drive the pipeline through the [`Flow`] trait.
//!
//! ```
//! use neoproxy_core::{Interceptor, MemoryFlow, RequestOutcome};
//!
//! let interceptor = Interceptor::default();
//! let mut flow = MemoryFlow::request("https://www.neopets.com/games/game.phtml?game_id=500");
//!
//! assert!(matches!(
//!     interceptor.on_request(&mut flow),
//!     RequestOutcome::Observed { first_seen: true, .. }
//! ));
//! assert_eq!(interceptor.registry().seen_count(), 1);
//! ```

pub mod assets;
pub mod cache;
pub mod classifier;
pub mod config;
mod error;
pub mod flow;
pub mod metadata;
pub mod pipeline;
pub mod registry;
pub mod rewrite;
pub mod stats;

pub use assets::{AssetResolver, AssetStore, FsAssetStore};
pub use cache::{CachedResponse, ResponseCache};
pub use classifier::{extract_asset_info, extract_resource_id, AssetInfo, ResourceId, UrlClassifier};
pub use config::InterceptConfig;
pub use error::{AssetError, ConfigError};
pub use flow::{Flow, Headers, MemoryFlow, SyntheticResponse};
pub use metadata::extract_name;
pub use pipeline::{Interceptor, RequestOutcome, ResponseOutcome};
pub use registry::{ResourceName, ResourceRegistry};
pub use rewrite::rewrite_url;
pub use stats::{InterceptStats, SessionSummary, StatsSnapshot};
