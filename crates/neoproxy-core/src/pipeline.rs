//! The interception pipeline.
//!
//! [`Interceptor`] owns all session state and is invoked once per request
//! and once per response by the proxy engine.
//!
//! ## Request hook (first match wins)
//!
//! ```text
//! game page?      → record game ID as seen
//! versioned SWF?  → substitute payload from the asset store, if present
//! play_flash?     → answer from the response cache, if present
//! SWF / config?   → redirect to the asset host with a cache buster
//! otherwise       → pass through
//! ```
//!
//! ## Response hook (both may fire)
//!
//! ```text
//! play_flash + 200       → cache body and headers under the exact URL
//! game page + text/html  → scrape the game name, first write wins
//! ```
//!
//! Every failure inside a hook degrades to leaving the flow untouched.

use std::sync::Arc;

use bytes::Bytes;

use crate::assets::{AssetResolver, AssetStore};
use crate::cache::ResponseCache;
use crate::classifier::{
    extract_asset_info, extract_resource_id, ResourceId, UrlClassifier, GAME_PAGE_MARKER,
};
use crate::config::InterceptConfig;
use crate::flow::{Flow, Headers, SyntheticResponse};
use crate::metadata::{decode_body, extract_name};
use crate::registry::{ResourceName, ResourceRegistry};
use crate::rewrite::rewrite_url;
use crate::stats::{InterceptStats, SessionSummary};

/// Content type of injected payloads.
pub const SWF_CONTENT_TYPE: &str = "application/x-shockwave-flash";

/// Longest URL prefix written to log lines.
const LOG_URL_LIMIT: usize = 100;

/// Source of the cache-busting timestamp, in milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// What the request hook did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A game page request was recorded.
    Observed {
        /// The game ID.
        id: ResourceId,
        /// Whether this was the first request for the game.
        first_seen: bool,
    },
    /// The request was answered with a substitute SWF.
    Injected {
        /// Game name used for the lookup.
        name: ResourceName,
        /// Asset file name.
        file_name: String,
        /// Payload size.
        bytes: usize,
    },
    /// The request was answered from the response cache.
    ServedFromCache,
    /// The request was redirected.
    Rewritten {
        /// The new URL.
        to: String,
    },
    /// Nothing was changed.
    PassThrough,
}

/// What the response hook did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseOutcome {
    /// The response was stored in the response cache.
    pub cached: bool,
    /// A game name was recorded.
    pub name_recorded: bool,
}

/// Per-session interception state and decision logic.
pub struct Interceptor {
    config: InterceptConfig,
    classifier: UrlClassifier,
    registry: ResourceRegistry,
    cache: ResponseCache,
    assets: AssetResolver,
    stats: InterceptStats,
    clock: Clock,
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("cached_responses", &self.cache.len())
            .field("assets", &self.assets)
            .field("clock", &"Clock")
            .finish()
    }
}

impl Interceptor {
    /// Creates an interceptor reading payloads from `config.asset_root`.
    pub fn new(config: InterceptConfig) -> Self {
        Self {
            classifier: UrlClassifier::new(config.origin_domain.clone()),
            assets: AssetResolver::new(config.asset_root.clone()),
            registry: ResourceRegistry::new(),
            cache: ResponseCache::new(),
            stats: InterceptStats::default(),
            clock: Arc::new(|| chrono::Utc::now().timestamp_millis()),
            config,
        }
    }

    /// Replaces the asset store (the root stays `config.asset_root`).
    pub fn with_asset_store(mut self, store: Arc<dyn AssetStore>) -> Self {
        self.assets = AssetResolver::with_store(self.config.asset_root.clone(), store);
        self
    }

    /// Replaces the cache-busting clock.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &InterceptConfig {
        &self.config
    }

    /// Returns the URL classifier.
    pub fn classifier(&self) -> &UrlClassifier {
        &self.classifier
    }

    /// Returns the game registry.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Returns the response cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Returns the session counters.
    pub fn stats(&self) -> &InterceptStats {
        &self.stats
    }

    /// Whether the response hook will read the body for this URL.
    ///
    /// Engines can skip buffering bodies for every other response.
    pub fn needs_response_body(&self, url: &str) -> bool {
        self.classifier.is_dedup_candidate_url(url) || url.contains(GAME_PAGE_MARKER)
    }

    /// Request hook.
    pub fn on_request<F: Flow + ?Sized>(&self, flow: &mut F) -> RequestOutcome {
        let url = flow.request_url().to_string();

        if self.classifier.is_game_page_url(&url) {
            match extract_resource_id(&url) {
                Some(id) => self.observe_game_page(id),
                None => RequestOutcome::PassThrough,
            }
        } else if self.classifier.is_asset_url(&url) {
            self.inject_asset(flow, &url)
        } else if self.classifier.is_dedup_candidate_url(&url) {
            self.serve_cached(flow, &url)
        } else if self.classifier.is_rewrite_candidate_url(&url) {
            self.rewrite(flow, &url)
        } else {
            RequestOutcome::PassThrough
        }
    }

    /// Response hook.
    pub fn on_response<F: Flow + ?Sized>(&self, flow: &mut F) -> ResponseOutcome {
        let url = flow.request_url().to_string();
        let mut outcome = ResponseOutcome::default();

        if self.classifier.is_dedup_candidate_url(&url) && flow.response_status() == Some(200) {
            outcome.cached = self.cache_response(&*flow, &url);
        }

        if self.classifier.is_game_page_html_response(&*flow) {
            outcome.name_recorded = self.record_game_name(&*flow, &url);
        }

        outcome
    }

    /// Builds the shutdown report.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            games_seen: self
                .registry
                .seen_ids()
                .into_iter()
                .map(|id| id.to_string())
                .collect(),
            game_names: self
                .registry
                .names()
                .into_iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
            cached_responses: self.cache.len(),
            stats: self.stats.snapshot(),
        }
    }

    fn observe_game_page(&self, id: ResourceId) -> RequestOutcome {
        let already_seen = self.registry.record_seen(&id);
        if already_seen {
            tracing::debug!(
                "Already monitoring {} (ID: {})",
                self.registry.display_name(&id),
                id
            );
        } else {
            tracing::info!("Monitoring game ID {} (waiting for page load to get name)", id);
        }

        RequestOutcome::Observed {
            id,
            first_seen: !already_seen,
        }
    }

    fn inject_asset<F: Flow + ?Sized>(&self, flow: &mut F, url: &str) -> RequestOutcome {
        let info = match extract_asset_info(url) {
            Some(info) => info,
            None => return RequestOutcome::PassThrough,
        };

        let name = self.registry.display_name(&info.resource_id);

        match self.assets.resolve(&name, &info.file_name) {
            Ok(Some(payload)) => {
                let bytes = payload.len();
                flow.respond(SyntheticResponse::ok(payload, swf_headers(bytes)));
                self.stats.record_injection();
                tracing::info!("SWF injected: {}/{} ({} bytes)", name, info.file_name, bytes);

                RequestOutcome::Injected {
                    name,
                    file_name: info.file_name,
                    bytes,
                }
            }
            Ok(None) => {
                tracing::info!("No substitute SWF found: {}/{}", name, info.file_name);
                RequestOutcome::PassThrough
            }
            Err(e) => {
                tracing::error!(
                    "Error loading substitute SWF {}/{}: {}",
                    name,
                    info.file_name,
                    e
                );
                RequestOutcome::PassThrough
            }
        }
    }

    fn serve_cached<F: Flow + ?Sized>(&self, flow: &mut F, url: &str) -> RequestOutcome {
        match self.cache.lookup(url) {
            Some(entry) => {
                flow.respond(SyntheticResponse::ok(entry.body, entry.headers));
                self.stats.record_cache_hit();
                tracing::info!("Served cached play_flash response for {}", abbreviate(url));
                RequestOutcome::ServedFromCache
            }
            None => {
                tracing::debug!("First play_flash request, will cache {}", abbreviate(url));
                RequestOutcome::PassThrough
            }
        }
    }

    fn rewrite<F: Flow + ?Sized>(&self, flow: &mut F, url: &str) -> RequestOutcome {
        let timestamp = (self.clock)();
        let rewritten = rewrite_url(
            url,
            &self.config.asset_host,
            &self.config.cache_buster_param,
            timestamp,
        );

        match rewritten {
            Some(to) => {
                flow.set_request_host(&self.config.asset_host);
                flow.set_request_url(&to);
                self.stats.record_rewrite();
                tracing::info!("URL rewritten: {} -> {}", url, to);
                RequestOutcome::Rewritten { to }
            }
            None => {
                tracing::warn!("Could not rewrite URL {}", abbreviate(url));
                RequestOutcome::PassThrough
            }
        }
    }

    fn cache_response<F: Flow + ?Sized>(&self, flow: &F, url: &str) -> bool {
        let body = match flow.response_body() {
            Some(body) => body,
            None => {
                tracing::debug!("play_flash response body unavailable for {}", abbreviate(url));
                return false;
            }
        };

        self.cache.store(url, body, flow.response_headers());
        self.stats.record_cache_store();
        tracing::info!("Cached play_flash response for {}", abbreviate(url));
        true
    }

    fn record_game_name<F: Flow + ?Sized>(&self, flow: &F, url: &str) -> bool {
        let id = match extract_resource_id(url) {
            Some(id) => id,
            None => return false,
        };

        if self.registry.has_name(&id) {
            return false;
        }

        let body = flow.response_body().unwrap_or_else(Bytes::new);
        let encoding = flow.response_header("content-encoding");
        let html = decode_body(&body, encoding.as_deref());

        let name = match extract_name(&html) {
            Some(name) => name,
            None => {
                tracing::warn!("Could not extract game name for ID: {}", id);
                return false;
            }
        };

        if !self.registry.record_name(&id, name.clone()) {
            return false;
        }

        self.stats.record_name_resolved();
        tracing::info!("Extracted game name: {} (ID: {})", name, id);
        true
    }
}

impl Default for Interceptor {
    fn default() -> Self {
        Self::new(InterceptConfig::default())
    }
}

/// Headers of an injected SWF response.
fn swf_headers(content_length: usize) -> Headers {
    [
        ("Content-Type", SWF_CONTENT_TYPE.to_string()),
        ("Content-Length", content_length.to_string()),
        ("Cache-Control", "no-cache".to_string()),
        ("Access-Control-Allow-Origin", "*".to_string()),
        ("Access-Control-Allow-Methods", "GET, POST, OPTIONS".to_string()),
        (
            "Access-Control-Allow-Headers",
            "Content-Type, Accept, Origin, User-Agent".to_string(),
        ),
        ("Access-Control-Allow-Credentials", "true".to_string()),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect()
}

/// Truncates a URL for logging.
fn abbreviate(url: &str) -> &str {
    match url.char_indices().nth(LOG_URL_LIMIT) {
        Some((idx, _)) => &url[..idx],
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;
    use std::path::{Path, PathBuf};

    use crate::flow::MemoryFlow;

    const GAME_PAGE: &str = "https://www.neopets.com/games/game.phtml?game_id=500";
    const ASSET: &str = "https://images.neopets.com/games/gaming_system/g500_v24_14240.swf";
    const PLAY_FLASH: &str = "https://www.neopets.com/play_flash.phtml?id=5";

    #[derive(Default)]
    struct MapStore(HashMap<PathBuf, Vec<u8>>);

    impl AssetStore for MapStore {
        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }
    }

    fn interceptor_with(files: &[(&str, &[u8])]) -> Interceptor {
        let store = MapStore(
            files
                .iter()
                .map(|(path, data)| (PathBuf::from(path), data.to_vec()))
                .collect(),
        );
        Interceptor::default()
            .with_asset_store(Arc::new(store))
            .with_clock(|| 1234)
    }

    fn html_response(url: &str, body: &str) -> MemoryFlow {
        MemoryFlow::request(url).with_response(
            200,
            vec![("content-type".into(), "text/html".into())],
            body.to_string(),
        )
    }

    #[test]
    fn game_page_request_is_observed() {
        let interceptor = interceptor_with(&[]);
        let mut flow = MemoryFlow::request(GAME_PAGE);

        let first = interceptor.on_request(&mut flow);
        let second = interceptor.on_request(&mut flow);

        assert!(matches!(first, RequestOutcome::Observed { first_seen: true, .. }));
        assert!(matches!(second, RequestOutcome::Observed { first_seen: false, .. }));
        assert!(flow.response.is_none());
        assert_eq!(interceptor.registry().seen_count(), 1);
    }

    #[test]
    fn asset_uses_placeholder_name_when_unknown() {
        let interceptor = interceptor_with(&[(
            "assets/swfs/unknown_game_500/g500_v24_14240.swf",
            b"SWF",
        )]);
        let mut flow = MemoryFlow::request(ASSET);

        let outcome = interceptor.on_request(&mut flow);
        assert!(matches!(outcome, RequestOutcome::Injected { bytes: 3, .. }));
    }

    #[test]
    fn injected_response_headers() {
        let interceptor = interceptor_with(&[(
            "assets/swfs/unknown_game_500/g500_v24_14240.swf",
            b"SWF",
        )]);
        let mut flow = MemoryFlow::request(ASSET);
        interceptor.on_request(&mut flow);

        let response = flow.response.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some(SWF_CONTENT_TYPE));
        assert_eq!(response.header("content-length"), Some("3"));
        assert_eq!(response.header("cache-control"), Some("no-cache"));
        assert_eq!(response.header("access-control-allow-origin"), Some("*"));
        assert_eq!(response.header("access-control-allow-credentials"), Some("true"));
        assert_eq!(interceptor.stats().snapshot().injected, 1);
    }

    #[test]
    fn missing_asset_passes_through_without_rewrite() {
        let interceptor = interceptor_with(&[]);
        let mut flow = MemoryFlow::request(ASSET);

        assert_eq!(interceptor.on_request(&mut flow), RequestOutcome::PassThrough);
        assert_eq!(flow.url, ASSET);
        assert!(flow.host.is_none());
        assert!(flow.response.is_none());
    }

    #[test]
    fn unversioned_swf_is_rewritten() {
        let interceptor = interceptor_with(&[]);
        let mut flow = MemoryFlow::request("https://swf.neopets.com/games/games/shell.swf");

        let outcome = interceptor.on_request(&mut flow);
        assert_eq!(
            outcome,
            RequestOutcome::Rewritten {
                to: "https://images.neopets.com/games/shell.swf?_nocache=1234".into()
            }
        );
        assert_eq!(flow.host.as_deref(), Some("images.neopets.com"));
        assert_eq!(flow.url, "https://images.neopets.com/games/shell.swf?_nocache=1234");
    }

    struct BrokenStore;

    impl AssetStore for BrokenStore {
        fn read(&self, _path: &Path) -> io::Result<Vec<u8>> {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        }
    }

    fn assert_untouched(flow: &MemoryFlow, url: &str) {
        assert_eq!(flow.url, url);
        assert!(flow.host.is_none());
        assert!(flow.response.is_none());
    }

    #[test]
    fn asset_io_error_passes_through() {
        let interceptor = Interceptor::default().with_asset_store(Arc::new(BrokenStore));
        let mut flow = MemoryFlow::request(ASSET);

        assert_eq!(interceptor.on_request(&mut flow), RequestOutcome::PassThrough);
        assert_untouched(&flow, ASSET);
        assert_eq!(interceptor.stats().snapshot().injected, 0);
        assert_eq!(interceptor.stats().snapshot().rewrites, 0);
    }

    #[test]
    fn unsafe_game_name_passes_through() {
        let interceptor = interceptor_with(&[("assets/g500_v24_14240.swf", b"SWF")]);
        let id = extract_resource_id(GAME_PAGE).unwrap();
        let name = ResourceName::from_title("..").unwrap();
        assert!(interceptor.registry().record_name(&id, name));

        let mut flow = MemoryFlow::request(ASSET);
        assert_eq!(interceptor.on_request(&mut flow), RequestOutcome::PassThrough);
        assert_untouched(&flow, ASSET);
    }

    #[test]
    fn unparsable_rewrite_target_passes_through() {
        let interceptor = interceptor_with(&[]);
        let mut flow = MemoryFlow::request("games/shell.swf");

        assert_eq!(interceptor.on_request(&mut flow), RequestOutcome::PassThrough);
        assert_untouched(&flow, "games/shell.swf");
        assert_eq!(interceptor.stats().snapshot().rewrites, 0);
    }

    #[test]
    fn game_page_without_numeric_id_stops_there() {
        let interceptor = interceptor_with(&[]);
        let url = "https://www.neopets.com/games/game.phtml?game_id=abc&next=/config.xml";
        let mut flow = MemoryFlow::request(url);

        assert_eq!(interceptor.on_request(&mut flow), RequestOutcome::PassThrough);
        assert_untouched(&flow, url);
        assert_eq!(interceptor.registry().seen_count(), 0);
    }

    #[test]
    fn brotli_game_page_name_recorded() {
        let page = r#"<meta property="og:title" content="Games Room - Meerca Chase"/>"#;
        let mut compressed = Vec::new();
        {
            use std::io::Write;
            let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(page.as_bytes()).unwrap();
        }

        let interceptor = interceptor_with(&[]);
        let mut flow = MemoryFlow::request(GAME_PAGE).with_response(
            200,
            vec![
                ("Content-Type".into(), "text/html; charset=utf-8".into()),
                ("Content-Encoding".into(), "br".into()),
            ],
            compressed,
        );

        assert!(interceptor.on_response(&mut flow).name_recorded);
        let id = extract_resource_id(GAME_PAGE).unwrap();
        assert_eq!(
            interceptor.registry().name_for(&id).unwrap().as_str(),
            "meerca_chase"
        );
    }

    #[test]
    fn unrelated_request_passes_through() {
        let interceptor = interceptor_with(&[]);
        let mut flow = MemoryFlow::request("https://www.neopets.com/index.phtml");
        assert_eq!(interceptor.on_request(&mut flow), RequestOutcome::PassThrough);
    }

    #[test]
    fn non_200_play_flash_is_not_cached() {
        let interceptor = interceptor_with(&[]);
        let mut flow = MemoryFlow::request(PLAY_FLASH).with_response(500, Vec::new(), "oops");

        let outcome = interceptor.on_response(&mut flow);
        assert!(!outcome.cached);
        assert!(interceptor.cache().is_empty());
    }

    #[test]
    fn play_flash_cache_round_trip() {
        let interceptor = interceptor_with(&[]);
        let headers = vec![("content-type".to_string(), "text/html".to_string())];

        let mut first = MemoryFlow::request(PLAY_FLASH);
        assert_eq!(interceptor.on_request(&mut first), RequestOutcome::PassThrough);

        let mut completed = first.with_response(200, headers.clone(), "DATA");
        assert!(interceptor.on_response(&mut completed).cached);

        let mut second = MemoryFlow::request(PLAY_FLASH);
        assert_eq!(interceptor.on_request(&mut second), RequestOutcome::ServedFromCache);

        let response = second.response.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, Bytes::from_static(b"DATA"));
        assert_eq!(response.headers, headers);
    }

    #[test]
    fn game_name_recorded_once() {
        let interceptor = interceptor_with(&[]);

        let mut flow = html_response(
            GAME_PAGE,
            r#"<meta property="og:title" content="Games Room - Meerca Chase"/>"#,
        );
        assert!(interceptor.on_response(&mut flow).name_recorded);

        let mut again = html_response(
            GAME_PAGE,
            r#"<meta property="og:title" content="Games Room - Something Else"/>"#,
        );
        assert!(!interceptor.on_response(&mut again).name_recorded);

        let id = extract_resource_id(GAME_PAGE).unwrap();
        assert_eq!(
            interceptor.registry().name_for(&id).unwrap().as_str(),
            "meerca_chase"
        );
    }

    #[test]
    fn game_page_without_title_leaves_registry_unchanged() {
        let interceptor = interceptor_with(&[]);
        let mut flow = html_response(GAME_PAGE, "<html></html>");

        assert!(!interceptor.on_response(&mut flow).name_recorded);
        assert!(interceptor.registry().names().is_empty());
    }

    #[test]
    fn needs_response_body_only_for_interesting_urls() {
        let interceptor = interceptor_with(&[]);
        assert!(interceptor.needs_response_body(PLAY_FLASH));
        assert!(interceptor.needs_response_body(GAME_PAGE));
        assert!(!interceptor.needs_response_body(ASSET));
        assert!(!interceptor.needs_response_body("https://www.neopets.com/"));
    }

    #[test]
    fn summary_reflects_session() {
        let interceptor = interceptor_with(&[]);
        interceptor.on_request(&mut MemoryFlow::request(GAME_PAGE));
        interceptor.on_response(&mut html_response(
            GAME_PAGE,
            r#"<meta property="og:title" content="Games Room - Meerca Chase"/>"#,
        ));

        let summary = interceptor.summary();
        assert_eq!(summary.games_seen, vec!["500".to_string()]);
        assert_eq!(
            summary.game_names,
            vec![("500".to_string(), "meerca_chase".to_string())]
        );
        assert_eq!(summary.stats.names_resolved, 1);
    }

    #[test]
    fn abbreviate_long_urls() {
        let long = format!("https://www.neopets.com/{}", "a".repeat(200));
        assert_eq!(abbreviate(&long).len(), LOG_URL_LIMIT);
        assert_eq!(abbreviate(PLAY_FLASH), PLAY_FLASH);
    }
}
