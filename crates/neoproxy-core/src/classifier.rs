//! URL classification.
//!
//! Stateless predicates and extractors that decide which pipeline branch a
//! URL belongs to. The dedup and rewrite predicates are plain substring
//! matches and over-match on purpose: any URL mentioning `play_flash`, or
//! `.swf` anywhere, qualifies.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::flow::Flow;

/// Path marker of a game page.
pub const GAME_PAGE_MARKER: &str = "games/game.phtml";

/// Query parameter marker carrying the game ID.
pub const RESOURCE_ID_MARKER: &str = "game_id=";

/// Marker of the play-flash action.
pub const PLAY_FLASH_MARKER: &str = "play_flash";

/// Config files that are rewritten alongside SWFs.
pub const CONFIG_FILE_MARKERS: &[&str] = &["/config.xml", "/shellconfig.xml"];

static RESOURCE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"game_id=(\d+)").expect("valid resource id regex"));
static VERSION_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"g\d+_v\d+").expect("valid version tag regex"));
static SWF_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/([^/]+\.swf)").expect("valid swf file regex"));
static SWF_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"g(\d+)_v").expect("valid swf id regex"));

/// Numeric identifier of a game, as found in a URL.
///
/// Only the classifier produces these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(String);

impl ResourceId {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Versioned asset referenced by a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    /// Trailing `.swf` path segment, e.g. `g772_v24_14240.swf`.
    pub file_name: String,
    /// Game ID embedded in the file name.
    pub resource_id: ResourceId,
}

/// Extracts the game ID following `game_id=`.
pub fn extract_resource_id(url: &str) -> Option<ResourceId> {
    RESOURCE_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| ResourceId::new(m.as_str()))
}

/// Extracts the SWF file name and the game ID embedded in it.
pub fn extract_asset_info(url: &str) -> Option<AssetInfo> {
    let file_name = SWF_FILE_RE.captures(url)?.get(1)?.as_str();
    let id = SWF_ID_RE.captures(file_name)?.get(1)?.as_str();

    Some(AssetInfo {
        file_name: file_name.to_string(),
        resource_id: ResourceId::new(id),
    })
}

/// URL classifier bound to one origin domain.
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    origin_domain: String,
}

impl UrlClassifier {
    /// Creates a classifier for the given origin domain.
    pub fn new(origin_domain: impl Into<String>) -> Self {
        Self {
            origin_domain: origin_domain.into(),
        }
    }

    /// Returns the origin domain.
    pub fn origin_domain(&self) -> &str {
        &self.origin_domain
    }

    fn on_origin(&self, url: &str) -> bool {
        url.contains(self.origin_domain.as_str())
    }

    /// Game page carrying a game ID parameter.
    pub fn is_game_page_url(&self, url: &str) -> bool {
        self.on_origin(url) && url.contains(GAME_PAGE_MARKER) && url.contains(RESOURCE_ID_MARKER)
    }

    /// Per-game versioned SWF asset (e.g. `g772_v24`).
    pub fn is_asset_url(&self, url: &str) -> bool {
        self.on_origin(url) && url.contains(".swf") && VERSION_TAG_RE.is_match(url)
    }

    /// Play-flash request eligible for response deduplication.
    pub fn is_dedup_candidate_url(&self, url: &str) -> bool {
        self.on_origin(url) && url.contains(PLAY_FLASH_MARKER)
    }

    /// SWF or config request that gets redirected to the asset host.
    pub fn is_rewrite_candidate_url(&self, url: &str) -> bool {
        url.contains(".swf") || CONFIG_FILE_MARKERS.iter().any(|m| url.contains(m))
    }

    /// HTML response to a game page request.
    pub fn is_game_page_html_response<F: Flow + ?Sized>(&self, flow: &F) -> bool {
        if !flow.request_url().contains(GAME_PAGE_MARKER) || flow.response_status().is_none() {
            return false;
        }

        flow.response_header("content-type")
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }
}

impl Default for UrlClassifier {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_ORIGIN_DOMAIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::MemoryFlow;

    const GAME_PAGE: &str = "https://www.neopets.com/games/game.phtml?game_id=500&size=regular";
    const ASSET: &str =
        "https://images.neopets.com/games/gaming_system/g500_v24_14240.swf?r=123";

    fn classifier() -> UrlClassifier {
        UrlClassifier::default()
    }

    // ==================== Game page Tests ====================

    #[test]
    fn game_page_detected() {
        assert!(classifier().is_game_page_url(GAME_PAGE));
    }

    #[test]
    fn game_page_requires_id_param() {
        assert!(!classifier().is_game_page_url("https://www.neopets.com/games/game.phtml"));
    }

    #[test]
    fn game_page_requires_origin() {
        assert!(!classifier().is_game_page_url("https://example.com/games/game.phtml?game_id=5"));
    }

    #[test]
    fn extract_resource_id_takes_digit_run() {
        let id = extract_resource_id(GAME_PAGE).unwrap();
        assert_eq!(id.as_str(), "500");
        assert_eq!(extract_resource_id(GAME_PAGE), Some(id));
    }

    #[test]
    fn extract_resource_id_without_digits() {
        assert!(extract_resource_id("https://www.neopets.com/games/game.phtml?game_id=abc").is_none());
    }

    // ==================== Asset Tests ====================

    #[test]
    fn asset_url_needs_version_tag() {
        assert!(classifier().is_asset_url(ASSET));
        assert!(!classifier().is_asset_url("https://images.neopets.com/games/clients/shell.swf"));
    }

    #[test]
    fn extract_asset_info_from_url() {
        let info = extract_asset_info(ASSET).unwrap();
        assert_eq!(info.file_name, "g500_v24_14240.swf");
        assert_eq!(info.resource_id.as_str(), "500");
    }

    #[test]
    fn extract_asset_info_without_id() {
        assert!(extract_asset_info("https://images.neopets.com/games/shell.swf").is_none());
        assert!(extract_asset_info("https://images.neopets.com/games/config.xml").is_none());
    }

    // ==================== Dedup / rewrite Tests ====================

    #[test]
    fn dedup_matches_play_flash_anywhere() {
        let c = classifier();
        assert!(c.is_dedup_candidate_url("https://www.neopets.com/play_flash.phtml?id=5"));
        assert!(c.is_dedup_candidate_url("https://www.neopets.com/misc?ref=play_flash_button"));
        assert!(!c.is_dedup_candidate_url("https://example.com/play_flash.phtml"));
    }

    #[test]
    fn rewrite_matches_swf_and_configs() {
        let c = classifier();
        assert!(c.is_rewrite_candidate_url("https://cdn.example.com/x/shell.swf"));
        assert!(c.is_rewrite_candidate_url("https://www.neopets.com/games/a/config.xml"));
        assert!(c.is_rewrite_candidate_url("https://www.neopets.com/games/a/shellconfig.xml"));
        assert!(!c.is_rewrite_candidate_url("https://www.neopets.com/games/a/other.xml"));
    }

    // ==================== HTML response Tests ====================

    #[test]
    fn game_page_html_response() {
        let flow = MemoryFlow::request(GAME_PAGE).with_response(
            200,
            vec![("Content-Type".into(), "Text/HTML; charset=utf-8".into())],
            "",
        );
        assert!(classifier().is_game_page_html_response(&flow));
    }

    #[test]
    fn game_page_non_html_response() {
        let flow = MemoryFlow::request(GAME_PAGE).with_response(
            200,
            vec![("content-type".into(), "application/json".into())],
            "",
        );
        assert!(!classifier().is_game_page_html_response(&flow));
    }

    #[test]
    fn game_page_without_response() {
        let flow = MemoryFlow::request(GAME_PAGE);
        assert!(!classifier().is_game_page_html_response(&flow));
    }
}
