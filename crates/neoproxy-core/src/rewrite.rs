//! URL rewriting for SWF and config requests.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static NESTED_GAMES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/games/.*/games/").expect("valid nested games regex"));

/// Redirects `url` to `host`, collapses doubled `games` path segments and
/// appends `<param>=<timestamp_ms>`.
///
/// Returns `None` if the URL cannot be parsed or the host is rejected.
pub fn rewrite_url(url: &str, host: &str, param: &str, timestamp_ms: i64) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_host(Some(host)).ok()?;

    let collapsed = NESTED_GAMES_RE.replace_all(parsed.as_str(), "/games/");
    let collapsed = collapsed.replace("games/games", "games");

    let separator = if collapsed.contains('?') { '&' } else { '?' };
    Some(format!("{}{}{}={}", collapsed, separator, param, timestamp_ms))
}
