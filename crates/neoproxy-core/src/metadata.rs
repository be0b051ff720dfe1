//! Game name extraction from game page HTML.

use std::borrow::Cow;
use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::registry::ResourceName;

const BROTLI_BUFFER_SIZE: usize = 4096;

static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<meta property="og:title" content="Games Room - ([^"]+)"/>"#)
        .expect("valid og:title regex")
});

/// Extracts the canonical game name from the page's `og:title` meta tag.
///
/// The body is decoded lossily; invalid UTF-8 never fails the extraction.
pub fn extract_name(html: &[u8]) -> Option<ResourceName> {
    let text = String::from_utf8_lossy(html);
    let title = TITLE_RE.captures(&text)?.get(1)?.as_str();
    ResourceName::from_title(title)
}

/// Undoes gzip, deflate or brotli `Content-Encoding` on a buffered body.
///
/// Unknown encodings and corrupt streams return the body unchanged.
pub fn decode_body<'a>(body: &'a [u8], content_encoding: Option<&str>) -> Cow<'a, [u8]> {
    let encoding = match content_encoding {
        Some(e) => e.trim().to_ascii_lowercase(),
        None => return Cow::Borrowed(body),
    };

    let mut decoded = Vec::new();
    let result = match encoding.as_str() {
        "gzip" | "x-gzip" => GzDecoder::new(body).read_to_end(&mut decoded),
        "deflate" => ZlibDecoder::new(body).read_to_end(&mut decoded),
        "br" => brotli::Decompressor::new(body, BROTLI_BUFFER_SIZE).read_to_end(&mut decoded),
        _ => return Cow::Borrowed(body),
    };

    match result {
        Ok(_) => Cow::Owned(decoded),
        Err(e) => {
            tracing::debug!("Failed to decode {} body: {}", encoding, e);
            Cow::Borrowed(body)
        }
    }
}
