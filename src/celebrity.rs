use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Characters escaped the same way `encodeURIComponent` escapes them, so
/// URLs built here match what the front end historically produced.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const FALLBACK_SEARCH_BASE: &str = "https://www.google.com/search?tbm=isch&q=";

const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".webp"];

/// Outcome of a celebrity image lookup. Always carries a usable URL; the
/// flag records whether the deterministic search fallback was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CelebrityImage {
    pub url: String,
    pub used_fallback: bool,
}

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Accepts only well-formed URLs that end in a recognized image extension.
pub fn is_valid_image_url(candidate: &str) -> bool {
    if Url::parse(candidate).is_err() {
        return false;
    }
    let lowered = candidate.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
}

/// Deterministic image-search URL for a celebrity name. Total: any input
/// yields a syntactically valid URL.
pub fn fallback_search_url(celebrity_name: &str) -> String {
    format!(
        "{}{}",
        FALLBACK_SEARCH_BASE,
        encode_component(celebrity_name)
    )
}

/// Collapses an optional lookup candidate into a guaranteed URL. Invalid or
/// absent candidates degrade to the search fallback; this function never
/// fails.
pub fn resolve_image_url(celebrity_name: &str, candidate: Option<&str>) -> CelebrityImage {
    match candidate {
        Some(url) if is_valid_image_url(url) => CelebrityImage {
            url: url.to_string(),
            used_fallback: false,
        },
        Some(url) => {
            log::warn!(
                "Celebrity image lookup for '{}' returned an unusable URL ({}), using search fallback",
                celebrity_name,
                url
            );
            CelebrityImage {
                url: fallback_search_url(celebrity_name),
                used_fallback: true,
            }
        }
        None => CelebrityImage {
            url: fallback_search_url(celebrity_name),
            used_fallback: true,
        },
    }
}

/// Percent-decodes a stored celebrity URL. Inputs that do not decode to
/// valid UTF-8 are used unchanged.
pub fn decoded_url(raw: &str) -> String {
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => {
            log::warn!("Could not decode celebrity URL, using original value: {}", raw);
            raw.to_string()
        }
    }
}

/// Rewrites a celebrity image URL through the image proxy, normalizing
/// hotlinking and cross-origin behavior for the front end. The raw URL is
/// decoded once, then re-encoded as the proxy's query parameter.
pub fn proxied_image_url(proxy_base: &str, raw: &str) -> String {
    format!(
        "{}/?url={}",
        proxy_base.trim_end_matches('/'),
        encode_component(&decoded_url(raw))
    )
}
