//! Identifier extraction, text truncation and derived URLs.
//!
//! Every URL here is a pure function of an identifier so that persisted
//! records stay compatible with links produced by earlier runs.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Item, SortOrder};

/// Maximum collection title length, in characters.
pub const MAX_COLLECTION_TITLE: usize = 200;
/// Maximum item title length, in characters.
pub const MAX_ITEM_TITLE: usize = 300;
/// Title used when every fallback in the chain comes up empty.
pub const UNTITLED: &str = "Untitled";

const WATCH_BASE: &str = "https://www.youtube.com/watch?v=";
const EMBED_BASE: &str = "https://www.youtube.com/embed/";
const PLAYLIST_BASE: &str = "https://www.youtube.com/playlist?list=";
const PIPED_EMBED_BASE: &str = "https://piped.video/embed/";
const INVIDIOUS_EMBED_BASE: &str = "https://inv.tux.pizza/embed/";

/// Collection reference inside a link target: `/playlist?list=<id>`.
static COLLECTION_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/playlist\?list=([A-Za-z0-9_-]+)").unwrap());

/// Item reference inside a link target: `v=<id>`.
static ITEM_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]v=([A-Za-z0-9_-]+)").unwrap());

/// Watch, short and embed links carrying a canonical 11-character id.
static ANY_ITEM_LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?(?:[^#]*&)?v=|youtu\.be/|youtube\.com/embed/)([A-Za-z0-9_-]{11})")
        .unwrap()
});

static VALID_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Extract a collection id from a link target, if it references one.
pub fn collection_id_from_href(href: &str) -> Option<String> {
    COLLECTION_ID_PATTERN
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract an item id from a link target such as `/watch?v=abc&list=...`.
pub fn item_id_from_href(href: &str) -> Option<String> {
    ITEM_ID_PATTERN
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Resolve a user-supplied item reference: a bare id, or a watch/short/embed URL.
pub fn item_id_from_url(input: &str) -> Option<String> {
    let input = input.trim();
    if is_valid_id(input) {
        return Some(input.to_string());
    }
    ANY_ITEM_LINK_PATTERN
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Check that an id only uses the permissive identifier alphabet.
pub fn is_valid_id(id: &str) -> bool {
    VALID_ID.is_match(id)
}

/// Truncate to at most `max` characters. Never splits a character.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Collapse runs of whitespace and trim, like a rendered text node.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize an element-provided image source.
///
/// Returns `None` for blank, inline (`data:`) or otherwise unusable sources so
/// callers fall through to the next thumbnail candidate.
pub fn normalize_image_src(src: &str) -> Option<String> {
    let src = src.trim();
    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    if src.starts_with("https://") || src.starts_with("http://") {
        return Some(src.to_string());
    }
    None
}

pub fn watch_url(item_id: &str) -> String {
    format!("{}{}", WATCH_BASE, item_id)
}

pub fn embed_url(item_id: &str) -> String {
    format!("{}{}", EMBED_BASE, item_id)
}

/// Embed URLs on alternative front-ends, in preference order.
pub fn alternate_embed_urls(item_id: &str) -> [String; 2] {
    [
        format!("{}{}", PIPED_EMBED_BASE, item_id),
        format!("{}{}", INVIDIOUS_EMBED_BASE, item_id),
    ]
}

pub fn thumbnail_url(id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/hqdefault.jpg", id)
}

pub fn collection_url(collection_id: &str) -> String {
    format!("{}{}", PLAYLIST_BASE, collection_id)
}

/// Search results target for collections matching `query`.
///
/// The query is form-encoded (spaces become `+`) and suffixed with `+playlist`.
pub fn search_url(query: &str, sort: SortOrder) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.trim().as_bytes()).collect();
    let mut target = format!(
        "https://www.youtube.com/results?search_query={}+playlist",
        encoded
    );
    if let Some(sp) = sort.filter_param() {
        target.push_str("&sp=");
        target.push_str(sp);
    }
    target
}

/// Drop repeated item ids (first occurrence wins) and renumber positions 1..=n.
pub fn dedupe_and_renumber(items: Vec<Item>) -> Vec<Item> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.item_id.clone()))
        .enumerate()
        .map(|(idx, mut item)| {
            item.position = idx as u32 + 1;
            item
        })
        .collect()
}
