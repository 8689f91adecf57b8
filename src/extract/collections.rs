//! Collection references on a results page and collection page headers.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::normalize::{self, clean_text, collection_id_from_href, normalize_image_src};
use crate::models::{Collection, CollectionStub, Item};

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static ANCHOR_IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[src]").unwrap());

/// Structured renderer-level title element.
static RENDERER_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("yt-formatted-string#text-container").unwrap());
/// Headings tried when the renderer title is missing.
static HEADING_TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static HEADER_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[class*='yt-img-shadow']").unwrap());

/// Title and image found on a collection's own page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionHeader {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
}

/// Find every collection referenced on a search results page.
///
/// Ids are deduplicated keeping first-seen order, which is the relevance
/// ranking; `rank` records that order.
pub fn extract_collections(html: &str) -> Vec<CollectionStub> {
    let document = Html::parse_document(html);
    let mut stubs: Vec<CollectionStub> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(collection_id) = collection_id_from_href(href) else {
            continue;
        };

        let title_hint = anchor_title(&anchor);
        let thumbnail_hint = anchor
            .select(&ANCHOR_IMAGE)
            .filter_map(|img| img.value().attr("src"))
            .find_map(normalize_image_src);

        match by_id.get(&collection_id) {
            Some(&idx) => {
                // Later anchors for the same id only fill in missing hints.
                let stub = &mut stubs[idx];
                if stub.title_hint.is_none() {
                    stub.title_hint = title_hint;
                }
                if stub.thumbnail_hint.is_none() {
                    stub.thumbnail_hint = thumbnail_hint;
                }
            }
            None => {
                let rank = stubs.len();
                by_id.insert(collection_id.clone(), rank);
                let mut stub = CollectionStub::new(collection_id, rank);
                stub.title_hint = title_hint;
                stub.thumbnail_hint = thumbnail_hint;
                stubs.push(stub);
            }
        }
    }

    debug!("Found {} unique collection references", stubs.len());
    stubs
}

fn anchor_title(anchor: &ElementRef<'_>) -> Option<String> {
    anchor
        .value()
        .attr("title")
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            let text = clean_text(&anchor.text().collect::<String>());
            (!text.is_empty()).then_some(text)
        })
}

/// Read the title and header image from a collection page.
pub fn extract_collection_header(html: &str) -> CollectionHeader {
    let document = Html::parse_document(html);

    let title = first_text(&document, &RENDERER_TITLE).or_else(|| {
        debug!("No renderer title element, trying headings");
        first_text(&document, &HEADING_TITLE)
    });

    let thumbnail = document
        .select(&HEADER_IMAGE)
        .filter_map(|img| img.value().attr("src"))
        .find_map(normalize_image_src);

    CollectionHeader { title, thumbnail }
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(|el| clean_text(&el.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

/// Assemble the persisted collection record.
///
/// Title: page header, then the search anchor's hint, then [`normalize::UNTITLED`].
/// Thumbnail: page image, then the search anchor's image, then the first
/// item's derived thumbnail, then one synthesized from the collection id.
/// Neither field is ever blank. `item_count` is always `items.len()`.
pub fn build_collection(
    stub: &CollectionStub,
    header: &CollectionHeader,
    items: &[Item],
    scraped_at: DateTime<Utc>,
) -> Collection {
    let title = header
        .title
        .clone()
        .or_else(|| stub.title_hint.clone())
        .unwrap_or_else(|| {
            debug!(collection = %stub.collection_id, "No title found, using placeholder");
            normalize::UNTITLED.to_string()
        });

    let thumbnail = header
        .thumbnail
        .clone()
        .or_else(|| stub.thumbnail_hint.clone())
        .or_else(|| items.first().map(Item::derived_thumbnail))
        .unwrap_or_else(|| normalize::thumbnail_url(&stub.collection_id));

    Collection::new(
        &stub.collection_id,
        &title,
        thumbnail,
        items.len() as u32,
        scraped_at,
    )
}
