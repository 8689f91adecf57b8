//! Item rows on a collection page.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::normalize::{self, clean_text, dedupe_and_renumber, item_id_from_href, normalize_image_src};
use crate::models::Item;

static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ytd-playlist-video-renderer").unwrap());
static TITLE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a#video-title").unwrap());
static ROW_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[class*='yt-img-shadow']").unwrap());

/// Extract items from a collection page.
///
/// At most `max_items` rows are considered, in document order. Rows without
/// a title link, or whose link carries no item id, are skipped. Positions are
/// contiguous over the kept rows and item ids are unique.
pub fn extract_items(html: &str, collection_id: &str, max_items: usize) -> Vec<Item> {
    let document = Html::parse_document(html);
    let mut items = Vec::new();
    let mut skipped = 0usize;

    for row in document.select(&ROW).take(max_items) {
        match item_from_row(&row, collection_id, items.len() as u32 + 1) {
            Some(item) => items.push(item),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(collection = collection_id, skipped, "Skipped item rows without a usable link");
    }

    dedupe_and_renumber(items)
}

fn item_from_row(row: &ElementRef<'_>, collection_id: &str, position: u32) -> Option<Item> {
    let link = row.select(&TITLE_LINK).next()?;
    let item_id = item_id_from_href(link.value().attr("href")?)?;

    let title = link
        .value()
        .attr("title")
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| clean_text(&link.text().collect::<String>()));
    let title = if title.is_empty() {
        normalize::UNTITLED.to_string()
    } else {
        title
    };

    let thumbnail = row
        .select(&ROW_IMAGE)
        .filter_map(|img| img.value().attr("src"))
        .find_map(normalize_image_src);

    Some(Item::new(collection_id, &item_id, &title, position).with_thumbnail(thumbnail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(href: &str, title: &str) -> String {
        format!(
            r#"<ytd-playlist-video-renderer><a id="video-title" href="{}" title="{}"></a></ytd-playlist-video-renderer>"#,
            href, title
        )
    }

    #[test]
    fn test_row_without_title_link_is_skipped() {
        let html = format!(
            "<html><body>{}{}{}</body></html>",
            row("/watch?v=aaa&list=PL", "A"),
            r#"<ytd-playlist-video-renderer><span>no link</span></ytd-playlist-video-renderer>"#,
            row("/watch?v=bbb&list=PL", "B"),
        );
        let items = extract_items(&html, "PL", 50);
        assert_eq!(items.len(), 2);
        let positions: Vec<_> = items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(items[1].item_id, "bbb");
    }

    #[test]
    fn test_row_without_item_id_is_skipped() {
        let html = format!(
            "{}{}{}",
            row("/shorts/xyz", "Short"),
            row("/watch?v=aaa", "A"),
            row("/watch?v=bbb", "B"),
        );
        let items = extract_items(&html, "PL", 50);
        let ids: Vec<_> = items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["aaa", "bbb"]);
        assert_eq!(items[0].position, 1);
    }

    #[test]
    fn test_cap_applies_in_document_order() {
        let html = format!(
            "{}{}{}",
            row("/watch?v=aaa", "A"),
            row("/watch?v=bbb", "B"),
            row("/watch?v=ccc", "C"),
        );
        let items = extract_items(&html, "PL", 2);
        let ids: Vec<_> = items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["aaa", "bbb"]);
        assert!(extract_items(&html, "PL", 0).is_empty());
    }

    #[test]
    fn test_duplicate_ids_within_collection_collapse() {
        let html = format!(
            "{}{}{}",
            row("/watch?v=aaa", "A"),
            row("/watch?v=aaa&index=2", "A again"),
            row("/watch?v=bbb", "B"),
        );
        let items = extract_items(&html, "PL", 50);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].item_id, "bbb");
        assert_eq!(items[1].position, 2);
    }

    #[test]
    fn test_title_falls_back_to_text_then_placeholder() {
        let html = r#"
            <ytd-playlist-video-renderer>
              <a id="video-title" href="/watch?v=aaa">  Link  text </a>
            </ytd-playlist-video-renderer>
            <ytd-playlist-video-renderer>
              <a id="video-title" href="/watch?v=bbb"></a>
            </ytd-playlist-video-renderer>
        "#;
        let items = extract_items(html, "PL", 50);
        assert_eq!(items[0].title, "Link text");
        assert_eq!(items[1].title, "Untitled");
    }

    #[test]
    fn test_row_image_used_when_present() {
        let html = r#"
            <ytd-playlist-video-renderer>
              <img class="style-scope yt-img-shadow" src="//i.ytimg.com/vi/aaa/mq.jpg">
              <a id="video-title" href="/watch?v=aaa" title="A"></a>
            </ytd-playlist-video-renderer>
            <ytd-playlist-video-renderer>
              <img class="style-scope yt-img-shadow" src="">
              <a id="video-title" href="/watch?v=bbb" title="B"></a>
            </ytd-playlist-video-renderer>
        "#;
        let items = extract_items(html, "PL", 50);
        assert_eq!(items[0].thumbnail, "https://i.ytimg.com/vi/aaa/mq.jpg");
        assert_eq!(items[1].thumbnail, "https://img.youtube.com/vi/bbb/hqdefault.jpg");
    }
}
