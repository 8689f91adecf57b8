//! Read-only queries over stored playlists.

use anyhow::Context;
use console::style;
use serde::Serialize;

use super::helpers::{print_empty_store_hint, print_json, store_for, truncate};
use crate::config::Settings;
use crate::extract::normalize;
use crate::models::{Collection, Item};

#[derive(Serialize)]
struct CollectionView<'a> {
    #[serde(flatten)]
    collection: &'a Collection,
    videos: &'a [Item],
}

#[derive(Serialize)]
struct ItemView<'a> {
    #[serde(flatten)]
    item: &'a Item,
    playlist_id: &'a str,
    playlist_title: &'a str,
    embed_urls: Vec<String>,
    related: &'a [Item],
}

/// List stored playlists, optionally filtered by title.
pub async fn cmd_collections(
    settings: &Settings,
    filter: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let store = store_for(settings)?;
    let collections = store
        .filter_collections(filter.unwrap_or(""))
        .await
        .context("Failed to read the playlist index")?;

    if json {
        return print_json(&collections);
    }

    if collections.is_empty() {
        println!("{} No playlists found", style("!").yellow());
        print_empty_store_hint();
        return Ok(());
    }

    println!("\n{}", style("Playlists").bold());
    println!("{}", "-".repeat(80));
    println!("{:<36} {:<28} {:>6} Scraped", "ID", "Title", "Videos");
    println!("{}", "-".repeat(80));
    for collection in &collections {
        println!(
            "{:<36} {:<28} {:>6} {}",
            truncate(&collection.collection_id, 36),
            truncate(&collection.title, 28),
            collection.item_count,
            collection.scraped_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!("{}", "-".repeat(80));
    println!("{} playlists", collections.len());

    Ok(())
}

/// Show one playlist with its videos.
pub async fn cmd_collection(settings: &Settings, collection_id: &str, json: bool) -> anyhow::Result<()> {
    let store = store_for(settings)?;
    let Some(collection) = store.find_collection(collection_id).await? else {
        println!("{} Playlist not found: {}", style("✗").red(), collection_id);
        print_empty_store_hint();
        return Ok(());
    };
    let items = store
        .load_items(collection_id)
        .await
        .with_context(|| format!("Failed to read videos for {}", collection_id))?
        .unwrap_or_default();

    if json {
        return print_json(&CollectionView {
            collection: &collection,
            videos: &items,
        });
    }

    println!("\n{}", style(&collection.title).bold());
    println!("  {}", collection.url);
    println!(
        "  {} videos, scraped {}",
        collection.item_count,
        collection.scraped_at.format("%Y-%m-%d %H:%M")
    );
    if items.is_empty() {
        println!("  {} No videos were found in this playlist", style("!").yellow());
        return Ok(());
    }
    println!();
    for item in &items {
        println!("{:>4}. {}", item.position, truncate(&item.title, 70));
        println!("      {}", style(item.embed_url()).dim());
    }

    Ok(())
}

/// Show one video, its embed links and related videos.
pub async fn cmd_item(
    settings: &Settings,
    reference: &str,
    related_limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let store = store_for(settings)?;
    let found = match normalize::item_id_from_url(reference) {
        Some(id) => store.find_item(&id).await?,
        None => None,
    };
    let Some((item, owner)) = found else {
        println!("{} Video not found: {}", style("✗").red(), reference);
        return Ok(());
    };
    let related = store.related_items(&item.item_id, related_limit).await?;

    if json {
        return print_json(&ItemView {
            item: &item,
            playlist_id: &owner.collection_id,
            playlist_title: &owner.title,
            embed_urls: item.embed_urls(),
            related: &related,
        });
    }

    println!("\n{}", style(&item.title).bold());
    println!("  {}", item.url);
    println!("  #{} in {} ({})", item.position, owner.title, owner.collection_id);
    println!("\n{}", style("Embed").bold());
    for url in item.embed_urls() {
        println!("  {}", url);
    }

    if !related.is_empty() {
        println!("\n{}", style("Related").bold());
        for other in &related {
            println!("  {:>4}. {}", other.position, truncate(&other.title, 70));
        }
    }

    Ok(())
}
