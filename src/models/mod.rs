//! Data models for scraped collections and their items.

mod collection;
mod item;
mod run;

pub use collection::{Collection, CollectionStub};
pub use item::Item;
pub use run::{CollectionFailure, RunState, RunSummary, SearchLimits, SortOrder};
