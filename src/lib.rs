// Vendor Reorder - Core Library
// Previous-items pipeline: find past orders for a vendor, collapse their lines
// into a catalog, and merge picked entries back into the order being drafted.

pub mod config;
pub mod error;
pub mod model;
pub mod filter;
pub mod source;         // List service seam: in-memory fixtures + REST
pub mod guard;          // Generation counter for overlapping runs
pub mod fetcher;        // Batched line queries
pub mod deduplication;  // Catalog builder
pub mod merge;          // Selection → draft lines
pub mod form;           // Form state container
pub mod aggregation;    // Vendor change → catalog orchestration
pub mod vendors;

// Re-export commonly used types
pub use config::Config;
pub use error::{CatalogError, Result};
pub use model::{
    CatalogEntry, CatalogSnapshot, DraftLineItem, OrderHeaderRef, RawLine, Record,
    SelectionSet, VendorId,
};
pub use filter::{quote_literal, Filter, Literal};
pub use source::{InMemoryListService, ListQuery, ListService, RestListService};
pub use guard::{RunOutcome, RunToken, StalenessGuard};
pub use fetcher::ChunkedFetcher;
pub use deduplication::{CatalogBuild, CatalogBuilder, format_currency, format_price};
pub use merge::merge_selections;
pub use form::{FormHandle, FormState};
pub use aggregation::AggregationOrchestrator;
pub use vendors::{load_vendors, VendorOption};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
