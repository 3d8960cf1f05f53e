// Card Catalog - Core Library
// Listing-title extraction, canonical titles, duplicate merging and price repair

pub mod assembler;
pub mod config;
pub mod data_quality;
pub mod db;
pub mod deduplication;
pub mod error;
pub mod extract;
pub mod parser;
pub mod pipeline;
pub mod rules;
pub mod terms;

// Re-export commonly used types
pub use assembler::{TitleAssembler, TitleField, DEFAULT_LAYOUT};
pub use config::PipelineConfig;
pub use data_quality::{Correction, PriceAnomalyCorrector, PriceField};
pub use db::{
    CardRecord, Event, MergeReport, PriceFields, UpsertStats,
    open_database, setup_database, upsert_cards, get_all_cards, get_card,
    get_cards_needing_review, get_cards_by_canonical_title, verify_count,
    apply_merge_group, apply_merge_groups, merge_duplicates,
    apply_corrections, repair_prices, export_cards_csv,
    insert_event, get_events_for_entity,
};
pub use deduplication::{DuplicateMerger, MergeGroup};
pub use error::{ConfigError, ConfigResult, PipelineError};
pub use extract::{ExtractedFields, GradeStripper, NumberPolicy, ReviewReason};
pub use parser::{
    ListingSource, LoadOutcome, RawListing, SourceFormat,
    CsvListingSource, JsonListingSource,
    detect_format, get_source, load_listings,
};
pub use pipeline::{BatchOutcome, BatchSummary, ExtractedListing, Pipeline};
pub use rules::{RewriteRule, RuleEngine};
pub use terms::{BrandEntry, TermListData, TermLists};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
