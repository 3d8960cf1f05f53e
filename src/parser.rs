// 🏗️ Listing Sources
// Polymorphic loaders for scraped marketplace exports (CSV, JSON)

use crate::db::PriceFields;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// CORE TYPES
// ============================================================================

/// SourceFormat - which export layout a file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Csv,
    Json,
}

impl SourceFormat {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            SourceFormat::Csv => "CSV export",
            SourceFormat::Json => "JSON export",
        }
    }
}

/// RawListing - one scraped listing before extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub source_id: String,
    pub title: String,
    pub scraped_at: Option<DateTime<Utc>>,

    /// Market prices scraped alongside the title, if any
    #[serde(default)]
    pub prices: PriceFields,

    // Provenance
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub line_number: usize,
}

impl RawListing {
    pub fn new(source_id: &str, title: &str) -> Self {
        RawListing {
            source_id: source_id.to_string(),
            title: title.to_string(),
            scraped_at: None,
            prices: PriceFields::default(),
            source_file: String::new(),
            line_number: 0,
        }
    }

    /// Builder pattern: add scrape timestamp
    pub fn with_scraped_at(mut self, scraped_at: DateTime<Utc>) -> Self {
        self.scraped_at = Some(scraped_at);
        self
    }

    /// Builder pattern: add prices
    pub fn with_prices(mut self, prices: PriceFields) -> Self {
        self.prices = prices;
        self
    }

    /// Builder pattern: add provenance
    pub fn with_provenance(mut self, source_file: &str, line_number: usize) -> Self {
        self.source_file = source_file.to_string();
        self.line_number = line_number;
        self
    }
}

/// Everything a loader read: usable listings plus rows rejected up front
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub listings: Vec<RawListing>,
    pub rejected: Vec<PipelineError>,
}

// ============================================================================
// LOADER TRAIT
// ============================================================================

/// ListingSource - one implementation per export format.
/// File-level problems are errors; row-level problems land in `rejected`.
pub trait ListingSource: Send + Sync {
    fn load(&self, file_path: &Path) -> Result<LoadOutcome>;

    fn format(&self) -> SourceFormat;

    /// Loader version (for provenance tracking)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Detect the export format from the file extension
pub fn detect_format(file_path: &Path) -> Result<SourceFormat> {
    let extension = file_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "csv" => Ok(SourceFormat::Csv),
        "json" => Ok(SourceFormat::Json),
        _ => Err(anyhow::anyhow!(
            "Could not detect listing format from filename: {}",
            file_path.display()
        )),
    }
}

pub fn get_source(format: SourceFormat) -> Box<dyn ListingSource> {
    match format {
        SourceFormat::Csv => Box::new(CsvListingSource),
        SourceFormat::Json => Box::new(JsonListingSource),
    }
}

/// Detect, pick a loader, load
pub fn load_listings(file_path: &Path) -> Result<LoadOutcome> {
    let source = get_source(detect_format(file_path)?);
    let outcome = source.load(file_path)?;

    info!(
        file = %file_path.display(),
        format = source.format().name(),
        loader = source.version(),
        loaded = outcome.listings.len(),
        rejected = outcome.rejected.len(),
        "listings loaded"
    );
    Ok(outcome)
}

fn file_name(file_path: &Path) -> String {
    file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// RFC 3339, or a bare YYYY-MM-DD taken as midnight UTC
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ============================================================================
// CSV
// ============================================================================

/// Columns: source_id,title[,scraped_at,raw_average_price,psa9_average_price,
/// psa10_price,psa10_average_price,multiplier]
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    source_id: String,
    title: String,
    #[serde(default)]
    scraped_at: Option<String>,
    #[serde(default)]
    raw_average_price: Option<f64>,
    #[serde(default)]
    psa9_average_price: Option<f64>,
    #[serde(default)]
    psa10_price: Option<f64>,
    #[serde(default)]
    psa10_average_price: Option<f64>,
    #[serde(default)]
    multiplier: Option<f64>,
}

pub struct CsvListingSource;

impl ListingSource for CsvListingSource {
    fn load(&self, file_path: &Path) -> Result<LoadOutcome> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_path(file_path)
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

        let filename = file_name(file_path);
        let mut outcome = LoadOutcome::default();

        for (idx, result) in reader.deserialize::<CsvRow>().enumerate() {
            let line_number = idx + 2; // 1-indexed + header row
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    warn!(file = %filename, line = line_number, error = %e, "malformed listing row");
                    outcome.rejected.push(PipelineError::InvalidInput {
                        source_id: format!("{}:{}", filename, line_number),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let source_id = if row.source_id.trim().is_empty() {
                format!("{}:{}", filename, line_number)
            } else {
                row.source_id.trim().to_string()
            };

            let mut listing = RawListing::new(&source_id, &row.title)
                .with_prices(PriceFields {
                    raw_average_price: row.raw_average_price,
                    psa9_average_price: row.psa9_average_price,
                    psa10_price: row.psa10_price,
                    psa10_average_price: row.psa10_average_price,
                    multiplier: row.multiplier,
                })
                .with_provenance(&filename, line_number);
            listing.scraped_at = row.scraped_at.as_deref().and_then(parse_timestamp);

            outcome.listings.push(listing);
        }

        Ok(outcome)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Csv
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Accepts a top-level array or `{ "listings": [...] }`
pub struct JsonListingSource;

impl ListingSource for JsonListingSource {
    fn load(&self, file_path: &Path) -> Result<LoadOutcome> {
        let content = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;
        let json: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON from {}", file_path.display()))?;

        let items = match &json {
            Value::Array(items) => items,
            Value::Object(map) => map
                .get("listings")
                .and_then(|v| v.as_array())
                .ok_or_else(|| anyhow::anyhow!("JSON missing 'listings' array"))?,
            _ => return Err(anyhow::anyhow!("JSON root must be an array or object")),
        };

        let filename = file_name(file_path);
        let mut outcome = LoadOutcome::default();

        for (idx, item) in items.iter().enumerate() {
            let source_id = match item.get("source_id") {
                Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                Some(Value::Number(n)) => n.to_string(),
                _ => format!("{}:{}", filename, idx),
            };

            let Some(title) = item.get("title").and_then(|v| v.as_str()) else {
                warn!(file = %filename, index = idx, "listing title is missing or not a string");
                outcome.rejected.push(PipelineError::InvalidInput {
                    source_id,
                    reason: "title is missing or not a string".to_string(),
                });
                continue;
            };

            let price = |key: &str| item.get(key).and_then(|v| v.as_f64());
            let mut listing = RawListing::new(&source_id, title)
                .with_prices(PriceFields {
                    raw_average_price: price("raw_average_price"),
                    psa9_average_price: price("psa9_average_price"),
                    psa10_price: price("psa10_price"),
                    psa10_average_price: price("psa10_average_price"),
                    multiplier: price("multiplier"),
                })
                .with_provenance(&filename, idx);
            listing.scraped_at = item
                .get("scraped_at")
                .and_then(|v| v.as_str())
                .and_then(parse_timestamp);

            outcome.listings.push(listing);
        }

        Ok(outcome)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Json
    }
}

// ============================================================================
// TESTS
// ============================================================================
