use crate::data_quality::{Correction, PriceAnomalyCorrector};
use crate::deduplication::{DuplicateMerger, MergeGroup};
use crate::extract::{ExtractedFields, ReviewReason};
use crate::pipeline::ExtractedListing;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Market prices attached to a card. Any of them may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceFields {
    pub raw_average_price: Option<f64>,
    pub psa9_average_price: Option<f64>,
    pub psa10_price: Option<f64>,
    pub psa10_average_price: Option<f64>,
    /// psa10_price / raw_average_price
    pub multiplier: Option<f64>,
}

/// Persisted card record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    /// Stable identity (UUID)
    pub id: String,
    /// Marketplace listing id; re-importing the same id updates in place
    pub source_id: String,
    pub title: String,
    pub canonical_title: String,
    pub fields: ExtractedFields,
    pub prices: PriceFields,
    pub needs_review: bool,
    pub review_reasons: Vec<ReviewReason>,
    pub term_fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl CardRecord {
    pub fn from_listing(listing: &ExtractedListing, prices: PriceFields) -> Self {
        let now = Utc::now();
        CardRecord {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: listing.source_id.clone(),
            title: listing.title.clone(),
            canonical_title: listing.canonical_title.clone(),
            fields: listing.fields.clone(),
            prices,
            needs_review: listing.needs_review,
            review_reasons: listing.review_reasons.clone(),
            term_fingerprint: listing.term_fingerprint.clone(),
            created_at: listing.scraped_at.unwrap_or(now),
            last_updated: now,
        }
    }
}

/// Event for audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub groups_merged: usize,
    pub records_removed: usize,
    /// Canonical titles of groups that failed every attempt
    pub failed_groups: Vec<String>,
}

pub fn open_database<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Cards Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            card_uuid TEXT UNIQUE NOT NULL,
            source_id TEXT UNIQUE NOT NULL,
            title TEXT NOT NULL,
            canonical_title TEXT NOT NULL,
            year TEXT,
            brand TEXT,
            set_name TEXT,
            variant TEXT,
            card_number TEXT,
            print_run TEXT,
            is_autograph INTEGER NOT NULL DEFAULT 0,
            is_rookie INTEGER NOT NULL DEFAULT 0,
            player_name TEXT,
            raw_average_price REAL,
            psa9_average_price REAL,
            psa10_price REAL,
            psa10_average_price REAL,
            multiplier REAL,
            needs_review INTEGER NOT NULL DEFAULT 0,
            review_reasons TEXT NOT NULL DEFAULT '[]',
            term_fingerprint TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            last_updated TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cards_canonical ON cards(canonical_title)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cards_review ON cards(needs_review)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// CARDS
// ============================================================================

/// Insert new cards, update existing ones (matched on source_id).
///
/// An update refreshes the extraction and keeps the stored identity and
/// creation time. Prices only overwrite when the new value is known.
pub fn upsert_cards(conn: &mut Connection, cards: &[CardRecord]) -> Result<UpsertStats> {
    let tx = conn.transaction()?;
    let mut stats = UpsertStats::default();

    for card in cards {
        let existing: Option<String> = tx
            .query_row(
                "SELECT card_uuid FROM cards WHERE source_id = ?1",
                params![card.source_id],
                |row| row.get(0),
            )
            .optional()?;

        let reasons_json = serde_json::to_string(&card.review_reasons)?;
        let f = &card.fields;
        let p = &card.prices;

        tx.execute(
            "INSERT INTO cards (
                card_uuid, source_id, title, canonical_title,
                year, brand, set_name, variant, card_number, print_run,
                is_autograph, is_rookie, player_name,
                raw_average_price, psa9_average_price, psa10_price, psa10_average_price, multiplier,
                needs_review, review_reasons, term_fingerprint, created_at, last_updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
            ON CONFLICT(source_id) DO UPDATE SET
                title = excluded.title,
                canonical_title = excluded.canonical_title,
                year = excluded.year,
                brand = excluded.brand,
                set_name = excluded.set_name,
                variant = excluded.variant,
                card_number = excluded.card_number,
                print_run = excluded.print_run,
                is_autograph = excluded.is_autograph,
                is_rookie = excluded.is_rookie,
                player_name = excluded.player_name,
                raw_average_price = COALESCE(excluded.raw_average_price, cards.raw_average_price),
                psa9_average_price = COALESCE(excluded.psa9_average_price, cards.psa9_average_price),
                psa10_price = COALESCE(excluded.psa10_price, cards.psa10_price),
                psa10_average_price = COALESCE(excluded.psa10_average_price, cards.psa10_average_price),
                multiplier = COALESCE(excluded.multiplier, cards.multiplier),
                needs_review = excluded.needs_review,
                review_reasons = excluded.review_reasons,
                term_fingerprint = excluded.term_fingerprint,
                last_updated = excluded.last_updated",
            params![
                card.id,
                card.source_id,
                card.title,
                card.canonical_title,
                f.year,
                f.brand,
                f.set_name,
                f.variant,
                f.card_number,
                f.print_run,
                f.is_autograph,
                f.is_rookie,
                f.player_name,
                p.raw_average_price,
                p.psa9_average_price,
                p.psa10_price,
                p.psa10_average_price,
                p.multiplier,
                card.needs_review,
                reasons_json,
                card.term_fingerprint,
                card.created_at.to_rfc3339(),
                card.last_updated.to_rfc3339(),
            ],
        )?;

        let (event_type, entity_id) = match &existing {
            Some(uuid) => {
                stats.updated += 1;
                ("card_updated", uuid.as_str())
            }
            None => {
                stats.inserted += 1;
                ("card_added", card.id.as_str())
            }
        };

        insert_event(
            &tx,
            &Event::new(
                event_type,
                "card",
                entity_id,
                serde_json::json!({
                    "source_id": card.source_id,
                    "canonical_title": card.canonical_title,
                    "needs_review": card.needs_review,
                }),
                "listing_importer",
            ),
        )?;
    }

    tx.commit()?;

    info!(inserted = stats.inserted, updated = stats.updated, "cards upserted");
    Ok(stats)
}

const CARD_COLUMNS: &str = "card_uuid, source_id, title, canonical_title,
    year, brand, set_name, variant, card_number, print_run,
    is_autograph, is_rookie, player_name,
    raw_average_price, psa9_average_price, psa10_price, psa10_average_price, multiplier,
    needs_review, review_reasons, term_fingerprint, created_at, last_updated";

fn parse_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn card_from_row(row: &Row) -> rusqlite::Result<CardRecord> {
    let reasons_json: String = row.get(19)?;
    let created_at: String = row.get(21)?;
    let last_updated: String = row.get(22)?;

    Ok(CardRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        title: row.get(2)?,
        canonical_title: row.get(3)?,
        fields: ExtractedFields {
            year: row.get(4)?,
            brand: row.get(5)?,
            set_name: row.get(6)?,
            variant: row.get(7)?,
            card_number: row.get(8)?,
            print_run: row.get(9)?,
            is_autograph: row.get(10)?,
            is_rookie: row.get(11)?,
            player_name: row.get(12)?,
        },
        prices: PriceFields {
            raw_average_price: row.get(13)?,
            psa9_average_price: row.get(14)?,
            psa10_price: row.get(15)?,
            psa10_average_price: row.get(16)?,
            multiplier: row.get(17)?,
        },
        needs_review: row.get(18)?,
        review_reasons: serde_json::from_str(&reasons_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(19, Type::Text, Box::new(e)))?,
        term_fingerprint: row.get(20)?,
        created_at: parse_time(21, &created_at)?,
        last_updated: parse_time(22, &last_updated)?,
    })
}

pub fn get_all_cards(conn: &Connection) -> Result<Vec<CardRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM cards ORDER BY created_at, card_uuid",
        CARD_COLUMNS
    ))?;

    let cards = stmt
        .query_map([], card_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(cards)
}

pub fn get_card(conn: &Connection, card_id: &str) -> Result<Option<CardRecord>> {
    let card = conn
        .query_row(
            &format!("SELECT {} FROM cards WHERE card_uuid = ?1", CARD_COLUMNS),
            params![card_id],
            card_from_row,
        )
        .optional()?;

    Ok(card)
}

pub fn get_cards_needing_review(conn: &Connection) -> Result<Vec<CardRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM cards WHERE needs_review = 1 ORDER BY created_at, card_uuid",
        CARD_COLUMNS
    ))?;

    let cards = stmt
        .query_map([], card_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(cards)
}

pub fn get_cards_by_canonical_title(conn: &Connection, canonical_title: &str) -> Result<Vec<CardRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM cards WHERE canonical_title = ?1 ORDER BY created_at, card_uuid",
        CARD_COLUMNS
    ))?;

    let cards = stmt
        .query_map(params![canonical_title], card_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(cards)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// MERGING
// ============================================================================

/// Apply one merge group atomically: survivor gets the merged prices, the
/// other records are deleted, and an event is logged. On any error nothing
/// is changed.
pub fn apply_merge_group(conn: &mut Connection, group: &MergeGroup) -> Result<()> {
    let tx = conn.transaction()?;
    let p = &group.merged_prices;

    let updated = tx.execute(
        "UPDATE cards SET
            raw_average_price = ?1,
            psa9_average_price = ?2,
            psa10_price = ?3,
            psa10_average_price = ?4,
            multiplier = ?5,
            last_updated = ?6
         WHERE card_uuid = ?7",
        params![
            p.raw_average_price,
            p.psa9_average_price,
            p.psa10_price,
            p.psa10_average_price,
            p.multiplier,
            Utc::now().to_rfc3339(),
            group.survivor_id,
        ],
    )?;
    if updated != 1 {
        bail!("Survivor {} not found", group.survivor_id);
    }

    for removed_id in &group.removed_ids {
        let deleted = tx.execute("DELETE FROM cards WHERE card_uuid = ?1", params![removed_id])?;
        if deleted != 1 {
            bail!("Duplicate {} not found", removed_id);
        }
    }

    insert_event(
        &tx,
        &Event::new(
            "cards_merged",
            "card",
            &group.survivor_id,
            serde_json::json!({
                "canonical_title": group.canonical_title,
                "removed_ids": group.removed_ids,
                "merged_prices": group.merged_prices,
            }),
            "duplicate_merger",
        ),
    )?;

    tx.commit()?;
    Ok(())
}

/// Apply planned groups, retrying each up to `max_attempts` times. A group
/// that keeps failing is reported and the rest still proceed.
pub fn apply_merge_groups(
    conn: &mut Connection,
    groups: &[MergeGroup],
    max_attempts: u32,
) -> MergeReport {
    let mut report = MergeReport::default();

    for group in groups {
        let mut merged = false;

        for attempt in 1..=max_attempts.max(1) {
            match apply_merge_group(conn, group) {
                Ok(()) => {
                    merged = true;
                    break;
                }
                Err(e) => {
                    warn!(
                        canonical = %group.canonical_title,
                        attempt,
                        error = %e,
                        "merge attempt failed"
                    );
                }
            }
        }

        if merged {
            report.groups_merged += 1;
            report.records_removed += group.removed_ids.len();
        } else {
            report.failed_groups.push(group.canonical_title.clone());
        }
    }

    report
}

/// Load every card, plan merges by canonical title and apply them
pub fn merge_duplicates(
    conn: &mut Connection,
    merger: &DuplicateMerger,
    max_attempts: u32,
) -> Result<MergeReport> {
    let cards = get_all_cards(conn)?;
    let groups = merger.plan(&cards);
    let report = apply_merge_groups(conn, &groups, max_attempts);

    info!(
        groups = report.groups_merged,
        removed = report.records_removed,
        failed = report.failed_groups.len(),
        "duplicate merge complete"
    );

    Ok(report)
}

// ============================================================================
// PRICE REPAIR
// ============================================================================

/// Persist corrected prices for one card and log each correction
pub fn apply_corrections(
    conn: &mut Connection,
    card_id: &str,
    prices: &PriceFields,
    corrections: &[Correction],
) -> Result<()> {
    let tx = conn.transaction()?;

    let updated = tx.execute(
        "UPDATE cards SET
            raw_average_price = ?1,
            psa9_average_price = ?2,
            psa10_price = ?3,
            psa10_average_price = ?4,
            multiplier = ?5,
            last_updated = ?6
         WHERE card_uuid = ?7",
        params![
            prices.raw_average_price,
            prices.psa9_average_price,
            prices.psa10_price,
            prices.psa10_average_price,
            prices.multiplier,
            Utc::now().to_rfc3339(),
            card_id,
        ],
    )?;
    if updated != 1 {
        bail!("Card {} not found", card_id);
    }

    for correction in corrections {
        insert_event(
            &tx,
            &Event::new(
                "price_corrected",
                "card",
                card_id,
                serde_json::to_value(correction)?,
                "price_anomaly_corrector",
            ),
        )?;
    }

    tx.commit()?;
    Ok(())
}

/// Run the corrector over every stored card; returns how many changed
pub fn repair_prices(conn: &mut Connection, corrector: &PriceAnomalyCorrector) -> Result<usize> {
    let cards = get_all_cards(conn)?;
    let mut repaired = 0;

    for card in &cards {
        let (fixed, corrections) = corrector.correct(&card.prices);
        if corrections.is_empty() {
            continue;
        }
        apply_corrections(conn, &card.id, &fixed, &corrections)?;
        repaired += 1;
    }

    info!(checked = cards.len(), repaired, "price repair complete");
    Ok(repaired)
}

// ============================================================================
// EXPORT
// ============================================================================

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    card_id: &'a str,
    source_id: &'a str,
    canonical_title: &'a str,
    year: Option<&'a str>,
    brand: Option<&'a str>,
    set_name: Option<&'a str>,
    variant: Option<&'a str>,
    card_number: Option<&'a str>,
    print_run: Option<&'a str>,
    player_name: Option<&'a str>,
    is_autograph: bool,
    is_rookie: bool,
    raw_average_price: Option<f64>,
    psa9_average_price: Option<f64>,
    psa10_price: Option<f64>,
    psa10_average_price: Option<f64>,
    multiplier: Option<f64>,
    needs_review: bool,
    review_reasons: String,
    created_at: String,
}

/// Write cards as flat CSV rows; review reasons are `;`-separated
pub fn export_cards_csv<W: std::io::Write>(cards: &[CardRecord], writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    for card in cards {
        let f = &card.fields;
        let p = &card.prices;
        wtr.serialize(ExportRow {
            card_id: &card.id,
            source_id: &card.source_id,
            canonical_title: &card.canonical_title,
            year: f.year.as_deref(),
            brand: f.brand.as_deref(),
            set_name: f.set_name.as_deref(),
            variant: f.variant.as_deref(),
            card_number: f.card_number.as_deref(),
            print_run: f.print_run.as_deref(),
            player_name: f.player_name.as_deref(),
            is_autograph: f.is_autograph,
            is_rookie: f.is_rookie,
            raw_average_price: p.raw_average_price,
            psa9_average_price: p.psa9_average_price,
            psa10_price: p.psa10_price,
            psa10_average_price: p.psa10_average_price,
            multiplier: p.multiplier,
            needs_review: card.needs_review,
            review_reasons: card
                .review_reasons
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(";"),
            created_at: card.created_at.to_rfc3339(),
        })
        .context("Failed to write CSV row")?;
    }

    wtr.flush()?;
    Ok(cards.len())
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_time(1, &timestamp_str)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::TitleField;
    use crate::config::PipelineConfig;
    use crate::parser::RawListing;
    use crate::pipeline::Pipeline;
    use crate::terms::TermLists;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    /// Helper to create a card with just the fields the store cares about
    fn create_test_card(source_id: &str, canonical: &str, minutes: i64, prices: PriceFields) -> CardRecord {
        let created = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes);
        CardRecord {
            id: format!("uuid-{}", source_id),
            source_id: source_id.to_string(),
            title: canonical.to_string(),
            canonical_title: canonical.to_string(),
            fields: ExtractedFields {
                player_name: Some("Caleb Williams".to_string()),
                ..ExtractedFields::default()
            },
            prices,
            needs_review: false,
            review_reasons: vec![],
            term_fingerprint: "test".to_string(),
            created_at: created,
            last_updated: created,
        }
    }

    fn prices(raw: Option<f64>, psa10: Option<f64>) -> PriceFields {
        PriceFields {
            raw_average_price: raw,
            psa10_price: psa10,
            ..PriceFields::default()
        }
    }

    #[test]
    fn test_upsert_idempotent() {
        let mut conn = create_test_db();
        let cards = vec![
            create_test_card("a", "2024 Topps Chrome Caleb Williams #74", 0, prices(Some(20.0), None)),
            create_test_card("b", "2023 Topps Chrome Julio Rodriguez", 1, prices(None, None)),
        ];

        let first = upsert_cards(&mut conn, &cards).unwrap();
        let second = upsert_cards(&mut conn, &cards).unwrap();

        assert_eq!(first, UpsertStats { inserted: 2, updated: 0 });
        assert_eq!(second, UpsertStats { inserted: 0, updated: 2 });
        assert_eq!(verify_count(&conn).unwrap(), 2);

        println!("✅ Upsert idempotency test PASSED");
    }

    #[test]
    fn test_upsert_keeps_identity_and_known_prices() {
        let mut conn = create_test_db();
        let original = create_test_card("a", "old title", 0, prices(Some(20.0), Some(100.0)));
        upsert_cards(&mut conn, &[original.clone()]).unwrap();

        let mut refreshed = create_test_card("a", "new title", 30, prices(None, Some(120.0)));
        refreshed.id = "uuid-other".to_string();
        upsert_cards(&mut conn, &[refreshed]).unwrap();

        let stored = get_all_cards(&conn).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, original.id);
        assert_eq!(stored[0].created_at, original.created_at);
        assert_eq!(stored[0].canonical_title, "new title");
        assert_eq!(stored[0].prices.raw_average_price, Some(20.0));
        assert_eq!(stored[0].prices.psa10_price, Some(120.0));

        let events = get_events_for_entity(&conn, "card", &original.id).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "card_updated");
    }

    #[test]
    fn test_card_roundtrip_through_store() {
        let mut conn = create_test_db();
        let mut card = create_test_card("a", "2024 Bowman U Chrome Cooper Flagg auto #16", 0, prices(Some(50.0), Some(400.0)));
        card.fields.is_autograph = true;
        card.needs_review = true;
        card.review_reasons = vec![ReviewReason::AmbiguousName];
        upsert_cards(&mut conn, &[card.clone()]).unwrap();

        let stored = get_card(&conn, &card.id).unwrap().unwrap();
        assert_eq!(stored, card);
        assert_eq!(get_cards_needing_review(&conn).unwrap().len(), 1);
        assert!(get_card(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_merge_duplicates_averages_prices() {
        let mut conn = create_test_db();
        let title = "2024 Topps Chrome #74 Caleb Williams";
        let cards = vec![
            create_test_card("late", title, 10, prices(Some(30.0), None)),
            create_test_card("early", title, 0, prices(Some(10.0), Some(200.0))),
            create_test_card("other", "2023 Topps Chrome Julio Rodriguez", 5, prices(Some(5.0), None)),
        ];
        upsert_cards(&mut conn, &cards).unwrap();

        let report = merge_duplicates(&mut conn, &DuplicateMerger::new(), 3).unwrap();
        assert_eq!(report.groups_merged, 1);
        assert_eq!(report.records_removed, 1);
        assert!(report.failed_groups.is_empty());

        let group = get_cards_by_canonical_title(&conn, title).unwrap();
        assert_eq!(group.len(), 1);
        assert_eq!(group[0].source_id, "early");
        assert_eq!(group[0].prices.raw_average_price, Some(20.0));
        assert_eq!(group[0].prices.psa10_price, Some(200.0));
        assert_eq!(verify_count(&conn).unwrap(), 2);

        let events = get_events_for_entity(&conn, "card", "uuid-early").unwrap();
        assert_eq!(events[0].event_type, "cards_merged");

        // Nothing left to merge
        let again = merge_duplicates(&mut conn, &DuplicateMerger::new(), 3).unwrap();
        assert_eq!(again, MergeReport::default());

        println!("✅ Merge test PASSED: {} groups merged", report.groups_merged);
    }

    #[test]
    fn test_failed_merge_group_rolls_back() {
        let mut conn = create_test_db();
        let card = create_test_card("a", "title", 0, prices(Some(10.0), None));
        upsert_cards(&mut conn, &[card.clone()]).unwrap();

        let broken = MergeGroup {
            canonical_title: "title".to_string(),
            survivor_id: card.id.clone(),
            removed_ids: vec!["uuid-missing".to_string()],
            merged_prices: prices(Some(999.0), None),
        };

        let report = apply_merge_groups(&mut conn, &[broken], 2);
        assert_eq!(report.groups_merged, 0);
        assert_eq!(report.failed_groups, vec!["title".to_string()]);

        // Survivor update was rolled back with the failed delete
        let stored = get_card(&conn, &card.id).unwrap().unwrap();
        assert_eq!(stored.prices.raw_average_price, Some(10.0));
        assert!(get_events_for_entity(&conn, "card", &card.id)
            .unwrap()
            .iter()
            .all(|e| e.event_type != "cards_merged"));
    }

    #[test]
    fn test_failed_group_does_not_block_others() {
        let mut conn = create_test_db();
        let cards = vec![
            create_test_card("a", "dup", 0, prices(Some(10.0), None)),
            create_test_card("b", "dup", 1, prices(Some(20.0), None)),
        ];
        upsert_cards(&mut conn, &cards).unwrap();

        let broken = MergeGroup {
            canonical_title: "ghost".to_string(),
            survivor_id: "uuid-ghost".to_string(),
            removed_ids: vec![],
            merged_prices: PriceFields::default(),
        };
        let mut groups = vec![broken];
        groups.extend(DuplicateMerger::new().plan(&get_all_cards(&conn).unwrap()));

        let report = apply_merge_groups(&mut conn, &groups, 3);
        assert_eq!(report.groups_merged, 1);
        assert_eq!(report.failed_groups, vec!["ghost".to_string()]);
        assert_eq!(verify_count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_repair_prices_persists_and_logs() {
        let mut conn = create_test_db();
        let inverted = PriceFields {
            raw_average_price: Some(250.0),
            psa9_average_price: Some(250.0),
            psa10_price: Some(200.0),
            psa10_average_price: None,
            multiplier: None,
        };
        let cards = vec![
            create_test_card("bad", "a", 0, inverted),
            create_test_card("good", "b", 1, PriceFields {
                raw_average_price: Some(50.0),
                psa10_price: Some(200.0),
                multiplier: Some(4.0),
                ..PriceFields::default()
            }),
        ];
        upsert_cards(&mut conn, &cards).unwrap();

        let corrector = PriceAnomalyCorrector::new(0.3, 0.7);
        let repaired = repair_prices(&mut conn, &corrector).unwrap();
        assert_eq!(repaired, 1);

        let fixed = get_card(&conn, "uuid-bad").unwrap().unwrap().prices;
        assert!((fixed.psa9_average_price.unwrap() - 140.0).abs() < 1e-9);
        assert!((fixed.raw_average_price.unwrap() - 60.0).abs() < 1e-9);
        assert!(fixed.raw_average_price <= fixed.psa10_price);

        let logged = get_events_for_entity(&conn, "card", "uuid-bad")
            .unwrap()
            .into_iter()
            .filter(|e| e.event_type == "price_corrected")
            .count();
        assert_eq!(logged, 3);

        // Second run finds nothing
        assert_eq!(repair_prices(&mut conn, &corrector).unwrap(), 0);
    }

    #[test]
    fn test_noisy_listings_merge_end_to_end() {
        let config = PipelineConfig {
            current_year: Some(2026),
            title_layout: vec![
                TitleField::Year,
                TitleField::BrandSet,
                TitleField::Variant,
                TitleField::CardNumber,
                TitleField::Player,
                TitleField::Autograph,
                TitleField::PrintRun,
            ],
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(Arc::new(TermLists::builtin().unwrap()), config).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();

        let listings = vec![
            RawListing::new("ebay-1", "2024 Topps Chrome #74 Caleb Williams RC Rookie PSA 10 GEM MINT Bears")
                .with_scraped_at(t0)
                .with_prices(prices(Some(40.0), Some(300.0))),
            RawListing::new("ebay-2", "CALEB WILLIAMS 2024 TOPPS CHROME ROOKIE #74 PSA 10 CHICAGO BEARS")
                .with_scraped_at(t0 + Duration::hours(1))
                .with_prices(prices(Some(60.0), None)),
        ];

        let outcome = pipeline.process_batch(&listings);
        let cards: Vec<CardRecord> = outcome
            .extracted
            .iter()
            .zip(&listings)
            .map(|(extracted, raw)| CardRecord::from_listing(extracted, raw.prices))
            .collect();

        let mut conn = create_test_db();
        upsert_cards(&mut conn, &cards).unwrap();
        let report = merge_duplicates(&mut conn, &DuplicateMerger::new(), 3).unwrap();

        assert_eq!(report.groups_merged, 1);
        let stored = get_all_cards(&conn).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].canonical_title, "2024 Topps Chrome #74 Caleb Williams");
        assert_eq!(stored[0].source_id, "ebay-1");
        assert_eq!(stored[0].prices.raw_average_price, Some(50.0));
        assert_eq!(stored[0].prices.psa10_price, Some(300.0));

        println!("✅ End-to-end merge PASSED: {}", stored[0].canonical_title);
    }

    #[test]
    fn test_export_csv() {
        let mut card = create_test_card("a", "2024 Topps Chrome #74 Caleb Williams", 0, prices(Some(20.0), None));
        card.needs_review = true;
        card.review_reasons = vec![ReviewReason::NoBrandMatch, ReviewReason::SingleTokenName];

        let mut out = Vec::new();
        let written = export_cards_csv(&[card], &mut out).unwrap();
        assert_eq!(written, 1);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("card_id,source_id,canonical_title,year"));
        let row = lines.next().unwrap();
        assert!(row.contains("2024 Topps Chrome #74 Caleb Williams"));
        assert!(row.contains("no_brand_match;single_token_name"));
        assert!(row.contains(",20.0,"));
    }

    #[test]
    fn test_event_log() {
        let conn = create_test_db();

        let event = Event::new(
            "test_event",
            "card",
            "test_id_123",
            serde_json::json!({"test": "data"}),
            "test_actor",
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "card", "test_id_123").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "test_event");
        assert_eq!(events[0].actor, "test_actor");
    }
}
