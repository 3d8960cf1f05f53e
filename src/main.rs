use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use card_catalog::{
    export_cards_csv, get_all_cards, get_cards_needing_review, load_listings, merge_duplicates,
    open_database, repair_prices, upsert_cards, verify_count, CardRecord, DuplicateMerger,
    GradeStripper, Pipeline, PipelineConfig, PriceAnomalyCorrector, RawListing, RuleEngine,
    TermLists, VERSION,
};

const DEFAULT_DB: &str = "cards.db";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    match command {
        "normalize" => {
            let title = args[2..].join(" ");
            run_normalize(&title)
        }
        "import" => {
            let path = args
                .get(2)
                .context("usage: card-catalog import <listings.csv|listings.json>")?;
            run_import(Path::new(path))
        }
        "merge" => run_merge(),
        "repair" => run_repair(),
        "review" => run_review(),
        "export" => {
            let path = args.get(2).context("usage: card-catalog export <cards.csv>")?;
            run_export(Path::new(path))
        }
        "terms" => run_terms(),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("🃏 card-catalog {}", VERSION);
    println!();
    println!("Commands:");
    println!("  normalize <title>     Extract fields and canonical title from one listing title");
    println!("  import <file>         Extract and store listings from a CSV or JSON export");
    println!("  merge                 Merge stored records that share a canonical title");
    println!("  repair                Correct inverted raw/PSA9/PSA10 prices");
    println!("  review                List records flagged for manual review");
    println!("  export <file>         Write all records to CSV");
    println!("  terms                 Show the active term lists");
    println!();
    println!("Environment:");
    println!("  CARD_CATALOG_DB       SQLite path (default: {})", DEFAULT_DB);
    println!("  CARD_CATALOG_TERMS    Term lists JSON (default: built-in)");
    println!("  CARD_CATALOG_CONFIG   Pipeline config JSON (default: built-in)");
    println!("  CARD_CATALOG_RULES    Grading rules JSON (default: built-in)");
    println!("  RUST_LOG              Log filter (default: info)");
}

// ============================================================================
// SETUP
// ============================================================================

fn db_path() -> PathBuf {
    env::var("CARD_CATALOG_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB))
}

fn load_config() -> Result<PipelineConfig> {
    match env::var("CARD_CATALOG_CONFIG") {
        Ok(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("Failed to load pipeline config from {}", path)),
        Err(_) => Ok(PipelineConfig::default()),
    }
}

fn load_terms() -> Result<TermLists> {
    match env::var("CARD_CATALOG_TERMS") {
        Ok(path) => TermLists::from_file(&path)
            .with_context(|| format!("Failed to load term lists from {}", path)),
        Err(_) => TermLists::builtin().context("Built-in term lists failed to compile"),
    }
}

fn build_pipeline() -> Result<Pipeline> {
    let terms = Arc::new(load_terms()?);
    let pipeline = Pipeline::new(terms, load_config()?)?;

    match env::var("CARD_CATALOG_RULES") {
        Ok(path) => {
            let rules = RuleEngine::from_file(&path)
                .with_context(|| format!("Failed to load grading rules from {}", path))?;
            Ok(pipeline.with_grade_stripper(GradeStripper::new(rules)))
        }
        Err(_) => Ok(pipeline),
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_normalize(title: &str) -> Result<()> {
    let pipeline = build_pipeline()?;
    let layout: Vec<String> = pipeline
        .assembler()
        .layout()
        .iter()
        .map(|field| format!("{:?}", field))
        .collect();
    info!(
        policy = ?pipeline.config().number_policy,
        layout = %layout.join(" "),
        "normalizing title"
    );

    let listing = pipeline.process(&RawListing::new("cli", title))?;

    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

fn run_import(path: &Path) -> Result<()> {
    println!("🗄️  Listing import - {} → SQLite + WAL", path.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📂 Loading listings...");
    let loaded = load_listings(path)?;
    println!(
        "✓ Loaded {} listings ({} rejected)",
        loaded.listings.len(),
        loaded.rejected.len()
    );

    println!("\n🔍 Extracting fields...");
    let pipeline = build_pipeline()?;
    let outcome = pipeline.process_batch(&loaded.listings);
    println!("✓ {}", outcome.summary().summary());

    // Extracted listings keep input order, minus skipped ones
    let prices_by_id: std::collections::HashMap<&str, _> = loaded
        .listings
        .iter()
        .map(|l| (l.source_id.as_str(), l.prices))
        .collect();
    let cards: Vec<CardRecord> = outcome
        .extracted
        .iter()
        .map(|e| {
            let prices = prices_by_id
                .get(e.source_id.as_str())
                .copied()
                .unwrap_or_default();
            CardRecord::from_listing(e, prices)
        })
        .collect();

    println!("\n💾 Storing records...");
    let mut conn = open_database(db_path())?;
    let stats = upsert_cards(&mut conn, &cards)?;
    println!("✓ Inserted: {}", stats.inserted);
    println!("✓ Updated: {}", stats.updated);

    let count = verify_count(&conn)?;
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Database contains {} cards", count);

    Ok(())
}

fn run_merge() -> Result<()> {
    let config = load_config()?;
    let mut conn = open_database(db_path())?;

    let before = verify_count(&conn)?;
    let report = merge_duplicates(&mut conn, &DuplicateMerger::new(), config.merge_max_attempts)?;
    let after = verify_count(&conn)?;

    println!("🔗 Merged {} groups, removed {} records", report.groups_merged, report.records_removed);
    println!("✓ Cards: {} → {}", before, after);
    for title in &report.failed_groups {
        println!("❌ Failed after {} attempts: {}", config.merge_max_attempts, title);
    }

    Ok(())
}

fn run_repair() -> Result<()> {
    let corrector = PriceAnomalyCorrector::from_config(&load_config()?);
    let mut conn = open_database(db_path())?;

    let repaired = repair_prices(&mut conn, &corrector)?;
    println!("🩹 Repaired prices on {} cards", repaired);

    Ok(())
}

fn run_review() -> Result<()> {
    let conn = open_database(db_path())?;
    let cards = get_cards_needing_review(&conn)?;

    println!("📋 {} cards need review", cards.len());
    for card in &cards {
        let reasons: Vec<&str> = card.review_reasons.iter().map(|r| r.as_str()).collect();
        println!("  {} | {} | {}", card.source_id, card.title, reasons.join(", "));
    }

    Ok(())
}

fn run_export(path: &Path) -> Result<()> {
    let conn = open_database(db_path())?;
    let cards = get_all_cards(&conn)?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let written = export_cards_csv(&cards, file)?;

    info!(path = %path.display(), written, "cards exported");
    println!("📤 Exported {} cards to {}", written, path.display());
    Ok(())
}

fn run_terms() -> Result<()> {
    let terms = load_terms()?;
    let data = terms.data();

    println!("📚 Term lists {}", terms.fingerprint());
    println!("  brands:            {}", data.brands.len());
    println!("  variants:          {}", data.variants.len());
    println!("  grading companies: {}", data.grading_companies.join(", "));
    println!("  card terms:        {}", data.card_terms.len());
    println!("  teams:             {}", data.teams.len());
    println!("  cities:            {}", data.cities.len());

    Ok(())
}
