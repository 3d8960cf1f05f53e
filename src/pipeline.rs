// 🔄 Extraction Pipeline
//
// Composes the stages in a fixed order:
//   validate → strip grading → brand → variant → year/number/print run/flags
//   → player name → canonical title
//
// Brand, variant and player run on the grade-stripped text. Year, numbers and
// flags read the raw title so "PSA 10" context is still visible to them.

use crate::assembler::TitleAssembler;
use crate::config::PipelineConfig;
use crate::error::{ConfigResult, PipelineError};
use crate::extract::{
    classify_brand, detect_variant, extract_card_number, extract_player, extract_print_run,
    extract_year, is_autograph, is_rookie, ExtractedFields, GradeStripper, ReviewReason,
};
use crate::parser::RawListing;
use crate::terms::TermLists;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// OUTPUT
// ============================================================================

/// One listing after extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedListing {
    pub source_id: String,
    pub title: String,
    pub scraped_at: Option<DateTime<Utc>>,
    pub fields: ExtractedFields,
    pub canonical_title: String,
    pub needs_review: bool,
    pub review_reasons: Vec<ReviewReason>,
    /// Fingerprint of the term lists that produced this record
    pub term_fingerprint: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub extracted: Vec<ExtractedListing>,
    pub skipped: Vec<PipelineError>,
}

impl BatchOutcome {
    pub fn summary(&self) -> BatchSummary {
        let mut reason_counts = BTreeMap::new();
        for listing in &self.extracted {
            for reason in &listing.review_reasons {
                *reason_counts.entry(reason.as_str()).or_insert(0) += 1;
            }
        }

        BatchSummary {
            total: self.extracted.len() + self.skipped.len(),
            extracted: self.extracted.len(),
            skipped: self.skipped.len(),
            needs_review: self.extracted.iter().filter(|l| l.needs_review).count(),
            reason_counts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub needs_review: usize,
    pub reason_counts: BTreeMap<&'static str, usize>,
}

impl BatchSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} listings: {} extracted, {} skipped | {} need review",
            self.total, self.extracted, self.skipped, self.needs_review
        )
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Stateless apart from the shared, read-only term lists and config; safe to
/// call from several threads at once.
#[derive(Debug, Clone)]
pub struct Pipeline {
    terms: Arc<TermLists>,
    config: PipelineConfig,
    stripper: GradeStripper,
    assembler: TitleAssembler,
    current_year: i32,
}

impl Pipeline {
    pub fn new(terms: Arc<TermLists>, config: PipelineConfig) -> ConfigResult<Self> {
        config.validate()?;

        Ok(Pipeline {
            stripper: GradeStripper::builtin()?,
            assembler: TitleAssembler::new(config.title_layout.clone()),
            current_year: config.effective_year(),
            terms,
            config,
        })
    }

    /// Built-in term lists and default configuration
    pub fn builtin() -> ConfigResult<Self> {
        Pipeline::new(Arc::new(TermLists::builtin()?), PipelineConfig::default())
    }

    /// Replace the grading ladder (e.g. one loaded from a rules file)
    pub fn with_grade_stripper(mut self, stripper: GradeStripper) -> Self {
        self.stripper = stripper;
        self
    }

    pub fn terms(&self) -> &TermLists {
        &self.terms
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn assembler(&self) -> &TitleAssembler {
        &self.assembler
    }

    /// Run every extraction stage on a title. Never fails; missing fields
    /// are `None` and the review reasons say what looked wrong.
    pub fn extract(&self, title: &str) -> (ExtractedFields, Vec<ReviewReason>) {
        let terms = self.terms.as_ref();
        let stripped = self.stripper.strip(title);

        let brand = classify_brand(&stripped, terms);
        let mut excluded = Vec::new();
        if let Some(b) = &brand {
            excluded.push(b.span.clone());
        }

        let variant = detect_variant(&stripped, &excluded, terms);
        excluded.extend(variant.spans.iter().cloned());

        let player = extract_player(&stripped, &excluded, terms);

        let mut reasons = Vec::new();
        if brand.is_none() {
            reasons.push(ReviewReason::NoBrandMatch);
        }
        reasons.extend(player.review);

        let (brand_name, set_name) = match brand {
            Some(b) => (Some(b.brand), b.set_name),
            None => (None, None),
        };

        let number_mask = self.phrase_spans(title);

        let fields = ExtractedFields {
            year: extract_year(title, self.current_year),
            brand: brand_name,
            set_name,
            variant: variant.variant,
            card_number: extract_card_number(title, &number_mask, terms, self.config.number_policy),
            print_run: extract_print_run(title),
            is_autograph: is_autograph(title),
            is_rookie: is_rookie(title),
            player_name: player.name,
        };

        (fields, reasons)
    }

    /// Brand and variant spans located in the raw title, so digits that belong
    /// to a phrase ("Topps Series 1") never read as card numbers
    fn phrase_spans(&self, title: &str) -> Vec<Range<usize>> {
        let terms = self.terms.as_ref();
        let mut spans: Vec<Range<usize>> = classify_brand(title, terms)
            .map(|b| vec![b.span])
            .unwrap_or_default();
        let variants = detect_variant(title, &spans, terms);
        spans.extend(variants.spans);
        spans
    }

    /// Validate and extract one listing
    pub fn process(&self, listing: &RawListing) -> Result<ExtractedListing, PipelineError> {
        if listing.title.trim().is_empty() {
            return Err(PipelineError::InvalidInput {
                source_id: listing.source_id.clone(),
                reason: "title is empty".to_string(),
            });
        }

        let (fields, review_reasons) = self.extract(&listing.title);
        let canonical_title = self.assembler.assemble(&fields);

        debug!(
            source_id = %listing.source_id,
            canonical = %canonical_title,
            review = review_reasons.len(),
            "listing extracted"
        );

        Ok(ExtractedListing {
            source_id: listing.source_id.clone(),
            title: listing.title.clone(),
            scraped_at: listing.scraped_at,
            fields,
            canonical_title,
            needs_review: !review_reasons.is_empty(),
            review_reasons,
            term_fingerprint: self.terms.fingerprint().to_string(),
        })
    }

    /// Extract a batch. Invalid listings are collected, not fatal.
    pub fn process_batch(&self, listings: &[RawListing]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for listing in listings {
            match self.process(listing) {
                Ok(extracted) => outcome.extracted.push(extracted),
                Err(e) => {
                    warn!(error = %e, "listing skipped");
                    outcome.skipped.push(e);
                }
            }
        }

        let summary = outcome.summary();
        info!(
            total = summary.total,
            extracted = summary.extracted,
            skipped = summary.skipped,
            needs_review = summary.needs_review,
            "batch extraction complete"
        );

        outcome
    }
}

// ============================================================================
// TESTS
// ============================================================================
