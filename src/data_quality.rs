// ✅ Price Anomaly Corrector
//
// Graded prices are ordered: raw <= PSA9 <= PSA10. Scraped averages break
// that order often enough (thin markets, mislabeled sales) that we repair
// them with fixed fractions of the PSA10 anchor and re-derive the multiplier.

use crate::config::PipelineConfig;
use crate::db::{CardRecord, PriceFields};
use serde::{Deserialize, Serialize};

/// Relative tolerance when comparing a stored multiplier to the expected one
const MULTIPLIER_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    RawAveragePrice,
    Psa9AveragePrice,
    Psa10Price,
    Psa10AveragePrice,
    Multiplier,
}

impl PriceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceField::RawAveragePrice => "raw_average_price",
            PriceField::Psa9AveragePrice => "psa9_average_price",
            PriceField::Psa10Price => "psa10_price",
            PriceField::Psa10AveragePrice => "psa10_average_price",
            PriceField::Multiplier => "multiplier",
        }
    }
}

/// One field change and why it was made
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub field: PriceField,
    pub old_value: Option<f64>,
    pub new_value: Option<f64>,
    pub reason: String,
}

// ============================================================================
// CORRECTOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct PriceAnomalyCorrector {
    /// Raw replacement = raw_fraction × PSA10 anchor (default: 0.3)
    raw_fraction: f64,

    /// PSA9 replacement = psa9_fraction × PSA10 price (default: 0.7)
    psa9_fraction: f64,
}

impl PriceAnomalyCorrector {
    pub fn new(raw_fraction: f64, psa9_fraction: f64) -> Self {
        PriceAnomalyCorrector {
            raw_fraction,
            psa9_fraction,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        PriceAnomalyCorrector::new(config.raw_fraction, config.psa9_fraction)
    }

    /// Check the price triple in a fixed order and return the repaired
    /// prices plus every change made. Unknown prices are never checked.
    ///
    /// 1. PSA9 above PSA10 → PSA9 = psa9_fraction × PSA10
    /// 2. raw above PSA10 → raw = raw_fraction × PSA10
    /// 3. raw above the PSA10 average → raw = raw_fraction × PSA10 average
    /// 4. multiplier missing or stale → PSA10 (or its average) / raw
    pub fn correct(&self, prices: &PriceFields) -> (PriceFields, Vec<Correction>) {
        let mut fixed = *prices;
        let mut corrections = Vec::new();

        if let (Some(psa9), Some(psa10)) = (fixed.psa9_average_price, fixed.psa10_price) {
            if psa9 > psa10 {
                let new = psa10 * self.psa9_fraction;
                corrections.push(Correction {
                    field: PriceField::Psa9AveragePrice,
                    old_value: Some(psa9),
                    new_value: Some(new),
                    reason: format!("PSA9 price {:.2} above PSA10 price {:.2}", psa9, psa10),
                });
                fixed.psa9_average_price = Some(new);
            }
        }

        if let (Some(raw), Some(psa10)) = (fixed.raw_average_price, fixed.psa10_price) {
            if raw > psa10 {
                let new = psa10 * self.raw_fraction;
                corrections.push(Correction {
                    field: PriceField::RawAveragePrice,
                    old_value: Some(raw),
                    new_value: Some(new),
                    reason: format!("raw price {:.2} above PSA10 price {:.2}", raw, psa10),
                });
                fixed.raw_average_price = Some(new);
            }
        }

        if let (Some(raw), Some(avg10)) = (fixed.raw_average_price, fixed.psa10_average_price) {
            if raw > avg10 {
                let new = avg10 * self.raw_fraction;
                corrections.push(Correction {
                    field: PriceField::RawAveragePrice,
                    old_value: Some(raw),
                    new_value: Some(new),
                    reason: format!("raw price {:.2} above PSA10 average {:.2}", raw, avg10),
                });
                fixed.raw_average_price = Some(new);
            }
        }

        if let Some(expected) = expected_multiplier(&fixed) {
            let stale = match fixed.multiplier {
                None => true,
                Some(m) => (m - expected).abs() > MULTIPLIER_TOLERANCE * expected.abs().max(1.0),
            };
            if stale {
                corrections.push(Correction {
                    field: PriceField::Multiplier,
                    old_value: fixed.multiplier,
                    new_value: Some(expected),
                    reason: "multiplier recomputed from PSA10 and raw prices".to_string(),
                });
                fixed.multiplier = Some(expected);
            }
        }

        (fixed, corrections)
    }

    /// Correct records in place; returns how many changed
    pub fn correct_records(&self, records: &mut [CardRecord]) -> usize {
        let mut changed = 0;
        for record in records.iter_mut() {
            let (fixed, corrections) = self.correct(&record.prices);
            if !corrections.is_empty() {
                record.prices = fixed;
                changed += 1;
            }
        }
        changed
    }
}

impl Default for PriceAnomalyCorrector {
    fn default() -> Self {
        PriceAnomalyCorrector::from_config(&PipelineConfig::default())
    }
}

/// PSA10 price (or the PSA10 average when the price is unknown) over raw
fn expected_multiplier(prices: &PriceFields) -> Option<f64> {
    let anchor = prices.psa10_price.or(prices.psa10_average_price)?;
    let raw = prices.raw_average_price?;
    (raw > 0.0).then(|| anchor / raw)
}

// ============================================================================
// TESTS
// ============================================================================
