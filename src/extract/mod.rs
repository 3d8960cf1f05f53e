// Extraction stages - one pure function per field family
//
// Every stage takes the title (raw or grade-stripped) plus the injected
// TermLists and returns Option values. None is the normal "not found" case.

pub mod brand;
pub mod flags;
pub mod grade;
pub mod number;
pub mod player;
pub mod variant;
pub mod year;

pub use brand::{classify_brand, BrandMatch};
pub use flags::{is_autograph, is_rookie};
pub use grade::GradeStripper;
pub use number::{extract_card_number, extract_print_run, NumberPolicy};
pub use player::{extract_player, PlayerExtraction};
pub use variant::{detect_variant, VariantMatch};
pub use year::extract_year;

use serde::{Deserialize, Serialize};

/// Structured description of one listing. Fresh per extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub year: Option<String>,
    pub brand: Option<String>,
    pub set_name: Option<String>,
    pub variant: Option<String>,
    pub card_number: Option<String>,
    pub print_run: Option<String>,
    pub is_autograph: bool,
    pub is_rookie: bool,
    pub player_name: Option<String>,
}

impl ExtractedFields {
    /// Brand and set rendered together ("Bowman" + "U Chrome" → "Bowman U Chrome")
    pub fn brand_set(&self) -> Option<String> {
        match (&self.brand, &self.set_name) {
            (Some(brand), Some(set)) => Some(format!("{} {}", brand, set)),
            (Some(brand), None) => Some(brand.clone()),
            (None, Some(set)) => Some(set.clone()),
            (None, None) => None,
        }
    }
}

/// Why a listing was flagged for manual review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    /// No brand/set phrase matched
    NoBrandMatch,

    /// No candidate survived the name filters
    NoPlayerName,

    /// Only one word survived; often a surname cut by a denylisted word
    SingleTokenName,

    /// More than one candidate of the same length
    AmbiguousName,

    /// Winning span has more than three words (multi-player card or noise)
    LongNameSpan,
}

impl ReviewReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewReason::NoBrandMatch => "no_brand_match",
            ReviewReason::NoPlayerName => "no_player_name",
            ReviewReason::SingleTokenName => "single_token_name",
            ReviewReason::AmbiguousName => "ambiguous_name",
            ReviewReason::LongNameSpan => "long_name_span",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_set_rendering() {
        let mut fields = ExtractedFields {
            brand: Some("Bowman".to_string()),
            set_name: Some("U Chrome".to_string()),
            ..ExtractedFields::default()
        };
        assert_eq!(fields.brand_set().as_deref(), Some("Bowman U Chrome"));

        fields.set_name = None;
        assert_eq!(fields.brand_set().as_deref(), Some("Bowman"));

        fields.brand = None;
        assert_eq!(fields.brand_set(), None);
    }

    #[test]
    fn test_review_reason_serialization() {
        let json = serde_json::to_string(&ReviewReason::NoPlayerName).unwrap();
        assert_eq!(json, "\"no_player_name\"");
        assert_eq!(ReviewReason::LongNameSpan.as_str(), "long_name_span");
    }
}
