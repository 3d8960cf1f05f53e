// Card Number / Print Run Extractor

use crate::terms::TermLists;
use regex::{Match, Regex};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::LazyLock;

static HASH_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\s?([A-Za-z0-9]+(?:-[A-Za-z0-9]+)*)").unwrap());
static PRINT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s(\[#]|\p{L})(\d{1,4})?\s?/\s?(\d{1,4})\b").unwrap());
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").unwrap());

/// Words after which a bare number is a count, not a card number
const COUNT_WORDS: &[&str] = &["pop", "population", "of", "lot", "x", "qty"];

/// Words before which a bare number is a count ("3 Card Lot", "50 ct")
const COUNTED_WORDS: &[&str] = &["card", "cards", "lot", "lots", "ct", "count", "pc", "pcs"];

const TOKEN_PUNCTUATION: &[char] = &[',', ';', ':', '(', ')', '[', ']'];

/// How bare (un-prefixed) numbers are treated when no `#` number exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberPolicy {
    /// Bare numbers count unless they follow a grading company ("PSA 10")
    #[default]
    GradeContext,

    /// First bare 1-3 digit number is the card number, grades included
    AlwaysCardNumber,

    /// Only `#`-prefixed tokens count
    HashOnly,
}

// ============================================================================
// CARD NUMBER
// ============================================================================

/// Card identifier, uppercased. `#`-prefixed tokens win; certificate numbers
/// (seven or more digits, or preceded by CERT) never count. Bare numbers inside
/// `masked` byte spans of `title` (brand and variant phrases such as
/// "Series 1") are skipped.
pub fn extract_card_number(
    title: &str,
    masked: &[Range<usize>],
    terms: &TermLists,
    policy: NumberPolicy,
) -> Option<String> {
    for caps in HASH_NUMBER_RE.captures_iter(title) {
        let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = value.as_str();

        if follows_cert(title, whole.start()) || is_cert_digits(value) {
            continue;
        }

        return Some(value.to_uppercase());
    }

    match policy {
        NumberPolicy::HashOnly => None,
        NumberPolicy::GradeContext | NumberPolicy::AlwaysCardNumber => {
            bare_number(title, masked, terms, policy)
        }
    }
}

fn bare_number(
    title: &str,
    masked: &[Range<usize>],
    terms: &TermLists,
    policy: NumberPolicy,
) -> Option<String> {
    let tokens: Vec<Match> = TOKEN_RE.find_iter(title).collect();
    let grades: Vec<Range<usize>> = match (policy, terms.grade_pattern()) {
        (NumberPolicy::GradeContext, Some(re)) => re
            .captures_iter(title)
            .filter_map(|caps| caps.get(1).map(|m| m.range()))
            .collect(),
        _ => Vec::new(),
    };

    for (i, raw) in tokens.iter().enumerate() {
        let token = raw.as_str().trim_matches(TOKEN_PUNCTUATION);
        if token.is_empty() || token.len() > 3 || !token.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let span = raw.range();
        if masked.iter().any(|m| m.start < span.end && span.start < m.end) {
            continue;
        }

        if i > 0 && COUNT_WORDS.contains(&word_at(&tokens, i - 1).as_str()) {
            continue;
        }
        if i + 1 < tokens.len() && COUNTED_WORDS.contains(&word_at(&tokens, i + 1).as_str()) {
            continue;
        }

        // "12 /99" is a serial, not a card number
        if tokens.get(i + 1).is_some_and(|next| next.as_str().starts_with('/')) {
            continue;
        }

        if grades.iter().any(|g| span.start <= g.start && g.end <= span.end) {
            continue;
        }

        return Some(token.to_string());
    }

    None
}

fn word_at(tokens: &[Match], index: usize) -> String {
    tokens[index].as_str().trim_matches(TOKEN_PUNCTUATION).to_lowercase()
}

fn follows_cert(title: &str, hash_start: usize) -> bool {
    title[..hash_start]
        .trim_end()
        .to_lowercase()
        .ends_with("cert")
}

fn is_cert_digits(value: &str) -> bool {
    value.len() >= 7 && value.chars().all(|c| c.is_ascii_digit())
}

// ============================================================================
// PRINT RUN
// ============================================================================

/// Serial-number denominator normalized to "/m" ("12/99" → "/99", "/5" → "/5")
pub fn extract_print_run(title: &str) -> Option<String> {
    PRINT_RUN_RE.captures_iter(title).find_map(|caps| {
        let total: u32 = caps.get(2)?.as_str().parse().ok()?;
        if total == 0 {
            return None;
        }
        Some(format!("/{}", total))
    })
}
