// Player Name Extractor
//
// Heuristic: mask the brand and variant spans, break the rest into tokens,
// drop everything on the denylists and keep the longest run of name-shaped
// tokens. Trade-off: a surname that is also a color or team word is cut
// ("Jalen Green" → "Jalen"); such results are flagged for review.

use super::ReviewReason;
use crate::terms::{normalize_word, TermLists};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static NAME_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{Lu}\p{L}*(?:['’\-.]\p{L}+)*\.?$").unwrap());
static LOWER_NAME_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{Ll}\p{L}*(?:['’\-.]\p{L}+)*\.?$").unwrap());

/// Characters that can never sit inside a name
const BREAK_CHARS: &[char] = &[
    ',', ';', ':', '(', ')', '[', ']', '{', '}', '|', '/', '&', '+', '!', '?', '"', '*', '~', '@',
];

/// Spans longer than this are flagged
const MAX_NAME_TOKENS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerExtraction {
    pub name: Option<String>,
    pub review: Vec<ReviewReason>,
}

pub fn extract_player(text: &str, excluded: &[Range<usize>], terms: &TermLists) -> PlayerExtraction {
    let residual = break_text(&mask_spans(text, excluded));
    let tokens: Vec<&str> = residual.split_whitespace().collect();

    // A title typed without capitals has no case signal to go on
    let lowercase = !text.chars().any(char::is_uppercase);

    let mut usable: Vec<bool> = tokens
        .iter()
        .map(|t| is_name_shaped(t, lowercase) && !terms.is_denied_word(t))
        .collect();
    deny_phrases(&tokens, &mut usable, terms);

    let mut runs: Vec<&[&str]> = Vec::new();
    let mut start = None;
    for i in 0..=tokens.len() {
        let ok = i < tokens.len() && usable[i];
        match (ok, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push(&tokens[s..i]);
                start = None;
            }
            _ => {}
        }
    }
    runs.retain(|run| !is_abbreviation(run));

    // Longest by tokens, then characters; earliest on a full tie
    let best = runs
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| {
            a.len()
                .cmp(&b.len())
                .then(char_len(a).cmp(&char_len(b)))
                .then(ib.cmp(ia))
        })
        .map(|(i, run)| (i, *run));

    let Some((best_index, best_run)) = best else {
        return PlayerExtraction {
            name: None,
            review: vec![ReviewReason::NoPlayerName],
        };
    };

    let mut review = Vec::new();
    if best_run.len() == 1 {
        review.push(ReviewReason::SingleTokenName);
    }
    if best_run.len() > MAX_NAME_TOKENS {
        review.push(ReviewReason::LongNameSpan);
    }
    let rivals = runs
        .iter()
        .enumerate()
        .any(|(i, run)| i != best_index && run.len() == best_run.len());
    if rivals {
        review.push(ReviewReason::AmbiguousName);
    }

    let name = best_run
        .iter()
        .map(|t| normalize_case(t))
        .collect::<Vec<_>>()
        .join(" ");

    PlayerExtraction {
        name: Some(name),
        review,
    }
}

fn is_name_shaped(token: &str, lowercase_title: bool) -> bool {
    NAME_TOKEN_RE.is_match(token) || (lowercase_title && LOWER_NAME_TOKEN_RE.is_match(token))
}

/// Replace excluded byte spans with a separator so runs cannot cross them
fn mask_spans(text: &str, excluded: &[Range<usize>]) -> String {
    let mut spans: Vec<Range<usize>> = excluded
        .iter()
        .filter(|r| r.start < r.end && r.end <= text.len())
        .filter(|r| text.is_char_boundary(r.start) && text.is_char_boundary(r.end))
        .cloned()
        .collect();
    spans.sort_by_key(|r| r.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        if span.start >= cursor {
            out.push_str(&text[cursor..span.start]);
            out.push_str(" | ");
            cursor = span.end;
        } else if span.end > cursor {
            cursor = span.end;
        }
    }
    out.push_str(&text[cursor..]);
    out
}

fn break_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if BREAK_CHARS.contains(&c) {
            out.push_str(" | ");
        } else {
            out.push(c);
        }
    }
    out
}

fn deny_phrases(tokens: &[&str], usable: &mut [bool], terms: &TermLists) {
    let normalized: Vec<String> = tokens.iter().map(|t| normalize_word(t)).collect();

    for phrase in terms.denied_phrases() {
        let k = phrase.len();
        if k == 0 || k > normalized.len() {
            continue;
        }
        for i in 0..=(normalized.len() - k) {
            if normalized[i..i + k] == phrase[..] {
                usable[i..i + k].iter_mut().for_each(|u| *u = false);
            }
        }
    }
}

/// A lone all-caps token of at most two letters ("RC", "LA") is not a name
fn is_abbreviation(run: &[&str]) -> bool {
    match run {
        [only] => only.chars().filter(|c| c.is_alphabetic()).count() <= 2
            && only.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase),
        _ => false,
    }
}

fn char_len(run: &[&str]) -> usize {
    run.iter().map(|t| t.chars().count()).sum()
}

/// Title-case a shouting or all-lowercase token, keeping upper-case initials
/// ("CJ", "A.J.") and roman numerals as written. Mixed case is left alone
/// ("McDavid", "DeBrusk").
fn normalize_case(token: &str) -> String {
    let letters: Vec<char> = token.chars().filter(|c| c.is_alphabetic()).collect();
    let all_upper = letters.iter().all(|c| c.is_uppercase());
    let all_lower = letters.iter().all(|c| c.is_lowercase());

    let keep = if all_upper {
        letters.len() <= 2 || is_roman_numeral(token)
    } else {
        !all_lower
    };
    if keep {
        return token.to_string();
    }

    let mut out = String::with_capacity(token.len());
    let mut capitalize = true;
    for c in token.chars() {
        if c.is_alphabetic() {
            if capitalize {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            capitalize = false;
        } else {
            out.push(c);
            capitalize = matches!(c, '\'' | '’' | '-' | '.');
        }
    }
    out
}

fn is_roman_numeral(token: &str) -> bool {
    let core = token.trim_end_matches('.');
    !core.is_empty() && core.chars().all(|c| matches!(c, 'I' | 'V' | 'X'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms() -> TermLists {
        TermLists::builtin().unwrap()
    }

    fn player(text: &str) -> PlayerExtraction {
        extract_player(text, &[], &terms())
    }

    #[test]
    fn test_name_between_noise() {
        let text = "2024 Bowman U Chrome #16 Cooper Flagg Duke RC Rookie AUTO";
        let result = extract_player(text, &[5..20], &terms());
        assert_eq!(result.name.as_deref(), Some("Cooper Flagg"));
        assert!(result.review.is_empty());
    }

    #[test]
    fn test_all_caps_title_cased() {
        let text = "PAUL SKENES 2024 BOWMAN CHROME SAPPHIRE ROOKIE RC RED /5 PIRATES";
        let result = extract_player(text, &[17..39, 50..53], &terms());
        assert_eq!(result.name.as_deref(), Some("Paul Skenes"));
        assert!(result.review.is_empty());
    }

    #[test]
    fn test_apostrophes_and_hyphens() {
        assert_eq!(
            player("2023 JA'MARR CHASE Bengals").name.as_deref(),
            Some("Ja'Marr Chase")
        );
        assert_eq!(
            player("JAXON SMITH-NJIGBA Seahawks").name.as_deref(),
            Some("Jaxon Smith-Njigba")
        );
    }

    #[test]
    fn test_initials_and_suffixes_kept() {
        assert_eq!(
            player("1989 Ken Griffey Jr. Mariners").name.as_deref(),
            Some("Ken Griffey Jr.")
        );
        assert_eq!(player("CJ STROUD Texans").name.as_deref(), Some("CJ Stroud"));
    }

    #[test]
    fn test_team_phrase_breaks_run() {
        assert_eq!(
            player("Rafael Devers Red Sox").name.as_deref(),
            Some("Rafael Devers")
        );
    }

    #[test]
    fn test_denylisted_surname_flagged() {
        let result = player("2021 Jalen Green RC");
        assert_eq!(result.name.as_deref(), Some("Jalen"));
        assert_eq!(result.review, vec![ReviewReason::SingleTokenName]);
    }

    #[test]
    fn test_ambiguous_and_long_spans() {
        let result = player("Mike Trout RC Shohei Ohtani");
        assert_eq!(result.name.as_deref(), Some("Shohei Ohtani"));
        assert_eq!(result.review, vec![ReviewReason::AmbiguousName]);

        let result = player("Caleb Williams Drake Maye Dual");
        assert_eq!(result.name.as_deref(), Some("Caleb Williams Drake Maye"));
        assert_eq!(result.review, vec![ReviewReason::LongNameSpan]);
    }

    #[test]
    fn test_no_name() {
        let result = player("2024 RC AUTO /25 PSA 10");
        assert_eq!(result.name, None);
        assert_eq!(result.review, vec![ReviewReason::NoPlayerName]);

        let result = player("");
        assert_eq!(result.name, None);
    }

    #[test]
    fn test_lowercase_words_are_not_names() {
        assert_eq!(player("wow look at this Elly De Cruz").name.as_deref(), Some("Elly De Cruz"));
    }

    #[test]
    fn test_all_lowercase_title_is_title_cased() {
        let result = player("caleb williams rc");
        assert_eq!(result.name.as_deref(), Some("Caleb Williams"));
        assert!(result.review.is_empty());

        assert_eq!(player("ja'marr chase").name.as_deref(), Some("Ja'Marr Chase"));
        assert_eq!(normalize_case("smith-njigba"), "Smith-Njigba");
    }

    #[test]
    fn test_masked_spans_break_runs() {
        let text = "Gunnar Henderson Gold Refractor";
        let result = extract_player(text, &[17..31], &terms());
        assert_eq!(result.name.as_deref(), Some("Gunnar Henderson"));
    }
}
