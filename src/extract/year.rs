// Year Extractor - first plausible 4-digit year, optional season suffix

use regex::Regex;
use std::sync::LazyLock;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})(?:-(\d{2}))?\b").unwrap());

/// First year in [1900, current_year + 1]. A two-digit suffix is kept only
/// when it names the following season ("1994-95", "2023-24").
///
/// Tokens glued to `#` or `/` are card numbers or print runs, not years.
pub fn extract_year(title: &str, current_year: i32) -> Option<String> {
    for caps in YEAR_RE.captures_iter(title) {
        let whole = caps.get(0)?;

        let prev = title[..whole.start()].chars().next_back();
        if matches!(prev, Some('#') | Some('/')) {
            continue;
        }

        let year: i32 = match caps[1].parse() {
            Ok(y) => y,
            Err(_) => continue,
        };
        if year < 1900 || year > current_year + 1 {
            continue;
        }

        if let Some(suffix) = caps.get(2) {
            if let Ok(s) = suffix.as_str().parse::<i32>() {
                if s == (year + 1) % 100 {
                    return Some(format!("{}-{:02}", year, s));
                }
            }
        }

        return Some(year.to_string());
    }

    None
}
