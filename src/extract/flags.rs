// Autograph / rookie flags

use regex::Regex;
use std::sync::LazyLock;

static NON_AUTO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:NON|NO)[-\s]?AUTO(?:GRAPH(?:ED)?)?\b").unwrap());
static AUTO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:AUTO|AUTOS|AUTOGRAPH|AUTOGRAPHS|AUTOGRAPHED|SIGNED|RPA)\b").unwrap()
});
static ROOKIE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:RC|ROOKIE|ROOKIES|RPA)\b").unwrap());

pub fn is_autograph(title: &str) -> bool {
    let cleaned = NON_AUTO_RE.replace_all(title, " ");
    AUTO_RE.is_match(&cleaned)
}

pub fn is_rookie(title: &str) -> bool {
    ROOKIE_RE.is_match(title)
}
