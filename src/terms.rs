// 📚 Term Lists - Dictionaries that drive extraction
//
// Brand/set phrases, variant terms, grading companies and the denylists the
// player-name extractor uses. Loaded once, never mutated, shared by Arc.
// The SHA-256 fingerprint identifies exactly which dictionary produced a record.

use crate::error::{read_json, ConfigError, ConfigResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// SERIALIZABLE FORM
// ============================================================================

/// One brand/set phrase. `phrase` is what appears in titles; `brand` and
/// `set_name` are the canonical values recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandEntry {
    pub phrase: String,
    pub brand: String,
    #[serde(default)]
    pub set_name: Option<String>,
}

impl BrandEntry {
    pub fn new(phrase: &str, brand: &str, set_name: Option<&str>) -> Self {
        BrandEntry {
            phrase: phrase.to_string(),
            brand: brand.to_string(),
            set_name: set_name.map(str::to_string),
        }
    }

    /// Number of words in the matching phrase (specificity)
    pub fn word_count(&self) -> usize {
        self.phrase.split_whitespace().count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermListData {
    /// Declaration order breaks specificity ties (earlier wins)
    pub brands: Vec<BrandEntry>,
    pub variants: Vec<String>,
    pub grading_companies: Vec<String>,
    pub card_terms: Vec<String>,
    pub teams: Vec<String>,
    pub cities: Vec<String>,
}

// ============================================================================
// COMPILED TERM LISTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct TermLists {
    data: TermListData,
    brand_patterns: Vec<Regex>,
    variant_patterns: Vec<Regex>,
    grade_pattern: Option<Regex>,
    denied_words: HashSet<String>,
    denied_phrases: Vec<Vec<String>>,
    fingerprint: String,
}

impl TermLists {
    pub fn new(data: TermListData) -> ConfigResult<Self> {
        if data.brands.iter().any(|b| b.phrase.trim().is_empty()) {
            return Err(ConfigError::Invalid("brand phrase is empty".to_string()));
        }
        if data.variants.iter().any(|v| v.trim().is_empty()) {
            return Err(ConfigError::Invalid("variant term is empty".to_string()));
        }

        let brand_patterns = data
            .brands
            .iter()
            .map(|b| compile_phrase(&b.phrase))
            .collect::<ConfigResult<Vec<_>>>()?;
        let variant_patterns = data
            .variants
            .iter()
            .map(|v| compile_phrase(v))
            .collect::<ConfigResult<Vec<_>>>()?;

        let grade_pattern = compile_grade_pattern(&data.grading_companies)?;

        let mut denied_words = HashSet::new();
        let mut denied_phrases = Vec::new();

        for term in data
            .card_terms
            .iter()
            .chain(data.teams.iter())
            .chain(data.cities.iter())
        {
            let words = phrase_words(term);
            match words.len() {
                0 => {}
                1 => {
                    denied_words.insert(words[0].clone());
                }
                _ => denied_phrases.push(words),
            }
        }

        // Dictionary vocabulary never belongs in a player name. Multi-word
        // phrases deny only as a whole so "Young Guns" leaves "Young" usable.
        for phrase in data
            .brands
            .iter()
            .map(|b| b.phrase.as_str())
            .chain(data.variants.iter().map(String::as_str))
        {
            let words = phrase_words(phrase);
            if words.len() == 1 {
                denied_words.extend(words);
            } else {
                denied_phrases.push(words);
            }
        }

        let canonical = serde_json::to_string(&data)
            .map_err(|e| ConfigError::Invalid(format!("term lists not serializable: {e}")))?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let fingerprint = format!("{:x}", hasher.finalize());

        Ok(TermLists {
            data,
            brand_patterns,
            variant_patterns,
            grade_pattern,
            denied_words,
            denied_phrases,
            fingerprint,
        })
    }

    /// Load term lists from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let data: TermListData = read_json(path.as_ref())?;
        TermLists::new(data)
    }

    /// Built-in dictionaries
    pub fn builtin() -> ConfigResult<Self> {
        TermLists::new(builtin_data())
    }

    pub fn data(&self) -> &TermListData {
        &self.data
    }

    /// Brand entries paired with their compiled matcher, in declaration order
    pub fn brands(&self) -> impl Iterator<Item = (&BrandEntry, &Regex)> {
        self.data.brands.iter().zip(self.brand_patterns.iter())
    }

    /// Variant terms paired with their compiled matcher, in declaration order
    pub fn variants(&self) -> impl Iterator<Item = (&str, &Regex)> {
        self.data
            .variants
            .iter()
            .map(String::as_str)
            .zip(self.variant_patterns.iter())
    }

    pub fn grading_companies(&self) -> &[String] {
        &self.data.grading_companies
    }

    /// Grading company followed by its grade; group 1 is the grade.
    /// `None` when no companies are configured.
    pub fn grade_pattern(&self) -> Option<&Regex> {
        self.grade_pattern.as_ref()
    }

    /// Whether a single word (any case, trailing period ignored) is denylisted
    pub fn is_denied_word(&self, word: &str) -> bool {
        self.denied_words.contains(&normalize_word(word))
    }

    /// Multi-word denylist entries, lowercased and split into words
    pub fn denied_phrases(&self) -> &[Vec<String>] {
        &self.denied_phrases
    }

    /// SHA-256 of the canonical JSON form of the dictionaries
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Lowercase and drop a trailing period: "Jr." and "JR" compare equal to "jr"
pub fn normalize_word(word: &str) -> String {
    word.trim_end_matches('.').to_lowercase()
}

fn phrase_words(phrase: &str) -> Vec<String> {
    phrase.split_whitespace().map(normalize_word).collect()
}

fn compile_grade_pattern(companies: &[String]) -> ConfigResult<Option<Regex>> {
    let names: Vec<String> = companies
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(regex::escape)
        .collect();
    if names.is_empty() {
        return Ok(None);
    }

    let pattern = format!(
        r"(?i)\b(?:{})\s*(?:GEM\s*-?\s*(?:MINT|MT)\s*)?(\d{{1,3}}(?:\.5)?)\b",
        names.join("|")
    );
    Regex::new(&pattern)
        .map(Some)
        .map_err(|source| ConfigError::Pattern {
            id: "grading_companies".to_string(),
            source,
        })
}

/// Case-insensitive matcher for a dictionary phrase. Words may be separated by
/// any run of whitespace; word boundaries apply only where the phrase starts or
/// ends with a letter or digit.
fn compile_phrase(phrase: &str) -> ConfigResult<Regex> {
    let body = phrase
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");

    let starts_alnum = phrase.trim().chars().next().is_some_and(char::is_alphanumeric);
    let ends_alnum = phrase.trim().chars().last().is_some_and(char::is_alphanumeric);

    let pattern = format!(
        "(?i){}{}{}",
        if starts_alnum { r"\b" } else { "" },
        body,
        if ends_alnum { r"\b" } else { "" },
    );

    Regex::new(&pattern).map_err(|source| ConfigError::Pattern {
        id: phrase.to_string(),
        source,
    })
}

// ============================================================================
// BUILT-IN DICTIONARIES
// ============================================================================

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn builtin_data() -> TermListData {
    let brands = vec![
        // Bowman
        BrandEntry::new("Bowman Chrome Update", "Bowman", Some("Chrome Update")),
        BrandEntry::new("Bowman Chrome Sapphire", "Bowman", Some("Chrome Sapphire")),
        BrandEntry::new("Bowman Draft Chrome", "Bowman", Some("Draft Chrome")),
        BrandEntry::new("Bowman Chrome Draft", "Bowman", Some("Chrome Draft")),
        BrandEntry::new("Bowman Draft Sapphire", "Bowman", Some("Draft Sapphire")),
        BrandEntry::new("Bowman University Chrome", "Bowman", Some("U Chrome")),
        BrandEntry::new("Bowman U Chrome", "Bowman", Some("U Chrome")),
        BrandEntry::new("Bowman University", "Bowman", Some("U")),
        BrandEntry::new("Bowman Sterling", "Bowman", Some("Sterling")),
        BrandEntry::new("Bowman's Best", "Bowman", Some("Best")),
        BrandEntry::new("Bowman Platinum", "Bowman", Some("Platinum")),
        BrandEntry::new("Bowman Chrome", "Bowman", Some("Chrome")),
        BrandEntry::new("Bowman Draft", "Bowman", Some("Draft")),
        BrandEntry::new("Bowman", "Bowman", None),
        // Topps
        BrandEntry::new("Topps Chrome Update", "Topps", Some("Chrome Update")),
        BrandEntry::new("Topps Chrome Sapphire", "Topps", Some("Chrome Sapphire")),
        BrandEntry::new("Topps Chrome Black", "Topps", Some("Chrome Black")),
        BrandEntry::new("Topps Cosmic Chrome", "Topps", Some("Cosmic Chrome")),
        BrandEntry::new("Topps Museum Collection", "Topps", Some("Museum Collection")),
        BrandEntry::new("Topps Stadium Club", "Topps", Some("Stadium Club")),
        BrandEntry::new("Topps Series 1", "Topps", Some("Series 1")),
        BrandEntry::new("Topps Series 2", "Topps", Some("Series 2")),
        BrandEntry::new("Topps Chrome", "Topps", Some("Chrome")),
        BrandEntry::new("Topps Update", "Topps", Some("Update")),
        BrandEntry::new("Topps Finest", "Topps", Some("Finest")),
        BrandEntry::new("Topps Heritage", "Topps", Some("Heritage")),
        BrandEntry::new("Topps Dynasty", "Topps", Some("Dynasty")),
        BrandEntry::new("Topps Tribute", "Topps", Some("Tribute")),
        BrandEntry::new("Topps Inception", "Topps", Some("Inception")),
        BrandEntry::new("Topps Gallery", "Topps", Some("Gallery")),
        BrandEntry::new("Topps Now", "Topps", Some("Now")),
        BrandEntry::new("Stadium Club", "Topps", Some("Stadium Club")),
        BrandEntry::new("Finest", "Topps", Some("Finest")),
        BrandEntry::new("Topps", "Topps", None),
        // Panini
        BrandEntry::new("Panini National Treasures", "Panini", Some("National Treasures")),
        BrandEntry::new("National Treasures", "Panini", Some("National Treasures")),
        BrandEntry::new("Immaculate Collection", "Panini", Some("Immaculate")),
        BrandEntry::new("Donruss Optic", "Panini", Some("Donruss Optic")),
        BrandEntry::new("Donruss Elite", "Panini", Some("Donruss Elite")),
        BrandEntry::new("Panini Prizm", "Panini", Some("Prizm")),
        BrandEntry::new("Panini Select", "Panini", Some("Select")),
        BrandEntry::new("Panini Mosaic", "Panini", Some("Mosaic")),
        BrandEntry::new("Panini Contenders", "Panini", Some("Contenders")),
        BrandEntry::new("Panini Spectra", "Panini", Some("Spectra")),
        BrandEntry::new("Panini Chronicles", "Panini", Some("Chronicles")),
        BrandEntry::new("Panini Origins", "Panini", Some("Origins")),
        BrandEntry::new("Panini Phoenix", "Panini", Some("Phoenix")),
        BrandEntry::new("Panini Flawless", "Panini", Some("Flawless")),
        BrandEntry::new("Panini Immaculate", "Panini", Some("Immaculate")),
        BrandEntry::new("Prizm", "Panini", Some("Prizm")),
        BrandEntry::new("Optic", "Panini", Some("Donruss Optic")),
        BrandEntry::new("Donruss", "Panini", Some("Donruss")),
        BrandEntry::new("Select", "Panini", Some("Select")),
        BrandEntry::new("Mosaic", "Panini", Some("Mosaic")),
        BrandEntry::new("Contenders", "Panini", Some("Contenders")),
        BrandEntry::new("Spectra", "Panini", Some("Spectra")),
        BrandEntry::new("Chronicles", "Panini", Some("Chronicles")),
        BrandEntry::new("Flawless", "Panini", Some("Flawless")),
        BrandEntry::new("Immaculate", "Panini", Some("Immaculate")),
        BrandEntry::new("Hoops", "Panini", Some("Hoops")),
        BrandEntry::new("Panini", "Panini", None),
        // Others
        BrandEntry::new("Upper Deck Young Guns", "Upper Deck", Some("Young Guns")),
        BrandEntry::new("Young Guns", "Upper Deck", Some("Young Guns")),
        BrandEntry::new("Upper Deck", "Upper Deck", None),
        BrandEntry::new("Fleer Ultra", "Fleer", Some("Ultra")),
        BrandEntry::new("Fleer", "Fleer", None),
        BrandEntry::new("Leaf Metal", "Leaf", Some("Metal")),
        BrandEntry::new("Leaf", "Leaf", None),
        BrandEntry::new("Skybox", "Skybox", None),
    ];

    let variants = strings(&[
        "Gold Refractor",
        "Orange Refractor",
        "Red Refractor",
        "Blue Refractor",
        "Green Refractor",
        "Purple Refractor",
        "Black Refractor",
        "Pink Refractor",
        "Aqua Refractor",
        "Sepia Refractor",
        "Negative Refractor",
        "X-Fractor",
        "Xfractor",
        "Superfractor",
        "Refractor",
        "Silver Prizm",
        "Gold Prizm",
        "Cracked Ice",
        "Tiger Stripe",
        "Color Blast",
        "Stained Glass",
        "Printing Plate",
        "Image Variation",
        "Photo Variation",
        "Case Hit",
        "Gold Vinyl",
        "Red Wave",
        "Blue Wave",
        "Gold Wave",
        "Wave",
        "Mojo",
        "Shimmer",
        "Speckle",
        "Lava",
        "Atomic",
        "Hyper",
        "Disco",
        "Snakeskin",
        "Camo",
        "Holo",
        "Kaboom",
        "Downtown",
        "Tie-Dye",
        "Tie Dye",
        "Zebra",
        "Checkerboard",
        "Nebula",
        "Pulsar",
        "Velocity",
        "Scope",
        "Lazer",
        "Fast Break",
        "Gold",
        "Orange",
        "Red",
        "Blue",
        "Green",
        "Purple",
        "Black",
        "Pink",
        "Aqua",
        "Silver",
        "Yellow",
        "Bronze",
        "Sapphire",
        "Emerald",
        "Ruby",
        "Variation",
        "SSP",
        "Base",
    ]);

    let grading_companies = strings(&["PSA", "BGS", "SGC", "CGC", "CSG", "HGA"]);

    let card_terms = strings(&[
        // Card status
        "rookie", "rookies", "rc", "rookie card", "rated rookie", "1st", "first",
        "debut", "prospect", "prospects", "draft", "pick", "auto", "autos",
        "autograph", "autographs", "autographed", "signed", "signature",
        "signatures", "on-card", "rpa", "patch", "relic", "jersey", "memorabilia",
        "game-used", "used", "worn", "logoman", "booklet", "dual", "triple", "quad",
        // Print & numbering
        "parallel", "insert", "sp", "ssp", "variation", "var", "image", "photo",
        "short", "print", "numbered", "serial", "edition", "limited", "one",
        "base", "card", "cards", "lot", "set", "sealed", "hobby", "retail",
        "blaster", "mega", "box", "pack", "break", "case", "hit",
        // Finishes and colors
        "refractor", "refractors", "prizm", "chrome", "sapphire", "foil", "holo",
        "wave", "mojo", "shimmer", "speckle", "lava", "atomic", "sepia", "negative",
        "superfractor", "xfractor", "x-fractor", "gold", "silver", "red", "blue",
        "green", "orange", "purple", "black", "pink", "aqua", "yellow", "bronze",
        "platinum", "white", "teal", "emerald", "ruby", "neon", "camo", "disco",
        "clear", "vinyl", "color", "match",
        // Set vocabulary
        "update", "series", "heritage", "finest", "optic", "select", "mosaic",
        "donruss", "topps", "bowman", "panini", "fleer", "leaf", "hoops", "flawless",
        "immaculate", "contenders", "spectra", "university", "young guns",
        // Grading leftovers
        "gem", "mint", "graded", "raw", "slab", "psa", "bgs", "sgc", "cgc",
        "pop", "cert", "dna",
        // Leagues & marketing
        "baseball", "football", "basketball", "hockey", "soccer", "mlb", "nfl",
        "nba", "nhl", "wnba", "ncaa", "college", "usa", "team", "mvp", "all-star",
        "hof", "hall of fame", "champion", "champions", "championship", "legend",
        "legends", "icons", "stars", "future", "hot", "invest", "rare", "ssp",
        "case hit", "new", "look", "read", "nice", "sharp", "centered", "wow",
    ]);

    let teams = strings(&[
        // MLB
        "angels", "astros", "athletics", "a's", "blue jays", "braves", "brewers",
        "cardinals", "cubs", "diamondbacks", "d-backs", "dodgers", "giants",
        "guardians", "indians", "mariners", "marlins", "mets", "nationals",
        "orioles", "padres", "phillies", "pirates", "rangers", "rays", "red sox",
        "reds", "rockies", "royals", "tigers", "twins", "white sox", "yankees",
        // NFL
        "bears", "bengals", "bills", "broncos", "browns", "buccaneers", "bucs",
        "chargers", "chiefs", "colts", "commanders", "cowboys", "dolphins",
        "eagles", "falcons", "49ers", "jaguars", "jets", "lions", "packers",
        "panthers", "patriots", "raiders", "rams", "ravens", "saints", "seahawks",
        "steelers", "texans", "titans", "vikings",
        // NBA
        "hawks", "celtics", "nets", "hornets", "bulls", "cavaliers", "cavs",
        "mavericks", "mavs", "nuggets", "pistons", "warriors", "rockets", "pacers",
        "clippers", "lakers", "grizzlies", "heat", "bucks", "timberwolves",
        "pelicans", "knicks", "thunder", "magic", "76ers", "sixers", "suns",
        "trail blazers", "blazers", "spurs", "raptors", "jazz", "wizards",
        // NHL
        "oilers", "maple leafs", "canadiens", "penguins", "blackhawks", "bruins",
        "capitals", "avalanche", "lightning", "flames", "canucks",
        // College
        "duke", "blue devils", "tar heels", "crimson tide", "alabama", "lsu",
        "ohio state", "buckeyes", "wildcats", "kentucky", "gonzaga", "longhorns",
        "clemson", "michigan", "wolverines", "usc", "trojans", "oregon", "ducks",
        "notre dame", "gators", "auburn", "sooners", "oklahoma", "volunteers",
        "hawkeyes", "baylor", "uconn", "huskies", "villanova", "jayhawks",
        "bulldogs",
    ]);

    let cities = strings(&[
        "new york", "los angeles", "chicago", "boston", "philadelphia",
        "houston", "miami", "atlanta", "denver", "detroit", "seattle",
        "san francisco", "san diego", "tampa bay", "tampa", "kansas city",
        "st. louis", "st louis", "pittsburgh", "cleveland", "cincinnati",
        "baltimore", "milwaukee", "minnesota", "arizona", "oakland", "toronto",
        "montreal", "brooklyn", "golden state", "sacramento", "portland",
        "phoenix", "utah", "memphis", "new orleans", "orlando", "indiana",
        "indianapolis", "charlotte", "buffalo", "green bay", "las vegas",
        "jacksonville", "nashville", "carolina", "new england", "colorado",
        "anaheim", "texas", "florida", "georgia", "tennessee", "iowa", "kansas",
    ]);

    TermListData {
        brands,
        variants,
        grading_companies,
        card_terms,
        teams,
        cities,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_loads() {
        let terms = TermLists::builtin().unwrap();
        assert!(terms.brands().count() > 50);
        assert!(terms.variants().count() > 40);
        assert!(terms.data().card_terms.len() >= 150);
        assert_eq!(terms.fingerprint().len(), 64);
    }

    #[test]
    fn test_denied_words_case_insensitive() {
        let terms = TermLists::builtin().unwrap();
        assert!(terms.is_denied_word("ROOKIE"));
        assert!(terms.is_denied_word("Pirates"));
        assert!(terms.is_denied_word("duke"));
        // Brand vocabulary is derived from the dictionary
        assert!(terms.is_denied_word("Bowman"));
        assert!(!terms.is_denied_word("Skenes"));
        assert!(!terms.is_denied_word("Jr."));
        assert!(!terms.is_denied_word("Young"));
    }

    #[test]
    fn test_multiword_entries_become_phrases() {
        let terms = TermLists::builtin().unwrap();
        let red_sox = vec!["red".to_string(), "sox".to_string()];
        assert!(terms.denied_phrases().contains(&red_sox));
        // "sox" alone is not a denied word
        assert!(!terms.is_denied_word("Sox"));
    }

    #[test]
    fn test_phrase_matcher_flexible_whitespace() {
        let regex = compile_phrase("Bowman Chrome Sapphire").unwrap();
        assert!(regex.is_match("2024 BOWMAN  CHROME\tSAPPHIRE Red"));
        assert!(!regex.is_match("2024 Bowmanchrome Sapphire"));

        let regex = compile_phrase("X-Fractor").unwrap();
        assert!(regex.is_match("Gold x-fractor /50"));
    }

    #[test]
    fn test_grade_pattern_captures_grade() {
        let terms = TermLists::builtin().unwrap();
        let re = terms.grade_pattern().unwrap();
        let grades: Vec<&str> = re
            .captures_iter("Skenes PSA 10 (bgs gem mint 9.5) SGC 8")
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        assert_eq!(grades, vec!["10", "9.5", "8"]);

        let none = TermLists::new(TermListData::default()).unwrap();
        assert!(none.grade_pattern().is_none());
    }

    #[test]
    fn test_tie_dye_is_a_variant() {
        let terms = TermLists::builtin().unwrap();
        assert!(terms.variants().any(|(v, re)| v == "Tie-Dye" && re.is_match("Wembanyama TIE-DYE /25")));
        assert!(terms.is_denied_word("Tie-Dye"));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = TermLists::builtin().unwrap();
        let b = TermLists::builtin().unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut data = a.data().clone();
        data.variants.push("Lunar Glow".to_string());
        let c = TermLists::new(data).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_empty_phrase_rejected() {
        let data = TermListData {
            brands: vec![BrandEntry::new("  ", "Topps", None)],
            ..TermListData::default()
        };
        assert!(matches!(TermLists::new(data), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_file() {
        let data = TermListData {
            brands: vec![BrandEntry::new("Score", "Score", None)],
            variants: vec!["Glossy".to_string()],
            grading_companies: vec!["PSA".to_string()],
            card_terms: vec!["rookie".to_string()],
            teams: vec![],
            cities: vec![],
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&data).unwrap().as_bytes())
            .unwrap();

        let terms = TermLists::from_file(file.path()).unwrap();
        assert_eq!(terms.data(), &data);
        assert!(terms.is_denied_word("glossy"));
    }
}
