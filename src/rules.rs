// 🏷️ Rewrite Rules - Rules as Data
// Ordered (pattern, replacement) passes used to scrub grading noise from titles

use crate::error::{read_json, ConfigError, ConfigResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteRule {
    /// Rule ID for tracking
    pub id: String,

    /// Regular expression (regex crate syntax)
    pub pattern: String,

    /// Replacement text, `$1`-style group references allowed
    #[serde(default = "default_replacement")]
    pub replacement: String,

    /// Description/notes about this rule
    pub description: Option<String>,

    /// Priority (higher = applied first, ties keep declaration order)
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_replacement() -> String {
    " ".to_string()
}

fn default_priority() -> i32 {
    0
}

impl RewriteRule {
    pub fn new(id: &str, pattern: &str, description: &str) -> Self {
        RewriteRule {
            id: id.to_string(),
            pattern: pattern.to_string(),
            replacement: default_replacement(),
            description: Some(description.to_string()),
            priority: 0,
        }
    }

    fn compile(self) -> ConfigResult<CompiledRule> {
        let regex = Regex::new(&self.pattern).map_err(|source| ConfigError::Pattern {
            id: self.id.clone(),
            source,
        })?;
        Ok(CompiledRule { rule: self, regex })
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: RewriteRule,
    regex: Regex,
}

// ============================================================================
// RULE ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
}

impl RuleEngine {
    /// Create a new empty rule engine
    pub fn new() -> Self {
        RuleEngine { rules: Vec::new() }
    }

    /// Load rules from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let rules: Vec<RewriteRule> = read_json(path.as_ref())?;
        RuleEngine::from_rules(rules)
    }

    /// Create engine from a list of rules
    pub fn from_rules(rules: Vec<RewriteRule>) -> ConfigResult<Self> {
        let mut compiled = rules
            .into_iter()
            .map(RewriteRule::compile)
            .collect::<ConfigResult<Vec<_>>>()?;
        // Stable sort: equal priorities keep declaration order
        compiled.sort_by(|a, b| b.rule.priority.cmp(&a.rule.priority));
        Ok(RuleEngine { rules: compiled })
    }

    /// Run the ladder until no rule changes the text
    pub fn apply(&self, text: &str) -> String {
        self.apply_traced(text).0
    }

    /// Same as `apply`, also returning the ids of rules that changed the text
    pub fn apply_traced(&self, text: &str) -> (String, Vec<String>) {
        let mut current = collapse_whitespace(text);
        let mut fired = Vec::new();
        let limit = pass_limit(&current);
        let mut passes = 0;

        loop {
            let mut changed = false;

            for compiled in &self.rules {
                if !compiled.regex.is_match(&current) {
                    continue;
                }
                let next = collapse_whitespace(
                    &compiled
                        .regex
                        .replace_all(&current, compiled.rule.replacement.as_str()),
                );
                if next != current {
                    debug!(rule = %compiled.rule.id, "rewrite rule fired");
                    fired.push(compiled.rule.id.clone());
                    current = next;
                    changed = true;
                }
            }

            if !changed {
                break;
            }

            passes += 1;
            if passes >= limit {
                warn!(passes, text = %current, "rewrite ladder did not settle");
                break;
            }
        }

        (current, fired)
    }

    /// Get number of rules loaded
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Rule ids in execution order
    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.rule.id.as_str()).collect()
    }

    /// Built-in grading/certification ladder.
    ///
    /// Order matters: authentication services go before the bare company
    /// pass (otherwise `PSA/DNA` leaves a dangling `/DNA`), and company+grade
    /// goes before grade words so `PSA 10 GEM MINT` loses both halves.
    pub fn grading_rules() -> ConfigResult<Self> {
        let rules = vec![
            RewriteRule::new(
                "auth_service",
                r"(?i)\b(?:PSA\s*/\s*DNA|JSA|BECKETT\s+(?:AUTHENTICATION|BAS)|BAS)(?:\s+(?:AUTH(?:ENTIC(?:ATED)?)?|CERTIFIED|COA|WITNESS(?:ED)?))?\b",
                "Autograph authentication services",
            ),
            RewriteRule::new(
                "black_label",
                r"(?i)\bBGS\s+BLACK\s+LABEL(?:\s+10)?\b",
                "Beckett black label",
            ),
            RewriteRule::new(
                "company_grade",
                r"(?i)\b(?:PSA|BGS|SGC|CGC|CSG|BVG|HGA)\s*(?:GEM\s*-?\s*(?:MINT|MT)\s*)?(?:10|[1-9](?:\.5)?)\b(?:\s*(?:CERT\s*)?#?\s*\d{7,}\b)?",
                "Grading company, numeric grade, optional cert number",
            ),
            RewriteRule::new(
                "cert_number",
                r"(?i)\bCERT(?:IFICATION)?\s*(?:#|NO\.?|NUMBER)?\s*:?\s*\d{6,}\b",
                "Standalone certificate numbers",
            ),
            RewriteRule::new(
                "population",
                r"(?i)\bPOP(?:ULATION)?\s*(?:REPORT\s*)?:?\s*\d+\b",
                "Population report counts",
            ),
            RewriteRule::new(
                "none_higher",
                r"(?i)\b(?:NONE|(?:ONLY\s+)?\d+)\s+HIGHER\b",
                "Population ceiling phrases",
            ),
            RewriteRule::new(
                "grade_words",
                r"(?i)\b(?:GEM\s*-?\s*MINT|GEM\s*-?\s*MT|NM\s*[-/]\s*MT|NEAR\s+MINT|MINT|PRISTINE|AUTHENTIC|GRADED|SLABBED)\b",
                "Standalone grade words",
            ),
            RewriteRule::new(
                "bare_company",
                r"(?i)\b(?:PSA|BGS|SGC|CGC|CSG|HGA)\b",
                "Company names left without a grade",
            ),
            RewriteRule::new(
                "empty_brackets",
                r"\(\s*\)|\[\s*\]",
                "Brackets emptied by earlier passes",
            ),
        ];

        RuleEngine::from_rules(rules)
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Passes allowed before giving up on a fixpoint. Every changing pass of a
/// ladder that only deletes text shortens it, so such a ladder settles first.
fn pass_limit(text: &str) -> usize {
    text.chars().count() + 2
}

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// TESTS
// ============================================================================
