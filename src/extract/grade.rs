// Grade/Certification Stripper - removes slab noise before name extraction

use crate::error::ConfigResult;
use crate::rules::RuleEngine;

/// Wraps the grading rule ladder. Stripping is idempotent because the
/// ladder runs to a fixpoint.
#[derive(Debug, Clone)]
pub struct GradeStripper {
    rules: RuleEngine,
}

impl GradeStripper {
    pub fn new(rules: RuleEngine) -> Self {
        GradeStripper { rules }
    }

    /// Built-in PSA/BGS/SGC/CGC ladder
    pub fn builtin() -> ConfigResult<Self> {
        Ok(GradeStripper::new(RuleEngine::grading_rules()?))
    }

    pub fn strip(&self, title: &str) -> String {
        self.rules.apply(title)
    }

    /// Stripped text plus the ids of the rules that changed it
    pub fn strip_traced(&self, title: &str) -> (String, Vec<String>) {
        self.rules.apply_traced(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripper() -> GradeStripper {
        GradeStripper::builtin().unwrap()
    }

    #[test]
    fn test_fixture_titles() {
        let s = stripper();
        assert_eq!(
            s.strip("2024 Bowman U Chrome #16 Cooper Flagg Duke RC Rookie AUTO PSA 10 GEM MINT"),
            "2024 Bowman U Chrome #16 Cooper Flagg Duke RC Rookie AUTO"
        );
        assert_eq!(
            s.strip("PAUL SKENES 2024 BOWMAN CHROME SAPPHIRE ROOKIE RC RED /5 PSA 10 GEM MINT PIRATES"),
            "PAUL SKENES 2024 BOWMAN CHROME SAPPHIRE ROOKIE RC RED /5 PIRATES"
        );
    }

    #[test]
    fn test_card_number_survives() {
        let s = stripper();
        assert_eq!(
            s.strip("2024 Topps Chrome #74 Caleb Williams PSA 9 MINT"),
            "2024 Topps Chrome #74 Caleb Williams"
        );
    }

    #[test]
    fn test_traced_reports_rules() {
        let s = stripper();
        let (out, fired) = s.strip_traced("Elly De La Cruz SGC 10 POP 2");
        assert_eq!(out, "Elly De La Cruz");
        assert_eq!(fired, vec!["company_grade".to_string(), "population".to_string()]);
    }

    #[test]
    fn test_idempotent_over_noisy_titles() {
        let s = stripper();
        let titles = [
            "2024 Bowman U Chrome #16 Cooper Flagg Duke RC Rookie AUTO PSA 10 GEM MINT",
            "PAUL SKENES 2024 BOWMAN CHROME SAPPHIRE ROOKIE RC RED /5 PSA 10 GEM MINT PIRATES",
            "Ohtani PSA/DNA AUTHENTIC AUTO 10 (PSA 10) CERT #87654321 POP 1 NONE HIGHER",
            "BGS 9.5 GEM MINT 2018 Prizm Luka Doncic Silver",
            "CGC PSA BGS SGC",
            "",
            "MINT MINT GEM MT NM-MT",
        ];
        for title in titles {
            let once = s.strip(title);
            assert_eq!(s.strip(&once), once, "not idempotent for {title:?}");
        }
    }

    #[test]
    fn test_idempotent_over_generated_noise() {
        let s = stripper();
        let noise = ["PSA", "10", "POP", "GEM MINT", "CERT", "(", ")", "BGS 9.5", "NONE HIGHER", "3"];

        // Every ordered triple of fragments, nested around a name
        for a in noise {
            for b in noise {
                for c in noise {
                    let title = format!("{a} {b} Ohtani {c} {a} {b} {c} {b} {a}");
                    let once = s.strip(&title);
                    assert_eq!(s.strip(&once), once, "not idempotent for {title:?}");
                }
            }
        }
    }
}
