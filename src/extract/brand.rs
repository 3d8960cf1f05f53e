// Brand/Set Classifier - most specific dictionary phrase wins

use crate::terms::TermLists;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandMatch {
    pub brand: String,
    pub set_name: Option<String>,
    /// Byte span of the matched phrase in the classified text
    pub span: Range<usize>,
}

/// Scan the brand dictionary and keep the most specific match: more words
/// first, then more characters. Equal specificity keeps the entry declared
/// first. `None` is common and means "needs review", not an error.
pub fn classify_brand(text: &str, terms: &TermLists) -> Option<BrandMatch> {
    let mut best: Option<((usize, usize), BrandMatch)> = None;

    for (entry, regex) in terms.brands() {
        let Some(found) = regex.find(text) else {
            continue;
        };

        let specificity = (entry.word_count(), entry.phrase.chars().count());
        let better = match &best {
            Some((current, _)) => specificity > *current,
            None => true,
        };

        if better {
            best = Some((
                specificity,
                BrandMatch {
                    brand: entry.brand.clone(),
                    set_name: entry.set_name.clone(),
                    span: found.range(),
                },
            ));
        }
    }

    best.map(|(_, m)| m)
}
