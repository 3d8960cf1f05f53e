// Variant Detector - parallels, colors and finishes

use crate::terms::TermLists;
use std::collections::HashSet;
use std::ops::Range;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantMatch {
    /// Dictionary-cased variant words in title order; None when only "Base"
    /// (or nothing) was found
    pub variant: Option<String>,

    /// Byte spans of every accepted match, "Base" included
    pub spans: Vec<Range<usize>>,
}

struct Candidate<'a> {
    term: &'a str,
    span: Range<usize>,
    order: usize,
}

/// Collect variant terms outside the `excluded` spans (normally the brand
/// phrase). Longer terms win where matches overlap, so "Gold Refractor"
/// beats "Gold". Repeated words are kept once.
pub fn detect_variant(text: &str, excluded: &[Range<usize>], terms: &TermLists) -> VariantMatch {
    let mut candidates = Vec::new();

    for (order, (term, regex)) in terms.variants().enumerate() {
        for found in regex.find_iter(text) {
            let span = found.range();
            if excluded.iter().any(|ex| overlaps(ex, &span)) {
                continue;
            }
            candidates.push(Candidate { term, span, order });
        }
    }

    candidates.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then(b.span.len().cmp(&a.span.len()))
            .then(a.order.cmp(&b.order))
    });

    let mut accepted: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if accepted
            .last()
            .is_some_and(|prev| candidate.span.start < prev.span.end)
        {
            continue;
        }
        accepted.push(candidate);
    }

    let mut seen = HashSet::new();
    let mut words = Vec::new();
    for candidate in &accepted {
        if candidate.term.eq_ignore_ascii_case("base") {
            continue;
        }
        for word in candidate.term.split_whitespace() {
            if seen.insert(word.to_lowercase()) {
                words.push(word);
            }
        }
    }

    VariantMatch {
        variant: if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        },
        spans: accepted.into_iter().map(|c| c.span).collect(),
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms() -> TermLists {
        TermLists::builtin().unwrap()
    }

    #[test]
    fn test_single_color() {
        let t = terms();
        let text = "PAUL SKENES 2024 BOWMAN CHROME SAPPHIRE ROOKIE RC RED /5 PIRATES";
        let brand_span = 17..39;
        assert_eq!(&text[brand_span.clone()], "BOWMAN CHROME SAPPHIRE");

        let m = detect_variant(text, &[brand_span], &t);
        assert_eq!(m.variant.as_deref(), Some("Red"));
        assert_eq!(m.spans.len(), 1);
        assert_eq!(&text[m.spans[0].clone()], "RED");
    }

    #[test]
    fn test_longest_term_wins() {
        let t = terms();
        let m = detect_variant("2023 Topps Chrome Gold Refractor /50 Ohtani", &[], &t);
        assert_eq!(m.variant.as_deref(), Some("Gold Refractor"));
    }

    #[test]
    fn test_multiple_terms_in_title_order() {
        let t = terms();
        let m = detect_variant("Prizm Silver Wembanyama Mojo", &[], &t);
        assert_eq!(m.variant.as_deref(), Some("Silver Mojo"));
    }

    #[test]
    fn test_repeated_words_deduplicated() {
        let t = terms();
        let m = detect_variant("Red Wave RED parallel", &[], &t);
        assert_eq!(m.variant.as_deref(), Some("Red Wave"));
        assert_eq!(m.spans.len(), 2);
    }

    #[test]
    fn test_base_suppressed() {
        let t = terms();
        let m = detect_variant("2024 Topps Chrome Base Jackson Holliday", &[], &t);
        assert_eq!(m.variant, None);
        assert_eq!(m.spans.len(), 1);
    }

    #[test]
    fn test_excluded_spans_ignored() {
        let t = terms();
        let text = "2024 Bowman Chrome Sapphire Holliday";
        let m = detect_variant(text, &[5..27], &t);
        assert_eq!(m.variant, None);
        assert!(m.spans.is_empty());
    }
}
