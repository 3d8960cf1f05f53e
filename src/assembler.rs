// 🧱 Title Assembler - deterministic canonical titles
//
// Same fields in, same string out. The canonical title is the deduplication
// key, so any change to the layout changes which records merge.

use crate::extract::ExtractedFields;
use crate::rules::collapse_whitespace;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleField {
    Year,
    BrandSet,
    Variant,
    Player,
    Autograph,
    CardNumber,
    PrintRun,
}

/// year, brand+set, variant, player, "auto", "#number", "/print_run"
pub const DEFAULT_LAYOUT: [TitleField; 7] = [
    TitleField::Year,
    TitleField::BrandSet,
    TitleField::Variant,
    TitleField::Player,
    TitleField::Autograph,
    TitleField::CardNumber,
    TitleField::PrintRun,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleAssembler {
    layout: Vec<TitleField>,
}

impl TitleAssembler {
    pub fn new(layout: Vec<TitleField>) -> Self {
        TitleAssembler { layout }
    }

    pub fn layout(&self) -> &[TitleField] {
        &self.layout
    }

    /// Join the present fields with single spaces. Absent fields leave no gap.
    pub fn assemble(&self, fields: &ExtractedFields) -> String {
        self.layout
            .iter()
            .filter_map(|field| render(*field, fields))
            .map(|part| collapse_whitespace(&part))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for TitleAssembler {
    fn default() -> Self {
        TitleAssembler::new(DEFAULT_LAYOUT.to_vec())
    }
}

fn render(field: TitleField, fields: &ExtractedFields) -> Option<String> {
    match field {
        TitleField::Year => fields.year.clone(),
        TitleField::BrandSet => fields.brand_set(),
        TitleField::Variant => fields
            .variant
            .clone()
            .filter(|v| !v.trim().eq_ignore_ascii_case("base")),
        TitleField::Player => fields.player_name.clone(),
        TitleField::Autograph => fields.is_autograph.then(|| "auto".to_string()),
        TitleField::CardNumber => fields
            .card_number
            .as_deref()
            .map(|n| n.trim().trim_start_matches('#'))
            .filter(|n| !n.is_empty())
            .map(|n| format!("#{}", n)),
        TitleField::PrintRun => fields
            .print_run
            .as_deref()
            .map(|p| p.trim().trim_start_matches('/'))
            .filter(|p| !p.is_empty())
            .map(|p| format!("/{}", p)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flagg() -> ExtractedFields {
        ExtractedFields {
            year: Some("2024".to_string()),
            brand: Some("Bowman".to_string()),
            set_name: Some("U Chrome".to_string()),
            variant: None,
            card_number: Some("16".to_string()),
            print_run: None,
            is_autograph: true,
            is_rookie: true,
            player_name: Some("Cooper Flagg".to_string()),
        }
    }

    #[test]
    fn test_default_layout() {
        let assembler = TitleAssembler::default();
        assert_eq!(assembler.assemble(&flagg()), "2024 Bowman U Chrome Cooper Flagg auto #16");
    }

    #[test]
    fn test_custom_layout() {
        let assembler = TitleAssembler::new(vec![
            TitleField::Year,
            TitleField::BrandSet,
            TitleField::CardNumber,
            TitleField::Player,
        ]);
        assert_eq!(assembler.assemble(&flagg()), "2024 Bowman U Chrome #16 Cooper Flagg");
    }

    #[test]
    fn test_missing_fields_leave_no_gaps() {
        let fields = ExtractedFields {
            player_name: Some("  Paul   Skenes ".to_string()),
            print_run: Some("/5".to_string()),
            ..ExtractedFields::default()
        };
        assert_eq!(TitleAssembler::default().assemble(&fields), "Paul Skenes /5");
    }

    #[test]
    fn test_base_variant_omitted() {
        let mut fields = flagg();
        fields.variant = Some("Base".to_string());
        fields.is_autograph = false;
        assert_eq!(
            TitleAssembler::default().assemble(&fields),
            "2024 Bowman U Chrome Cooper Flagg #16"
        );
    }

    #[test]
    fn test_prefixes_not_doubled() {
        let mut fields = flagg();
        fields.card_number = Some("#16".to_string());
        fields.print_run = Some("5".to_string());
        assert!(TitleAssembler::default().assemble(&fields).ends_with("#16 /5"));
    }

    #[test]
    fn test_empty_fields_give_empty_title() {
        assert_eq!(TitleAssembler::default().assemble(&ExtractedFields::default()), "");
    }

    #[test]
    fn test_deterministic() {
        let assembler = TitleAssembler::default();
        let fields = flagg();
        assert_eq!(assembler.assemble(&fields), assembler.assemble(&fields.clone()));
    }
}
