// src/detect/mod.rs

mod attributes;
mod order_flags;

pub use attributes::{
    detect_core_type, detect_cover_material, detect_cover_type, detect_firmness, has_handles,
};
pub use order_flags::{OrderFlags, is_excluded};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mattress core construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoreType {
    NaturalLatex,
    #[serde(rename = "MIXED_LATEX_7ZONE")]
    MixedLatex7Zone,
    #[serde(rename = "GROOVED_FOAM_7ZONE")]
    GroovedFoam7Zone,
    ReinforcedLatex,
    #[serde(rename = "SELECT_43")]
    Select43,
    ViscoFoam,
    Unknown,
}

impl CoreType {
    pub const KNOWN: [CoreType; 6] = [
        CoreType::NaturalLatex,
        CoreType::MixedLatex7Zone,
        CoreType::GroovedFoam7Zone,
        CoreType::ReinforcedLatex,
        CoreType::Select43,
        CoreType::ViscoFoam,
    ];

    /// Label written into the order sheets.
    pub fn label(self) -> &'static str {
        match self {
            CoreType::NaturalLatex => "LATEX NATUREL",
            CoreType::MixedLatex7Zone => "LATEX MIXTE 7 ZONES",
            CoreType::GroovedFoam7Zone => "MOUSSE RAINUREE 7 ZONES",
            CoreType::ReinforcedLatex => "LATEX RENFORCE",
            CoreType::Select43 => "SELECT 43",
            CoreType::ViscoFoam => "MOUSSE VISCO",
            CoreType::Unknown => "NON DETERMINE",
        }
    }

    /// File stem / column name used by the reference tables.
    pub fn table_stem(self) -> Option<&'static str> {
        match self {
            CoreType::NaturalLatex => Some("latex_naturel"),
            CoreType::MixedLatex7Zone => Some("latex_mixte_7zones"),
            CoreType::GroovedFoam7Zone => Some("mousse_rainuree_7zones"),
            CoreType::ReinforcedLatex => Some("latex_renforce"),
            CoreType::Select43 => Some("select43"),
            CoreType::ViscoFoam => Some("mousse_visco"),
            CoreType::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != CoreType::Unknown
    }
}

impl fmt::Display for CoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Firmness {
    Firm,
    Medium,
    Comfort,
    Unknown,
}

impl Firmness {
    pub fn label(self) -> &'static str {
        match self {
            Firmness::Firm => "FERME",
            Firmness::Medium => "MEDIUM",
            Firmness::Comfort => "CONFORT",
            Firmness::Unknown => "NON DETERMINE",
        }
    }

    pub fn is_known(self) -> bool {
        self != Firmness::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverType {
    Quilted,
    Simple,
    Unknown,
}

impl CoverType {
    pub fn label(self) -> &'static str {
        match self {
            CoverType::Quilted => "MATELASSEE",
            CoverType::Simple => "SIMPLE",
            CoverType::Unknown => "NON DETERMINE",
        }
    }

    pub fn is_known(self) -> bool {
        self != CoverType::Unknown
    }
}

/// Cover fabric as written on the order, e.g. `"TENCEL LUXE 3D"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverMaterial {
    Named(String),
    Unknown,
}

impl CoverMaterial {
    pub fn name(&self) -> Option<&str> {
        match self {
            CoverMaterial::Named(name) => Some(name),
            CoverMaterial::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, CoverMaterial::Named(_))
    }
}

/// One detection rule: if `predicate` holds on the normalized text, the
/// category is `value`. Rules are evaluated in slice order, first hit wins.
pub struct Rule<T: Copy> {
    pub name: &'static str,
    pub predicate: fn(&str) -> bool,
    pub value: T,
}

/// Evaluate `rules` in order against already-normalized text.
pub fn first_match<T: Copy>(rules: &[Rule<T>], text: &str) -> Option<T> {
    let rule = rules.iter().find(|r| (r.predicate)(text))?;
    tracing::trace!(rule = rule.name, "Detection rule matched");
    Some(rule.value)
}

/// Every attribute the per-article detectors produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedAttributes {
    pub core_type: CoreType,
    pub firmness: Firmness,
    pub cover_type: CoverType,
    pub cover_material: CoverMaterial,
    pub handles: bool,
}

impl DetectedAttributes {
    /// Run every per-article detector over normalized text.
    pub fn detect(text: &str) -> Self {
        Self {
            core_type: detect_core_type(text),
            firmness: detect_firmness(text),
            cover_type: detect_cover_type(text),
            cover_material: detect_cover_material(text),
            handles: has_handles(text),
        }
    }

    /// True when at least one categorical attribute is still undetermined.
    pub fn has_unknowns(&self) -> bool {
        !self.core_type.is_known()
            || !self.firmness.is_known()
            || !self.cover_type.is_known()
            || !self.cover_material.is_known()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    #[test]
    fn test_first_match_respects_order() {
        let rules = [
            Rule {
                name: "a",
                predicate: |t| t.contains("A"),
                value: 1,
            },
            Rule {
                name: "b",
                predicate: |t| t.contains("B"),
                value: 2,
            },
        ];
        assert_eq!(first_match(&rules, "BA"), Some(1));
        assert_eq!(first_match(&rules, "B"), Some(2));
        assert_eq!(first_match(&rules, "C"), None);
    }

    #[test]
    fn test_full_detection_perforated_latex() {
        let text = normalize(
            "MATELAS 1 PIÈCE - 100% LATEX PERFORÉ 7 ZONES DIFFÉRENCIÉES FERME - HOUSSE MATELASSÉE TENCEL LUXE 3D",
        );
        let attrs = DetectedAttributes::detect(&text);
        assert_eq!(attrs.core_type, CoreType::MixedLatex7Zone);
        assert_eq!(attrs.firmness, Firmness::Firm);
        assert_eq!(attrs.cover_type, CoverType::Quilted);
        assert_eq!(
            attrs.cover_material,
            CoverMaterial::Named("TENCEL LUXE 3D".to_string())
        );
        assert!(!attrs.handles);
        assert!(!attrs.has_unknowns());
    }

    #[test]
    fn test_full_detection_grooved_foam() {
        let text = normalize("MATELAS MOUSSE RAINURÉE 7 ZONES DIFFÉRENCIÉES FERME");
        let attrs = DetectedAttributes::detect(&text);
        assert_eq!(attrs.core_type, CoreType::GroovedFoam7Zone);
        assert_eq!(attrs.firmness, Firmness::Firm);
        assert_eq!(attrs.cover_type, CoverType::Unknown);
        assert!(attrs.has_unknowns());
    }

    #[test]
    fn test_core_type_serde_names() {
        assert_eq!(
            serde_json::to_string(&CoreType::MixedLatex7Zone).unwrap(),
            "\"MIXED_LATEX_7ZONE\""
        );
        assert_eq!(
            serde_json::to_string(&CoreType::Select43).unwrap(),
            "\"SELECT_43\""
        );
        let parsed: CoreType = serde_json::from_str("\"GROOVED_FOAM_7ZONE\"").unwrap();
        assert_eq!(parsed, CoreType::GroovedFoam7Zone);
    }
}
