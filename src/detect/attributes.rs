use super::{CoreType, CoverMaterial, CoverType, Firmness, Rule, first_match};

// All detectors take text already passed through `normalize::normalize`.

// ---------------------------------------------------------------------------
// Core type
// ---------------------------------------------------------------------------

const PERFORATED_LATEX_7_ZONES: &[&str] = &[
    "100% LATEX PERFORE 7 ZONES",
    "100 % LATEX PERFORE 7 ZONES",
    "100% LATEX PERFORE 7ZONES",
    "LATEX 100% PERFORE 7 ZONES",
];

fn reinforced_latex(t: &str) -> bool {
    t.contains("RENFORCE") && t.contains("LATEX")
}

fn full_natural_latex(t: &str) -> bool {
    (t.contains("100% LATEX") || t.contains("100 % LATEX")) && t.contains("NATUREL")
}

fn perforated_latex_7_zones(t: &str) -> bool {
    PERFORATED_LATEX_7_ZONES.iter().any(|p| t.contains(p))
}

fn mixed_latex_7_zones(t: &str) -> bool {
    t.contains("LATEX MIXTE 7 ZONES")
}

fn grooved_foam_7_zones(t: &str) -> bool {
    t.contains("MOUSSE RAINUREE 7 ZONES")
}

fn natural_latex(t: &str) -> bool {
    t.contains("LATEX NATUREL")
}

fn select_43(t: &str) -> bool {
    t.contains("SELECT 43")
}

fn visco_foam(t: &str) -> bool {
    t.contains("MOUSSE VISCO") || t.contains("VISCOELASTIQUE")
}

fn select_43_collapsed(t: &str) -> bool {
    t.contains("SELECT43")
}

/// Priority order: co-occurrence rules first, then canonical names, then
/// known spelling variants.
pub const CORE_TYPE_RULES: &[Rule<CoreType>] = &[
    Rule {
        name: "renforce+latex",
        predicate: reinforced_latex,
        value: CoreType::ReinforcedLatex,
    },
    Rule {
        name: "100% latex+naturel",
        predicate: full_natural_latex,
        value: CoreType::NaturalLatex,
    },
    Rule {
        name: "100% latex perfore 7 zones",
        predicate: perforated_latex_7_zones,
        value: CoreType::MixedLatex7Zone,
    },
    Rule {
        name: "latex mixte 7 zones",
        predicate: mixed_latex_7_zones,
        value: CoreType::MixedLatex7Zone,
    },
    Rule {
        name: "mousse rainuree 7 zones",
        predicate: grooved_foam_7_zones,
        value: CoreType::GroovedFoam7Zone,
    },
    Rule {
        name: "latex naturel",
        predicate: natural_latex,
        value: CoreType::NaturalLatex,
    },
    Rule {
        name: "select 43",
        predicate: select_43,
        value: CoreType::Select43,
    },
    Rule {
        name: "mousse visco",
        predicate: visco_foam,
        value: CoreType::ViscoFoam,
    },
    Rule {
        name: "select43",
        predicate: select_43_collapsed,
        value: CoreType::Select43,
    },
];

pub fn detect_core_type(text: &str) -> CoreType {
    first_match(CORE_TYPE_RULES, text).unwrap_or(CoreType::Unknown)
}

// ---------------------------------------------------------------------------
// Firmness
// ---------------------------------------------------------------------------

fn firm(t: &str) -> bool {
    t.contains("FERME")
}

fn medium(t: &str) -> bool {
    t.contains("MEDIUM")
}

fn comfort(t: &str) -> bool {
    t.contains("CONFORT")
}

/// Scan order, not textual position, decides between several keywords.
pub const FIRMNESS_RULES: &[Rule<Firmness>] = &[
    Rule {
        name: "ferme",
        predicate: firm,
        value: Firmness::Firm,
    },
    Rule {
        name: "medium",
        predicate: medium,
        value: Firmness::Medium,
    },
    Rule {
        name: "confort",
        predicate: comfort,
        value: Firmness::Comfort,
    },
];

pub fn detect_firmness(text: &str) -> Firmness {
    first_match(FIRMNESS_RULES, text).unwrap_or(Firmness::Unknown)
}

// ---------------------------------------------------------------------------
// Cover
// ---------------------------------------------------------------------------

fn quilted(t: &str) -> bool {
    t.contains("MATELASSE")
}

fn simple(t: &str) -> bool {
    t.contains("SIMPLE") || t.contains("EXTENSIBLE") || t.contains("STRETCH")
}

pub const COVER_TYPE_RULES: &[Rule<CoverType>] = &[
    Rule {
        name: "matelassee",
        predicate: quilted,
        value: CoverType::Quilted,
    },
    Rule {
        name: "simple/extensible",
        predicate: simple,
        value: CoverType::Simple,
    },
];

pub fn detect_cover_type(text: &str) -> CoverType {
    first_match(COVER_TYPE_RULES, text).unwrap_or(CoverType::Unknown)
}

/// Longer names first so "TENCEL LUXE 3D" is not reported as "TENCEL".
const COVER_MATERIALS: &[&str] = &["TENCEL LUXE 3D", "LUXE 3D", "TENCEL", "BAMBOU", "POLYESTER"];

pub fn detect_cover_material(text: &str) -> CoverMaterial {
    COVER_MATERIALS
        .iter()
        .find(|m| text.contains(*m))
        .map(|m| CoverMaterial::Named((*m).to_string()))
        .unwrap_or(CoverMaterial::Unknown)
}

pub fn has_handles(text: &str) -> bool {
    text.contains("POIGNEE")
}
