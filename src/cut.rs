// src/cut.rs

use crate::detect::{CoreType, Firmness};
use serde::Serialize;
use tracing::debug;

/// Core types sharing the same cutting behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CutFamily {
    Latex,
    Foam,
    Visco,
}

pub fn cut_family(core: CoreType) -> Option<CutFamily> {
    match core {
        CoreType::NaturalLatex | CoreType::MixedLatex7Zone | CoreType::ReinforcedLatex => {
            Some(CutFamily::Latex)
        }
        CoreType::GroovedFoam7Zone | CoreType::Select43 => Some(CutFamily::Foam),
        CoreType::ViscoFoam => Some(CutFamily::Visco),
        CoreType::Unknown => None,
    }
}

/// (family, firmness) → (width delta, length delta) in centimetres.
const CUT_DELTAS: &[(CutFamily, Firmness, f64, f64)] = &[
    (CutFamily::Latex, Firmness::Firm, -1.0, -1.5),
    (CutFamily::Latex, Firmness::Medium, -1.5, -2.0),
    (CutFamily::Latex, Firmness::Comfort, -2.0, -2.5),
    (CutFamily::Foam, Firmness::Firm, -0.5, -1.0),
    (CutFamily::Foam, Firmness::Medium, -1.0, -1.0),
    (CutFamily::Foam, Firmness::Comfort, -1.0, -1.5),
    (CutFamily::Visco, Firmness::Medium, -0.5, -0.5),
    (CutFamily::Visco, Firmness::Comfort, -0.5, -1.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CutDimensions {
    pub width: f64,
    pub length: f64,
    /// False when no rule matched and the input was passed through.
    pub corrected: bool,
}

fn delta_for(family: CutFamily, firmness: Firmness) -> Option<(f64, f64)> {
    CUT_DELTAS
        .iter()
        .find(|(f, firm, _, _)| *f == family && *firm == firmness)
        .map(|(_, _, dw, dl)| (*dw, *dl))
}

/// Apply the cut correction for a core type and firmness.
///
/// UNKNOWN core type or firmness, or a combination without a rule, returns
/// the input untouched. Corrected values are rounded half away from zero.
pub fn correct(core: CoreType, firmness: Firmness, width: f64, length: f64) -> CutDimensions {
    let unchanged = CutDimensions {
        width,
        length,
        corrected: false,
    };
    if !firmness.is_known() {
        return unchanged;
    }
    let Some(family) = cut_family(core) else {
        return unchanged;
    };
    let Some((dw, dl)) = delta_for(family, firmness) else {
        debug!(?family, ?firmness, "No cut rule, keeping nominal size");
        return unchanged;
    };
    CutDimensions {
        width: (width + dw).round(),
        length: (length + dl).round(),
        corrected: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_families_collapse_core_types() {
        assert_eq!(cut_family(CoreType::NaturalLatex), Some(CutFamily::Latex));
        assert_eq!(cut_family(CoreType::ReinforcedLatex), Some(CutFamily::Latex));
        assert_eq!(cut_family(CoreType::MixedLatex7Zone), Some(CutFamily::Latex));
        assert_eq!(cut_family(CoreType::Select43), Some(CutFamily::Foam));
        assert_eq!(cut_family(CoreType::Unknown), None);
    }

    #[test]
    fn test_latex_firm() {
        let cut = correct(CoreType::MixedLatex7Zone, Firmness::Firm, 79.0, 198.0);
        assert_eq!(cut.width, 78.0);
        // 196.5 rounds away from zero.
        assert_eq!(cut.length, 197.0);
        assert!(cut.corrected);
    }

    #[test]
    fn test_same_family_same_delta() {
        let a = correct(CoreType::NaturalLatex, Firmness::Comfort, 140.0, 190.0);
        let b = correct(CoreType::ReinforcedLatex, Firmness::Comfort, 140.0, 190.0);
        assert_eq!(a, b);
        assert_eq!((a.width, a.length), (138.0, 188.0));
    }

    #[test]
    fn test_missing_rule_is_identity() {
        let cut = correct(CoreType::ViscoFoam, Firmness::Firm, 89.5, 199.5);
        assert_eq!((cut.width, cut.length), (89.5, 199.5));
        assert!(!cut.corrected);
    }

    #[test]
    fn test_unknown_short_circuits() {
        let cut = correct(CoreType::Unknown, Firmness::Firm, 90.0, 200.0);
        assert!(!cut.corrected);
        let cut = correct(CoreType::NaturalLatex, Firmness::Unknown, 90.0, 200.0);
        assert_eq!((cut.width, cut.length), (90.0, 200.0));
        assert!(!cut.corrected);
    }
}
