use serde::Serialize;

const EXCLUDED_MARKERS: &[&str] = &[
    "PROTEGE MATELAS",
    "PROTEGE-MATELAS",
    "SURMATELAS",
    "SUR-MATELAS",
];

const DOSSERET_MARKERS: &[&str] = &["DOSSERET", "TETE DE LIT"];

/// Canonical spelling, two misspellings seen on customer orders, and the
/// abbreviation used on the order form.
const CONNECTING_STRIP_MARKERS: &[&str] = &[
    "BANDE DE JONCTION",
    "BANDE DE JONTION",
    "BANDE DE JONCTON",
    "BDE JONCTION",
];

const TOPPER_MARKERS: &[&str] = &["SURMATELAS", "SUR-MATELAS"];

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

/// Mattress protectors and toppers never become manufacturing records.
pub fn is_excluded(text: &str) -> bool {
    contains_any(text, EXCLUDED_MARKERS)
}

/// Accessory flags evaluated once over the whole order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderFlags {
    pub dosseret: bool,
    pub connecting_strip: bool,
    pub topper: bool,
}

impl OrderFlags {
    /// `texts` are the normalized texts of every article in the order,
    /// excluded ones included.
    pub fn detect<S: AsRef<str>>(texts: &[S]) -> Self {
        let any = |markers: &[&str]| texts.iter().any(|t| contains_any(t.as_ref(), markers));
        Self {
            dosseret: any(DOSSERET_MARKERS),
            connecting_strip: any(CONNECTING_STRIP_MARKERS),
            topper: any(TOPPER_MARKERS),
        }
    }
}
