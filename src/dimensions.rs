// src/dimensions.rs

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Two or three numbers separated by `/` or `x`, comma or dot decimals.
static DIMENSIONS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+(?:[.,]\d+)?)\s*[/x]\s*(\d+(?:[.,]\d+)?)(?:\s*[/x]\s*(\d+(?:[.,]\d+)?))?",
    )
    .expect("valid dimensions regex")
});

/// Measured article dimensions in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Dimensions {
    pub width: f64,
    pub length: f64,
    pub height: Option<f64>,
}

/// Width and length rounded up to manufacturing increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundedDimensions {
    pub width: u32,
    pub length: u32,
}

/// Bed-frame equivalent size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiterieDimensions {
    pub width: u32,
    pub length: u32,
}

impl LiterieDimensions {
    pub fn label(&self) -> String {
        format!("{}x{}", self.width, self.length)
    }
}

/// Largest accepted measure in centimetres. Anything above is a misread
/// number, not a mattress.
pub const MAX_DIMENSION_CM: f64 = 1_000.0;

fn plausible(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0 && value <= MAX_DIMENSION_CM).then_some(value)
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok().and_then(plausible)
}

/// Find the first dimension pattern in `text`. `None` means the text carries
/// no usable dimensions: zero, negative or implausibly large width and
/// length are rejected, an out-of-range height is dropped.
pub fn parse_dimensions(text: &str) -> Option<Dimensions> {
    let cap = DIMENSIONS_RE.captures(text)?;
    let width = parse_number(&cap[1])?;
    let length = parse_number(&cap[2])?;
    let height = cap.get(3).and_then(|m| parse_number(m.as_str()));
    Some(Dimensions {
        width,
        length,
        height,
    })
}

/// Ceiling to the next multiple of 10; exact multiples are unchanged.
pub fn round_up_to_ten(value: f64) -> u32 {
    ((value / 10.0).ceil() * 10.0) as u32
}

impl Dimensions {
    /// Structured measures; `None` when width or length is out of range.
    /// An implausible height is dropped rather than rejecting the article.
    pub fn checked(width: f64, length: f64, height: Option<f64>) -> Option<Self> {
        Some(Self {
            width: plausible(width)?,
            length: plausible(length)?,
            height: height.and_then(plausible),
        })
    }

    pub fn rounded(&self) -> RoundedDimensions {
        RoundedDimensions {
            width: round_up_to_ten(self.width),
            length: round_up_to_ten(self.length),
        }
    }

    /// Two single mattresses ordered together make one double bed frame.
    pub fn literie(&self, quantity: u32) -> LiterieDimensions {
        let rounded = self.rounded();
        let width = if quantity == 2 {
            rounded.width.saturating_mul(2)
        } else {
            rounded.width
        };
        LiterieDimensions {
            width,
            length: rounded.length,
        }
    }
}
