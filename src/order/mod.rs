// src/order/mod.rs

mod text;

use crate::dimensions::{Dimensions, parse_dimensions};
use crate::normalize::{normalize, normalize_opt};
use serde::{Deserialize, Serialize};

/// One order line as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub description: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Raw dimension string such as `"89/198/20"`.
    #[serde(default)]
    pub dimensions: Option<String>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl Article {
    pub fn new(description: impl Into<String>, quantity: u32) -> Self {
        Self {
            description: description.into(),
            name: None,
            dimensions: None,
            width: None,
            length: None,
            height: None,
            quantity: quantity.max(1),
        }
    }

    /// Normalized description followed by the normalized name, if any.
    pub fn search_text(&self) -> String {
        let description = normalize(&self.description);
        let name = normalize_opt(self.name.as_deref());
        if name.is_empty() {
            description
        } else {
            format!("{description} {name}")
        }
    }

    /// Structured width/length win over the raw dimension string, which wins
    /// over whatever the description carries.
    pub fn measured(&self) -> Option<Dimensions> {
        if let (Some(width), Some(length)) = (self.width, self.length) {
            if let Some(d) = Dimensions::checked(width, length, self.height) {
                return Some(d);
            }
        }
        self.dimensions
            .as_deref()
            .and_then(parse_dimensions)
            .or_else(|| parse_dimensions(&self.description))
    }
}

/// Header fields found on the purchase order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderHeader {
    pub order_no: Option<String>,
    pub order_date: Option<String>,
    pub customer: Option<String>,
}

impl OrderHeader {
    /// How many header fields were found, out of the total.
    pub fn coverage(&self) -> (usize, usize) {
        let filled = [
            self.order_no.is_some(),
            self.order_date.is_some(),
            self.customer.is_some(),
        ]
        .iter()
        .filter(|&&v| v)
        .count();
        (filled, 3)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedOrder {
    pub header: OrderHeader,
    pub articles: Vec<Article>,
}

/// Read the header and the ordered article lines out of raw PDF text.
pub fn read_order(raw_text: &str) -> ParsedOrder {
    text::read(raw_text)
}
