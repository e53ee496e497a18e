use super::{Article, OrderHeader, ParsedOrder};
use crate::normalize::normalize;
use regex::Regex;
use std::sync::LazyLock;

/// Main entry point: keyword-anchored regexes over the raw PDF text.
pub fn read(text: &str) -> ParsedOrder {
    ParsedOrder {
        header: OrderHeader {
            order_no: read_order_no(text),
            order_date: read_order_date(text),
            customer: read_customer(text),
        },
        articles: read_articles(text),
    }
}

// ---------------------------------------------------------------------------
// Header fields
// ---------------------------------------------------------------------------

static ORDER_NO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)commande\s*(?:n\s*[°º]|no\.?|num[ée]ro)\s*:?\s*([A-Z0-9][A-Z0-9\-/]*)")
        .expect("valid order number regex")
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)date(?:\s+de\s+commande)?\s*:?\s*(\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4})")
        .expect("valid date regex")
});

static CUSTOMER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*client\s*:\s*(.+?)\s*$").expect("valid customer regex")
});

fn read_order_no(text: &str) -> Option<String> {
    ORDER_NO_RE.captures(text).map(|c| c[1].trim().to_string())
}

fn read_order_date(text: &str) -> Option<String> {
    DATE_RE.captures(text).map(|c| c[1].trim().to_string())
}

fn read_customer(text: &str) -> Option<String> {
    CUSTOMER_RE
        .captures(text)
        .map(|c| c[1].to_string())
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Article lines
// ---------------------------------------------------------------------------

/// A line mentioning one of these starts a new article. Matched on
/// normalized text, so "MATELASSEE" alone does not start one.
static PRODUCT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:MATELAS|SURMATELAS|SUR-MATELAS|SOMMIER|DOSSERET|TETE DE LIT|BANDE DE JON\w*|BDE JONCTION|PROTEGE)\b",
    )
    .expect("valid product regex")
});

/// Leading quantity, e.g. "2 MATELAS ..." or "2 X MATELAS ...". A leading
/// number followed by X and a digit is a dimension, not a quantity.
static LEADING_QTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,3})\s+(?:X\s+)?([A-WYZ].*)$").expect("valid quantity regex")
});

static QTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bQTE\s*:?\s*(\d{1,3})\b").expect("valid QTE regex"));

/// Lines that end an article's continuation block.
static BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:TOTAL|SOUS-TOTAL|TVA|MONTANT|NET A PAYER|CLIENT|DATE|LIVRAISON)\b")
        .expect("valid break regex")
});

fn parse_quantity(raw: &str) -> u32 {
    raw.parse::<u32>().unwrap_or(1).max(1)
}

/// Split a normalized article line into (quantity, description).
fn split_quantity(line: &str) -> (u32, String) {
    if let Some(cap) = QTE_RE.captures(line) {
        let qty = parse_quantity(&cap[1]);
        let description = QTE_RE.replace(line, "");
        return (qty, collapse_spaces(&description));
    }
    if let Some(cap) = LEADING_QTY_RE.captures(line) {
        return (parse_quantity(&cap[1]), collapse_spaces(&cap[2]));
    }
    (1, collapse_spaces(line))
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn read_articles(text: &str) -> Vec<Article> {
    let mut articles: Vec<Article> = Vec::new();
    let mut open = false;

    for raw_line in text.lines() {
        let line = normalize(raw_line);
        if line.trim().is_empty() {
            open = false;
            continue;
        }

        if PRODUCT_RE.is_match(&line) {
            let (quantity, description) = split_quantity(&line);
            articles.push(Article::new(description, quantity));
            open = true;
            continue;
        }

        if BREAK_RE.is_match(&line) {
            open = false;
            continue;
        }

        // Wrapped description line from the PDF layout.
        if open {
            if let Some(last) = articles.last_mut() {
                last.description.push(' ');
                last.description.push_str(&collapse_spaces(&line));
            }
        }
    }

    articles
}
