// src/assemble.rs

use crate::cut::{self, CutDimensions};
use crate::detect::{
    CoreType, CoverMaterial, CoverType, DetectedAttributes, Firmness, OrderFlags, is_excluded,
};
use crate::dimensions::{Dimensions, LiterieDimensions, RoundedDimensions};
use crate::order::Article;
use crate::reference::ReferenceTables;
use serde::Serialize;
use tracing::{debug, info, info_span};

/// Everything the spreadsheet writer needs for one mattress line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedManufacturingRecord {
    /// 1-based position among all articles of the order, excluded ones included.
    pub position: usize,
    pub description: String,
    pub quantity: u32,
    pub core_type: CoreType,
    pub firmness: Firmness,
    pub cover_type: CoverType,
    pub cover_material: CoverMaterial,
    pub dimensions: Option<Dimensions>,
    pub rounded: Option<RoundedDimensions>,
    pub literie: Option<LiterieDimensions>,
    pub literie_label: Option<String>,
    pub cover_length: Option<f64>,
    pub cover_width: Option<f64>,
    pub cut: Option<CutDimensions>,
    pub handles: bool,
    pub dosseret: bool,
    pub connecting_strip: bool,
    pub topper_in_order: bool,
    /// Attributes filled in by the model rather than by pattern matching.
    pub enriched: Vec<String>,
}

/// An article that survived exclusion, with its detected attributes.
#[derive(Debug, Clone)]
pub struct DetectedArticle<'a> {
    pub position: usize,
    pub article: &'a Article,
    pub attributes: DetectedAttributes,
    pub enriched: Vec<String>,
}

/// Detection results for a whole order, before derivation.
#[derive(Debug, Clone)]
pub struct DetectedOrder<'a> {
    pub flags: OrderFlags,
    pub excluded: Vec<usize>,
    pub articles: Vec<DetectedArticle<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreTypeCount {
    pub core_type: CoreType,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderOutput {
    pub records: Vec<DerivedManufacturingRecord>,
    /// 1-based positions of protector / topper lines.
    pub excluded: Vec<usize>,
    pub flags: OrderFlags,
    pub core_types: Vec<CoreTypeCount>,
}

/// Turns article lists into manufacturing records.
pub struct Assembler<'a> {
    tables: &'a ReferenceTables,
    display_order: &'a [CoreType],
}

impl<'a> Assembler<'a> {
    pub fn new(tables: &'a ReferenceTables, display_order: &'a [CoreType]) -> Self {
        Self {
            tables,
            display_order,
        }
    }

    /// Pattern-only pipeline.
    pub fn assemble(&self, articles: &[Article]) -> OrderOutput {
        let detected = self.detect(articles);
        self.finish(detected)
    }

    /// Exclusion, order-wide flags and per-article detection.
    pub fn detect<'b>(&self, articles: &'b [Article]) -> DetectedOrder<'b> {
        let texts: Vec<String> = articles.iter().map(Article::search_text).collect();
        let flags = OrderFlags::detect(&texts);

        let mut excluded = Vec::new();
        let mut detected = Vec::new();
        for (idx, (article, text)) in articles.iter().zip(&texts).enumerate() {
            let position = idx + 1;
            if is_excluded(text) {
                debug!(position, "Protector or topper line, excluded");
                excluded.push(position);
                continue;
            }
            detected.push(DetectedArticle {
                position,
                article,
                attributes: DetectedAttributes::detect(text),
                enriched: Vec::new(),
            });
        }

        info!(
            articles = articles.len(),
            kept = detected.len(),
            excluded = excluded.len(),
            dosseret = flags.dosseret,
            connecting_strip = flags.connecting_strip,
            topper = flags.topper,
            "Order detection complete"
        );

        DetectedOrder {
            flags,
            excluded,
            articles: detected,
        }
    }

    /// Derive dimensions, reference values and cut sizes for detected articles.
    pub fn finish(&self, detected: DetectedOrder<'_>) -> OrderOutput {
        let flags = detected.flags;
        let records: Vec<DerivedManufacturingRecord> = detected
            .articles
            .into_iter()
            .map(|item| self.derive(item, flags))
            .collect();
        let core_types = core_type_tally(&records, self.display_order);
        OrderOutput {
            records,
            excluded: detected.excluded,
            flags,
            core_types,
        }
    }

    fn derive(&self, item: DetectedArticle<'_>, flags: OrderFlags) -> DerivedManufacturingRecord {
        let span = info_span!("article", position = item.position);
        let _guard = span.enter();

        let attrs = item.attributes;
        let article = item.article;

        let dimensions = article.measured();
        let rounded = dimensions.map(|d| d.rounded());
        let literie = dimensions.map(|d| d.literie(article.quantity));

        let (cover_length, cover_width) = match rounded {
            Some(r) if attrs.core_type.is_known() => {
                let length = attrs.cover_material.name().and_then(|material| {
                    self.tables
                        .cover_length(attrs.core_type, material, r.length)
                        .report("cover_length")
                });
                let width = self
                    .tables
                    .cover_width(attrs.core_type, r.width)
                    .report("cover_width");
                (length, width)
            }
            _ => (None, None),
        };

        let cut = dimensions
            .map(|d| cut::correct(attrs.core_type, attrs.firmness, d.width, d.length));

        info!(
            core_type = %attrs.core_type,
            firmness = attrs.firmness.label(),
            cover = attrs.cover_type.label(),
            material = attrs.cover_material.name().unwrap_or("NON DETERMINE"),
            literie = ?literie.map(|l| l.label()),
            "Record assembled"
        );

        DerivedManufacturingRecord {
            position: item.position,
            description: article.description.clone(),
            quantity: article.quantity,
            core_type: attrs.core_type,
            firmness: attrs.firmness,
            cover_type: attrs.cover_type,
            cover_material: attrs.cover_material,
            dimensions,
            rounded,
            literie_label: literie.map(|l| l.label()),
            literie,
            cover_length,
            cover_width,
            cut,
            handles: attrs.handles,
            dosseret: flags.dosseret,
            connecting_strip: flags.connecting_strip,
            topper_in_order: flags.topper,
            enriched: item.enriched,
        }
    }
}

/// Count records per core type. Core types listed in `display_order` come
/// first in that order; the rest follow, UNKNOWN last. Zero counts are
/// left out.
pub fn core_type_tally(
    records: &[DerivedManufacturingRecord],
    display_order: &[CoreType],
) -> Vec<CoreTypeCount> {
    let mut order: Vec<CoreType> = Vec::new();
    for core in display_order
        .iter()
        .chain(CoreType::KNOWN.iter())
        .chain(std::iter::once(&CoreType::Unknown))
    {
        if !order.contains(core) {
            order.push(*core);
        }
    }
    order
        .into_iter()
        .map(|core_type| CoreTypeCount {
            core_type,
            count: records.iter().filter(|r| r.core_type == core_type).count(),
        })
        .filter(|c| c.count > 0)
        .collect()
}
