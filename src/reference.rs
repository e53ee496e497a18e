// src/reference.rs

use crate::detect::CoreType;
use crate::normalize::normalize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Directory holding one cover-length table per core type.
pub const COVER_LENGTH_DIR: &str = "longueurs_housse";
/// Single table keyed by width, one column per core type.
pub const COVER_WIDTH_FILE: &str = "largeurs_housse.json";

pub const LENGTH_KEY: &str = "LONGUEUR";
pub const WIDTH_KEY: &str = "LARGEUR";

/// Cover material as written on orders → column of the cover-length tables.
/// Matched on normalized text; anything else is reported, never guessed.
const MATERIAL_COLUMNS: &[(&str, &str)] = &[
    ("TENCEL LUXE 3D", "LUXE_3D"),
    ("LUXE 3D", "LUXE_3D"),
    ("TENCEL", "TENCEL"),
    ("BAMBOU", "BAMBOU"),
    ("POLYESTER", "POLYESTER"),
];

pub fn material_column(material: &str) -> Option<&'static str> {
    let material = normalize(material);
    let material = material.trim();
    MATERIAL_COLUMNS
        .iter()
        .find(|(name, _)| *name == material)
        .map(|(_, column)| *column)
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReferenceError {
    #[error("malformed reference table {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("unrecognized cover material: {0}")]
    UnknownMaterial(String),

    #[error("column {column} is not numeric in row {key}")]
    NotNumeric { column: String, key: u32 },
}

/// Legitimately absent data, as opposed to a broken source.
#[derive(Debug, Clone, PartialEq)]
pub enum NotFound {
    MissingTable(PathBuf),
    UnknownCoreType,
    Key { column: &'static str, key: u32 },
    Column { column: String, key: u32 },
}

/// Outcome of a reference lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(f64),
    NotFound(NotFound),
    Failed(ReferenceError),
}

impl Lookup {
    pub fn value(&self) -> Option<f64> {
        match self {
            Lookup::Found(v) => Some(*v),
            _ => None,
        }
    }

    /// Log anything but a hit and reduce the outcome to the value to write.
    pub fn report(self, field: &str) -> Option<f64> {
        match &self {
            Lookup::Found(_) => {}
            Lookup::NotFound(reason) => {
                warn!(field, reason = ?reason, "Reference value not found");
            }
            Lookup::Failed(e) => {
                warn!(field, error = %e, "Reference lookup failed");
            }
        }
        self.value()
    }
}

/// Rows of a static JSON table, kept in file order.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    rows: Vec<Map<String, Value>>,
}

fn key_matches(value: &Value, key: u32) -> bool {
    match value {
        Value::Number(n) => n.as_f64() == Some(f64::from(key)),
        Value::String(s) => s.trim().parse::<u32>().ok() == Some(key),
        _ => false,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

impl ReferenceTable {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let rows: Vec<Map<String, Value>> = serde_json::from_str(json)?;
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row whose `key_column` equals `key` exactly.
    pub fn find_row(&self, key_column: &str, key: u32) -> Option<&Map<String, Value>> {
        self.rows
            .iter()
            .find(|row| row.get(key_column).is_some_and(|v| key_matches(v, key)))
    }

    pub fn lookup(&self, key_column: &'static str, key: u32, column: &str) -> Lookup {
        let Some(row) = self.find_row(key_column, key) else {
            return Lookup::NotFound(NotFound::Key {
                column: key_column,
                key,
            });
        };
        match row.get(column) {
            None | Some(Value::Null) => Lookup::NotFound(NotFound::Column {
                column: column.to_string(),
                key,
            }),
            Some(v) => match numeric(v) {
                Some(n) => Lookup::Found(n),
                None => Lookup::Failed(ReferenceError::NotNumeric {
                    column: column.to_string(),
                    key,
                }),
            },
        }
    }
}

/// What happened when a table file was loaded.
#[derive(Debug, Clone)]
enum TableSource {
    Loaded(ReferenceTable),
    Missing(PathBuf),
    Malformed(ReferenceError),
}

impl TableSource {
    fn load(path: PathBuf) -> Self {
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Reference table not readable");
                return TableSource::Missing(path);
            }
        };
        match ReferenceTable::from_json_str(&content) {
            Ok(table) => {
                if table.is_empty() {
                    warn!(path = %path.display(), "Reference table has no rows");
                }
                info!(path = %path.display(), rows = table.len(), "Reference table loaded");
                TableSource::Loaded(table)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Reference table is malformed");
                TableSource::Malformed(ReferenceError::Malformed {
                    path,
                    message: e.to_string(),
                })
            }
        }
    }

    fn lookup(&self, key_column: &'static str, key: u32, column: &str) -> Lookup {
        match self {
            TableSource::Loaded(table) => table.lookup(key_column, key, column),
            TableSource::Missing(path) => Lookup::NotFound(NotFound::MissingTable(path.clone())),
            TableSource::Malformed(e) => Lookup::Failed(e.clone()),
        }
    }
}

/// Every reference table, loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    cover_length: HashMap<CoreType, TableSource>,
    cover_width: TableSource,
}

impl ReferenceTables {
    /// Load all tables under `dir`. Missing or malformed files are logged and
    /// remembered; loading itself never fails.
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let cover_length = CoreType::KNOWN
            .iter()
            .filter_map(|core| {
                let stem = core.table_stem()?;
                let path = dir.join(COVER_LENGTH_DIR).join(format!("{stem}.json"));
                Some((*core, TableSource::load(path)))
            })
            .collect();
        let cover_width = TableSource::load(dir.join(COVER_WIDTH_FILE));
        Self {
            cover_length,
            cover_width,
        }
    }

    /// Cover-length allowance for a core type, cover material and rounded
    /// mattress length.
    pub fn cover_length(&self, core: CoreType, material: &str, length: u32) -> Lookup {
        let Some(source) = self.cover_length.get(&core) else {
            return Lookup::NotFound(NotFound::UnknownCoreType);
        };
        let Some(column) = material_column(material) else {
            return Lookup::Failed(ReferenceError::UnknownMaterial(material.to_string()));
        };
        source.lookup(LENGTH_KEY, length, column)
    }

    /// Cover-width allowance for a core type and rounded mattress width.
    pub fn cover_width(&self, core: CoreType, width: u32) -> Lookup {
        let Some(stem) = core.table_stem() else {
            return Lookup::NotFound(NotFound::UnknownCoreType);
        };
        self.cover_width
            .lookup(WIDTH_KEY, width, &stem.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LENGTHS: &str = r#"[
        {"LONGUEUR": 190, "LUXE_3D": 196, "TENCEL": 195, "POLYESTER": 194},
        {"LONGUEUR": 200, "LUXE_3D": 206.5, "TENCEL": "205,5", "POLYESTER": null}
    ]"#;

    const WIDTHS: &str = r#"[
        {"LARGEUR": 90, "LATEX_NATUREL": 93, "LATEX_MIXTE_7ZONES": 92},
        {"LARGEUR": "160", "LATEX_NATUREL": 163, "LATEX_MIXTE_7ZONES": 162}
    ]"#;

    fn write_tables(dir: &Path) {
        fs::create_dir_all(dir.join(COVER_LENGTH_DIR)).unwrap();
        fs::write(
            dir.join(COVER_LENGTH_DIR).join("latex_mixte_7zones.json"),
            LENGTHS,
        )
        .unwrap();
        fs::write(
            dir.join(COVER_LENGTH_DIR).join("latex_naturel.json"),
            "[{\"LONGUEUR\": 190,",
        )
        .unwrap();
        fs::write(dir.join(COVER_WIDTH_FILE), WIDTHS).unwrap();
    }

    #[test]
    fn test_report_reduces_to_value() {
        assert_eq!(Lookup::Found(93.5).report("cover_width"), Some(93.5));
        assert_eq!(
            Lookup::NotFound(NotFound::UnknownCoreType).report("cover_width"),
            None
        );
        assert_eq!(
            Lookup::Failed(ReferenceError::UnknownMaterial("COTON".into())).report("cover_length"),
            None
        );
    }

    #[test]
    fn test_material_synonyms() {
        assert_eq!(material_column("TENCEL LUXE 3D"), Some("LUXE_3D"));
        assert_eq!(material_column("Luxe 3D"), Some("LUXE_3D"));
        assert_eq!(material_column(" tencel "), Some("TENCEL"));
        assert_eq!(material_column("COTON BIO"), None);
    }

    #[test]
    fn test_exact_key_lookup() {
        let table = ReferenceTable::from_json_str(LENGTHS).unwrap();
        assert_eq!(table.lookup(LENGTH_KEY, 190, "LUXE_3D"), Lookup::Found(196.0));
        assert_eq!(table.lookup(LENGTH_KEY, 200, "TENCEL"), Lookup::Found(205.5));
        // No interpolation between 190 and 200.
        assert_eq!(
            table.lookup(LENGTH_KEY, 195, "LUXE_3D"),
            Lookup::NotFound(NotFound::Key {
                column: LENGTH_KEY,
                key: 195
            })
        );
        assert!(matches!(
            table.lookup(LENGTH_KEY, 200, "POLYESTER"),
            Lookup::NotFound(NotFound::Column { .. })
        ));
    }

    #[test]
    fn test_tables_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path());
        let tables = ReferenceTables::load(dir.path());

        assert_eq!(
            tables.cover_length(CoreType::MixedLatex7Zone, "TENCEL LUXE 3D", 200),
            Lookup::Found(206.5)
        );
        assert_eq!(
            tables.cover_width(CoreType::MixedLatex7Zone, 160),
            Lookup::Found(162.0)
        );
        assert_eq!(tables.cover_width(CoreType::NaturalLatex, 90).value(), Some(93.0));
    }

    #[test]
    fn test_unknown_length_does_not_block_width() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path());
        let tables = ReferenceTables::load(dir.path());

        let length = tables.cover_length(CoreType::MixedLatex7Zone, "LUXE 3D", 210);
        assert!(matches!(length, Lookup::NotFound(NotFound::Key { key: 210, .. })));
        assert_eq!(length.report("cover_length"), None);
        assert_eq!(
            tables.cover_width(CoreType::MixedLatex7Zone, 90).report("cover_width"),
            Some(92.0)
        );
    }

    #[test]
    fn test_missing_and_malformed_sources() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path());
        let tables = ReferenceTables::load(dir.path());

        assert!(matches!(
            tables.cover_length(CoreType::Select43, "TENCEL", 190),
            Lookup::NotFound(NotFound::MissingTable(_))
        ));
        assert!(matches!(
            tables.cover_length(CoreType::NaturalLatex, "TENCEL", 190),
            Lookup::Failed(ReferenceError::Malformed { .. })
        ));
        assert!(matches!(
            tables.cover_length(CoreType::MixedLatex7Zone, "COTON", 190),
            Lookup::Failed(ReferenceError::UnknownMaterial(_))
        ));
        assert_eq!(
            tables.cover_length(CoreType::Unknown, "TENCEL", 190),
            Lookup::NotFound(NotFound::UnknownCoreType)
        );
        assert!(matches!(
            tables.cover_width(CoreType::ViscoFoam, 90),
            Lookup::NotFound(NotFound::Column { .. })
        ));
    }

    #[test]
    fn test_empty_directory_loads() {
        let dir = tempfile::tempdir().unwrap();
        let tables = ReferenceTables::load(dir.path());
        assert!(matches!(
            tables.cover_width(CoreType::NaturalLatex, 90),
            Lookup::NotFound(NotFound::MissingTable(_))
        ));
    }

    #[test]
    fn test_shipped_tables_cover_every_core_type() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/reference");
        let tables = ReferenceTables::load(dir);
        for core in CoreType::KNOWN {
            assert!(tables.cover_width(core, 90).value().is_some(), "{core}");
            for material in ["TENCEL LUXE 3D", "TENCEL", "BAMBOU", "POLYESTER"] {
                assert!(
                    tables.cover_length(core, material, 200).value().is_some(),
                    "{core} {material}"
                );
            }
        }
    }
}
