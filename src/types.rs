use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage label used when a scan arrives without one
pub const DEFAULT_STAGE: &str = "Ingreso";

/// A validated scan, split into its category prefix and serial
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCode {
    pub category_code: String,
    pub serial: String,
    /// Canonical form of the whole code; unique key for a registration
    pub barcode: String,
}

/// Descriptive attributes shared by every item of one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryReference {
    pub category_code: String,
    pub variety: String,
    pub block: String,
    /// Either a size label, the "NA" sentinel, or nothing at all
    #[serde(default)]
    pub size: Option<String>,
    pub stem_count: i64,
}

/// A persisted registration row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration {
    pub barcode: String,
    pub category_code: String,
    pub serial: String,
    pub variety: String,
    pub block: String,
    pub size: Option<String>,
    pub stem_count: i64,
    pub stage: String,
    pub registered_at: DateTime<Utc>,
}

impl Registration {
    /// Combine a parsed code with its category attributes
    pub fn new(
        parsed: &ParsedCode,
        category: &CategoryReference,
        stage: &str,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            barcode: parsed.barcode.clone(),
            category_code: parsed.category_code.clone(),
            serial: parsed.serial.clone(),
            variety: category.variety.clone(),
            block: category.block.clone(),
            size: category.size.clone(),
            stem_count: category.stem_count,
            stage: stage.to_string(),
            registered_at,
        }
    }
}

/// Trim a raw stage label, falling back to `default` when it is blank or missing
pub fn normalize_stage(raw: Option<&str>, default: &str) -> String {
    match raw.map(str::trim) {
        Some(stage) if !stage.is_empty() => stage.to_string(),
        _ => default.to_string(),
    }
}
