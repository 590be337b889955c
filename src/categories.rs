//! Loading category reference rows from a TOML file.
//!
//! ```toml
//! [[category]]
//! category_code = "A1"
//! variety = "Freedom"
//! block = "12"
//! size = "NA"
//! stem_count = 25
//! ```

use crate::error::{IntakeError, Result};
use crate::parser::is_category_code;
use crate::storage::RegistryStore;
use crate::types::CategoryReference;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct CategoryFile {
    #[serde(default, rename = "category")]
    categories: Vec<CategoryReference>,
}

/// Parse and validate category rows; codes are upper-cased before validation
pub fn parse_categories(content: &str) -> Result<Vec<CategoryReference>> {
    let file: CategoryFile = toml::from_str(content)?;
    let mut seen = HashSet::new();
    let mut categories = Vec::with_capacity(file.categories.len());

    for mut category in file.categories {
        category.category_code = category.category_code.trim().to_ascii_uppercase();
        if !is_category_code(&category.category_code) {
            return Err(IntakeError::InvalidCategory(format!(
                "'{}' is not a 2-digit or letter+digit code",
                category.category_code
            )));
        }
        if !seen.insert(category.category_code.clone()) {
            return Err(IntakeError::InvalidCategory(format!(
                "'{}' is listed more than once",
                category.category_code
            )));
        }
        categories.push(category);
    }

    Ok(categories)
}

pub fn load_categories(path: &Path) -> Result<Vec<CategoryReference>> {
    let content = std::fs::read_to_string(path)?;
    parse_categories(&content)
}

/// Upsert every row into the store, returning how many were written
pub fn import_categories(store: &dyn RegistryStore, categories: &[CategoryReference]) -> Result<usize> {
    for category in categories {
        store.upsert_category(category)?;
    }
    info!("Imported {} category references", categories.len());
    Ok(categories.len())
}
