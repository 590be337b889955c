//! Scanned code grammar.
//!
//! Two label shapes are in circulation: a legacy all-numeric category prefix
//! (`60123456`) and a letter+digit category prefix (`A1123456`). Both resolve to
//! the same category key space used by the reference lookup.

use crate::types::ParsedCode;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static LETTER_PREFIXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][0-9])([0-9]+)$").expect("letter-prefixed pattern"));

static NUMERIC_PREFIXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{2})([0-9]+)$").expect("numeric-prefixed pattern"));

static CATEGORY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Z][0-9]|[0-9]{2})$").expect("category code pattern"));

/// The scanned text does not match either code shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid code: expected a 2-digit or letter+digit prefix followed by a numeric serial")]
pub struct ValidationError {
    pub input: String,
}

/// Parse a raw scan into its category code, serial and canonical barcode
pub fn parse(raw: &str) -> Result<ParsedCode, ValidationError> {
    let code = raw.trim();

    if let Some(caps) = LETTER_PREFIXED.captures(code) {
        return Ok(ParsedCode {
            category_code: caps[1].to_ascii_uppercase(),
            serial: caps[2].to_string(),
            barcode: code.to_ascii_uppercase(),
        });
    }

    if let Some(caps) = NUMERIC_PREFIXED.captures(code) {
        return Ok(ParsedCode {
            category_code: caps[1].to_string(),
            serial: caps[2].to_string(),
            barcode: code.to_string(),
        });
    }

    Err(ValidationError {
        input: code.to_string(),
    })
}

/// Whether `code` is a canonical category code (`A1` or `60` style)
pub fn is_category_code(code: &str) -> bool {
    CATEGORY_CODE.is_match(code)
}
