use crate::error::Result;
use crate::server::{ScanParams, REGISTER_PATH};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Reply from the registration endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ScanReply {
    pub code: String,
    pub http_status: u16,
    pub body: serde_json::Value,
}

impl ScanReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status)
    }
}

/// Submits scanned codes to a running registration server
pub struct ScanClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ScanClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), REGISTER_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST one code (and optional stage) as a JSON body
    pub async fn submit(&self, code: &str, stage: Option<&str>) -> Result<ScanReply> {
        let params = ScanParams {
            code: Some(code.to_string()),
            etapa: stage.map(str::to_string),
        };
        debug!("Submitting {} to {}", code, self.endpoint);

        let resp = self.http.post(&self.endpoint).json(&params).send().await?;
        let http_status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        Ok(ScanReply {
            code: code.to_string(),
            http_status,
            body,
        })
    }
}

/// Read codes from a batch file: one per line, blank lines and `#` comments skipped
pub fn read_codes_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_codes(&content))
}

pub fn parse_codes(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
