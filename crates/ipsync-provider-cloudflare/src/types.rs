//! Cloudflare API v4 response envelopes

use serde::Deserialize;

/// Standard response envelope: `{ success, errors, result, result_info }`
#[derive(Debug, Deserialize)]
pub struct CloudflareResponse<T> {
    pub success: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub errors: Vec<CloudflareError>,
    pub result_info: Option<CloudflareResultInfo>,
}

impl<T> CloudflareResponse<T> {
    /// First error message, or a generic one when the API sent none
    pub fn error_message(&self) -> String {
        self.errors
            .first()
            .map(|e| format!("{} (code {})", e.message, e.code))
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct CloudflareError {
    pub code: i64,
    pub message: String,
}

/// Pagination info attached to list responses
#[derive(Debug, Deserialize)]
pub struct CloudflareResultInfo {
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

impl CloudflareResultInfo {
    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

#[derive(Debug, Deserialize)]
pub struct CloudflareZone {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CloudflareDnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
}

/// `result` of a create call; only the id is needed
#[derive(Debug, Deserialize)]
pub struct CreatedRecord {
    pub id: String,
}
