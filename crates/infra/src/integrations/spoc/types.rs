//! Wire types for the encrypted query protocol

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outer RPC envelope, both directions: the interesting content travels
/// encrypted in `data`.
#[derive(Debug, Deserialize)]
pub struct RpcEnvelope {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub msg: Option<String>,
}

/// Inner payload of the query-id bootstrap call.
#[derive(Debug, Serialize)]
pub struct QueryIdRequest<'a> {
    pub sqlid: &'a str,
    pub id: &'a str,
}

/// Inner payload of a paginated records call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsRequest<'a> {
    pub sqlid: &'a str,
    pub page_num: u32,
    pub page_size: u32,
    /// Submission-state filter
    pub tjzt: &'a str,
}

/// Decrypted shape of a records page.
#[derive(Debug, Default, Deserialize)]
pub struct RecordsPage {
    #[serde(default)]
    pub list: Vec<Value>,
    #[serde(default)]
    pub total: Option<u64>,
}
