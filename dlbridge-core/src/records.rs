//! JSON records exchanged with the engine.
//!
//! The engine hands these back as ready-made JSON text and the dispatcher forwards
//! that text verbatim. The types here pin down the shape both sides agree on; the
//! dispatcher itself only ever builds [`NodeInfo`] (for its embedded-error reply).

use serde::{Deserialize, Serialize};

/// Entry type tag inside a content-addressed directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
    Unknown,
}

/// One entry of a content-addressed directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub cid: String,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub size: i64,
}

/// Progress of one file download, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressInfo {
    /// -1 while the total is unknown.
    pub total_bytes: i64,
    pub bytes_retrieved: i64,
    pub speed_bps: f64,
    pub elapsed_time_sec: f64,
    pub is_completed: bool,
    pub has_error: bool,
    #[serde(default)]
    pub error_message: String,
}

/// What a CID resolves to: a file with a size, a directory with entries, or an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub cid: String,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub size: i64,
    pub entries: Option<Vec<DirectoryEntry>>,
    #[serde(default)]
    pub error: String,
}

impl NodeInfo {
    /// Record for a CID that could not be inspected.
    pub fn failed(cid: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            cid: cid.into(),
            kind: EntryType::Unknown,
            size: 0,
            entries: None,
            error: error.into(),
        }
    }

    pub fn to_json(&self) -> String {
        // Plain strings, integers and enums only: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Result of starting the HTTP API and gateway services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpServicesStatus {
    pub success: bool,
    pub api_addr: String,
    pub gateway_addr: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}
