//! Wire contract shared by the HTTP server and the HTTP peer client.
//!
//! Field tags are short (`g`, `k`, `o`, ...) and must stay stable: nodes of
//! different versions talk to each other with these bodies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::condition::Condition;
use super::task::TaskUpdate;
use crate::error::TaskStoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddRequest {
    #[serde(rename = "g")]
    pub group: String,
    #[serde(rename = "k")]
    pub kind: String,
    #[serde(rename = "o", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(rename = "p", default)]
    pub param: BTreeMap<String, String>,
}

/// Response of Add and GetFirstInGroup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub id: String,
    #[serde(rename = "g")]
    pub group: String,
    /// Raw status; 0 means "not set" and is rejected by validation.
    #[serde(rename = "s", default)]
    pub status: u8,
    /// Absent keeps the stored param.
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub param: Option<BTreeMap<String, String>>,
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerRegRequest {
    #[serde(rename = "o")]
    pub owner: String,
    #[serde(rename = "k", default)]
    pub kinds: Vec<String>,
    #[serde(rename = "i", default)]
    pub internal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerUnRegRequest {
    #[serde(rename = "o")]
    pub owner: String,
    #[serde(rename = "i", default)]
    pub internal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckRequest {
    #[serde(rename = "i", default)]
    pub internal: bool,
}

/// Which records a search touches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(rename = "k", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Stop after this many matches.
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

impl SearchFilter {
    /// A condition, when present, must not be empty.
    pub fn validate(&self) -> Result<(), TaskStoreError> {
        match &self.condition {
            Some(c) if c.is_empty() => Err(TaskStoreError::validation("condition is empty")),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(flatten)]
    pub filter: SearchFilter,
    #[serde(rename = "i", default)]
    pub internal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchUpdateRequest {
    #[serde(default)]
    pub up: TaskUpdate,
    #[serde(flatten)]
    pub filter: SearchFilter,
    #[serde(rename = "i", default)]
    pub internal: bool,
}
