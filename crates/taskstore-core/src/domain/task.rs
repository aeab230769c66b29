//! Task model: the unit of work stored and routed by the cluster.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Task status.
///
/// State transitions:
/// - Virgin -> Virgin (param patch)
/// - Virgin -> Failed (moved to the error namespace)
/// - Virgin -> Completed (deleted)
/// - error -> Scheduled (re-created as a fresh Virgin task with a new id)
/// - error -> Completed (deleted)
///
/// Serialized as its wire number (1..=4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Status {
    /// Freshly created, pollable by its owner.
    Virgin = 1,

    /// Reserved. No mutation path moves a task record into this state.
    Scheduled = 2,

    /// Done; the record is removed.
    Completed = 3,

    /// Failed; the record moves to the error namespace.
    Failed = 4,
}

impl Status {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Does this status take the task out of its owner's pollable set?
    pub fn leaves_pool(self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

impl TryFrom<u8> for Status {
    type Error = StoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Status::Virgin),
            2 => Ok(Status::Scheduled),
            3 => Ok(Status::Completed),
            4 => Ok(Status::Failed),
            other => Err(StoreError::UnexpectedStatus(other)),
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.as_u8()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Virgin => "VIRGIN",
            Status::Scheduled => "SCHEDULED",
            Status::Completed => "COMPLETED",
            Status::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// A task as seen by clients and workers.
///
/// `id` is the full storage key (`t-{kind}-{tsid}` or `e-{kind}-{tsid}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "k")]
    pub kind: String,

    #[serde(rename = "g")]
    pub group: String,

    #[serde(rename = "o", default)]
    pub owner: Option<String>,

    #[serde(rename = "s")]
    pub status: Status,

    #[serde(rename = "p", default)]
    pub param: BTreeMap<String, String>,

    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "e", default)]
    pub error: Option<String>,
}

/// Partial update applied by the search-and-update commands.
///
/// Changing `kind`, `group` or `owner` moves the task to a new identity
/// (and possibly a new partition).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub param: Option<BTreeMap<String, String>>,

    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(rename = "k", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(rename = "g", default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(rename = "o", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl TaskUpdate {
    /// Apply the update to `task` in place.
    ///
    /// Returns `true` when the task's identity changed and it has to be
    /// re-added rather than updated.
    pub fn apply_to(&self, task: &mut Task) -> bool {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(param) = &self.param {
            task.param
                .extend(param.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(error) = &self.error {
            task.error = Some(error.clone());
        }

        let mut moved = false;
        if let Some(kind) = &self.kind {
            task.kind = kind.clone();
            moved = true;
        }
        if let Some(group) = &self.group {
            task.group = group.clone();
            moved = true;
        }
        if let Some(owner) = &self.owner {
            task.owner = Some(owner.clone());
            moved = true;
        }
        moved
    }
}
