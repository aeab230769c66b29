//! KvEngine port - 順序付きキーバリューストア
//!
//! 必要な能力:
//! - point get
//! - アトミックなバッチ書き込み
//! - prefix + 開始キー付きの前方イテレーション
//! - point-in-time スナップショット
//!
//! # 実装
//! - `impls::memory_kv::InMemoryKv`（テスト・開発用）
//! - `impls::fjall_kv::FjallKv`（永続化）

use crate::domain::events::{Event, EventType};
use crate::error::StoreError;

/// Visitor for scans. Return `Ok(false)` to stop early.
pub type ScanVisitor<'a> = dyn FnMut(&[u8], &[u8]) -> Result<bool, StoreError> + 'a;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Mutations applied together or not at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

impl From<Vec<Event>> for WriteBatch {
    /// SET -> put (nil value becomes empty bytes), DELETE -> delete.
    fn from(events: Vec<Event>) -> Self {
        let mut batch = WriteBatch::new();
        for event in events {
            match event.kind {
                EventType::Set => batch.put(event.key, event.value.unwrap_or_default()),
                EventType::Delete => batch.delete(event.key),
            }
        }
        batch
    }
}

/// Consistent read-only view used for log compaction.
pub trait KvSnapshot: Send {
    /// Visit every key/value pair in key order.
    fn scan_all(&self, visit: &mut ScanVisitor<'_>) -> Result<(), StoreError>;
}

pub trait KvEngine: Send + Sync {
    /// Missing keys are `Ok(None)`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Apply `batch` atomically.
    fn write(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Iterate keys starting with `prefix` in order, beginning at `start`
    /// (inclusive) when given.
    fn scan(
        &self,
        prefix: &[u8],
        start: Option<&[u8]>,
        visit: &mut ScanVisitor<'_>,
    ) -> Result<(), StoreError>;

    fn snapshot(&self) -> Result<Box<dyn KvSnapshot>, StoreError>;
}
