//! FjallKv - fjall (LSM) による永続化 KvEngine
//!
//! 1 つの keyspace に 1 つの partition（`tasks`）を開き、全キー空間をそこに置きます。
//! バッチは keyspace の `Batch` でアトミックにコミットし、
//! スナップショットは partition の MVCC スナップショットを使います（書き込みをブロックしない）。

use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::info;

use crate::error::StoreError;
use crate::ports::kv_engine::{BatchOp, KvEngine, KvSnapshot, ScanVisitor, WriteBatch};

const PARTITION: &str = "tasks";

pub struct FjallKv {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl FjallKv {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let keyspace = Config::new(path)
            .open()
            .map_err(|e| StoreError::engine("open", e))?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .map_err(|e| StoreError::engine("open partition", e))?;
        info!(path = %path.display(), "opened fjall keyspace");
        Ok(Self {
            keyspace,
            partition,
        })
    }
}

impl KvEngine for FjallKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self
            .partition
            .get(key)
            .map_err(|e| StoreError::engine("get", e))?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tx = self.keyspace.batch();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => tx.insert(&self.partition, key, value),
                BatchOp::Delete { key } => tx.remove(&self.partition, key),
            }
        }
        tx.commit().map_err(|e| StoreError::engine("write", e))
    }

    fn scan(
        &self,
        prefix: &[u8],
        start: Option<&[u8]>,
        visit: &mut ScanVisitor<'_>,
    ) -> Result<(), StoreError> {
        let from = match start {
            Some(start) if start > prefix => start.to_vec(),
            _ => prefix.to_vec(),
        };
        for item in self.partition.range(from..) {
            let (key, value) = item.map_err(|e| StoreError::engine("scan", e))?;
            if !key.starts_with(prefix) {
                break;
            }
            if !visit(&key, &value)? {
                break;
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<Box<dyn KvSnapshot>, StoreError> {
        Ok(Box::new(FjallSnapshot {
            snapshot: self.partition.snapshot(),
        }))
    }
}

struct FjallSnapshot {
    snapshot: fjall::Snapshot,
}

impl KvSnapshot for FjallSnapshot {
    fn scan_all(&self, visit: &mut ScanVisitor<'_>) -> Result<(), StoreError> {
        for item in self.snapshot.iter() {
            let (key, value) = item.map_err(|e| StoreError::engine("snapshot scan", e))?;
            if !visit(&key, &value)? {
                break;
            }
        }
        Ok(())
    }
}
