//! InMemoryKv - 開発・テスト用の KvEngine
//!
//! # 実装詳細
//! - `RwLock<BTreeMap>` で順序付きキー空間を保持
//! - バッチは書き込みロック 1 回で適用（アトミック）
//! - スナップショットはマップの複製

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use crate::error::StoreError;
use crate::ports::kv_engine::{BatchOp, KvEngine, KvSnapshot, ScanVisitor, WriteBatch};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Debug, Default, Clone)]
pub struct InMemoryKv {
    tree: Arc<RwLock<Tree>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tree.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn scan_tree(
    tree: &Tree,
    prefix: &[u8],
    start: Option<&[u8]>,
    visit: &mut ScanVisitor<'_>,
) -> Result<(), StoreError> {
    let from = match start {
        Some(start) if start > prefix => start,
        _ => prefix,
    };
    for (key, value) in tree.range::<[u8], _>((Bound::Included(from), Bound::Unbounded)) {
        if !key.starts_with(prefix) {
            break;
        }
        if !visit(key, value)? {
            break;
        }
    }
    Ok(())
}

impl KvEngine for InMemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());
        Ok(tree.get(key).cloned())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tree = self.tree.write().unwrap_or_else(|e| e.into_inner());
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    tree.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    tree.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan(
        &self,
        prefix: &[u8],
        start: Option<&[u8]>,
        visit: &mut ScanVisitor<'_>,
    ) -> Result<(), StoreError> {
        let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());
        scan_tree(&tree, prefix, start, visit)
    }

    fn snapshot(&self) -> Result<Box<dyn KvSnapshot>, StoreError> {
        let tree = self.tree.read().unwrap_or_else(|e| e.into_inner()).clone();
        Ok(Box::new(TreeSnapshot { tree }))
    }
}

struct TreeSnapshot {
    tree: Tree,
}

impl KvSnapshot for TreeSnapshot {
    fn scan_all(&self, visit: &mut ScanVisitor<'_>) -> Result<(), StoreError> {
        scan_tree(&self.tree, b"", None, visit)
    }
}
