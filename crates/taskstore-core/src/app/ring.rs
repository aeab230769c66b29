//! HashRing - group → ノードの一貫性ハッシュ
//!
//! # 実装詳細
//! - 各ノードを `VNODES` 個の仮想ノードとしてリングに配置する（xxHash64）
//! - キーのハッシュ以上で最初の仮想ノードを選び、末尾を超えたら先頭に戻る
//! - ノード集合が同じなら、どのプロセスでも同じ割り当てになる（順序にも依存しない）

use std::collections::BTreeMap;
use std::hash::Hasher;

use twox_hash::XxHash64;

/// Virtual nodes per physical node.
pub const VNODES: u32 = 160;

const SEED: u64 = 0;

#[derive(Debug, Clone, Default)]
pub struct HashRing {
    nodes: Vec<String>,
    points: BTreeMap<u64, usize>,
}

impl HashRing {
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut nodes: Vec<String> = nodes.into_iter().map(Into::into).collect();
        nodes.sort();
        nodes.dedup();

        let mut points = BTreeMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            for replica in 0..VNODES {
                let mut hasher = XxHash64::with_seed(SEED);
                hasher.write(node.as_bytes());
                hasher.write(&replica.to_be_bytes());
                // on a collision the smaller node name wins, independent of input order
                points.entry(hasher.finish()).or_insert(idx);
            }
        }
        Self { nodes, points }
    }

    /// Node owning `key`; `None` on an empty ring.
    pub fn get(&self, key: &str) -> Option<&str> {
        let hash = hash_key(key);
        let (_, idx) = self
            .points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())?;
        self.nodes.get(*idx).map(String::as_str)
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn hash_key(key: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(SEED);
    hasher.write(key.as_bytes());
    hasher.finish()
}
