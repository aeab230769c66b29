//! OwnerRegistry - kind ごとのオーナー一覧とラウンドロビン
//!
//! # 実装詳細
//! - kind を初めて見たときに `o-{kind}-*` のスキャン結果からリストを作りキャッシュする
//! - カウンタはアトミック加算のみ（Add 同士を直列化しない）
//! - 初回構築の競合は許容する（最悪でも重複して構築するだけ）
//! - オーナー登録・解除が適用されたら該当 kind のキャッシュを捨て、世代を進める
//! - 読み込み中に世代が進んだ結果はキャッシュせず、読み直す

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::StoreError;

/// Fixed owner list with a shared cursor.
#[derive(Debug, Default)]
pub struct RoundRobin {
    owners: Vec<String>,
    cursor: AtomicU32,
}

impl RoundRobin {
    pub fn new(owners: Vec<String>) -> Self {
        Self {
            owners,
            cursor: AtomicU32::new(0),
        }
    }

    /// `None` when no owner is registered.
    pub fn next(&self) -> Option<&str> {
        if self.owners.is_empty() {
            return None;
        }
        let n = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        self.owners
            .get(n as usize % self.owners.len())
            .map(String::as_str)
    }

    pub fn owners(&self) -> &[String] {
        &self.owners
    }
}

#[derive(Debug, Default)]
struct Cache {
    kinds: HashMap<String, Arc<RoundRobin>>,
    generations: HashMap<String, u64>,
}

impl Cache {
    fn generation(&self, kind: &str) -> u64 {
        self.generations.get(kind).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct OwnerRegistry {
    cache: RwLock<Cache>,
}

impl OwnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached round robin for `kind`, built with `load` on a miss.
    ///
    /// A list loaded while `kind` was invalidated is never cached; `load` runs again.
    pub fn get_or_load<F>(&self, kind: &str, mut load: F) -> Result<Arc<RoundRobin>, StoreError>
    where
        F: FnMut() -> Result<Vec<String>, StoreError>,
    {
        loop {
            let seen = {
                let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
                if let Some(rr) = cache.kinds.get(kind) {
                    return Ok(rr.clone());
                }
                cache.generation(kind)
            };

            let fresh = Arc::new(RoundRobin::new(load()?));
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            if cache.generation(kind) == seen {
                return Ok(cache.kinds.entry(kind.to_string()).or_insert(fresh).clone());
            }
        }
    }

    pub fn invalidate(&self, kind: &str) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.kinds.remove(kind);
        *cache.generations.entry(kind.to_string()).or_insert(0) += 1;
    }
}
