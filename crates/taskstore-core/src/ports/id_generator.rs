//! IdGenerator port - tsid 生成の抽象化
//!
//! # 実装
//! - **TsidGenerator**: Clock のミリ秒 + プロセス内カウンタ
//!
//! 同一ミリ秒内ではカウンタを 1 ずつ進め、ミリ秒が変わると 1 に戻します。
//! 時計が巻き戻っても前回値 + 1 を返すので、プロセス内では常に狭義単調増加です。

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::domain::ids::Tsid;
use crate::ports::Clock;

/// A fresh id together with the wall-clock time it was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedId {
    pub tsid: Tsid,
    pub timestamp: DateTime<Utc>,
}

/// IdGenerator は時刻順にソート可能な ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数の Add から同時に呼ばれる）
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> GeneratedId;
}

/// Lock-free tsid generator.
pub struct TsidGenerator<C> {
    clock: C,
    last: AtomicU64,
}

impl<C: Clock> TsidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last: AtomicU64::new(0),
        }
    }
}

impl<C: Clock> IdGenerator for TsidGenerator<C> {
    fn generate(&self) -> GeneratedId {
        let timestamp = self.clock.now();
        let candidate = Tsid::from_parts(timestamp.timestamp_millis(), 1).raw();

        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(candidate.max(last + 1))
            })
            // the closure always returns Some
            .unwrap_or_else(|last| last);

        GeneratedId {
            tsid: Tsid::from_raw(candidate.max(prev + 1)),
            timestamp,
        }
    }
}
