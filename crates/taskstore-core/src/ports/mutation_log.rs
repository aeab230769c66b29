//! MutationLog port - イベント列をコミットする唯一の窓口
//!
//! コマンドは `TaskStore` でイベント列を計算し、ここに渡すだけです。
//! レプリケーションの有無は実装の選択で決まり、呼び出し側は意識しません。
//!
//! # 実装
//! - **DirectApply**: 単一ノード。`TaskStore::apply` を直接呼ぶ
//! - **ReplicatedApply**: 合意ログに提案し、コミットまで待つ

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::events::{Event, encode_batch};
use crate::error::{ConsensusError, TaskStoreError};
use crate::ports::consensus::ConsensusLog;
use crate::ports::task_store::TaskStore;

/// Default bound on how long a proposal may wait for commit.
pub const DEFAULT_PROPOSE_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait MutationLog: Send + Sync {
    async fn commit(&self, events: Vec<Event>) -> Result<(), TaskStoreError>;
}

pub struct DirectApply {
    store: Arc<dyn TaskStore>,
}

impl DirectApply {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MutationLog for DirectApply {
    async fn commit(&self, events: Vec<Event>) -> Result<(), TaskStoreError> {
        if events.is_empty() {
            return Ok(());
        }
        self.store.apply(events)?;
        Ok(())
    }
}

pub struct ReplicatedApply {
    log: Arc<dyn ConsensusLog>,
    timeout: Duration,
}

impl ReplicatedApply {
    pub fn new(log: Arc<dyn ConsensusLog>) -> Self {
        Self {
            log,
            timeout: DEFAULT_PROPOSE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl MutationLog for ReplicatedApply {
    async fn commit(&self, events: Vec<Event>) -> Result<(), TaskStoreError> {
        if events.is_empty() {
            return Ok(());
        }
        let entry = encode_batch(&events).map_err(ConsensusError::Encode)?;
        self.log.propose(entry, self.timeout).await.map_err(|err| {
            warn!(error = %err, events = events.len(), "proposal failed");
            TaskStoreError::from(err)
        })
    }
}
