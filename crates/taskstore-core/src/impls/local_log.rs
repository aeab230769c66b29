//! LocalConsensusLog - プロセス内・単一レプリカの合意ログ
//!
//! # 実装詳細
//! - 提案は mpsc チャネルに積まれ、1 つの apply タスクが到着順（= コミット順）に適用する
//! - `propose` は oneshot で適用結果を待つ。timeout はキューへの投入待ちも含めた全体に掛かる
//! - timeout を過ぎると呼び出し側は失敗するが、既に積まれたエントリは後で適用される
//!   （合意ログと同じ意味論）
//! - 状態機械の `apply` はブロッキング I/O なので spawn_blocking で実行する

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::ConsensusError;
use crate::ports::consensus::{ConsensusLog, SnapshotSink, StateMachine};

const QUEUE_DEPTH: usize = 1024;

struct Proposal {
    entry: Vec<u8>,
    ack: oneshot::Sender<Result<u64, ConsensusError>>,
}

pub struct LocalConsensusLog {
    tx: mpsc::Sender<Proposal>,
    fsm: Arc<dyn StateMachine>,
    applied: Arc<AtomicU64>,
}

impl LocalConsensusLog {
    /// Start the apply task. Must be called inside a tokio runtime.
    pub fn spawn(fsm: Arc<dyn StateMachine>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let applied = Arc::new(AtomicU64::new(0));
        tokio::spawn(apply_loop(rx, fsm.clone(), applied.clone()));
        Self { tx, fsm, applied }
    }

    /// Index of the last successfully applied entry.
    pub fn last_applied(&self) -> u64 {
        self.applied.load(Ordering::Acquire)
    }

    /// Persist a point-in-time snapshot of the state machine.
    pub fn snapshot_to(&self, sink: &mut dyn SnapshotSink) -> Result<usize, ConsensusError> {
        self.fsm.snapshot()?.persist(sink)
    }

    pub fn restore_from(&self, source: &mut dyn Read) -> Result<usize, ConsensusError> {
        self.fsm.restore(source)
    }
}

async fn apply_loop(
    mut rx: mpsc::Receiver<Proposal>,
    fsm: Arc<dyn StateMachine>,
    applied: Arc<AtomicU64>,
) {
    let mut index = 0u64;
    while let Some(Proposal { entry, ack }) = rx.recv().await {
        index += 1;
        let fsm = fsm.clone();
        let result = tokio::task::spawn_blocking(move || fsm.apply(&entry))
            .await
            .unwrap_or_else(|e| Err(ConsensusError::Apply(format!("apply task: {e}"))));

        match &result {
            Ok(()) => {
                applied.store(index, Ordering::Release);
                debug!(index, "entry applied");
            }
            Err(err) => warn!(index, error = %err, "entry apply failed"),
        }
        // the proposer may have timed out already
        let _ = ack.send(result.map(|()| index));
    }
    debug!("consensus log closed");
}

#[async_trait]
impl ConsensusLog for LocalConsensusLog {
    async fn propose(&self, entry: Vec<u8>, timeout: Duration) -> Result<(), ConsensusError> {
        let (ack, done) = oneshot::channel();
        let commit = async move {
            if self.tx.send(Proposal { entry, ack }).await.is_err() {
                return Err(ConsensusError::Closed);
            }
            match done.await {
                Err(_) => Err(ConsensusError::Closed),
                Ok(result) => result.map(|_| ()),
            }
        };

        tokio::time::timeout(timeout, commit)
            .await
            .unwrap_or(Err(ConsensusError::Timeout(timeout)))
    }
}
