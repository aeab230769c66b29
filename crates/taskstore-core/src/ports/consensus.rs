//! Consensus port - 合意ログと状態機械
//!
//! `ConsensusLog` はエントリを提案し、コミット（または timeout）まで待ちます。
//! `StateMachine` はコミット順に 1 エントリずつ適用されます。全レプリカで同じ結果になるよう、
//! `apply` はストレージ書き込み以外の副作用を持ってはいけません。

use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ConsensusError;

/// Proposal side of a replicated log.
#[async_trait]
pub trait ConsensusLog: Send + Sync {
    /// Block until `entry` is committed and applied, or `timeout` elapses.
    async fn propose(&self, entry: Vec<u8>, timeout: Duration) -> Result<(), ConsensusError>;
}

/// Destination of a persisted snapshot.
pub trait SnapshotSink: Write + Send {
    /// Abandon a partially written snapshot.
    fn cancel(&mut self) -> std::io::Result<()>;
}

impl SnapshotSink for Vec<u8> {
    fn cancel(&mut self) -> std::io::Result<()> {
        self.clear();
        Ok(())
    }
}

/// Point-in-time view handed to the log for compaction.
pub trait FsmSnapshot: Send {
    /// Stream every pair to `sink`; returns the number of pairs written.
    /// The sink is cancelled on error.
    fn persist(&self, sink: &mut dyn SnapshotSink) -> Result<usize, ConsensusError>;
}

/// Callbacks driven by the log in commit order.
pub trait StateMachine: Send + Sync {
    fn apply(&self, entry: &[u8]) -> Result<(), ConsensusError>;

    /// Must not block concurrent writes.
    fn snapshot(&self) -> Result<Box<dyn FsmSnapshot>, ConsensusError>;

    /// Bulk load a persisted stream; returns the number of pairs loaded.
    fn restore(&self, source: &mut dyn Read) -> Result<usize, ConsensusError>;
}
