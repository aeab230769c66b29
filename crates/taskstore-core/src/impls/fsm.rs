//! TaskStateMachine - 合意ログの状態機械
//!
//! - `apply`: コミット済みエントリ（JSON のイベント列）を `TaskStore::apply` に渡す
//! - `snapshot`: KvEngine のスナップショット（書き込みをブロックしない）
//! - `persist`: 全キー/値を `[u32 BE 長さ][bytes]` のフレームで key, value の順に書く
//! - `restore`: 同じストリームを 1000 件ずつのバッチで読み込む
//!
//! `restore` も `TaskStore::apply` を通すので、オーナーのキャッシュも更新されます。

use std::io::{self, Read, Write};
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::events::{Event, decode_batch};
use crate::error::{ConsensusError, StoreError};
use crate::ports::consensus::{FsmSnapshot, SnapshotSink, StateMachine};
use crate::ports::kv_engine::{KvEngine, KvSnapshot};
use crate::ports::task_store::TaskStore;

/// Pairs per restore batch.
pub const RESTORE_BATCH: usize = 1000;

pub struct TaskStateMachine {
    store: Arc<dyn TaskStore>,
    engine: Arc<dyn KvEngine>,
}

impl TaskStateMachine {
    /// `store` must be backed by `engine`.
    pub fn new(store: Arc<dyn TaskStore>, engine: Arc<dyn KvEngine>) -> Self {
        Self { store, engine }
    }

    fn apply_batch(&self, events: Vec<Event>) -> Result<(), ConsensusError> {
        self.store
            .apply(events)
            .map_err(|e| ConsensusError::Apply(e.to_string()))
    }
}

impl StateMachine for TaskStateMachine {
    fn apply(&self, entry: &[u8]) -> Result<(), ConsensusError> {
        let events =
            decode_batch(entry).map_err(|e| ConsensusError::Apply(format!("event decode: {e}")))?;
        self.apply_batch(events)
    }

    fn snapshot(&self) -> Result<Box<dyn FsmSnapshot>, ConsensusError> {
        let snapshot = self
            .engine
            .snapshot()
            .map_err(|e| ConsensusError::Apply(e.to_string()))?;
        Ok(Box::new(EngineSnapshot { snapshot }))
    }

    fn restore(&self, source: &mut dyn Read) -> Result<usize, ConsensusError> {
        let mut batch = Vec::with_capacity(RESTORE_BATCH);
        let mut total = 0;

        while let Some(key) = read_frame(source)? {
            let value = read_frame(source)?.ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "snapshot ends after a key")
            })?;
            batch.push(Event::set(key, value));
            total += 1;
            if batch.len() == RESTORE_BATCH {
                self.apply_batch(std::mem::take(&mut batch))?;
            }
        }
        if !batch.is_empty() {
            self.apply_batch(batch)?;
        }

        info!(pairs = total, "snapshot restored");
        Ok(total)
    }
}

struct EngineSnapshot {
    snapshot: Box<dyn KvSnapshot>,
}

impl EngineSnapshot {
    fn write_all(&self, sink: &mut dyn SnapshotSink) -> Result<usize, ConsensusError> {
        let mut count = 0;
        let mut io_err = None;
        self.snapshot
            .scan_all(&mut |key, value| {
                if let Err(e) = write_pair(sink, key, value) {
                    io_err = Some(e);
                    return Ok(false);
                }
                count += 1;
                Ok(true)
            })
            .map_err(|e: StoreError| ConsensusError::Apply(e.to_string()))?;
        if let Some(e) = io_err {
            return Err(e.into());
        }
        sink.flush()?;
        Ok(count)
    }
}

impl FsmSnapshot for EngineSnapshot {
    fn persist(&self, sink: &mut dyn SnapshotSink) -> Result<usize, ConsensusError> {
        match self.write_all(sink) {
            Ok(count) => {
                info!(pairs = count, "snapshot persisted");
                Ok(count)
            }
            Err(err) => {
                warn!(error = %err, "snapshot persist failed, cancelling sink");
                if let Err(cancel) = sink.cancel() {
                    warn!(error = %cancel, "sink cancel failed");
                }
                Err(err)
            }
        }
    }
}

fn write_frame(w: &mut dyn SnapshotSink, bytes: &[u8]) -> io::Result<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(bytes)
}

fn write_pair(w: &mut dyn SnapshotSink, key: &[u8], value: &[u8]) -> io::Result<()> {
    write_frame(w, key)?;
    write_frame(w, value)
}

/// `Ok(None)` on a clean end of stream.
fn read_frame(r: &mut dyn Read) -> io::Result<Option<Vec<u8>>> {
    let mut len = [0u8; 4];
    let mut filled = 0;
    while filled < len.len() {
        match r.read(&mut len[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    let mut buf = vec![0u8; u32::from_be_bytes(len) as usize];
    r.read_exact(&mut buf)?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::encode_batch;
    use crate::impls::kv_store::KvTaskStore;
    use crate::impls::memory_kv::InMemoryKv;

    fn machine() -> (TaskStateMachine, Arc<InMemoryKv>) {
        let engine = Arc::new(InMemoryKv::new());
        let store = Arc::new(KvTaskStore::new(engine.clone()));
        (TaskStateMachine::new(store, engine.clone()), engine)
    }

    struct FailingSink {
        cancelled: bool,
    }

    impl Write for FailingSink {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SnapshotSink for FailingSink {
        fn cancel(&mut self) -> io::Result<()> {
            self.cancelled = true;
            Ok(())
        }
    }

    #[test]
    fn apply_decodes_committed_entry() {
        let (fsm, engine) = machine();
        let entry = encode_batch(&[Event::set("a", "1"), Event::set("b", "2")]).unwrap();
        fsm.apply(&entry).unwrap();
        assert_eq!(engine.len(), 2);

        assert!(matches!(fsm.apply(b"garbage"), Err(ConsensusError::Apply(_))));
    }

    #[test]
    fn persist_then_restore_copies_every_pair() {
        let (source, source_engine) = machine();
        let events: Vec<_> = (0..2500)
            .map(|i| Event::set(format!("t-k-{i:05}"), format!("{i}")))
            .collect();
        source.apply(&encode_batch(&events).unwrap()).unwrap();

        let snap = source.snapshot().unwrap();
        // writes after the snapshot are not part of it
        source.apply(&encode_batch(&[Event::set("late", "x")]).unwrap()).unwrap();

        let mut buf: Vec<u8> = Vec::new();
        assert_eq!(snap.persist(&mut buf).unwrap(), 2500);

        let (target, target_engine) = machine();
        assert_eq!(target.restore(&mut buf.as_slice()).unwrap(), 2500);
        assert_eq!(target_engine.len(), 2500);
        assert_eq!(source_engine.len(), 2501);
        assert_eq!(
            target_engine.get(b"t-k-01234").unwrap(),
            Some(b"1234".to_vec())
        );
    }

    #[test]
    fn empty_value_round_trips() {
        let (source, _) = machine();
        source.apply(&encode_batch(&[Event::set_empty("o-K-w")]).unwrap()).unwrap();
        let mut buf: Vec<u8> = Vec::new();
        source.snapshot().unwrap().persist(&mut buf).unwrap();

        let (target, engine) = machine();
        target.restore(&mut buf.as_slice()).unwrap();
        assert_eq!(engine.get(b"o-K-w").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let (source, _) = machine();
        source.apply(&encode_batch(&[Event::set("a", "1")]).unwrap()).unwrap();
        let mut buf: Vec<u8> = Vec::new();
        source.snapshot().unwrap().persist(&mut buf).unwrap();
        buf.truncate(buf.len() - 1);

        let (target, _) = machine();
        assert!(matches!(
            target.restore(&mut buf.as_slice()),
            Err(ConsensusError::Snapshot(_))
        ));
    }

    #[test]
    fn failed_persist_cancels_sink() {
        let (source, _) = machine();
        source.apply(&encode_batch(&[Event::set("a", "1")]).unwrap()).unwrap();
        let mut sink = FailingSink { cancelled: false };
        assert!(source.snapshot().unwrap().persist(&mut sink).is_err());
        assert!(sink.cancelled);
    }
}
