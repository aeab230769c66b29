//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」です。
//! 各 trait はストレージ・合意ログ・ピアノードへのインターフェースを提供し、
//! 実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - ストレージは計算（イベント列）と適用（`apply`）を分ける
//! - レプリケーションの有無は `MutationLog` の実装で切り替える
//! - ピアへの転送は `ClusterClient` の実装で切り替える（HTTP / in-process）

pub mod clock;
pub mod cluster;
pub mod consensus;
pub mod id_generator;
pub mod kv_engine;
pub mod mutation_log;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::cluster::ClusterClient;
pub use self::consensus::{ConsensusLog, FsmSnapshot, SnapshotSink, StateMachine};
pub use self::id_generator::{GeneratedId, IdGenerator, TsidGenerator};
pub use self::kv_engine::{KvEngine, KvSnapshot, WriteBatch};
pub use self::mutation_log::{DirectApply, MutationLog, ReplicatedApply};
pub use self::task_store::TaskStore;
