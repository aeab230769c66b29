//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryKv** / **FjallKv**: KvEngine（開発用 BTreeMap / 永続化 LSM）
//! - **KvTaskStore**: 任意の KvEngine 上のローカルストレージエンジン
//! - **OwnerRegistry**: kind ごとのオーナー一覧とラウンドロビン
//! - **TaskStateMachine**: 合意ログの状態機械（apply / snapshot / restore）
//! - **LocalConsensusLog**: プロセス内の合意ログ（提案順に適用、タイムアウト付き）
//! - **FileSnapshotStore**: スナップショットのファイル保存（tmp に書いて rename）
//! - **HttpClusterClient** / **InProcessCluster**: ピアノードへの転送

pub mod fjall_kv;
pub mod fsm;
pub mod http_cluster;
pub mod inproc_cluster;
pub mod kv_store;
pub mod local_log;
pub mod memory_kv;
pub mod round_robin;
pub mod snapshot_file;

// 主要な型を再エクスポート
pub use self::fjall_kv::FjallKv;
pub use self::fsm::TaskStateMachine;
pub use self::http_cluster::HttpClusterClient;
pub use self::inproc_cluster::InProcessCluster;
pub use self::kv_store::{KvTaskStore, OwnerUnRegScope};
pub use self::local_log::LocalConsensusLog;
pub use self::memory_kv::InMemoryKv;
pub use self::round_robin::{OwnerRegistry, RoundRobin};
pub use self::snapshot_file::{FileSnapshotSink, FileSnapshotStore};
