//! taskstore - ノード 1 台分のプロセス
//!
//! 設定を読み、ストレージ（fjall / in-memory）とミューテーションの経路
//! （直接適用 / ローカル順序ログ経由）を組み立てて、HTTP サーバを起動します。
//!
//! # 実装詳細
//! - `--local-log` のときは停止時にスナップショットを `rpath/<host>` に書き出す
//! - 起動時の復元は in-memory エンジンのみ（fjall は自前で永続化しており、
//!   古いスナップショットを被せると削除済みのキーが戻ってしまうため）

mod config;
mod handlers;
mod server;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use taskstore_core::impls::{
    FileSnapshotStore, FjallKv, HttpClusterClient, InMemoryKv, KvTaskStore, LocalConsensusLog,
    TaskStateMachine,
};
use taskstore_core::ports::{ConsensusLog, KvEngine, MutationLog, ReplicatedApply, TaskStore};
use taskstore_core::{App, AppBuilder};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{Args, Config, Engine};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

struct Node {
    app: Arc<App>,
    log: Option<Arc<LocalConsensusLog>>,
}

fn build_app<E: KvEngine + 'static>(cfg: &Config, engine: Arc<E>) -> Result<Node> {
    let store: Arc<dyn TaskStore> = Arc::new(KvTaskStore::new(engine.clone()));

    let mut builder = AppBuilder::new(cfg.cur_url.clone())
        .nodes(cfg.nodes.iter().cloned())
        .store(store.clone())
        .cluster(Arc::new(HttpClusterClient::default()));

    let mut local = None;
    if cfg.local_log {
        let fsm = TaskStateMachine::new(store, engine);
        let log = Arc::new(LocalConsensusLog::spawn(Arc::new(fsm)));
        let proposer: Arc<dyn ConsensusLog> = log.clone();
        let mutations: Arc<dyn MutationLog> =
            Arc::new(ReplicatedApply::new(proposer).with_timeout(cfg.commit_timeout));
        builder = builder.mutation_log(mutations);
        local = Some(log);
    }

    Ok(Node {
        app: Arc::new(builder.build()?),
        log: local,
    })
}

fn restore(log: &LocalConsensusLog, snapshots: &FileSnapshotStore) -> Result<()> {
    let Some(mut reader) = snapshots
        .open()
        .with_context(|| format!("failed to open {:?}", snapshots.path()))?
    else {
        info!(dir = ?snapshots.path(), "no snapshot to restore");
        return Ok(());
    };
    let records = log.restore_from(&mut reader)?;
    info!(records, "restored from snapshot");
    Ok(())
}

fn take_snapshot(log: &LocalConsensusLog, snapshots: &FileSnapshotStore) -> Result<()> {
    let mut sink = snapshots
        .create()
        .with_context(|| format!("failed to create a snapshot in {:?}", snapshots.path()))?;
    let records = log.snapshot_to(&mut sink)?;
    sink.commit()?;
    info!(records, applied = log.last_applied(), "snapshot written");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::resolve(Args::parse(), &config::hostname())?;
    info!(
        url = %cfg.cur_url,
        nodes = ?cfg.nodes,
        engine = ?cfg.engine,
        local_log = cfg.local_log,
        "starting node"
    );

    let node = match cfg.engine {
        Engine::Fjall => {
            std::fs::create_dir_all(&cfg.data_dir)
                .with_context(|| format!("failed to create {:?}", cfg.data_dir))?;
            let engine = FjallKv::open(&cfg.data_dir)
                .with_context(|| format!("failed to open fjall at {:?}", cfg.data_dir))?;
            build_app(&cfg, Arc::new(engine))?
        }
        Engine::Memory => build_app(&cfg, Arc::new(InMemoryKv::new()))?,
    };

    let snapshots = FileSnapshotStore::new(&cfg.snapshot_dir);
    if let (Some(log), Engine::Memory) = (&node.log, cfg.engine) {
        restore(log, &snapshots)?;
    }

    let served = server::serve(node.app, cfg.port).await;

    if let Some(log) = &node.log {
        if let Err(e) = take_snapshot(log, &snapshots) {
            warn!(error = %e, "failed to write the shutdown snapshot");
        }
    }
    served
}
