//! taskstore-core
//!
//! Core building blocks of a partitioned, optionally replicated task store.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（task, events, condition, ids, contract）
//! - **ports**: 抽象化レイヤー（KvEngine, TaskStore, MutationLog, ConsensusLog, ClusterClient, など）
//! - **impls**: 実装（InMemoryKv, FjallKv, KvTaskStore, TaskStateMachine, HttpClusterClient, など）
//! - **app**: ルーティングとコマンド／クエリ（builder, ring, command, query）
//! - **error**: エラー型

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;

pub use crate::app::{App, AppBuilder};
pub use crate::error::{Result, TaskStoreError};
