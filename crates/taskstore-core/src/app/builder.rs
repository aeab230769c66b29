//! AppBuilder - ノード 1 台分の App を組み立てる
//!
//! ノード一覧から一貫性ハッシュのリングを作り、ローカルストア・
//! ミューテーションの経路・他ノードへのクライアントを Context にまとめます。
//! ミューテーションの経路は既定で DirectApply、順序ログを使うときだけ
//! 呼び出し側が ReplicatedApply を差し込みます。
//!
//! 自ノードがリングに載っていない構成は、リクエストを受ける前に弾きます。

use std::sync::Arc;

use tracing::info;

use crate::app::command::Commands;
use crate::app::context::Context;
use crate::app::query::Queries;
use crate::app::ring::HashRing;
use crate::ports::cluster::ClusterClient;
use crate::ports::mutation_log::{DirectApply, MutationLog};
use crate::ports::task_store::TaskStore;

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new("http://node-a:8080")
///     .nodes(["http://node-a:8080", "http://node-b:8080"])
///     .store(store)
///     .cluster(Arc::new(HttpClusterClient::default()))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - store / cluster が未設定なら BuildError
/// - 自ノードの URL がノード一覧に含まれていなければ BuildError
/// - mutation_log を省略すると DirectApply（レプリケーションなし）になる
pub struct AppBuilder {
    cur_url: String,
    nodes: Vec<String>,
    store: Option<Arc<dyn TaskStore>>,
    cluster: Option<Arc<dyn ClusterClient>>,
    log: Option<Arc<dyn MutationLog>>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("url is empty")]
    EmptyUrl,

    #[error("nodes is empty")]
    EmptyNodes,

    #[error("current node {0} is not in the node list {1:?}")]
    NotAMember(String, Vec<String>),

    #[error("no task store configured")]
    MissingStore,

    #[error("no cluster client configured")]
    MissingCluster,
}

impl AppBuilder {
    pub fn new(cur_url: impl Into<String>) -> Self {
        Self {
            cur_url: cur_url.into(),
            nodes: Vec::new(),
            store: None,
            cluster: None,
            log: None,
        }
    }

    /// Every node of the cluster, this one included.
    pub fn nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cluster(mut self, cluster: Arc<dyn ClusterClient>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn mutation_log(mut self, log: Arc<dyn MutationLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        if self.cur_url.is_empty() {
            return Err(BuildError::EmptyUrl);
        }
        if self.nodes.is_empty() {
            return Err(BuildError::EmptyNodes);
        }
        if !self.nodes.contains(&self.cur_url) {
            return Err(BuildError::NotAMember(self.cur_url, self.nodes));
        }
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let cluster = self.cluster.ok_or(BuildError::MissingCluster)?;
        let replicated = self.log.is_some();
        let log = self
            .log
            .unwrap_or_else(|| Arc::new(DirectApply::new(store.clone())));

        info!(
            url = %self.cur_url,
            nodes = self.nodes.len(),
            replicated,
            "app built"
        );
        let ctx = Arc::new(Context {
            ring: HashRing::new(self.nodes.iter().cloned()),
            cur_url: self.cur_url,
            nodes: self.nodes,
            store,
            cluster,
            log,
        });
        Ok(App {
            commands: Commands::new(&ctx),
            queries: Queries::new(&ctx),
            ctx,
        })
    }
}

/// App はノード 1 つ分のアプリケーション
pub struct App {
    pub commands: Commands,
    pub queries: Queries,
    ctx: Arc<Context>,
}

impl App {
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Node that owns `group`, if the ring is not empty.
    pub fn node_for(&self, group: &str) -> Option<&str> {
        self.ctx.ring.get(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::StubCluster;
    use crate::impls::kv_store::KvTaskStore;
    use crate::impls::memory_kv::InMemoryKv;

    fn store() -> Arc<dyn TaskStore> {
        Arc::new(KvTaskStore::new(Arc::new(InMemoryKv::new())))
    }

    #[test]
    fn test_build_success() {
        let app = AppBuilder::new("http://a")
            .nodes(["http://a", "http://b"])
            .store(store())
            .cluster(Arc::new(StubCluster::default()))
            .build()
            .unwrap();
        assert_eq!(app.context().nodes().len(), 2);
        assert!(app.node_for("12345").is_some());
    }

    #[test]
    fn test_build_missing_parts() {
        let no_store = AppBuilder::new("http://a")
            .nodes(["http://a"])
            .cluster(Arc::new(StubCluster::default()))
            .build();
        assert!(matches!(no_store, Err(BuildError::MissingStore)));

        let no_cluster = AppBuilder::new("http://a").nodes(["http://a"]).store(store()).build();
        assert!(matches!(no_cluster, Err(BuildError::MissingCluster)));
    }

    #[test]
    fn test_build_bad_membership() {
        let empty = AppBuilder::new("").nodes(["http://a"]).build();
        assert!(matches!(empty, Err(BuildError::EmptyUrl)));

        let no_nodes = AppBuilder::new("http://a").build();
        assert!(matches!(no_nodes, Err(BuildError::EmptyNodes)));

        let stranger = AppBuilder::new("http://c").nodes(["http://a", "http://b"]).build();
        assert!(matches!(stranger, Err(BuildError::NotAMember(url, _)) if url == "http://c"));
    }
}
