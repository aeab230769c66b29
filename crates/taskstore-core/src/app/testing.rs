//! Test fixtures for the command and query handlers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::app::builder::{App, AppBuilder};
use crate::domain::contract::{AddRequest, SearchFilter, UpdateRequest};
use crate::domain::ids::error_id_for;
use crate::domain::task::{Status, Task, TaskUpdate};
use crate::error::ClusterError;
use crate::impls::kv_store::KvTaskStore;
use crate::impls::memory_kv::InMemoryKv;
use crate::ports::cluster::ClusterClient;

/// Records every peer call and answers with canned data.
#[derive(Default)]
pub(crate) struct StubCluster {
    calls: Mutex<Vec<String>>,
}

impl StubCluster {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn remote_task(id: &str, owner: &str, kind: &str) -> Task {
    Task {
        id: id.to_string(),
        kind: kind.to_string(),
        group: "remote".to_string(),
        owner: Some(owner.to_string()),
        status: Status::Virgin,
        param: BTreeMap::new(),
        timestamp: Utc::now(),
        error: None,
    }
}

#[async_trait]
impl ClusterClient for StubCluster {
    async fn add(&self, url: &str, req: &AddRequest) -> Result<String, ClusterError> {
        self.record(format!("add {url} {}", req.group));
        Ok("t-TEST-REMOTE".to_string())
    }

    async fn update(&self, url: &str, req: &UpdateRequest) -> Result<(), ClusterError> {
        self.record(format!("update {url} {}", req.id));
        Ok(())
    }

    async fn get(&self, url: &str, _group: &str, id: &str) -> Result<Option<Task>, ClusterError> {
        self.record(format!("get {url} {id}"));
        Ok(None)
    }

    async fn get_first_in_group(
        &self,
        url: &str,
        group: &str,
    ) -> Result<Option<String>, ClusterError> {
        self.record(format!("get_first_in_group {url} {group}"));
        Ok(Some("t-TEST-FIRST".to_string()))
    }

    async fn pool(&self, url: &str, owner: &str, kind: &str) -> Result<Vec<Task>, ClusterError> {
        self.record(format!("pool {url} {owner} {kind}"));
        Ok(vec![
            remote_task(&format!("t-{kind}-ZZZZZZZZZZZZZ"), owner, kind),
            remote_task(&format!("t-{kind}-0000000000000"), owner, kind),
        ])
    }

    async fn owner_reg(&self, url: &str, owner: &str, _kinds: &[String]) -> Result<(), ClusterError> {
        self.record(format!("owner_reg {url} {owner}"));
        Ok(())
    }

    async fn owner_unreg(&self, url: &str, owner: &str) -> Result<(), ClusterError> {
        self.record(format!("owner_unreg {url} {owner}"));
        Ok(())
    }

    async fn search_task(&self, url: &str, _: &SearchFilter) -> Result<Vec<Task>, ClusterError> {
        self.record(format!("search_task {url}"));
        Ok(vec![remote_task("t-K-0000000000001", "w", "K")])
    }

    async fn search_error_task(&self, url: &str, _: &SearchFilter) -> Result<Vec<Task>, ClusterError> {
        self.record(format!("search_error_task {url}"));
        Ok(Vec::new())
    }

    async fn search_delete_task(&self, url: &str, _: &SearchFilter) -> Result<(), ClusterError> {
        self.record(format!("search_delete_task {url}"));
        Ok(())
    }

    async fn search_delete_error_task(&self, url: &str, _: &SearchFilter) -> Result<(), ClusterError> {
        self.record(format!("search_delete_error_task {url}"));
        Ok(())
    }

    async fn search_update_task(
        &self,
        url: &str,
        _: &TaskUpdate,
        _: &SearchFilter,
    ) -> Result<(), ClusterError> {
        self.record(format!("search_update_task {url}"));
        Ok(())
    }

    async fn search_update_error_task(
        &self,
        url: &str,
        _: &TaskUpdate,
        _: &SearchFilter,
    ) -> Result<(), ClusterError> {
        self.record(format!("search_update_error_task {url}"));
        Ok(())
    }

    async fn health_check(&self, url: &str) -> Result<(), ClusterError> {
        self.record(format!("health_check {url}"));
        Ok(())
    }
}

fn build(nodes: &[&str]) -> (App, Arc<StubCluster>, Arc<InMemoryKv>) {
    let kv = Arc::new(InMemoryKv::new());
    let cluster = Arc::new(StubCluster::default());
    let app = AppBuilder::new("http://a")
        .nodes(nodes.iter().copied())
        .store(Arc::new(KvTaskStore::new(kv.clone())))
        .cluster(cluster.clone())
        .build()
        .unwrap();
    (app, cluster, kv)
}

/// One node, `http://a`, owning every group.
pub(crate) fn single_node() -> (App, Arc<StubCluster>) {
    let (app, cluster, _) = build(&["http://a"]);
    (app, cluster)
}

/// `http://a` (local) and a stubbed `http://b`.
pub(crate) fn two_nodes() -> (App, Arc<StubCluster>, Arc<InMemoryKv>) {
    build(&["http://a", "http://b"])
}

/// Two nodes plus a group owned by the stubbed peer.
pub(crate) fn two_nodes_remote_group() -> (App, Arc<StubCluster>, String) {
    let (app, cluster, _) = two_nodes();
    let group = group_on(&app, "http://b");
    (app, cluster, group)
}

/// A group the local node owns.
pub(crate) fn local_group(app: &App) -> String {
    group_on(app, app.context().cur_url())
}

fn group_on(app: &App, node: &str) -> String {
    (0..)
        .map(|i: u32| i.to_string())
        .find(|g| app.node_for(g) == Some(node))
        .unwrap()
}

pub(crate) async fn add(app: &App, group: &str, kind: &str) -> String {
    app.commands
        .add_task
        .handle(AddRequest {
            group: group.into(),
            kind: kind.into(),
            owner: None,
            param: BTreeMap::from([("pid".into(), "12345".into())]),
        })
        .await
        .unwrap()
}

pub(crate) async fn add_owned(app: &App, group: &str, kind: &str, owner: &str) -> String {
    app.commands
        .add_task
        .handle(AddRequest {
            group: group.into(),
            kind: kind.into(),
            owner: Some(owner.into()),
            param: BTreeMap::new(),
        })
        .await
        .unwrap()
}

/// Fail a task with error `boom`; returns the error-namespace id.
pub(crate) async fn fail(app: &App, group: &str, id: &str) -> String {
    app.commands
        .update_task
        .handle(UpdateRequest {
            id: id.into(),
            group: group.into(),
            status: Status::Failed.as_u8(),
            param: None,
            error: Some("boom".into()),
        })
        .await
        .unwrap();
    error_id_for(id)
}
