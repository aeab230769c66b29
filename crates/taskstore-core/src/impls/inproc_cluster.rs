//! InProcessCluster - 同一プロセス内の App 同士をつなぐ ClusterClient
//!
//! テストや組み込み用途で、HTTP を使わずに複数ノードのクラスタを組むためのものです。
//! ノードは URL で登録し、呼び出しはそのノードの App のハンドラへ
//! （HTTP サーバと同じ引数・`internal` フラグで）直接渡します。
//!
//! App は ClusterClient を持つので、循環参照にならないよう Weak で保持します。

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;

use crate::app::builder::App;
use crate::domain::contract::{
    AddRequest, HealthCheckRequest, OwnerRegRequest, OwnerUnRegRequest, SearchFilter,
    SearchRequest, SearchUpdateRequest, UpdateRequest,
};
use crate::domain::task::{Task, TaskUpdate};
use crate::error::{ClusterError, TaskStoreError};
use crate::ports::cluster::ClusterClient;

#[derive(Default)]
pub struct InProcessCluster {
    apps: RwLock<HashMap<String, Weak<App>>>,
}

impl InProcessCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, url: impl Into<String>, app: &Arc<App>) {
        self.apps
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.into(), Arc::downgrade(app));
    }

    fn app(&self, url: &str) -> Result<Arc<App>, ClusterError> {
        self.apps
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .and_then(Weak::upgrade)
            .ok_or_else(|| ClusterError::UnknownNode(url.to_string()))
    }
}

fn remote(url: &str) -> impl FnOnce(TaskStoreError) -> ClusterError + '_ {
    move |err| ClusterError::Remote {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn search(filter: &SearchFilter) -> SearchRequest {
    SearchRequest {
        filter: filter.clone(),
        internal: true,
    }
}

fn search_update(up: &TaskUpdate, filter: &SearchFilter) -> SearchUpdateRequest {
    SearchUpdateRequest {
        up: up.clone(),
        filter: filter.clone(),
        internal: true,
    }
}

#[async_trait]
impl ClusterClient for InProcessCluster {
    async fn add(&self, url: &str, req: &AddRequest) -> Result<String, ClusterError> {
        let app = self.app(url)?;
        app.commands.add_task.handle(req.clone()).await.map_err(remote(url))
    }

    async fn update(&self, url: &str, req: &UpdateRequest) -> Result<(), ClusterError> {
        let app = self.app(url)?;
        app.commands.update_task.handle(req.clone()).await.map_err(remote(url))
    }

    async fn get(&self, url: &str, group: &str, id: &str) -> Result<Option<Task>, ClusterError> {
        let app = self.app(url)?;
        app.queries.get.handle(group, id).await.map_err(remote(url))
    }

    async fn get_first_in_group(
        &self,
        url: &str,
        group: &str,
    ) -> Result<Option<String>, ClusterError> {
        let app = self.app(url)?;
        app.queries
            .get_first_in_group
            .handle(group)
            .await
            .map_err(remote(url))
    }

    async fn pool(&self, url: &str, owner: &str, kind: &str) -> Result<Vec<Task>, ClusterError> {
        let app = self.app(url)?;
        app.queries.pool.handle(owner, kind, true).await.map_err(remote(url))
    }

    async fn owner_reg(&self, url: &str, owner: &str, kinds: &[String]) -> Result<(), ClusterError> {
        let app = self.app(url)?;
        let req = OwnerRegRequest {
            owner: owner.to_string(),
            kinds: kinds.to_vec(),
            internal: true,
        };
        app.commands.owner_reg.handle(req).await.map_err(remote(url))
    }

    async fn owner_unreg(&self, url: &str, owner: &str) -> Result<(), ClusterError> {
        let app = self.app(url)?;
        let req = OwnerUnRegRequest {
            owner: owner.to_string(),
            internal: true,
        };
        app.commands.owner_unreg.handle(req).await.map_err(remote(url))
    }

    async fn search_task(&self, url: &str, filter: &SearchFilter) -> Result<Vec<Task>, ClusterError> {
        let app = self.app(url)?;
        app.queries
            .search_task
            .handle(search(filter))
            .await
            .map_err(remote(url))
    }

    async fn search_error_task(
        &self,
        url: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<Task>, ClusterError> {
        let app = self.app(url)?;
        app.queries
            .search_error_task
            .handle(search(filter))
            .await
            .map_err(remote(url))
    }

    async fn search_delete_task(&self, url: &str, filter: &SearchFilter) -> Result<(), ClusterError> {
        let app = self.app(url)?;
        app.commands
            .search_delete_task
            .handle(search(filter))
            .await
            .map_err(remote(url))
    }

    async fn search_delete_error_task(
        &self,
        url: &str,
        filter: &SearchFilter,
    ) -> Result<(), ClusterError> {
        let app = self.app(url)?;
        app.commands
            .search_delete_error_task
            .handle(search(filter))
            .await
            .map_err(remote(url))
    }

    async fn search_update_task(
        &self,
        url: &str,
        up: &TaskUpdate,
        filter: &SearchFilter,
    ) -> Result<(), ClusterError> {
        let app = self.app(url)?;
        app.commands
            .search_update_task
            .handle(search_update(up, filter))
            .await
            .map_err(remote(url))
    }

    async fn search_update_error_task(
        &self,
        url: &str,
        up: &TaskUpdate,
        filter: &SearchFilter,
    ) -> Result<(), ClusterError> {
        let app = self.app(url)?;
        app.commands
            .search_update_error_task
            .handle(search_update(up, filter))
            .await
            .map_err(remote(url))
    }

    async fn health_check(&self, url: &str) -> Result<(), ClusterError> {
        let app = self.app(url)?;
        app.commands
            .health_check
            .handle(HealthCheckRequest { internal: true })
            .await
            .map_err(remote(url))
    }
}
