//! Cluster port - ピアノードへの転送
//!
//! ローカル実行と同じ引数・同じ結果の形でリモートの同等エンドポイントを呼びます。
//! scatter-gather 用のメソッドは常に `internal=true` でリモートを呼び、
//! リモート側で再ブロードキャストが起きないようにします。
//!
//! 一時的な失敗のリトライは実装側の責務です（コマンド層はリトライしません）。

use async_trait::async_trait;

use crate::domain::contract::{AddRequest, SearchFilter, UpdateRequest};
use crate::domain::task::{Task, TaskUpdate};
use crate::error::ClusterError;

#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Returns the id generated by the remote node.
    async fn add(&self, url: &str, req: &AddRequest) -> Result<String, ClusterError>;

    async fn update(&self, url: &str, req: &UpdateRequest) -> Result<(), ClusterError>;

    async fn get(&self, url: &str, group: &str, id: &str) -> Result<Option<Task>, ClusterError>;

    async fn get_first_in_group(&self, url: &str, group: &str)
    -> Result<Option<String>, ClusterError>;

    async fn pool(&self, url: &str, owner: &str, kind: &str) -> Result<Vec<Task>, ClusterError>;

    async fn owner_reg(&self, url: &str, owner: &str, kinds: &[String])
    -> Result<(), ClusterError>;

    async fn owner_unreg(&self, url: &str, owner: &str) -> Result<(), ClusterError>;

    async fn search_task(&self, url: &str, filter: &SearchFilter)
    -> Result<Vec<Task>, ClusterError>;

    async fn search_error_task(
        &self,
        url: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<Task>, ClusterError>;

    async fn search_delete_task(&self, url: &str, filter: &SearchFilter)
    -> Result<(), ClusterError>;

    async fn search_delete_error_task(
        &self,
        url: &str,
        filter: &SearchFilter,
    ) -> Result<(), ClusterError>;

    async fn search_update_task(
        &self,
        url: &str,
        up: &TaskUpdate,
        filter: &SearchFilter,
    ) -> Result<(), ClusterError>;

    async fn search_update_error_task(
        &self,
        url: &str,
        up: &TaskUpdate,
        filter: &SearchFilter,
    ) -> Result<(), ClusterError>;

    async fn health_check(&self, url: &str) -> Result<(), ClusterError>;
}
