//! TaskStore port - ローカルストレージエンジン
//!
//! 変更系のメソッドは書き込みを行わず、`Event` の列を返すだけです。
//! 実際の書き込みは `apply` のみが行います（合意ログ経由でも直接でも同じ列を適用）。
//!
//! # 設計原則
//! - 見つからないことはエラーではない（`None` / 空の Vec）
//! - 壊れたレコードはスキャンを中断してエラーを返す
//! - `apply` の失敗は部分適用を意味しない（バッチはアトミック）

use std::collections::BTreeMap;

use crate::domain::contract::SearchFilter;
use crate::domain::events::Event;
use crate::domain::task::{Status, Task};
use crate::error::StoreError;

pub type Param = BTreeMap<String, String>;

pub trait TaskStore: Send + Sync {
    /// Create a VIRGIN task. The owner is picked round-robin among the
    /// kind's registered owners when `owner` is `None`.
    ///
    /// The first event is always the SET of the new task key.
    fn add(
        &self,
        group: &str,
        kind: &str,
        owner: Option<&str>,
        param: Param,
    ) -> Result<Vec<Event>, StoreError>;

    fn get(&self, id: &str) -> Result<Option<Task>, StoreError>;

    /// Transition a task. `param: None` keeps the stored param.
    ///
    /// When `offset` is given and the task has an owner, the
    /// `(owner, kind)` cursor is moved to `offset`.
    fn update(
        &self,
        id: &str,
        status: Status,
        param: Option<Param>,
        error: Option<String>,
        offset: Option<&str>,
    ) -> Result<Vec<Event>, StoreError>;

    /// Transition a record of the error namespace.
    fn update_error(
        &self,
        id: &str,
        status: Status,
        param: Option<Param>,
    ) -> Result<Vec<Event>, StoreError>;

    fn delete(&self, id: &str) -> Result<Vec<Event>, StoreError> {
        self.update(id, Status::Completed, None, None, None)
    }

    fn delete_error(&self, id: &str) -> Result<Vec<Event>, StoreError> {
        self.update_error(id, Status::Completed, None)
    }

    /// Up to `size` tasks of `kind` owned by `owner`, past the stored offset.
    fn pool(&self, owner: &str, kind: &str, size: usize) -> Result<Vec<Task>, StoreError>;

    fn search_task(&self, filter: &SearchFilter) -> Result<Vec<Task>, StoreError>;

    fn search_error_task(&self, filter: &SearchFilter) -> Result<Vec<Task>, StoreError>;

    /// Id of the oldest task still in `group`.
    fn get_first_in_group(&self, group: &str) -> Result<Option<String>, StoreError>;

    fn owner_reg(&self, owner: &str, kinds: &[String]) -> Result<Vec<Event>, StoreError>;

    fn owner_unreg(&self, owner: &str) -> Result<Vec<Event>, StoreError>;

    /// Liveness marker write.
    fn health_check(&self) -> Result<Vec<Event>, StoreError>;

    /// The only method that writes. One atomic batch.
    fn apply(&self, events: Vec<Event>) -> Result<(), StoreError>;
}
