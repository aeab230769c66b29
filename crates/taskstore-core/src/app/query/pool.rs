//! Pool - オーナーが処理すべきタスクの取得
//!
//! 全ノードから最大 `POOL_SIZE` 件ずつ集め、id で安定ソートして返します。
//! id は時刻順に並ぶので、クラスタ全体でおおよそ古い順になります。

use std::sync::Arc;

use tracing::debug;

use crate::app::context::{Context, Target, require};
use crate::domain::task::Task;
use crate::error::Result;

/// Per-node page size.
pub const POOL_SIZE: usize = 1000;

pub struct Pool {
    ctx: Arc<Context>,
}

impl Pool {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, owner: &str, kind: &str, internal: bool) -> Result<Vec<Task>> {
        require(owner, "owner")?;
        require(kind, "kind")?;

        if internal {
            return Ok(self.ctx.store.pool(owner, kind, POOL_SIZE)?);
        }

        let mut tasks = Vec::new();
        for target in self.ctx.fan_out() {
            let portion = match target {
                Target::Local => self.ctx.store.pool(owner, kind, POOL_SIZE)?,
                Target::Remote(node) => self.ctx.cluster.pool(node, owner, kind).await?,
            };
            tasks.extend(portion);
        }
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(owner, kind, tasks = tasks.len(), "pool gathered");
        Ok(tasks)
    }
}
