use std::sync::Arc;

use crate::app::context::{Context, Target};
use crate::domain::contract::SearchRequest;
use crate::domain::task::Task;
use crate::error::Result;

/// Tasks matching a filter, gathered from every node.
pub struct SearchTask {
    ctx: Arc<Context>,
}

impl SearchTask {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, req: SearchRequest) -> Result<Vec<Task>> {
        req.filter.validate()?;

        if req.internal {
            return Ok(self.ctx.store.search_task(&req.filter)?);
        }
        let mut tasks = Vec::new();
        for target in self.ctx.fan_out() {
            let portion = match target {
                Target::Local => self.ctx.store.search_task(&req.filter)?,
                Target::Remote(node) => self.ctx.cluster.search_task(node, &req.filter).await?,
            };
            tasks.extend(portion);
        }
        Ok(tasks)
    }
}
