use std::sync::Arc;

use tracing::debug;

use crate::app::context::{Context, Target};
use crate::domain::contract::{SearchFilter, SearchRequest};
use crate::error::Result;

/// Delete every task matching a filter, on every node.
pub struct SearchDeleteTask {
    ctx: Arc<Context>,
}

impl SearchDeleteTask {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, req: SearchRequest) -> Result<()> {
        req.filter.validate()?;

        if req.internal {
            return self.local(&req.filter).await;
        }
        for target in self.ctx.fan_out() {
            match target {
                Target::Local => self.local(&req.filter).await?,
                Target::Remote(node) => {
                    self.ctx.cluster.search_delete_task(node, &req.filter).await?
                }
            }
        }
        Ok(())
    }

    async fn local(&self, filter: &SearchFilter) -> Result<()> {
        let hits = self.ctx.store.search_task(filter)?;
        debug!(hits = hits.len(), "deleting matched tasks");
        for task in hits {
            let events = self.ctx.store.delete(&task.id)?;
            self.ctx.commit(events).await?;
        }
        Ok(())
    }
}
