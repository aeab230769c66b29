use std::sync::Arc;

use tracing::debug;

use crate::app::context::{Context, Target};
use crate::domain::contract::{SearchFilter, SearchUpdateRequest};
use crate::domain::task::TaskUpdate;
use crate::error::Result;

/// Bulk transition of failed tasks. SCHEDULED retries them as fresh tasks.
pub struct SearchUpdateErrorTask {
    ctx: Arc<Context>,
}

impl SearchUpdateErrorTask {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, req: SearchUpdateRequest) -> Result<()> {
        req.filter.validate()?;

        if req.internal {
            return self.local(&req.up, &req.filter).await;
        }
        for target in self.ctx.fan_out() {
            match target {
                Target::Local => self.local(&req.up, &req.filter).await?,
                Target::Remote(node) => {
                    self.ctx
                        .cluster
                        .search_update_error_task(node, &req.up, &req.filter)
                        .await?
                }
            }
        }
        Ok(())
    }

    async fn local(&self, up: &TaskUpdate, filter: &SearchFilter) -> Result<()> {
        let hits = self.ctx.store.search_error_task(filter)?;
        debug!(hits = hits.len(), "updating matched error tasks");

        for mut task in hits {
            if let Some(status) = up.status {
                task.status = status;
            }
            if let Some(param) = &up.param {
                task.param
                    .extend(param.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            let events = self
                .ctx
                .store
                .update_error(&task.id, task.status, Some(task.param))?;
            self.ctx.commit(events).await?;
        }
        Ok(())
    }
}
