use std::sync::Arc;

use crate::app::context::{Context, Target};
use crate::domain::contract::SearchRequest;
use crate::domain::task::Task;
use crate::error::Result;

/// Failed tasks matching a filter, gathered from every node.
pub struct SearchErrorTask {
    ctx: Arc<Context>,
}

impl SearchErrorTask {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, req: SearchRequest) -> Result<Vec<Task>> {
        req.filter.validate()?;

        if req.internal {
            return Ok(self.ctx.store.search_error_task(&req.filter)?);
        }
        let mut tasks = Vec::new();
        for target in self.ctx.fan_out() {
            let portion = match target {
                Target::Local => self.ctx.store.search_error_task(&req.filter)?,
                Target::Remote(node) => {
                    self.ctx
                        .cluster
                        .search_error_task(node, &req.filter)
                        .await?
                }
            };
            tasks.extend(portion);
        }
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{add, fail, single_node};

    #[tokio::test]
    async fn finds_failed_tasks_only() {
        let (app, _) = single_node();
        let failed = add(&app, "1", "K").await;
        add(&app, "1", "K").await;
        let error_id = fail(&app, "1", &failed).await;

        let tasks = app
            .queries
            .search_error_task
            .handle(SearchRequest::default())
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, error_id);
        assert_eq!(tasks[0].error.as_deref(), Some("boom"));
    }
}
