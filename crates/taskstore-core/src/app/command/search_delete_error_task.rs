use std::sync::Arc;

use tracing::debug;

use crate::app::context::{Context, Target};
use crate::domain::contract::{SearchFilter, SearchRequest};
use crate::error::Result;

/// Drop every failed task matching a filter, on every node.
pub struct SearchDeleteErrorTask {
    ctx: Arc<Context>,
}

impl SearchDeleteErrorTask {
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
                    self.ctx
                        .cluster
                        .search_delete_error_task(node, &req.filter)
                        .await?
                }
            }
        }
        Ok(())
    }

    async fn local(&self, filter: &SearchFilter) -> Result<()> {
        let hits = self.ctx.store.search_error_task(filter)?;
        debug!(hits = hits.len(), "deleting matched error tasks");
        for task in hits {
            let events = self.ctx.store.delete_error(&task.id)?;
            self.ctx.commit(events).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{add, fail, two_nodes};

    #[tokio::test]
    async fn clears_error_namespace_and_broadcasts() {
        let (app, cluster, _) = two_nodes();
        let group = crate::app::testing::local_group(&app);
        let id = add(&app, &group, "TEST").await;
        let error_id = fail(&app, &group, &id).await;

        app.commands
            .search_delete_error_task
            .handle(SearchRequest::default())
            .await
            .unwrap();

        assert!(app.queries.get.handle(&group, &error_id).await.unwrap().is_none());
        assert_eq!(
            cluster.calls(),
            vec!["search_delete_error_task http://b".to_string()]
        );
    }
}
