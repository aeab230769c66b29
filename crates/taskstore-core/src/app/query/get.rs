use std::sync::Arc;

use crate::app::context::{Context, Target, require};
use crate::domain::task::Task;
use crate::error::Result;

/// Point lookup on the node owning `group`. Works for task and error ids.
pub struct Get {
    ctx: Arc<Context>,
}

impl Get {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, group: &str, id: &str) -> Result<Option<Task>> {
        require(group, "group")?;
        require(id, "id")?;

        match self.ctx.route(group)? {
            Target::Local => Ok(self.ctx.store.get(id)?),
            Target::Remote(node) => Ok(self.ctx.cluster.get(node, group, id).await?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{single_node, two_nodes_remote_group};

    #[tokio::test]
    async fn absent_task_is_none() {
        let (app, _) = single_node();
        assert!(app.queries.get.handle("1", "t-K-0000000000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn validates_before_routing() {
        let (app, cluster, group) = two_nodes_remote_group();
        let err = app.queries.get.handle(&group, "").await.unwrap_err();
        assert_eq!(err.to_string(), "id is empty");
        assert!(cluster.calls().is_empty());

        app.queries.get.handle(&group, "t-K-1").await.unwrap();
        assert_eq!(cluster.calls(), vec![format!("get http://b t-K-1")]);
    }
}
