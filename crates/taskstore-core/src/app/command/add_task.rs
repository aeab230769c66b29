use std::sync::Arc;

use crate::app::context::{Context, Target, require};
use crate::domain::contract::AddRequest;
use crate::error::{Result, StoreError};

/// Create a task on the node owning its group.
pub struct AddTask {
    ctx: Arc<Context>,
}

impl AddTask {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Returns the new task id (the remote node's id when forwarded).
    pub async fn handle(&self, req: AddRequest) -> Result<String> {
        require(&req.group, "group")?;
        require(&req.kind, "kind")?;

        match self.ctx.route(&req.group)? {
            Target::Local => {
                let events =
                    self.ctx
                        .store
                        .add(&req.group, &req.kind, req.owner.as_deref(), req.param)?;
                let id = events
                    .first()
                    .map(|e| e.key_str())
                    .ok_or_else(|| StoreError::MalformedKey("add produced no events".into()))?;
                self.ctx.commit(events).await?;
                Ok(id)
            }
            Target::Remote(node) => Ok(self.ctx.cluster.add(node, &req).await?),
        }
    }
}
