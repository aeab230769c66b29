use std::sync::Arc;

use crate::app::context::{Context, Target, require};
use crate::domain::contract::UpdateRequest;
use crate::domain::task::Status;
use crate::error::{Result, TaskStoreError};

/// Report on a task. COMPLETED and FAILED also advance the owner's pool cursor.
pub struct UpdateTask {
    ctx: Arc<Context>,
}

impl UpdateTask {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, req: UpdateRequest) -> Result<()> {
        require(&req.group, "group")?;
        require(&req.id, "id")?;
        if req.status == 0 {
            return Err(TaskStoreError::validation("status is empty"));
        }
        let status =
            Status::try_from(req.status).map_err(|e| TaskStoreError::validation(e.to_string()))?;

        match self.ctx.route(&req.group)? {
            Target::Local => {
                let offset = status.leaves_pool().then_some(req.id.as_str());
                let events =
                    self.ctx
                        .store
                        .update(&req.id, status, req.param.clone(), req.error.clone(), offset)?;
                self.ctx.commit(events).await
            }
            Target::Remote(node) => Ok(self.ctx.cluster.update(node, &req).await?),
        }
    }
}
