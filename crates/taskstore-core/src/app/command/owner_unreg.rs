use std::sync::Arc;

use tracing::info;

use crate::app::context::{Context, Target, require};
use crate::domain::contract::OwnerUnRegRequest;
use crate::error::Result;

pub struct OwnerUnReg {
    ctx: Arc<Context>,
}

impl OwnerUnReg {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, req: OwnerUnRegRequest) -> Result<()> {
        require(&req.owner, "owner")?;

        if req.internal {
            return self.local(&req.owner).await;
        }
        info!(owner = %req.owner, "unregistering owner on every node");
        for target in self.ctx.fan_out() {
            match target {
                Target::Local => self.local(&req.owner).await?,
                Target::Remote(node) => self.ctx.cluster.owner_unreg(node, &req.owner).await?,
            }
        }
        Ok(())
    }

    async fn local(&self, owner: &str) -> Result<()> {
        let events = self.ctx.store.owner_unreg(owner)?;
        self.ctx.commit(events).await
    }
}
