use std::sync::Arc;

use crate::app::context::{Context, Target};
use crate::domain::contract::HealthCheckRequest;
use crate::error::Result;

/// Prove the write path (storage + mutation log) is alive, here and on every peer.
pub struct HealthCheck {
    ctx: Arc<Context>,
}

impl HealthCheck {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, req: HealthCheckRequest) -> Result<()> {
        if req.internal {
            return self.local().await;
        }
        for target in self.ctx.fan_out() {
            match target {
                Target::Local => self.local().await?,
                Target::Remote(node) => self.ctx.cluster.health_check(node).await?,
            }
        }
        Ok(())
    }

    async fn local(&self) -> Result<()> {
        let events = self.ctx.store.health_check()?;
        self.ctx.commit(events).await
    }
}
