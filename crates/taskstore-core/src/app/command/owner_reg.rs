use std::sync::Arc;

use tracing::info;

use crate::app::context::{Context, Target, require};
use crate::domain::contract::OwnerRegRequest;
use crate::error::{Result, TaskStoreError};

/// Register an owner for kinds on every node (or only locally when `internal`).
pub struct OwnerReg {
    ctx: Arc<Context>,
}

impl OwnerReg {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, req: OwnerRegRequest) -> Result<()> {
        require(&req.owner, "owner")?;
        if req.kinds.is_empty() {
            return Err(TaskStoreError::validation("kinds is empty"));
        }

        if req.internal {
            return self.local(&req.owner, &req.kinds).await;
        }
        info!(owner = %req.owner, kinds = ?req.kinds, "registering owner on every node");
        for target in self.ctx.fan_out() {
            match target {
                Target::Local => self.local(&req.owner, &req.kinds).await?,
                Target::Remote(node) => {
                    self.ctx.cluster.owner_reg(node, &req.owner, &req.kinds).await?
                }
            }
        }
        Ok(())
    }

    async fn local(&self, owner: &str, kinds: &[String]) -> Result<()> {
        let events = self.ctx.store.owner_reg(owner, kinds)?;
        self.ctx.commit(events).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{single_node, two_nodes};
    use crate::ports::kv_engine::KvEngine;

    fn request(owner: &str, kinds: &[&str], internal: bool) -> OwnerRegRequest {
        OwnerRegRequest {
            owner: owner.into(),
            kinds: kinds.iter().map(|k| k.to_string()).collect(),
            internal,
        }
    }

    #[tokio::test]
    async fn validates_owner_and_kinds() {
        let (app, _) = single_node();
        let err = app.commands.owner_reg.handle(request("", &["K"], false)).await;
        assert_eq!(err.unwrap_err().to_string(), "owner is empty");
        let err = app.commands.owner_reg.handle(request("w", &[], false)).await;
        assert_eq!(err.unwrap_err().to_string(), "kinds is empty");
    }

    #[tokio::test]
    async fn broadcast_reaches_every_node() {
        let (app, cluster, kv) = two_nodes();
        app.commands
            .owner_reg
            .handle(request("w1", &["K"], false))
            .await
            .unwrap();
        assert_eq!(kv.get(b"o-K-w1").unwrap(), Some(Vec::new()));
        assert_eq!(cluster.calls(), vec!["owner_reg http://b w1".to_string()]);
    }

    #[tokio::test]
    async fn internal_call_stays_local() {
        let (app, cluster, kv) = two_nodes();
        app.commands
            .owner_reg
            .handle(request("w1", &["K", "L"], true))
            .await
            .unwrap();
        assert_eq!(kv.len(), 2);
        assert!(cluster.calls().is_empty());
    }
}
