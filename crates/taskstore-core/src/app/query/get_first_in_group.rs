use std::sync::Arc;

use crate::app::context::{Context, Target, require};
use crate::error::Result;

/// Id of the oldest live task of a group.
pub struct GetFirstInGroup {
    ctx: Arc<Context>,
}

impl GetFirstInGroup {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, group: &str) -> Result<Option<String>> {
        require(group, "group")?;

        match self.ctx.route(group)? {
            Target::Local => Ok(self.ctx.store.get_first_in_group(group)?),
            Target::Remote(node) => Ok(self.ctx.cluster.get_first_in_group(node, group).await?),
        }
    }
}
