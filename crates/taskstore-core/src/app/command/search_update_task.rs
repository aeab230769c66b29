//! SearchUpdateTask - 条件に合うタスクを一括更新
//!
//! # 実装詳細
//! - status / error は上書き、param はマージ（更新側のキーが勝つ）
//! - kind / group / owner が変わる場合は別パーティションへの移動になる：
//!   1. 新しい識別子で Add（自ノード宛てでも必ずクラスタクライアント経由で再ルーティング）
//!   2. 元のタスクを Delete
//!
//!   途中で落ちると重複は起きうるが、タスクが消えることはない

use std::sync::Arc;

use tracing::{debug, info};

use crate::app::context::{Context, Target};
use crate::domain::contract::{AddRequest, SearchFilter, SearchUpdateRequest};
use crate::domain::task::TaskUpdate;
use crate::error::Result;

pub struct SearchUpdateTask {
    ctx: Arc<Context>,
}

impl SearchUpdateTask {
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
                        .search_update_task(node, &req.up, &req.filter)
                        .await?
                }
            }
        }
        Ok(())
    }

    async fn local(&self, up: &TaskUpdate, filter: &SearchFilter) -> Result<()> {
        let hits = self.ctx.store.search_task(filter)?;
        debug!(hits = hits.len(), "updating matched tasks");

        for mut task in hits {
            let moved = up.apply_to(&mut task);
            if moved {
                let add = AddRequest {
                    group: task.group,
                    kind: task.kind,
                    owner: task.owner,
                    param: task.param,
                };
                let new_id = self.ctx.cluster.add(self.ctx.cur_url(), &add).await?;
                info!(from = %task.id, to = %new_id, group = %add.group, "task moved");

                let events = self.ctx.store.delete(&task.id)?;
                self.ctx.commit(events).await?;
            } else {
                let events = self.ctx.store.update(
                    &task.id,
                    task.status,
                    Some(task.param),
                    task.error,
                    None,
                )?;
                self.ctx.commit(events).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::app::testing::{add, single_node};
    use crate::domain::task::Status;

    #[tokio::test]
    async fn merges_param_in_place() {
        let (app, cluster) = single_node();
        let id = add(&app, "1", "TEST").await;

        let req = SearchUpdateRequest {
            up: TaskUpdate {
                param: Some(BTreeMap::from([("extra".into(), "y".into())])),
                ..TaskUpdate::default()
            },
            ..SearchUpdateRequest::default()
        };
        app.commands.search_update_task.handle(req).await.unwrap();

        let task = app.queries.get.handle("1", &id).await.unwrap().unwrap();
        assert_eq!(task.param["pid"], "12345");
        assert_eq!(task.param["extra"], "y");
        assert_eq!(task.status, Status::Virgin);
        assert!(cluster.calls().is_empty());
    }

    #[tokio::test]
    async fn identity_change_adds_through_cluster_then_deletes() {
        let (app, cluster) = single_node();
        let id = add(&app, "1", "TEST").await;

        let req = SearchUpdateRequest {
            up: TaskUpdate {
                kind: Some("OTHER".into()),
                ..TaskUpdate::default()
            },
            ..SearchUpdateRequest::default()
        };
        app.commands.search_update_task.handle(req).await.unwrap();

        assert_eq!(cluster.calls(), vec!["add http://a 1".to_string()]);
        assert!(app.queries.get.handle("1", &id).await.unwrap().is_none());
    }
}
