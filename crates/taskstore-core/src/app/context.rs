//! Context - コマンド・クエリが共有する依存関係
//!
//! ハンドラはすべて `Arc<Context>` を持ち、ルーティング（ring）と
//! 書き込みの窓口（MutationLog）をここから使います。

use std::sync::Arc;

use tracing::debug;

use crate::app::ring::HashRing;
use crate::domain::events::Event;
use crate::error::{Result, TaskStoreError};
use crate::ports::cluster::ClusterClient;
use crate::ports::mutation_log::MutationLog;
use crate::ports::task_store::TaskStore;

/// Where an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    Local,
    Remote(&'a str),
}

pub struct Context {
    pub(crate) ring: HashRing,
    pub(crate) cur_url: String,
    pub(crate) nodes: Vec<String>,
    pub(crate) store: Arc<dyn TaskStore>,
    pub(crate) cluster: Arc<dyn ClusterClient>,
    pub(crate) log: Arc<dyn MutationLog>,
}

impl Context {
    /// Owning node of `group`.
    pub(crate) fn route(&self, group: &str) -> Result<Target<'_>> {
        let node = self
            .ring
            .get(group)
            .ok_or_else(|| TaskStoreError::Routing(format!("not found node by group: {group}")))?;
        if node == self.cur_url {
            Ok(Target::Local)
        } else {
            debug!(node, group, "forwarding to owning node");
            Ok(Target::Remote(node))
        }
    }

    /// Every node of the cluster, in configured order.
    pub(crate) fn fan_out(&self) -> impl Iterator<Item = Target<'_>> {
        self.nodes.iter().map(|node| {
            if *node == self.cur_url {
                Target::Local
            } else {
                Target::Remote(node.as_str())
            }
        })
    }

    pub(crate) async fn commit(&self, events: Vec<Event>) -> Result<()> {
        self.log.commit(events).await
    }

    pub fn cur_url(&self) -> &str {
        &self.cur_url
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }
}

/// Reject an empty required field with `"{name} is empty"`.
pub(crate) fn require(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(TaskStoreError::validation(format!("{name} is empty")));
    }
    Ok(())
}
