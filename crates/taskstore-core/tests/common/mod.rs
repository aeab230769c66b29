//! Shared helpers for the integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use taskstore_core::app::{App, AppBuilder};
use taskstore_core::domain::contract::{AddRequest, OwnerRegRequest};
use taskstore_core::impls::{InMemoryKv, InProcessCluster, KvTaskStore};
use taskstore_core::ports::ClusterClient;

pub struct Node {
    pub url: String,
    pub app: Arc<App>,
    pub kv: Arc<InMemoryKv>,
}

/// In-process nodes wired to each other, no replication.
pub fn cluster(urls: &[&str]) -> Vec<Node> {
    let peers = Arc::new(InProcessCluster::new());
    let nodes: Vec<Node> = urls
        .iter()
        .map(|url| {
            let kv = Arc::new(InMemoryKv::new());
            let app = AppBuilder::new(*url)
                .nodes(urls.iter().copied())
                .store(Arc::new(KvTaskStore::new(kv.clone())))
                .cluster(peers.clone() as Arc<dyn ClusterClient>)
                .build()
                .expect("valid cluster config");
            Node {
                url: url.to_string(),
                app: Arc::new(app),
                kv,
            }
        })
        .collect();
    for node in &nodes {
        peers.register(node.url.clone(), &node.app);
    }
    nodes
}

pub fn single() -> Node {
    cluster(&["http://a"]).remove(0)
}

/// First numeric group owned by `url`.
pub fn group_on(app: &App, url: &str) -> String {
    (0u32..)
        .map(|i| i.to_string())
        .find(|g| app.node_for(g) == Some(url))
        .expect("some group lands on every node")
}

pub fn add_request(group: &str, kind: &str) -> AddRequest {
    AddRequest {
        group: group.into(),
        kind: kind.into(),
        owner: None,
        param: BTreeMap::from([("pid".into(), "12345".into())]),
    }
}

pub async fn register(app: &App, owner: &str, kind: &str) {
    app.commands
        .owner_reg
        .handle(OwnerRegRequest {
            owner: owner.into(),
            kinds: vec![kind.into()],
            internal: false,
        })
        .await
        .expect("owner registration");
}
