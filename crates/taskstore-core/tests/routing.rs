//! Partition routing and scatter-gather across in-process nodes.

mod common;

use std::collections::BTreeMap;

use taskstore_core::domain::contract::{SearchFilter, SearchRequest, SearchUpdateRequest};
use taskstore_core::domain::task::TaskUpdate;
use taskstore_core::ports::KvEngine;

use common::{add_request, cluster, group_on, register};

const A: &str = "http://a";
const B: &str = "http://b";

#[tokio::test]
async fn add_on_non_owner_is_forwarded() {
    let nodes = cluster(&[A, B]);
    let (a, b) = (&nodes[0], &nodes[1]);
    let group = group_on(&a.app, B);

    let id = a
        .app
        .commands
        .add_task
        .handle(add_request(&group, "TEST"))
        .await
        .unwrap();

    // stored on B only, and B's id came back unchanged
    assert!(b.kv.get(id.as_bytes()).unwrap().is_some());
    assert_eq!(a.kv.get(id.as_bytes()).unwrap(), None);
    let via_a = a.app.queries.get.handle(&group, &id).await.unwrap().unwrap();
    let via_b = b.app.queries.get.handle(&group, &id).await.unwrap().unwrap();
    assert_eq!(via_a, via_b);
}

#[tokio::test]
async fn both_nodes_agree_on_ownership() {
    let nodes = cluster(&[A, B]);
    for i in 0..200 {
        let g = i.to_string();
        assert_eq!(nodes[0].app.node_for(&g), nodes[1].app.node_for(&g));
    }
}

#[tokio::test]
async fn pool_gathers_every_node_in_id_order() {
    let nodes = cluster(&[A, B]);
    let (a, b) = (&nodes[0], &nodes[1]);
    register(&a.app, "w1", "K").await;
    // broadcast registration reached B as well
    assert!(b.kv.get(b"o-K-w1").unwrap().is_some());

    let on_a = group_on(&a.app, A);
    let on_b = group_on(&a.app, B);
    let mut ids = Vec::new();
    for group in [&on_b, &on_a, &on_b, &on_a] {
        ids.push(
            b.app
                .commands
                .add_task
                .handle(add_request(group, "K"))
                .await
                .unwrap(),
        );
    }

    let pooled = a.app.queries.pool.handle("w1", "K", false).await.unwrap();
    let got: Vec<_> = pooled.iter().map(|t| t.id.clone()).collect();
    let mut expected = ids.clone();
    expected.sort();
    assert_eq!(got, expected);

    // internal only sees the local shard
    let local = a.app.queries.pool.handle("w1", "K", true).await.unwrap();
    assert_eq!(local.len(), 2);
}

#[tokio::test]
async fn search_update_moves_task_to_its_new_group() {
    let nodes = cluster(&[A, B]);
    let (a, b) = (&nodes[0], &nodes[1]);
    let from = group_on(&a.app, A);
    let to = group_on(&a.app, B);

    let old = a
        .app
        .commands
        .add_task
        .handle(add_request(&from, "K"))
        .await
        .unwrap();

    a.app
        .commands
        .search_update_task
        .handle(SearchUpdateRequest {
            up: TaskUpdate {
                group: Some(to.clone()),
                param: Some(BTreeMap::from([("moved".into(), "yes".into())])),
                ..TaskUpdate::default()
            },
            ..SearchUpdateRequest::default()
        })
        .await
        .unwrap();

    assert!(a.app.queries.get.handle(&from, &old).await.unwrap().is_none());
    let new_id = b
        .app
        .queries
        .get_first_in_group
        .handle(&to)
        .await
        .unwrap()
        .unwrap();
    let moved = b.app.queries.get.handle(&to, &new_id).await.unwrap().unwrap();
    assert_eq!(moved.param["pid"], "12345");
    assert_eq!(moved.param["moved"], "yes");
}

#[tokio::test]
async fn search_delete_reaches_every_shard() {
    let nodes = cluster(&[A, B]);
    let (a, b) = (&nodes[0], &nodes[1]);
    for group in [group_on(&a.app, A), group_on(&a.app, B)] {
        a.app
            .commands
            .add_task
            .handle(add_request(&group, "K"))
            .await
            .unwrap();
    }

    let everything = SearchRequest::default();
    assert_eq!(
        b.app.queries.search_task.handle(everything.clone()).await.unwrap().len(),
        2
    );
    b.app
        .commands
        .search_delete_task
        .handle(everything.clone())
        .await
        .unwrap();
    assert!(a.app.queries.search_task.handle(everything).await.unwrap().is_empty());
    assert!(a.kv.is_empty());
    assert!(b.kv.is_empty());
}

#[tokio::test]
async fn empty_condition_fails_before_fan_out() {
    let nodes = cluster(&[A, B]);
    let req = SearchRequest {
        filter: SearchFilter {
            condition: Some(Default::default()),
            ..SearchFilter::default()
        },
        internal: false,
    };
    let err = nodes[0].app.queries.search_task.handle(req).await.unwrap_err();
    assert!(err.is_validation());
}
