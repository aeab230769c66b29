//! HttpClusterClient - HTTP でピアノードを呼ぶ ClusterClient
//!
//! # 実装詳細
//! - ピアが 503（一時的に利用不可）を返したら `3s × 試行回数` 待って最大 3 回リトライする
//! - それ以外の失敗はそのまま返す（リトライしない）
//! - エラー応答の本文が JSON なら `{"error": ...}` のメッセージを使い、
//!   そうでなければ `httpcode N` を使う
//! - パスのセグメント（group, owner, kind, id）は URL エンコードする

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::domain::contract::{
    AddRequest, ErrorResponse, HealthCheckRequest, IdResponse, OwnerRegRequest,
    OwnerUnRegRequest, SearchFilter, SearchRequest, SearchUpdateRequest, UpdateRequest,
};
use crate::domain::task::{Task, TaskUpdate};
use crate::error::ClusterError;
use crate::ports::cluster::ClusterClient;

const RETRY_ATTEMPTS: u64 = 3;
const RETRY_STEP: Duration = Duration::from_secs(3);

/// Outcome of one attempt that did not produce a usable response.
enum Attempt {
    Unavailable(Response),
    Transport(reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct HttpClusterClient {
    http: Client,
    delays: Vec<Duration>,
}

impl Default for HttpClusterClient {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl HttpClusterClient {
    pub fn new(http: Client) -> Self {
        let delays = (1..=RETRY_ATTEMPTS).map(|n| RETRY_STEP * n as u32).collect();
        Self { http, delays }
    }

    /// Replace the waits between retries. An empty list disables retrying.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    async fn send<F>(&self, base: &str, build: F) -> Result<Response, ClusterError>
    where
        F: Fn(&Client) -> RequestBuilder + Sync,
    {
        let (build, http) = (&build, &self.http);
        let outcome = RetryIf::spawn(
            self.delays.clone(),
            move || async move {
                let resp = build(http).send().await.map_err(Attempt::Transport)?;
                if resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Err(Attempt::Unavailable(resp));
                }
                Ok(resp)
            },
            |attempt: &Attempt| {
                let retry = matches!(attempt, Attempt::Unavailable(_));
                if retry {
                    warn!(url = base, "peer unavailable, retrying");
                }
                retry
            },
        )
        .await;

        match outcome {
            Ok(resp) | Err(Attempt::Unavailable(resp)) => check(base, resp).await,
            Err(Attempt::Transport(e)) => Err(ClusterError::Transport {
                url: base.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn send_json<B: Serialize + Sync>(
        &self,
        base: &str,
        method: reqwest::Method,
        path: &[&str],
        body: &B,
    ) -> Result<Response, ClusterError> {
        let target = endpoint(base, path)?;
        debug!(%method, url = %target, "forwarding to peer");
        self.send(base, |http| http.request(method.clone(), target.clone()).json(body))
            .await
    }
}

fn endpoint(base: &str, path: &[&str]) -> Result<Url, ClusterError> {
    let invalid = |message: String| ClusterError::Transport {
        url: base.to_string(),
        message,
    };
    let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("url cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(path);
    Ok(url)
}

async fn check(base: &str, resp: Response) -> Result<Response, ClusterError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let is_json = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("application/json"));

    let message = if is_json {
        resp.json::<ErrorResponse>()
            .await
            .map_err(|e| ClusterError::Decode {
                url: base.to_string(),
                message: e.to_string(),
            })?
            .error
    } else {
        format!("httpcode {}", status.as_u16())
    };
    Err(ClusterError::Remote {
        url: base.to_string(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(base: &str, resp: Response) -> Result<T, ClusterError> {
    resp.json::<T>().await.map_err(|e| ClusterError::Decode {
        url: base.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    async fn add(&self, url: &str, req: &AddRequest) -> Result<String, ClusterError> {
        let resp = self
            .send_json(url, reqwest::Method::POST, &["task"], req)
            .await?;
        Ok(decode::<IdResponse>(url, resp).await?.id)
    }

    async fn update(&self, url: &str, req: &UpdateRequest) -> Result<(), ClusterError> {
        self.send_json(url, reqwest::Method::PATCH, &["task"], req)
            .await
            .map(drop)
    }

    async fn get(&self, url: &str, group: &str, id: &str) -> Result<Option<Task>, ClusterError> {
        let target = endpoint(url, &["task", id, "group", group])?;
        let resp = self.send(url, |http| http.get(target.clone())).await?;
        decode(url, resp).await
    }

    async fn get_first_in_group(
        &self,
        url: &str,
        group: &str,
    ) -> Result<Option<String>, ClusterError> {
        let target = endpoint(url, &["task", "group", group])?;
        let resp = self.send(url, |http| http.get(target.clone())).await?;
        let IdResponse { id } = decode(url, resp).await?;
        Ok((!id.is_empty()).then_some(id))
    }

    async fn pool(&self, url: &str, owner: &str, kind: &str) -> Result<Vec<Task>, ClusterError> {
        let target = endpoint(url, &["pool", owner, "kind", kind])?;
        let resp = self
            .send(url, |http| {
                http.get(target.clone()).query(&[("internal", "true")])
            })
            .await?;
        decode(url, resp).await
    }

    async fn owner_reg(&self, url: &str, owner: &str, kinds: &[String]) -> Result<(), ClusterError> {
        let body = OwnerRegRequest {
            owner: owner.to_string(),
            kinds: kinds.to_vec(),
            internal: true,
        };
        self.send_json(url, reqwest::Method::PUT, &["owner"], &body)
            .await
            .map(drop)
    }

    async fn owner_unreg(&self, url: &str, owner: &str) -> Result<(), ClusterError> {
        let body = OwnerUnRegRequest {
            owner: owner.to_string(),
            internal: true,
        };
        self.send_json(url, reqwest::Method::DELETE, &["owner"], &body)
            .await
            .map(drop)
    }

    async fn search_task(&self, url: &str, filter: &SearchFilter) -> Result<Vec<Task>, ClusterError> {
        let body = internal_search(filter);
        let resp = self
            .send_json(url, reqwest::Method::POST, &["task", "search"], &body)
            .await?;
        decode(url, resp).await
    }

    async fn search_error_task(
        &self,
        url: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<Task>, ClusterError> {
        let body = internal_search(filter);
        let resp = self
            .send_json(url, reqwest::Method::POST, &["error", "search"], &body)
            .await?;
        decode(url, resp).await
    }

    async fn search_delete_task(&self, url: &str, filter: &SearchFilter) -> Result<(), ClusterError> {
        let body = internal_search(filter);
        self.send_json(url, reqwest::Method::POST, &["task", "search", "delete"], &body)
            .await
            .map(drop)
    }

    async fn search_delete_error_task(
        &self,
        url: &str,
        filter: &SearchFilter,
    ) -> Result<(), ClusterError> {
        let body = internal_search(filter);
        self.send_json(url, reqwest::Method::POST, &["error", "search", "delete"], &body)
            .await
            .map(drop)
    }

    async fn search_update_task(
        &self,
        url: &str,
        up: &TaskUpdate,
        filter: &SearchFilter,
    ) -> Result<(), ClusterError> {
        let body = internal_search_update(up, filter);
        self.send_json(url, reqwest::Method::POST, &["task", "search", "update"], &body)
            .await
            .map(drop)
    }

    async fn search_update_error_task(
        &self,
        url: &str,
        up: &TaskUpdate,
        filter: &SearchFilter,
    ) -> Result<(), ClusterError> {
        let body = internal_search_update(up, filter);
        self.send_json(url, reqwest::Method::POST, &["error", "search", "update"], &body)
            .await
            .map(drop)
    }

    async fn health_check(&self, url: &str) -> Result<(), ClusterError> {
        let body = HealthCheckRequest { internal: true };
        self.send_json(url, reqwest::Method::POST, &["healthcheck"], &body)
            .await
            .map(drop)
    }
}

fn internal_search(filter: &SearchFilter) -> SearchRequest {
    SearchRequest {
        filter: filter.clone(),
        internal: true,
    }
}

fn internal_search_update(up: &TaskUpdate, filter: &SearchFilter) -> SearchUpdateRequest {
    SearchUpdateRequest {
        up: up.clone(),
        filter: filter.clone(),
        internal: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_path_segments() {
        let url = endpoint("http://node-a:8080", &["task", "t-k-0", "group", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://node-a:8080/task/t-k-0/group/a%20b%2Fc");

        let url = endpoint("http://node-a:8080/", &["owner"]).unwrap();
        assert_eq!(url.as_str(), "http://node-a:8080/owner");
    }

    #[test]
    fn endpoint_rejects_garbage_base() {
        assert!(matches!(
            endpoint("not a url", &["task"]),
            Err(ClusterError::Transport { .. })
        ));
    }

    #[test]
    fn default_retry_waits_grow_linearly() {
        let client = HttpClusterClient::default();
        assert_eq!(
            client.delays,
            vec![
                Duration::from_secs(3),
                Duration::from_secs(6),
                Duration::from_secs(9)
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_peer_is_a_transport_error() {
        let client = HttpClusterClient::default().with_retry_delays(Vec::new());
        // port 9 (discard) is closed on test hosts
        let err = client.health_check("http://127.0.0.1:9").await.unwrap_err();
        assert!(matches!(err, ClusterError::Transport { .. }));
        assert!(err.to_string().starts_with("request url http://127.0.0.1:9 error"));
    }
}
