//! HTTP handlers
//!
//! 各ハンドラはリクエストをデコードし、App のコマンド／クエリに渡して、
//! 結果を JSON で返します。失敗は `ApiError` として reject し、
//! server 側の recover で `{"error": ...}` に変換します。

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use taskstore_core::App;
use taskstore_core::TaskStoreError;
use taskstore_core::domain::contract::{
    AddRequest, HealthCheckRequest, IdResponse, OwnerRegRequest, OwnerUnRegRequest, SearchRequest,
    SearchUpdateRequest, UpdateRequest,
};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Rejection, Reply};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl warp::reject::Reject for ApiError {}

impl From<TaskStoreError> for ApiError {
    fn from(err: TaskStoreError) -> Self {
        let status = if err.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

fn reject(err: impl Into<ApiError>) -> Rejection {
    warp::reject::custom(err.into())
}

fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, Rejection> {
    serde_json::from_slice(body).map_err(|e| reject(ApiError::bad_request(format!("decode request: {e}"))))
}

fn segment(raw: &str, name: &str) -> Result<String, Rejection> {
    let value = urlencoding::decode(raw)
        .map_err(|_| reject(ApiError::bad_request(format!("bad path param '{name}'"))))?;
    if value.is_empty() {
        return Err(reject(ApiError::bad_request(format!("not found query param '{name}'"))));
    }
    Ok(value.into_owned())
}

fn json<T: Serialize>(value: &T) -> Result<Response, Rejection> {
    Ok(warp::reply::json(value).into_response())
}

fn empty() -> Result<Response, Rejection> {
    Ok(StatusCode::OK.into_response())
}

pub async fn add(app: Arc<App>, body: Bytes) -> Result<Response, Rejection> {
    let req: AddRequest = decode(&body)?;
    let id = app.commands.add_task.handle(req).await.map_err(reject)?;
    json(&IdResponse { id })
}

pub async fn update(app: Arc<App>, body: Bytes) -> Result<Response, Rejection> {
    let req: UpdateRequest = decode(&body)?;
    app.commands.update_task.handle(req).await.map_err(reject)?;
    empty()
}

pub async fn owner_reg(app: Arc<App>, body: Bytes) -> Result<Response, Rejection> {
    let req: OwnerRegRequest = decode(&body)?;
    app.commands.owner_reg.handle(req).await.map_err(reject)?;
    empty()
}

pub async fn owner_unreg(app: Arc<App>, body: Bytes) -> Result<Response, Rejection> {
    let req: OwnerUnRegRequest = decode(&body)?;
    app.commands.owner_unreg.handle(req).await.map_err(reject)?;
    empty()
}

/// `null` when the task does not exist.
pub async fn get(id: String, group: String, app: Arc<App>) -> Result<Response, Rejection> {
    let (id, group) = (segment(&id, "id")?, segment(&group, "group")?);
    let task = app.queries.get.handle(&group, &id).await.map_err(reject)?;
    json(&task)
}

/// `{"id": ""}` when the group is empty.
pub async fn get_first_in_group(group: String, app: Arc<App>) -> Result<Response, Rejection> {
    let group = segment(&group, "group")?;
    let id = app
        .queries
        .get_first_in_group
        .handle(&group)
        .await
        .map_err(reject)?;
    json(&IdResponse {
        id: id.unwrap_or_default(),
    })
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct PoolQuery {
    #[serde(default)]
    pub internal: bool,
}

pub async fn pool(
    owner: String,
    kind: String,
    query: PoolQuery,
    app: Arc<App>,
) -> Result<Response, Rejection> {
    let (owner, kind) = (segment(&owner, "owner")?, segment(&kind, "kind")?);
    let tasks = app
        .queries
        .pool
        .handle(&owner, &kind, query.internal)
        .await
        .map_err(reject)?;
    json(&tasks)
}

pub async fn search_task(app: Arc<App>, body: Bytes) -> Result<Response, Rejection> {
    let req: SearchRequest = decode(&body)?;
    let tasks = app.queries.search_task.handle(req).await.map_err(reject)?;
    json(&tasks)
}

pub async fn search_error_task(app: Arc<App>, body: Bytes) -> Result<Response, Rejection> {
    let req: SearchRequest = decode(&body)?;
    let tasks = app
        .queries
        .search_error_task
        .handle(req)
        .await
        .map_err(reject)?;
    json(&tasks)
}

pub async fn search_delete_task(app: Arc<App>, body: Bytes) -> Result<Response, Rejection> {
    let req: SearchRequest = decode(&body)?;
    app.commands
        .search_delete_task
        .handle(req)
        .await
        .map_err(reject)?;
    empty()
}

pub async fn search_delete_error_task(app: Arc<App>, body: Bytes) -> Result<Response, Rejection> {
    let req: SearchRequest = decode(&body)?;
    app.commands
        .search_delete_error_task
        .handle(req)
        .await
        .map_err(reject)?;
    empty()
}

pub async fn search_update_task(app: Arc<App>, body: Bytes) -> Result<Response, Rejection> {
    let req: SearchUpdateRequest = decode(&body)?;
    app.commands
        .search_update_task
        .handle(req)
        .await
        .map_err(reject)?;
    empty()
}

pub async fn search_update_error_task(app: Arc<App>, body: Bytes) -> Result<Response, Rejection> {
    let req: SearchUpdateRequest = decode(&body)?;
    app.commands
        .search_update_error_task
        .handle(req)
        .await
        .map_err(reject)?;
    empty()
}

pub async fn health_check(app: Arc<App>, body: Bytes) -> Result<Response, Rejection> {
    // An empty body is a bare liveness check from a client.
    let req: HealthCheckRequest = if body.is_empty() {
        HealthCheckRequest::default()
    } else {
        decode(&body)?
    };
    app.commands.health_check.handle(req).await.map_err(reject)?;
    empty()
}
