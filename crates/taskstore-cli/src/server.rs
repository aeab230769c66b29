//! Server - warp による HTTP サーバ
//!
//! # 実装詳細
//! - ルートは `routes()` に集約し、テストでは `warp::test` で直接叩く
//! - `X-Request-Id` が無ければ採番し、レスポンスに付け直す
//! - エラーはすべて `{"error": "..."}`（デコード・検証は 400、それ以外は 500）
//! - SIGINT / SIGTERM で `/healthz` を 503 に切り替え、処理中のリクエストを待って停止

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use taskstore_core::App;
use taskstore_core::domain::contract::ErrorResponse;
use tokio::sync::oneshot;
use tracing::{info, warn};
use ulid::Ulid;
use warp::filters::path::FullPath;
use warp::http::{Method, StatusCode};
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::handlers::{self, ApiError, PoolQuery};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_ID: &str = "x-request-id";

fn with_app(app: Arc<App>) -> impl Filter<Extract = (Arc<App>,), Error = Infallible> + Clone {
    warp::any().map(move || app.clone())
}

fn body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::body::bytes()
}

fn next_request_id() -> String {
    Ulid::new().to_string()
}

fn request_id() -> impl Filter<Extract = (String,), Error = Infallible> + Clone {
    warp::header::optional::<String>(REQUEST_ID)
        .map(|id: Option<String>| id.filter(|s| !s.is_empty()).unwrap_or_else(next_request_id))
        .or_else(|_: Rejection| async { Ok::<_, Infallible>((next_request_id(),)) })
}

/// Every route of a node.
pub fn routes(
    app: Arc<App>,
    healthy: Arc<AtomicBool>,
) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone {
    let add = warp::path!("task")
        .and(warp::post())
        .and(with_app(app.clone()))
        .and(body())
        .and_then(handlers::add);
    let update = warp::path!("task")
        .and(warp::patch())
        .and(with_app(app.clone()))
        .and(body())
        .and_then(handlers::update);
    let owner_reg = warp::path!("owner")
        .and(warp::put())
        .and(with_app(app.clone()))
        .and(body())
        .and_then(handlers::owner_reg);
    let owner_unreg = warp::path!("owner")
        .and(warp::delete())
        .and(with_app(app.clone()))
        .and(body())
        .and_then(handlers::owner_unreg);
    let get_first = warp::path!("task" / "group" / String)
        .and(warp::get())
        .and(with_app(app.clone()))
        .and_then(handlers::get_first_in_group);
    let get = warp::path!("task" / String / "group" / String)
        .and(warp::get())
        .and(with_app(app.clone()))
        .and_then(handlers::get);
    let pool = warp::path!("pool" / String / "kind" / String)
        .and(warp::get())
        .and(warp::query::<PoolQuery>())
        .and(with_app(app.clone()))
        .and_then(handlers::pool);
    let search_task = warp::path!("task" / "search")
        .and(warp::post())
        .and(with_app(app.clone()))
        .and(body())
        .and_then(handlers::search_task);
    let search_error_task = warp::path!("error" / "search")
        .and(warp::post())
        .and(with_app(app.clone()))
        .and(body())
        .and_then(handlers::search_error_task);
    let search_delete_task = warp::path!("task" / "search" / "delete")
        .and(warp::post())
        .and(with_app(app.clone()))
        .and(body())
        .and_then(handlers::search_delete_task);
    let search_delete_error_task = warp::path!("error" / "search" / "delete")
        .and(warp::post())
        .and(with_app(app.clone()))
        .and(body())
        .and_then(handlers::search_delete_error_task);
    let search_update_task = warp::path!("task" / "search" / "update")
        .and(warp::post())
        .and(with_app(app.clone()))
        .and(body())
        .and_then(handlers::search_update_task);
    let search_update_error_task = warp::path!("error" / "search" / "update")
        .and(warp::post())
        .and(with_app(app.clone()))
        .and(body())
        .and_then(handlers::search_update_error_task);
    let health_check = warp::path!("healthcheck")
        .and(warp::post())
        .and(with_app(app))
        .and(body())
        .and_then(handlers::health_check);
    let healthz = warp::path!("healthz").and(warp::get()).map(move || {
        let status = if healthy.load(Ordering::SeqCst) {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        status.into_response()
    });

    let api = add
        .or(update)
        .unify()
        .or(owner_reg)
        .unify()
        .or(owner_unreg)
        .unify()
        .or(get_first)
        .unify()
        .or(get)
        .unify()
        .or(pool)
        .unify()
        .or(search_task)
        .unify()
        .or(search_error_task)
        .unify()
        .or(search_delete_task)
        .unify()
        .or(search_delete_error_task)
        .unify()
        .or(search_update_task)
        .unify()
        .or(search_update_error_task)
        .unify()
        .or(health_check)
        .unify()
        .or(healthz)
        .unify()
        .recover(recover)
        .unify();

    request_id()
        .and(warp::method())
        .and(warp::path::full())
        .and(api)
        .map(finish)
}

fn finish(id: String, method: Method, path: FullPath, mut resp: Response) -> Response {
    info!(
        request_id = %id,
        %method,
        path = path.as_str(),
        status = resp.status().as_u16(),
        "request"
    );
    if let Ok(value) = id.parse() {
        resp.headers_mut().insert(REQUEST_ID, value);
    }
    resp
}

fn error_reply(status: StatusCode, message: String) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorResponse { error: message }), status)
        .into_response()
}

async fn recover(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if let Some(err) = rejection.find::<ApiError>() {
        (err.status, err.message.clone())
    } else if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if rejection.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "bad query param 'internal'".to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        warn!(?rejection, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{rejection:?}"))
    };
    if status.is_server_error() {
        warn!(status = status.as_u16(), %message, "request failed");
    }
    Ok(error_reply(status, message))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                warn!(%err, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Serve until SIGINT/SIGTERM, then drain in-flight requests.
pub async fn serve(app: Arc<App>, port: u16) -> Result<()> {
    let healthy = Arc::new(AtomicBool::new(true));
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let (addr, server) = warp::serve(routes(app, healthy.clone()))
        .try_bind_with_graceful_shutdown(addr, async {
            let _ = stop_rx.await;
        })?;
    info!(%addr, "server starting");
    let server = tokio::spawn(server);

    shutdown_signal().await;
    info!("server is shutting down");
    healthy.store(false, Ordering::SeqCst);
    let _ = stop_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server).await {
        Ok(joined) => joined?,
        Err(_) => warn!(timeout = ?DRAIN_TIMEOUT, "in-flight requests did not drain"),
    }
    info!("server stopped");
    Ok(())
}
