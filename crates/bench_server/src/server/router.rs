//! Route table: the seven workloads behind axum.
//!
//! The adapters here only extract the request data a workload needs and
//! turn its [`Reply`] into a response. Framing, keep-alive, pipelining,
//! the `Date` header and malformed-request handling are hyper's.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::handlers::Handlers;
use crate::reply::Reply;

pub const SERVER_NAME: &str = "bench";
/// Content type for replies whose workload sets none.
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

type Shared = State<Arc<Handlers>>;

/// Query string of the multi-row workloads, percent-decoded.
#[derive(Debug, Default, Deserialize)]
pub struct CountQuery {
    pub queries: Option<String>,
}

/// The raw `queries` value. A query string that does not deserialize
/// counts as missing.
fn count_arg(query: &Option<Query<CountQuery>>) -> Option<&str> {
    query.as_ref().and_then(|Query(q)| q.queries.as_deref())
}

pub fn router(handlers: Arc<Handlers>) -> Router {
    Router::new()
        .route("/json", get(json))
        .route("/db", get(db))
        .route("/queries", get(queries))
        .route("/cached-worlds", get(cached_worlds))
        .route("/fortunes", get(fortunes))
        .route("/updates", get(updates))
        .route("/plaintext", get(plaintext))
        .fallback(not_found)
        .with_state(handlers)
}

async fn json(State(handlers): Shared) -> Reply {
    let mut reply = Reply::new();
    handlers.json(&mut reply);
    reply
}

async fn db(State(handlers): Shared) -> Reply {
    let mut reply = Reply::new();
    handlers.db(&mut reply).await;
    reply
}

async fn queries(State(handlers): Shared, query: Option<Query<CountQuery>>) -> Reply {
    let mut reply = Reply::new();
    handlers.queries(count_arg(&query), &mut reply).await;
    reply
}

async fn cached_worlds(State(handlers): Shared, query: Option<Query<CountQuery>>) -> Reply {
    let mut reply = Reply::new();
    handlers.cached_worlds(count_arg(&query), &mut reply);
    reply
}

async fn fortunes(State(handlers): Shared) -> Reply {
    let mut reply = Reply::new();
    handlers.fortunes(&mut reply).await;
    reply
}

async fn updates(State(handlers): Shared, query: Option<Query<CountQuery>>) -> Reply {
    let mut reply = Reply::new();
    handlers.updates(count_arg(&query), &mut reply).await;
    reply
}

async fn plaintext(State(handlers): Shared) -> Reply {
    let mut reply = Reply::new();
    handlers.plaintext(&mut reply);
    reply
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, [(header::SERVER, SERVER_NAME)]).into_response()
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let (content_type, body) = self.into_parts();
        let mut response = Response::new(Body::from(body));
        let headers = response.headers_mut();
        headers.insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(content_type.unwrap_or(CONTENT_TYPE_TEXT)),
        );
        response
    }
}
