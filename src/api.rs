//! REST management API
//!
//! The HTTP surface by which clients mutate and query the dynamic zone.
//! Every payload is the textual record form, one record per line; error
//! responses are a single `; <status>: <message>` line with continuation
//! lines indented by `;` and six spaces.
//!
//! | Method   | Path                  | Effect                              |
//! |----------|-----------------------|-------------------------------------|
//! | `GET`    | `/v1`                 | All non-expired records             |
//! | `POST`   | `/v1`                 | Upsert enabled, remove disabled     |
//! | `DELETE` | `/v1`                 | Invert disabled, then apply as POST |
//! | `GET`    | `/v1/id/<n>`          | One record or 404                   |
//! | `DELETE` | `/v1/id/<n>`          | Remove by ID or 404                 |
//! | `GET`    | `/v1/suffix/<a>/<b>`  | Reversed-segment suffix search      |
//! | `GET`    | `/v1/glob/<pattern>`  | Glob search                         |

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::record::{Domain, DynamicRecordSet};
use crate::resolver::{no_such_record, DynamicResolver};

const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

type ApiState = Arc<dyn DynamicResolver>;

/// Error reply of the management API.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        ApiError::new(StatusCode::NOT_FOUND, "not found")
    }

    fn internal() -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

/// Render the error line: `; <status>: <message>`, continuation lines
/// indented with `;` and six spaces.
fn render_error(status: StatusCode, message: &str) -> String {
    let message = message.replace('\n', "\n;      ");
    format!("; {}: {}\n", status.as_u16(), message)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = render_error(self.status, &self.message);
        (self.status, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
    }
}

/// Successful plain-text reply: trailing newlines normalized to exactly
/// one, empty bodies stay empty.
fn ok(text: String) -> Response {
    let trimmed = text.trim_end_matches('\n');
    let body = if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    };
    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

/// Substitute body placeholders and parse the record set. `$ADDR` becomes
/// the client address, `$TTL` the literal `3600`, and `$$` a single `$`,
/// in that order.
fn parse_record_set(body: &str, remote: &str) -> Result<DynamicRecordSet, ApiError> {
    let body = body
        .replace("$ADDR", remote)
        .replace("$TTL", "3600")
        .replace("$$", "$");

    body.parse()
        .map_err(|e: crate::error::Error| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))
}

async fn get_all_records(State(resolver): State<ApiState>) -> Result<Response, ApiError> {
    let records = resolver.records().await.map_err(|_| ApiError::internal())?;
    Ok(ok(records.to_string()))
}

async fn apply_records(resolver: &ApiState, records: DynamicRecordSet) -> Result<Response, ApiError> {
    let added = records.iter().filter(|r| !r.disabled).count();
    let deleted = records.len() - added;

    resolver
        .set_records(records)
        .await
        .map_err(|_| ApiError::internal())?;

    Ok(ok(format!("; 200: add:{} delete:{}", added, deleted)))
}

async fn post_records(
    State(resolver): State<ApiState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    body: String,
) -> Result<Response, ApiError> {
    let records = parse_record_set(&body, &remote.ip().to_string())?;
    apply_records(&resolver, records).await
}

async fn delete_records(
    State(resolver): State<ApiState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    body: String,
) -> Result<Response, ApiError> {
    let mut records = parse_record_set(&body, &remote.ip().to_string())?;
    for record in &mut records.0 {
        record.disabled = !record.disabled;
    }
    apply_records(&resolver, records).await
}

async fn get_record_by_id(
    State(resolver): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: i64 = id.parse().map_err(|_| ApiError::not_found())?;

    let records = resolver
        .get_record(id)
        .await
        .map_err(|_| ApiError::internal())?;
    if records.is_empty() {
        return Err(ApiError::not_found());
    }

    Ok(ok(records.to_string()))
}

async fn delete_record_by_id(
    State(resolver): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: i64 = id.parse().map_err(|_| ApiError::not_found())?;

    match resolver.remove_record(id).await {
        Ok(()) => Ok(ok("; 200: ok".to_string())),
        Err(err) if err == no_such_record() => Err(ApiError::not_found()),
        Err(_) => Err(ApiError::internal()),
    }
}

async fn get_records_by_suffix(
    State(resolver): State<ApiState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    if path.ends_with('/') {
        return Err(ApiError::not_found());
    }

    // Path segments arrive most-significant first and are reversed into a
    // domain: /v1/suffix/com/example -> example.com.
    let mut segments: Vec<&str> = path.split('/').collect();
    segments.reverse();
    let domain = Domain::new(segments.join(".")).map_err(|_| ApiError::not_found())?;

    let records = resolver
        .search_records(&domain)
        .await
        .map_err(|_| ApiError::internal())?;
    Ok(ok(records.to_string()))
}

async fn get_records_by_glob(
    State(resolver): State<ApiState>,
    Path(pattern): Path<String>,
) -> Result<Response, ApiError> {
    if pattern.is_empty() || pattern.contains('/') {
        return Err(ApiError::not_found());
    }

    let mut pattern = pattern;
    if !pattern.ends_with('.') {
        pattern.push('.');
    }

    let records = resolver
        .glob_records(&pattern)
        .await
        .map_err(|_| ApiError::internal())?;
    Ok(ok(records.to_string()))
}

async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

async fn fallback() -> ApiError {
    ApiError::not_found()
}

/// Build the management API router over a dynamic resolver.
pub fn router(resolver: Arc<dyn DynamicResolver>) -> Router {
    Router::new()
        .route(
            "/v1",
            get(get_all_records)
                .post(post_records)
                .delete(delete_records)
                .fallback(method_not_allowed),
        )
        .route(
            "/v1/id/{id}",
            get(get_record_by_id)
                .delete(delete_record_by_id)
                .fallback(method_not_allowed),
        )
        .route(
            "/v1/suffix/{*path}",
            get(get_records_by_suffix).fallback(method_not_allowed),
        )
        .route(
            "/v1/glob/{pattern}",
            get(get_records_by_glob).fallback(method_not_allowed),
        )
        .fallback(fallback)
        .with_state(resolver)
}
