//! Read-only reporting routes over the event store.
//!
//! | Route                          | Reply                              |
//! |--------------------------------|------------------------------------|
//! | `GET /`                        | dashboard page                     |
//! | `GET /static/<file>`           | embedded dashboard assets          |
//! | `GET /api/events`              | events matching the query string   |
//! | `GET /api/sessions`            | per-session summaries              |
//! | `GET /api/sessions/<id>/events`| every event of one session         |

use std::convert::Infallible;
use std::sync::Arc;

use log::error;
use rust_embed::RustEmbed;
use warp::http::StatusCode;
use warp::path::Tail;
use warp::{reply, Filter, Rejection, Reply};

use super::types::{ApiError, EventQuery};
use crate::storage::storage_trait::Storage;
use crate::storage::types::EventFilter;

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/web/"]
struct Assets;

/// All routes, composed.
pub fn routes(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    dashboard_route()
        .or(static_route())
        .or(list_events_route(storage.clone()))
        .or(list_sessions_route(storage.clone()))
        .or(session_events_route(storage))
}

fn with_storage(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = (Arc<dyn Storage>,), Error = Infallible> + Clone {
    warp::any().map(move || storage.clone())
}

/// GET /
pub fn dashboard_route() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .and_then(|| async move { asset_reply("index.html") })
}

/// GET /static/<file>
pub fn static_route() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("static")
        .and(warp::path::tail())
        .and(warp::get())
        .and_then(|tail: Tail| async move { asset_reply(tail.as_str()) })
}

/// GET /api/events?kind=&src_ip=&session_id=&limit=
pub fn list_events_route(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("api" / "events")
        .and(warp::get())
        .and(warp::query::<EventQuery>())
        .and(with_storage(storage))
        .and_then(|query: EventQuery, storage: Arc<dyn Storage>| async move {
            let filter = match query.to_filter() {
                Ok(filter) => filter,
                Err(message) => {
                    return Ok::<_, Rejection>(error_reply(StatusCode::BAD_REQUEST, message))
                }
            };
            match storage.list_events(&filter).await {
                Ok(events) => Ok(reply::json(&events).into_response()),
                Err(e) => {
                    error!("Failed to list events: {}", e);
                    Ok(error_reply(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to load events",
                    ))
                }
            }
        })
}

/// GET /api/sessions
pub fn list_sessions_route(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("api" / "sessions")
        .and(warp::get())
        .and(with_storage(storage))
        .and_then(|storage: Arc<dyn Storage>| async move {
            match storage.session_summaries().await {
                Ok(list) => Ok::<_, Rejection>(reply::json(&list).into_response()),
                Err(e) => {
                    error!("Failed to summarize sessions: {}", e);
                    Ok(error_reply(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to load sessions",
                    ))
                }
            }
        })
}

/// GET /api/sessions/<id>/events
pub fn session_events_route(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("api" / "sessions" / String / "events")
        .and(warp::get())
        .and(with_storage(storage))
        .and_then(|id: String, storage: Arc<dyn Storage>| async move {
            match storage.list_events(&EventFilter::for_session(&id)).await {
                Ok(events) if events.is_empty() => Ok::<_, Rejection>(error_reply(
                    StatusCode::NOT_FOUND,
                    format!("No session '{}'", id),
                )),
                Ok(events) => Ok(reply::json(&events).into_response()),
                Err(e) => {
                    error!("Failed to load session {}: {}", id, e);
                    Ok(error_reply(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to load session events",
                    ))
                }
            }
        })
}

/// Embedded file contents and MIME type.
pub fn asset(path: &str) -> Option<(Vec<u8>, String)> {
    let file = Assets::get(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Some((file.data.into_owned(), mime.to_string()))
}

fn asset_reply(path: &str) -> Result<reply::Response, Rejection> {
    match asset(path) {
        Some((body, mime)) => {
            Ok(reply::with_header(body, "Content-Type", mime).into_response())
        }
        None => Err(warp::reject::not_found()),
    }
}

fn error_reply(status: StatusCode, message: impl Into<String>) -> reply::Response {
    reply::with_status(
        reply::json(&ApiError {
            message: message.into(),
        }),
        status,
    )
    .into_response()
}
