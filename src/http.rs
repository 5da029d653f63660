use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use realtime::{Error, TripId};
use route_matching::{MatchResult, RiderRequest, RouteMatcher, TripCandidate};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use trip_location::{LocationReport, TripState};

use crate::{Engine, Session};

#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub matcher: Arc<RouteMatcher>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws/trip-location", get(trip_location))
        .route("/trips/{trip_id}", put(open_trip).delete(close_trip))
        .route("/trips/{trip_id}/location", get(last_location))
        .route("/match", post(match_trips))
        .with_state(state)
}

async fn trip_location(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state.engine))
}

async fn serve_socket(socket: WebSocket, engine: Arc<Engine>) {
    let (mut sink, mut stream) = socket.split();
    let (session, mut outbound) = Session::open(engine);
    let connection_id = session.connection_id();
    debug!(connection_id = %connection_id, "websocket connected");

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!(monotonic_counter.processing_errors = 1, error = %e, "serializing reply");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => session.handle_text(text.as_str()).await,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection_id = %connection_id, error = %e, "websocket read failed");
                break;
            }
        }
    }

    // dropping the session closes the outbound stream, which ends the writer
    drop(session);
    if let Err(e) = writer.await {
        error!(connection_id = %connection_id, error = %e, "websocket writer failed");
    }
    debug!(connection_id = %connection_id, "websocket disconnected");
}

async fn open_trip(Path(trip_id): Path<TripId>, State(state): State<AppState>) -> StatusCode {
    state.engine.open_trip(trip_id);
    StatusCode::NO_CONTENT
}

async fn close_trip(
    Path(trip_id): Path<TripId>, State(state): State<AppState>,
) -> Result<StatusCode, HttpError> {
    if !state.engine.close_trip(trip_id).await {
        return Err(realtime::unknown_trip!("Trip {trip_id} not found").into());
    }
    // a retired trip's route will not be matched again
    if let Some(cache) = state.matcher.cache() {
        cache.invalidate(trip_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct LocationReply {
    trip_id: TripId,
    state: TripState,
    location: Option<LocationReport>,
}

async fn last_location(
    Path(trip_id): Path<TripId>, State(state): State<AppState>,
) -> Result<Json<LocationReply>, HttpError> {
    let trip_state =
        state.engine.state(trip_id).ok_or_else(|| realtime::unknown_trip!("Trip {trip_id} not found"))?;
    Ok(Json(LocationReply { trip_id, state: trip_state, location: state.engine.last_known(trip_id) }))
}

/// Trip as supplied by the trip store: its stored polyline and seat state.
#[derive(Debug, Deserialize)]
struct CandidateBody {
    trip_id: TripId,
    polyline: String,
    available_seats: u32,
    #[serde(default = "accepting_default")]
    accepting_requests: bool,
}

const fn accepting_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct MatchBody {
    request: RiderRequest,
    candidates: Vec<CandidateBody>,
}

#[derive(Debug, Serialize)]
struct MatchReply {
    count: usize,
    matches: Vec<MatchResult>,
}

async fn match_trips(
    State(state): State<AppState>, Json(body): Json<MatchBody>,
) -> Result<Json<MatchReply>, HttpError> {
    let candidates: Vec<TripCandidate> = body
        .candidates
        .into_iter()
        .map(|c| {
            TripCandidate::new(c.trip_id, c.polyline, c.available_seats)
                .accepting(c.accepting_requests)
        })
        .collect();

    let matches = state.matcher.match_trips(&body.request, &candidates)?;
    Ok(Json(MatchReply { count: matches.len(), matches }))
}

/// Error response carrying the error code and description.
#[derive(Debug)]
pub struct HttpError(Error);

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl HttpError {
    const fn status(&self) -> StatusCode {
        match self.0 {
            Error::MalformedPolyline(_) | Error::InvalidRequest(_) | Error::InvalidFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::UnknownTrip(_) => StatusCode::NOT_FOUND,
            Error::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.0.code(),
            "message": self.0.description(),
        });
        (self.status(), Json(body)).into_response()
    }
}
