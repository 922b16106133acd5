//! Controller endpoints. Both require the session bound to the room.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::needs::NeedsState;
use crate::server::routes::session::session_token;
use crate::server::state::AppState;
use crate::session::{is_room_id, Denial};

/// Errors returned by controller endpoints.
#[derive(Debug)]
pub enum ControlError {
    Denied(Denial),
    MalformedPayload(serde_json::Error),
}

impl From<Denial> for ControlError {
    fn from(denial: Denial) -> Self {
        ControlError::Denied(denial)
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        match self {
            ControlError::Denied(denial @ Denial::UnknownSession) => {
                (StatusCode::NOT_FOUND, denial.to_string()).into_response()
            }
            ControlError::Denied(denial @ Denial::Forbidden) => {
                (StatusCode::FORBIDDEN, denial.to_string()).into_response()
            }
            ControlError::MalformedPayload(e) => {
                (StatusCode::BAD_REQUEST, format!("Malformed needs payload: {}", e)).into_response()
            }
        }
    }
}

/// GET /:room_id/control - Controller page.
pub async fn view_control(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    jar: CookieJar,
) -> Result<Html<String>, ControlError> {
    if !is_room_id(&room_id) {
        return Err(Denial::UnknownSession.into());
    }
    state.gate.authorize(session_token(&jar), &room_id)?;
    Ok(Html(state.renderer.render_control(&room_id, &NeedsState::baseline())))
}

/// POST /:room_id/control - Publish a needs update to the room.
///
/// Authorization is decided before the body is looked at, so a bad
/// session gets 404/403 whatever it sent.
pub async fn submit_control(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    jar: CookieJar,
    body: Bytes,
) -> Result<&'static str, ControlError> {
    let token = session_token(&jar);

    match serde_json::from_slice::<NeedsState>(&body) {
        Ok(needs) => {
            state.ingress.submit(token, &room_id, needs)?;
            Ok("Control POST request received")
        }
        Err(e) => {
            state.gate.authorize(token, &room_id)?;
            tracing::debug!(room = %room_id, ?e, "Rejected malformed needs payload");
            Err(ControlError::MalformedPayload(e))
        }
    }
}
