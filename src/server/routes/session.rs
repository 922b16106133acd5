//! Session bootstrap endpoint.

use std::sync::Arc;

use axum::{extract::State, response::Redirect};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::server::state::AppState;
use crate::session::Session;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_id";

/// GET / - Issue a session and send the visitor to their new room.
pub async fn new_session(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let session = state.sessions.create();
    tracing::info!(room = %session.room, "New session issued");

    let location = format!("/{}", session.room);
    let cookie = session_cookie(&session, state.config.secure_cookies);
    (jar.add(cookie), Redirect::to(&location))
}

/// Builds the http-only, same-site session cookie for `session`.
pub fn session_cookie(session: &Session, secure: bool) -> Cookie<'static> {
    let max_age = time::Duration::try_from(session.ttl).unwrap_or(time::Duration::MAX);

    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

/// Session token sent by the client, if any.
pub fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(SESSION_COOKIE).map(|cookie| cookie.value())
}
