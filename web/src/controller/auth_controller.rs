//! Sign-in endpoints.
//!
//! `GET /` is both the landing page and the OAuth redirect target: Google sends the browser
//! back here with `code` and `state` in the query string.

use crate::error::status_for;
use crate::{AppState, Error};

use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use google_auth::controller::{AuthView, Outcome, RequestContext};
use google_auth::session::SessionStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;
use uuid::Uuid;

/// Cookie-session key holding the id of the server-side sign-in session.
const SESSION_ID_KEY: &str = "sign_in.session_id";
/// Cookie-session key holding an error view to show once after a redirect.
const FLASH_KEY: &str = "sign_in.flash";

#[derive(Debug, Serialize, Deserialize)]
struct Flash {
    status: u16,
    message: String,
}

impl Flash {
    fn from_view(view: &AuthView) -> Option<Self> {
        match view {
            AuthView::Error { kind, message } => Some(Self {
                status: status_for(*kind).as_u16(),
                message: message.clone(),
            }),
            _ => None,
        }
    }

    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_REQUEST);
        (status, Json(serde_json::json!({ "errorMessage": self.message }))).into_response()
    }
}

/// GET /
///
/// Shows the login URL, completes a returning authorization, or shows the signed-in profile.
/// A request carrying `code` or `error` is answered with a 303 to the same path without the
/// query, so a reload never replays the code.
pub async fn index(
    State(app_state): State<AppState>,
    session: Session,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, Error> {
    let request = RequestContext::from_query_pairs(pairs);

    let flash = session.remove::<Flash>(FLASH_KEY).await?;
    if !request.is_callback() {
        if let Some(flash) = flash {
            return Ok(flash.into_response());
        }
    }

    let store = session_store(&app_state, &session).await?;
    let outcome = app_state.auth_controller.handle(&store, &request).await;

    if outcome.clear_code_parameter {
        match Flash::from_view(&outcome.view) {
            Some(flash) => session.insert(FLASH_KEY, flash).await?,
            // Fresh id for the now-authenticated cookie session
            None => session.cycle_id().await?,
        }
        return Ok(Redirect::to(uri.path()).into_response());
    }

    Ok(render(&outcome))
}

/// GET|POST /sign-out
///
/// Signs the session out and answers with a fresh login URL. Safe to repeat.
pub async fn sign_out(
    State(app_state): State<AppState>,
    session: Session,
) -> Result<Response, Error> {
    let store = session_store(&app_state, &session).await?;
    let outcome = app_state.auth_controller.sign_out(&store);
    session.remove::<Flash>(FLASH_KEY).await?;
    Ok(render(&outcome))
}

fn render(outcome: &Outcome) -> Response {
    let status = match &outcome.view {
        AuthView::Error { kind, .. } => status_for(*kind),
        AuthView::ShowLogin { .. } | AuthView::ShowProfile { .. } => StatusCode::OK,
    };
    (status, Json(outcome.view.rendered())).into_response()
}

async fn session_store(app_state: &AppState, session: &Session) -> Result<Arc<SessionStore>, Error> {
    let session_id = match session.get::<Uuid>(SESSION_ID_KEY).await? {
        Some(session_id) => session_id,
        None => {
            let session_id = Uuid::new_v4();
            session.insert(SESSION_ID_KEY, session_id).await?;
            session_id
        }
    };
    Ok(app_state.sessions.resolve(session_id))
}
