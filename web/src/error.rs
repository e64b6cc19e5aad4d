use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use google_auth::ErrorKind;

extern crate log;
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

/// Failures of the HTTP layer itself. Sign-in failures are rendered views, not errors.
#[derive(Debug)]
pub enum Error {
    Session(tower_sessions::session::Error),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Session(err) => Some(err),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        match self {
            Error::Session(err) => write!(fmt, "session store error: {err}"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!("Request failed: {self}");
        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
    }
}

impl From<tower_sessions::session::Error> for Error {
    fn from(err: tower_sessions::session::Error) -> Self {
        Error::Session(err)
    }
}

/// Status code an error view is rendered with.
pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Configuration | ErrorKind::InvalidState => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Network => StatusCode::BAD_GATEWAY,
        ErrorKind::ExchangeFailed | ErrorKind::ProfileFetchFailed | ErrorKind::StateMismatch => {
            StatusCode::BAD_REQUEST
        }
    }
}
