//! Application error that may occur during the processing of a request.
//!
//! See [`AppError`].

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection},
    response::{IntoResponse, Response},
};

use derive_more::{Display, From};

use hearthstone_tracker_model::{ApiError, rank::RankRangeError};

use http::StatusCode;

use tokio::task::JoinError;

use crate::{app::AppJson, session::SessionError};

/// Application error that may occur during the processing of a request.
///
/// This includes both internal errors and user errors.
#[derive(Debug)]
pub struct AppError {
    kind: AppErrorKind,
    message: Option<String>,
}

impl AppError {
    /// Replaces the message shown to the client.
    pub fn with_message(mut self, message: impl Into<String>) -> AppError {
        self.message = Some(message.into());
        self
    }

    /// The inner [`AppErrorKind`] of the error.
    pub fn kind(&self) -> &AppErrorKind {
        &self.kind
    }

    /// Discards the error message, unwrapping the inner error.
    pub fn into_kind(self) -> AppErrorKind {
        self.kind
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.message.as_ref() {
            Some(msg) => f.write_str(msg),
            None => Display::fmt(&self.kind, f),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            AppErrorKind::Json(err) => Some(err),
            AppErrorKind::Form(err) => Some(err),
            AppErrorKind::Path(err) => Some(err),
            AppErrorKind::Garde(err) => Some(err),
            AppErrorKind::Session(err) => Some(err),
            AppErrorKind::Database(err) => Some(err),
            AppErrorKind::Bcrypt(err) => Some(err),
            AppErrorKind::Join(err) => Some(err),
            AppErrorKind::CorruptRank(err) => Some(err),
            _ => None,
        }
    }
}

impl<T> From<T> for AppError
where
    T: Into<AppErrorKind>,
{
    fn from(value: T) -> Self {
        AppError {
            kind: value.into(),
            message: None,
        }
    }
}

/// The specific kind of error that happened.
#[derive(Debug, Display, From)]
#[non_exhaustive]
pub enum AppErrorKind {
    /// The request's JSON payload was malformed or invalid.
    #[display("{_0}")]
    Json(JsonRejection),
    /// The request's urlencoded payload was malformed or invalid.
    #[display("{_0}")]
    Form(FormRejection),
    /// A path parameter was malformed.
    #[display("{_0}")]
    Path(PathRejection),
    /// The request's payload failed validation.
    #[display("{_0}")]
    Garde(garde::Report),
    /// The request has a body but no `Content-Type`.
    #[display("missing content type")]
    #[from(ignore)]
    MissingContentType,
    /// The request's `Content-Type` is not accepted.
    #[display("unsupported content type {_0:?}")]
    #[from(ignore)]
    UnsupportedContentType(String),
    /// The session store failed.
    #[display("session error: {_0}")]
    Session(SessionError),
    /// The database failed.
    #[display("database error: {_0}")]
    Database(sqlx::Error),
    /// Password hashing failed.
    #[display("bcrypt error: {_0}")]
    Bcrypt(bcrypt::BcryptError),
    /// A blocking task panicked or was cancelled.
    #[display("blocking task failed: {_0}")]
    Join(JoinError),
    /// A rank outside of the rank bounds was found in storage.
    #[display("stored rank is corrupt: {_0}")]
    CorruptRank(RankRangeError),
    /// The endpoint needs a signed in user, but there is none.
    #[display("You need to sign in first.")]
    #[from(ignore)]
    UserUnauthenticated,
    /// The session is signed in as a user that does not exist.
    #[display("Your session is no longer valid. Sign in again.")]
    #[from(ignore)]
    InvalidSession,
    /// The email or password did not match a user.
    #[display("Invalid email or password.")]
    #[from(ignore)]
    BadCredentials,
    /// The form's CSRF token did not match the session.
    #[display("The form has expired. Reload the page and try again.")]
    #[from(ignore)]
    InvalidCsrf,
    /// The signed in user may not act on the target user.
    #[display("You can only change your own rank.")]
    #[from(ignore)]
    Unauthorized,
    /// The target user does not exist.
    #[display("User {_0} not found.")]
    #[from(ignore)]
    UserNotFound(i32),
    /// The user's rank changed while it was being adjusted.
    #[display("Your rank changed while updating it. Try again.")]
    #[from(ignore)]
    RankConflict,
    /// A user already signs in with this email.
    #[display("A user with the email {_0:?} already exists.")]
    #[from(ignore)]
    EmailTaken(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut internal_error = None;

        let status = match &self.kind {
            AppErrorKind::Json(error) => error.status(),
            AppErrorKind::Form(error) => error.status(),
            AppErrorKind::Path(error) => error.status(),
            AppErrorKind::Garde(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppErrorKind::MissingContentType => StatusCode::BAD_REQUEST,
            AppErrorKind::UnsupportedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppErrorKind::UserUnauthenticated
            | AppErrorKind::InvalidSession
            | AppErrorKind::BadCredentials => StatusCode::UNAUTHORIZED,
            AppErrorKind::InvalidCsrf | AppErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            AppErrorKind::UserNotFound(_) => StatusCode::NOT_FOUND,
            AppErrorKind::RankConflict | AppErrorKind::EmailTaken(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut error = ApiError::new(self.kind.to_string());

        // fallthrough for internal server errors not turned into user
        // errors here
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error.message = "An internal server error occured.".into();
            internal_error = Some(self.kind);
        }

        // replace error message
        if let Some(message) = self.message {
            error.message = message;
        }

        let mut response = (status, AppJson(error)).into_response();
        if let Some(error) = internal_error {
            response.extensions_mut().insert(Arc::new(error));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors_keep_their_message() {
        let response = AppError::from(AppErrorKind::Unauthorized).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.extensions().get::<Arc<AppErrorKind>>().is_none());
    }

    #[test]
    fn test_internal_errors_are_attached() {
        let response = AppError::from(sqlx::Error::RowNotFound).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<Arc<AppErrorKind>>().is_some());
    }

    #[test]
    fn test_error_message_override() {
        let error = AppError::from(AppErrorKind::UserNotFound(4)).with_message("gone");

        assert_eq!(error.to_string(), "gone");
        assert!(matches!(error.kind(), AppErrorKind::UserNotFound(4)));
    }
}
