//! User authentication routes.

use axum::{
    extract::State,
    response::{Html, IntoResponse as _, Redirect, Response},
};

use garde::Validate;

use serde::Deserialize;

use tracing::instrument;

use crate::{
    app::{AppError, AppForm, AppGarde, AppState, error::AppErrorKind},
    auth,
    session::Session,
    view::{self, Layout},
};

/// A submitted sign in form.
#[derive(Deserialize, Validate)]
pub struct LoginForm {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 1))]
    pub password: String,
    #[garde(skip)]
    pub csrf: String,
}

/// A form that carries nothing but its CSRF token.
#[derive(Debug, Deserialize)]
pub struct CsrfForm {
    pub csrf: String,
}

/// Shows the sign in page.
#[instrument(skip(state))]
pub async fn login_page(
    mut session: Session,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if session.identity.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let notice = session.take_notice().await?;

    let layout = Layout {
        title: &state.config.site.title,
        signed_in_as: None,
        csrf: &session.csrf,
        notice: notice.as_deref(),
    };

    Ok(Html(view::login(&layout)).into_response())
}

/// Processes a sign in form.
#[instrument(skip(state, form))]
pub async fn login(
    mut session: Session,
    State(state): State<AppState>,
    AppGarde(AppForm(form)): AppGarde<AppForm<LoginForm>>,
) -> Result<Redirect, AppError> {
    session.verify_csrf(&form.csrf)?;

    let mut conn = state.db.acquire().await?;

    match auth::authenticate(&form.email, &form.password, &mut conn).await {
        Ok(requester) => {
            tracing::info!(id = requester.id, "user signed in");

            session.set_user(requester.id).await?; // attach user to session
            Ok(Redirect::to("/"))
        }
        Err(err) if matches!(err.kind(), AppErrorKind::BadCredentials) => {
            tracing::info!("failed sign in attempt");

            session.set_notice(err.to_string()).await?;
            Ok(Redirect::to("/login"))
        }
        Err(err) => Err(err),
    }
}

/// Signs the session out.
#[instrument(skip(form))]
pub async fn logout(
    mut session: Session,
    AppForm(form): AppForm<CsrfForm>,
) -> Result<Redirect, AppError> {
    session.verify_csrf(&form.csrf)?;

    if let Some(identity) = session.identity {
        tracing::info!(id = identity, "user signed out");
    }

    session.clear().await?;

    Ok(Redirect::to("/"))
}
