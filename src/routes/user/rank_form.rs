//! Rank buttons on the home page.

use axum::{extract::State, response::Redirect};

use hearthstone_tracker_model::RankDirection;

use tracing::instrument;

use crate::{
    app::{AppError, AppForm, AppPath, AppState},
    rank::{self, Requester},
    routes::user::auth::CsrfForm,
    session::Session,
};

/// Handles the "go up" button.
#[instrument(skip(state, form))]
pub async fn go_up(
    session: Session,
    State(state): State<AppState>,
    AppPath(user_id): AppPath<i32>,
    AppForm(form): AppForm<CsrfForm>,
) -> Result<Redirect, AppError> {
    submit(session, &state, user_id, RankDirection::Up, &form).await
}

/// Handles the "go down" button.
#[instrument(skip(state, form))]
pub async fn go_down(
    session: Session,
    State(state): State<AppState>,
    AppPath(user_id): AppPath<i32>,
    AppForm(form): AppForm<CsrfForm>,
) -> Result<Redirect, AppError> {
    submit(session, &state, user_id, RankDirection::Down, &form).await
}

async fn submit(
    mut session: Session,
    state: &AppState,
    user_id: i32,
    direction: RankDirection,
    form: &CsrfForm,
) -> Result<Redirect, AppError> {
    session.verify_csrf(&form.csrf)?;

    let requester = session.identity.map(|id| Requester { id });

    let mut conn = state.db.acquire().await?;

    let adjustment = rank::adjust(user_id, requester.as_ref(), direction, &mut conn).await?;

    // a rank that could not move explains why on the next page
    if let Some(notice) = adjustment.notice {
        session.set_notice(notice).await?;
    }

    Ok(Redirect::to("/"))
}
