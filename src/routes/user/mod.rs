//! Users endpoints.

use axum::extract::State;

use hearthstone_tracker_model::{
    RankAdjustment, User, request::AdjustRankRequest, user::CurrentUser,
};

use tracing::instrument;

use crate::{
    app::{AppError, AppJson, AppPath, AppState, Payload, error::AppErrorKind},
    rank::{self, Requester},
    session::{Session, SessionUser},
    user,
};

pub mod auth;
pub mod rank_form;

/// Lists every user, best rank first.
#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<AppJson<Vec<User>>, AppError> {
    let mut conn = state.db.acquire().await?;

    let users = user::list_users(&mut conn)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AppJson(users))
}

/// Shows a single user.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<i32>,
) -> Result<AppJson<User>, AppError> {
    let mut conn = state.db.acquire().await?;

    let user = user::get_user(user_id, &mut conn)
        .await?
        .ok_or(AppErrorKind::UserNotFound(user_id))?;

    Ok(AppJson(user.try_into()?))
}

/// Returns the currently authenticated user's details.
#[instrument]
pub async fn show_me(user: SessionUser) -> Result<AppJson<CurrentUser>, AppError> {
    Ok(AppJson(user.into_inner().try_into()?))
}

/// Moves the rank of a user one step.
///
/// Only the user themself may do this.
#[instrument(skip(state))]
pub async fn adjust_rank(
    session: Session,
    State(state): State<AppState>,
    AppPath(user_id): AppPath<i32>,
    Payload(request): Payload<AdjustRankRequest>,
) -> Result<AppJson<RankAdjustment>, AppError> {
    let requester = session.identity.map(|id| Requester { id });

    let mut conn = state.db.acquire().await?;

    let adjustment = rank::adjust(user_id, requester.as_ref(), request.direction, &mut conn).await?;

    Ok(AppJson(adjustment))
}
