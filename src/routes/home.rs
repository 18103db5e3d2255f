//! Home page.

use axum::{extract::State, response::Html};

use hearthstone_tracker_model::User;

use tracing::instrument;

use crate::{
    app::{AppError, AppState},
    rank::Requester,
    session::Session,
    user,
    view::{self, Layout},
};

/// Shows every user, best rank first.
#[instrument(skip(state))]
pub async fn index(
    mut session: Session,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let mut conn = state.db.acquire().await?;

    let current_user = session.current_user(&mut conn).await?;

    let users = user::list_users(&mut conn)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    drop(conn);

    let notice = session.take_notice().await?;
    let requester = current_user.as_ref().map(|user| Requester { id: user.id });

    let layout = Layout {
        title: &state.config.site.title,
        signed_in_as: current_user.as_ref().map(|user| user.name.as_str()),
        csrf: &session.csrf,
        notice: notice.as_deref(),
    };

    Ok(Html(view::home(&layout, &users, requester.as_ref())))
}
