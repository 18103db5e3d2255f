//! HTTP routes.

pub mod home;
pub mod user;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::app::AppState;

/// Builds the routes of the app.
///
/// The returned router still needs a session layer to work; see
/// [`tower_sessions::SessionManagerLayer`].
pub fn router(state: AppState) -> Router {
    let pages = Router::<AppState>::new()
        .route("/", get(home::index))
        .route("/home", get(home::index))
        .route("/login", get(user::auth::login_page).post(user::auth::login))
        .route("/logout", post(user::auth::logout))
        .route("/users/{user_id}/go-up", post(user::rank_form::go_up))
        .route("/users/{user_id}/go-down", post(user::rank_form::go_down));

    let api = Router::<AppState>::new().nest(
        "/users",
        Router::<AppState>::new()
            .route("/", get(user::list))
            .route("/~me", get(user::show_me))
            .route("/{user_id}", get(user::show))
            .route("/{user_id}/rank", patch(user::adjust_rank)),
    );

    Router::<AppState>::new()
        .merge(pages)
        .nest("/api", api)
        .with_state(state)
}
