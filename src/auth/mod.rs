//! User authentication.

use sqlx::SqliteConnection;

use tokio::task;

use tracing::instrument;

use crate::{
    app::{AppError, error::AppErrorKind},
    rank::Requester,
    user,
};

/// The cheapest cost bcrypt accepts.
pub const MIN_COST: u32 = 4;

/// Hashes a password for storage with the given bcrypt cost.
///
/// Hashing is slow on purpose, so this runs on the blocking pool.
pub async fn hash_password(password: impl Into<String>, cost: u32) -> Result<String, AppError> {
    let password = password.into();

    let hash = task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

    Ok(hash)
}

/// Checks a password against a stored hash.
pub async fn verify_password(
    password: impl Into<String>,
    hash: impl Into<String>,
) -> Result<bool, AppError> {
    let password = password.into();
    let hash = hash.into();

    let matches = task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;

    Ok(matches)
}

/// Checks an email and password, returning who they belong to.
///
/// An unknown email and a wrong password both fail with
/// [`AppErrorKind::BadCredentials`].
#[instrument(skip(password, conn))]
pub async fn authenticate(
    email: &str,
    password: &str,
    conn: &mut SqliteConnection,
) -> Result<Requester, AppError> {
    let Some(credentials) = user::get_credentials(email, conn).await? else {
        return Err(AppErrorKind::BadCredentials.into());
    };

    if verify_password(password, credentials.password_hash).await? {
        Ok(Requester { id: credentials.id })
    } else {
        tracing::debug!("wrong password");
        Err(AppErrorKind::BadCredentials.into())
    }
}
