//! Browser sessions.

use axum::{
    RequestPartsExt as _,
    extract::{FromRef, FromRequestParts},
};

use derive_more::Deref;

use std::fmt::{self, Debug, Formatter};

use http::request::Parts;

use rand::{Rng, distr::Distribution};

use serde::{Deserialize, Serialize};

use sqlx::SqliteConnection;

use tower_sessions::Session as TowerSession;

use crate::{
    app::{AppError, AppState, error::AppErrorKind},
    rank::Requester,
    user::{self, UserSchema},
};

pub type SessionError = tower_sessions::session::Error;

/// A session, used to keep state between page loads.
///
/// The session carries who is signed in, the CSRF token every form must
/// echo back, and a one-shot notice to show on the next page.
#[derive(Clone, Deref)]
pub struct Session {
    session: TowerSession,
    #[deref]
    data: SessionData,
}

/// Inner session data.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SessionData {
    /// A randomly generated csrf token.
    pub csrf: String,
    /// The identity of the user.
    ///
    /// This is the user's ID in the database. If this is `None`, this is an
    /// anonymous session.
    pub identity: Option<i32>,
    /// A message to show the user on the next page they see.
    #[serde(default)]
    pub notice: Option<String>,
}

impl Session {
    /// The name of the key this struct is stored in on the session.
    pub const SESSION_KEY: &'static str = "tracker_session";

    /// Signs the session in as a user.
    ///
    /// The session ID and the CSRF token are both regenerated, so a token
    /// captured before signing in is useless afterwards.
    ///
    /// **Only call this if you are confident the user has followed the proper
    /// authentication flow!**
    pub async fn set_user(&mut self, user_id: i32) -> Result<(), SessionError> {
        self.session.cycle_id().await?;
        self.data.identity = Some(user_id);
        self.shuffle_csrf().await
    }

    /// Signs the session out, discarding everything stored in it.
    pub async fn clear(&mut self) -> Result<(), SessionError> {
        self.session.flush().await?;
        self.data = SessionData {
            csrf: generate_csrf(),
            ..Default::default()
        };
        self.update_data().await
    }

    /// Shuffles the CSRF token.
    pub async fn shuffle_csrf(&mut self) -> Result<(), SessionError> {
        self.data.csrf = generate_csrf();
        self.update_data().await
    }

    /// Checks a CSRF token sent with a form.
    pub fn verify_csrf(&self, csrf: &str) -> Result<(), AppError> {
        if !self.data.csrf.is_empty() && self.data.csrf == csrf {
            Ok(())
        } else {
            tracing::warn!(identity = ?self.data.identity, "request with bad csrf token");
            Err(AppErrorKind::InvalidCsrf.into())
        }
    }

    /// Stores a notice to be shown on the next page.
    pub async fn set_notice(&mut self, notice: impl Into<String>) -> Result<(), SessionError> {
        self.data.notice = Some(notice.into());
        self.update_data().await
    }

    /// Takes the pending notice, if there is one.
    ///
    /// The notice is removed from the session, so it is only shown once.
    pub async fn take_notice(&mut self) -> Result<Option<String>, SessionError> {
        let notice = self.data.notice.take();
        if notice.is_some() {
            self.update_data().await?;
        }
        Ok(notice)
    }

    /// Fetches the signed in user, if the session is signed in.
    ///
    /// A session signed in as a user that has since disappeared is treated
    /// as anonymous.
    pub async fn current_user(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Option<UserSchema>, AppError> {
        match self.data.identity {
            Some(identity) => user::get_user(identity, conn).await,
            None => Ok(None),
        }
    }

    async fn update_data(&self) -> Result<(), SessionError> {
        self.session.insert(Session::SESSION_KEY, &self.data).await
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.data.identity)
            .field("notice", &self.data.notice)
            .finish()
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extract::<TowerSession>()
            .await
            .map_err(|(_, msg)| {
                tracing::error!("session layer missing: {}", msg);
                AppErrorKind::InvalidSession
            })?;

        let session_data = if let Some(session_data) = session.get(Session::SESSION_KEY).await? {
            session_data
        } else {
            // create new session
            tracing::trace!("creating new session");
            let session_data = SessionData {
                csrf: generate_csrf(),
                identity: None,
                notice: None,
            };
            session.insert(Session::SESSION_KEY, &session_data).await?;
            session_data
        };

        Ok(Session {
            session,
            data: session_data,
        })
    }
}

/// An authenticated user.
///
/// This type dereferences into the stored user [`UserSchema`], and converts
/// into the [`Requester`] handed to rank adjustments.
#[derive(Clone, Debug, Deref)]
pub struct SessionUser {
    #[deref]
    user: UserSchema,
    identity: i32,
}

impl SessionUser {
    /// Unwraps the inner user row.
    pub fn into_inner(self) -> UserSchema {
        self.user
    }

    /// The database ID of the user.
    ///
    /// This is simply a copy of [`SessionData::identity`], but you don't have
    /// to work with an [`Option`].
    pub fn identity(&self) -> i32 {
        self.identity
    }

    /// The requester context for acting as this user.
    pub fn requester(&self) -> Requester {
        Requester { id: self.identity }
    }
}

impl<S> FromRequestParts<S> for SessionUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = parts.extract_with_state::<Session, S>(state).await?;

        let state = AppState::from_ref(state);

        if let Some(identity) = session.identity {
            let mut conn = state.db.acquire().await?;

            match user::get_user(identity, &mut conn).await? {
                Some(user) => Ok(SessionUser { user, identity }),
                None => Err(AppErrorKind::InvalidSession.into()),
            }
        } else {
            Err(AppErrorKind::UserUnauthenticated.into())
        }
    }
}

/// A random distribution for base 64.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base64;

impl Distribution<u8> for Base64 {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u8 {
        const GEN_ASCII_STR_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                abcdefghijklmnopqrstuvwxyz\
                0123456789\
                -_";

        let ix = rng.next_u32() >> (32 - 6);
        GEN_ASCII_STR_CHARSET[ix as usize]
    }
}

/// Generates a random state with thread-local entropy.
pub fn generate_csrf() -> String {
    let mut rng = rand::rng();
    generate_csrf_with(&mut rng)
}

/// Generates a random state with a provided random generator.
pub fn generate_csrf_with<R>(rng: &mut R) -> String
where
    R: Rng,
{
    rng.sample_iter(Base64).take(64).map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_generate_csrf() {
        let csrf = generate_csrf();

        assert_eq!(csrf.len(), 64);
        assert!(
            csrf.chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'))
        );
    }

    #[test]
    fn test_generate_csrf_is_seeded() {
        let a = generate_csrf_with(&mut StdRng::seed_from_u64(25));
        let b = generate_csrf_with(&mut StdRng::seed_from_u64(25));
        let c = generate_csrf_with(&mut StdRng::seed_from_u64(1));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
