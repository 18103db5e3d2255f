//! User structs and utilities.

use chrono::Utc;

use hearthstone_tracker_model::{Rank, User, user::CurrentUser};

use sqlx::{FromRow, SqliteConnection};

use crate::app::{AppError, error::AppErrorKind};

/// A user schema.
#[derive(Clone, Debug, FromRow)]
pub struct UserSchema {
    pub id: i32,
    pub name: String,
    pub email: String,
    /// The stored rank.
    ///
    /// Kept as the raw column; use [`UserSchema::rank`] to get a checked
    /// [`Rank`].
    #[sqlx(rename = "rank")]
    pub raw_rank: Option<i64>,
}

impl UserSchema {
    /// The user's checked rank.
    pub fn rank(&self) -> Result<Option<Rank>, AppError> {
        self.raw_rank
            .map(Rank::new)
            .transpose()
            .map_err(|err| AppErrorKind::CorruptRank(err).into())
    }
}

impl TryFrom<UserSchema> for User {
    type Error = AppError;

    fn try_from(value: UserSchema) -> Result<Self, Self::Error> {
        let rank = value.rank()?;

        Ok(User {
            id: value.id,
            name: value.name,
            rank,
        })
    }
}

impl TryFrom<UserSchema> for CurrentUser {
    type Error = AppError;

    fn try_from(value: UserSchema) -> Result<Self, Self::Error> {
        let rank = value.rank()?;

        Ok(CurrentUser {
            id: value.id,
            name: value.name,
            email: value.email,
            rank,
        })
    }
}

/// A new user to insert.
#[derive(Clone, Debug)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    /// The bcrypt hash of the user's password.
    pub password_hash: &'a str,
    pub rank: Option<Rank>,
}

/// Creates a user, returning their ID.
pub async fn create_user(
    user: &NewUser<'_>,
    conn: &mut SqliteConnection,
) -> Result<i32, AppError> {
    let now = Utc::now();

    let result = sqlx::query_as::<_, (i32,)>(
        r#"
        INSERT INTO user (name, email, password_hash, rank, inserted_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        RETURNING id
        "#,
    )
    .bind(user.name)
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.rank.map(i64::from))
    .bind(now)
    .fetch_one(&mut *conn)
    .await;

    match result {
        Ok((id,)) => {
            tracing::info!(id, name = user.name, "created user");
            Ok(id)
        }
        Err(err) => match err.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                Err(AppErrorKind::EmailTaken(user.email.to_owned()).into())
            }
            _ => Err(err.into()),
        },
    }
}

/// Gets a user by their ID.
pub async fn get_user(id: i32, conn: &mut SqliteConnection) -> Result<Option<UserSchema>, AppError> {
    sqlx::query_as::<_, UserSchema>(
        r#"
        SELECT id, name, email, rank
        FROM user
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(AppError::from)
}

/// A user and the hash they sign in with.
#[derive(FromRow)]
pub struct UserCredentials {
    pub id: i32,
    pub password_hash: String,
}

/// Gets the sign-in credentials of a user by their email.
pub async fn get_credentials(
    email: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<UserCredentials>, AppError> {
    sqlx::query_as::<_, UserCredentials>(
        r#"
        SELECT id, password_hash
        FROM user
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await
    .map_err(AppError::from)
}

/// Lists every user, best rank first.
///
/// Unranked users come after every ranked user. Ties are broken by ID, so
/// the oldest user comes first.
pub async fn list_users(conn: &mut SqliteConnection) -> Result<Vec<UserSchema>, AppError> {
    sqlx::query_as::<_, UserSchema>(
        r#"
        SELECT id, name, email, rank
        FROM user
        ORDER BY rank IS NULL, rank ASC, id ASC
        "#,
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(AppError::from)
}

/// Sets the rank of a user, by email.
///
/// Returns the ID of the user that was updated, or `None` if no user signs
/// in with `email`.
pub async fn set_rank_by_email(
    email: &str,
    rank: Option<Rank>,
    conn: &mut SqliteConnection,
) -> Result<Option<i32>, AppError> {
    sqlx::query_as::<_, (i32,)>(
        r#"
        UPDATE user
        SET rank = $1, updated_at = $2
        WHERE email = $3
        RETURNING id
        "#,
    )
    .bind(rank.map(i64::from))
    .bind(Utc::now())
    .bind(email)
    .fetch_optional(&mut *conn)
    .await
    .map(|row| row.map(|(id,)| id))
    .map_err(AppError::from)
}
