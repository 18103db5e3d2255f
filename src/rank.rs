//! Rank adjustments.
//!
//! A user may move their own rank one step at a time, and never past
//! [`Rank::MIN`] or [`Rank::MAX`]. Nobody may move anybody else's rank.

use chrono::Utc;

use hearthstone_tracker_model::{BoundaryReached, Rank, RankAdjustment, RankDirection};

use sqlx::{Connection as _, SqliteConnection};

use tracing::instrument;

use crate::{
    app::{AppError, error::AppErrorKind},
    user,
};

/// The user a rank adjustment is made on behalf of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Requester {
    /// The database ID of the requesting user.
    pub id: i32,
}

/// Checks if `requester` may adjust the rank of the user `target`.
///
/// Only the owner of a rank may adjust it. Anonymous requesters may adjust
/// nothing.
pub fn can_adjust(requester: Option<&Requester>, target: i32) -> bool {
    requester.is_some_and(|requester| requester.id == target)
}

/// The outcome of stepping a rank, before it is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    /// The rank before stepping.
    ///
    /// `None` if the user was unranked.
    pub from: Option<Rank>,
    /// The rank after stepping.
    pub to: Rank,
    /// Set if the rank could not move.
    pub boundary: Option<BoundaryReached>,
}

impl Step {
    /// Whether the step changes what is stored.
    pub fn is_change(&self) -> bool {
        self.from != Some(self.to)
    }
}

/// Steps a rank in `direction`, clamping at the bounds.
///
/// An unranked user steps from [`Rank::DEFAULT`]. Stepping past a bound
/// leaves the rank where it is and reports the bound instead of failing.
pub fn step(from: Option<Rank>, direction: RankDirection) -> Step {
    let current = from.unwrap_or_default();

    match current.step(direction) {
        Ok(to) => Step {
            from,
            to,
            boundary: None,
        },
        Err(boundary) => Step {
            from,
            to: current,
            boundary: Some(boundary),
        },
    }
}

/// Adjusts the rank of the user `target` one step in `direction`.
///
/// The read and the write happen in one transaction, and the write only
/// lands if the rank is still what was read. If another request moved the
/// rank in between, this fails with [`AppErrorKind::RankConflict`].
#[instrument(skip(conn))]
pub async fn adjust(
    target: i32,
    requester: Option<&Requester>,
    direction: RankDirection,
    conn: &mut SqliteConnection,
) -> Result<RankAdjustment, AppError> {
    let Some(requester) = requester else {
        return Err(AppErrorKind::UserUnauthenticated.into());
    };

    if !can_adjust(Some(requester), target) {
        tracing::warn!(requester = requester.id, target, "rank adjustment on another user");
        return Err(AppErrorKind::Unauthorized.into());
    }

    // hold the write lock for the whole read-modify-write
    let mut tx = conn
        .begin_with("BEGIN IMMEDIATE")
        .await
        .map_err(conflict_on_busy)?;

    let user = user::get_user(target, &mut tx)
        .await?
        .ok_or(AppErrorKind::UserNotFound(target))?;

    let step = step(user.rank()?, direction);

    if step.is_change() {
        let result = sqlx::query(
            r#"
            UPDATE user
            SET rank = $1, updated_at = $2
            WHERE id = $3 AND rank IS $4
            "#,
        )
        .bind(i64::from(step.to))
        .bind(Utc::now())
        .bind(target)
        .bind(step.from.map(i64::from))
        .execute(&mut *tx)
        .await
        .map_err(conflict_on_busy)?;

        if result.rows_affected() == 0 {
            return Err(AppErrorKind::RankConflict.into());
        }

        tx.commit().await.map_err(conflict_on_busy)?;

        tracing::debug!(from = ?step.from, to = %step.to, "adjusted rank");
    } else {
        tracing::debug!(rank = %step.to, "rank already at bound");
    }

    Ok(RankAdjustment {
        user_id: target,
        rank: step.to,
        progress: step.to.progress(),
        notice: step.boundary.map(|boundary| boundary.to_string()),
    })
}

/// Turns a database locked by another writer into
/// [`AppErrorKind::RankConflict`].
fn conflict_on_busy(err: sqlx::Error) -> AppError {
    let busy = match &err {
        // SQLITE_BUSY and its extended codes
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| code & 0xff == 5),
        _ => false,
    };

    if busy {
        tracing::debug!(%err, "rank is being written elsewhere");
        AppErrorKind::RankConflict.into()
    } else {
        err.into()
    }
}

/// Moves the rank of `target` towards [`Rank::MAX`].
pub async fn increase(
    target: i32,
    requester: Option<&Requester>,
    conn: &mut SqliteConnection,
) -> Result<RankAdjustment, AppError> {
    adjust(target, requester, RankDirection::Up, conn).await
}

/// Moves the rank of `target` towards [`Rank::MIN`].
pub async fn decrease(
    target: i32,
    requester: Option<&Requester>,
    conn: &mut SqliteConnection,
) -> Result<RankAdjustment, AppError> {
    adjust(target, requester, RankDirection::Down, conn).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use axum::response::IntoResponse as _;

    use http::StatusCode;

    use rstest::rstest;

    use sqlx::{Connection as _, sqlite::SqliteConnectOptions};

    use tempfile::tempdir;

    use crate::user::tests::{insert_user, test_conn};

    fn rank(n: i64) -> Rank {
        Rank::new(n).unwrap()
    }

    async fn stored_rank(id: i32, conn: &mut SqliteConnection) -> Option<Rank> {
        user::get_user(id, conn).await.unwrap().unwrap().rank().unwrap()
    }

    #[test]
    fn test_can_adjust() {
        let owner = Requester { id: 1 };

        assert!(can_adjust(Some(&owner), 1));
        assert!(!can_adjust(Some(&owner), 2));
        assert!(!can_adjust(None, 1));
    }

    #[rstest]
    #[case(Some(20), RankDirection::Up, 21, None)]
    #[case(Some(20), RankDirection::Down, 19, None)]
    #[case(Some(25), RankDirection::Up, 25, Some(BoundaryReached::Ceiling))]
    #[case(Some(1), RankDirection::Down, 1, Some(BoundaryReached::Floor))]
    #[case(None, RankDirection::Up, 25, Some(BoundaryReached::Ceiling))]
    #[case(None, RankDirection::Down, 24, None)]
    fn test_step(
        #[case] from: Option<i64>,
        #[case] direction: RankDirection,
        #[case] to: i64,
        #[case] boundary: Option<BoundaryReached>,
    ) {
        let step = step(from.map(rank), direction);

        assert_eq!(step.to, rank(to));
        assert_eq!(step.boundary, boundary);
    }

    #[test]
    fn test_unranked_at_bound_is_still_a_change() {
        // an unranked user pressing "up" gets pinned to the default rank
        assert!(step(None, RankDirection::Up).is_change());
        assert!(!step(Some(Rank::MAX), RankDirection::Up).is_change());
    }

    #[tokio::test]
    async fn test_adjust_own_rank() {
        let mut conn = test_conn().await;
        let omgrr = insert_user("omgrr", Some(20), &mut conn).await;
        let requester = Requester { id: omgrr };

        let down = decrease(omgrr, Some(&requester), &mut conn).await.unwrap();
        assert_eq!(down.rank, rank(19));
        assert_eq!(down.progress, 24);
        assert_eq!(down.notice, None);
        assert_eq!(stored_rank(omgrr, &mut conn).await, Some(rank(19)));

        let up = increase(omgrr, Some(&requester), &mut conn).await.unwrap();
        assert_eq!(up.rank, rank(20));
        assert_eq!(stored_rank(omgrr, &mut conn).await, Some(rank(20)));
    }

    #[tokio::test]
    async fn test_adjust_at_bounds() {
        let mut conn = test_conn().await;
        let top = insert_user("top", Some(25), &mut conn).await;
        let bottom = insert_user("bottom", Some(1), &mut conn).await;

        let result = increase(top, Some(&Requester { id: top }), &mut conn)
            .await
            .unwrap();
        assert_eq!(result.rank, rank(25));
        assert_eq!(result.notice.as_deref(), Some("Rank cannot go above 25"));
        assert_eq!(stored_rank(top, &mut conn).await, Some(rank(25)));

        let result = decrease(bottom, Some(&Requester { id: bottom }), &mut conn)
            .await
            .unwrap();
        assert_eq!(result.rank, rank(1));
        assert_eq!(result.notice.as_deref(), Some("Rank cannot go below 1"));
        assert_eq!(stored_rank(bottom, &mut conn).await, Some(rank(1)));
    }

    #[tokio::test]
    async fn test_adjust_progress() {
        let mut conn = test_conn().await;
        let omgrr = insert_user("omgrr", Some(24), &mut conn).await;
        let requester = Requester { id: omgrr };

        let down = decrease(omgrr, Some(&requester), &mut conn).await.unwrap();
        assert_eq!(down.progress, 8);

        let up = increase(omgrr, Some(&requester), &mut conn).await.unwrap();
        assert_eq!(up.progress, 4);

        let up = increase(omgrr, Some(&requester), &mut conn).await.unwrap();
        assert_eq!(up.progress, 0);
    }

    #[tokio::test]
    async fn test_adjust_unranked() {
        let mut conn = test_conn().await;
        let bison = insert_user("bison", None, &mut conn).await;

        let result = decrease(bison, Some(&Requester { id: bison }), &mut conn)
            .await
            .unwrap();
        assert_eq!(result.rank, rank(24));
        assert_eq!(stored_rank(bison, &mut conn).await, Some(rank(24)));
    }

    #[tokio::test]
    async fn test_adjust_someone_else() {
        let mut conn = test_conn().await;
        let omgrr = insert_user("omgrr", Some(20), &mut conn).await;
        let bison = insert_user("bison", Some(10), &mut conn).await;

        let result = increase(bison, Some(&Requester { id: omgrr }), &mut conn).await;
        assert!(matches!(
            result.map_err(AppError::into_kind),
            Err(AppErrorKind::Unauthorized)
        ));

        let result = increase(bison, None, &mut conn).await;
        assert!(matches!(
            result.map_err(AppError::into_kind),
            Err(AppErrorKind::UserUnauthenticated)
        ));

        assert_eq!(stored_rank(bison, &mut conn).await, Some(rank(10)));
    }

    #[tokio::test]
    async fn test_adjust_missing_user() {
        let mut conn = test_conn().await;

        let result = increase(404, Some(&Requester { id: 404 }), &mut conn).await;
        assert!(matches!(
            result.map_err(AppError::into_kind),
            Err(AppErrorKind::UserNotFound(404))
        ));
    }

    #[tokio::test]
    async fn test_adjust_while_locked_is_a_conflict() {
        let dir = tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("tracker.db"))
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(100));

        let mut a = SqliteConnection::connect_with(&options).await.unwrap();
        sqlx::migrate!().run(&mut a).await.unwrap();
        let omgrr = insert_user("omgrr", Some(20), &mut a).await;

        // another connection is midway through writing the rank
        let mut b = SqliteConnection::connect_with(&options).await.unwrap();
        let mut tx = b.begin().await.unwrap();
        sqlx::query("UPDATE user SET rank = 19 WHERE id = $1")
            .bind(omgrr)
            .execute(&mut *tx)
            .await
            .unwrap();

        let Err(error) = increase(omgrr, Some(&Requester { id: omgrr }), &mut a).await else {
            panic!("adjusted a locked rank");
        };
        assert!(matches!(error.kind(), AppErrorKind::RankConflict));
        assert_eq!(error.into_response().status(), StatusCode::CONFLICT);

        tx.rollback().await.unwrap();
        assert_eq!(stored_rank(omgrr, &mut a).await, Some(rank(20)));

        // once the lock is gone the adjustment goes through
        let up = increase(omgrr, Some(&Requester { id: omgrr }), &mut a).await.unwrap();
        assert_eq!(up.rank, rank(21));
    }
}
