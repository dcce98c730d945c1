//! Status workflows as explicit edge tables.
//!
//! Every status enum lists the edges it allows and who may take each one.
//! An edge missing from the table is a conflict with the record's current
//! state; a caller who is not the named actor is forbidden.

use std::fmt::Display;

use serde::Deserialize;
use sqlx::{sqlite::SqliteRow, FromRow, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::{db, AppError, AppResult};

/// Body of every `PUT /{id}/status` route.
#[derive(Debug, Deserialize)]
pub struct StatusChange<S> {
    pub status: S,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Owner,
    Approver,
    Either,
}

impl Actor {
    fn admits(self, is_owner: bool, is_approver: bool) -> bool {
        match self {
            Actor::Owner => is_owner,
            Actor::Approver => is_approver,
            Actor::Either => is_owner || is_approver,
        }
    }
}

pub trait Workflow: Copy + PartialEq + Display + 'static {
    const EDGES: &'static [(Self, Self, Actor)];

    fn actor_for(from: Self, to: Self) -> Option<Actor> {
        Self::EDGES
            .iter()
            .find(|(f, t, _)| *f == from && *t == to)
            .map(|&(_, _, actor)| actor)
    }
}

/// Validates `from -> to` for a caller. `is_owner` should already fold in
/// admins where the record's owner rules allow it.
pub fn check<S: Workflow>(from: S, to: S, is_owner: bool, is_approver: bool) -> AppResult<()> {
    let Some(actor) = S::actor_for(from, to) else {
        return Err(AppError::conflict(format!("cannot move from {from} to {to}")));
    };

    if actor.admits(is_owner, is_approver) {
        Ok(())
    } else {
        let who = match actor {
            Actor::Owner => "the owner",
            Actor::Approver => "an approver",
            Actor::Either => "the owner or an approver",
        };
        Err(AppError::forbidden(format!("only {who} may move from {from} to {to}")))
    }
}

/// Writes a checked `from -> to` move to `table`. The update only matches
/// while the row is still in `from`; anything else is a conflict.
pub async fn apply<S, T>(db_pool: &SqlitePool, table: &str, id: Uuid, from: S, to: S) -> AppResult<T>
where
    S: Workflow + sqlx::Type<Sqlite> + for<'q> sqlx::Encode<'q, Sqlite> + Send,
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    sqlx::query_as(&format!(
        "UPDATE {table} SET status = ?, updated_at = ? WHERE id = ? AND status = ? RETURNING *"
    ))
    .bind(to)
    .bind(db::now())
    .bind(id)
    .bind(from)
    .fetch_optional(db_pool)
    .await?
    .ok_or_else(|| AppError::conflict(format!("status is no longer {from}, reload and try again")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labelled;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Door {
        Shut,
        Open,
        Locked,
    }

    labelled!(Door {
        Shut => "shut",
        Open => "open",
        Locked => "locked",
    });

    impl Workflow for Door {
        const EDGES: &'static [(Self, Self, Actor)] = &[
            (Door::Shut, Door::Open, Actor::Either),
            (Door::Open, Door::Shut, Actor::Either),
            (Door::Shut, Door::Locked, Actor::Owner),
            (Door::Locked, Door::Shut, Actor::Approver),
        ];
    }

    #[test]
    fn missing_edges_conflict() {
        assert!(matches!(check(Door::Open, Door::Locked, true, true), Err(AppError::Conflict(_))));
        assert!(matches!(check(Door::Shut, Door::Shut, true, true), Err(AppError::Conflict(_))));
    }

    #[test]
    fn actors_are_enforced() {
        assert!(check(Door::Shut, Door::Locked, true, false).is_ok());
        assert!(matches!(check(Door::Shut, Door::Locked, false, true), Err(AppError::Forbidden(_))));

        assert!(check(Door::Locked, Door::Shut, false, true).is_ok());
        assert!(matches!(check(Door::Locked, Door::Shut, true, false), Err(AppError::Forbidden(_))));

        assert!(check(Door::Shut, Door::Open, true, false).is_ok());
        assert!(check(Door::Shut, Door::Open, false, true).is_ok());
        assert!(matches!(check(Door::Shut, Door::Open, false, false), Err(AppError::Forbidden(_))));
    }
}
