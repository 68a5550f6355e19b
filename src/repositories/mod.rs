// Repository pattern - all reads and writes of persisted entities go through here
mod attendance;
mod stories;
mod users;

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::marker::PhantomData;
use thiserror::Error;

use crate::db::models::{EventAttendance, Story, User};
use crate::db::NOW;
use crate::state::DbPool;

pub type UserRepository = SqliteRepository<User>;
pub type StoryRepository = SqliteRepository<Story>;
pub type AttendanceRepository = SqliteRepository<EventAttendance>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),
}

impl RepositoryError {
    /// True when the statement tripped a UNIQUE or PRIMARY KEY constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            RepositoryError::Sql(rusqlite::Error::SqliteFailure(e, _)) => {
                e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            }
            _ => false,
        }
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Column/value pairs written by an insert or a partial update.
pub trait IntoColumns {
    fn into_columns(self) -> Vec<(&'static str, Value)>;
}

/// A soft-deletable table row. Every table behind an `Entity` has an `id`
/// primary key plus `updated_at` and `deleted_at` columns.
pub trait Entity: Sized + Send + 'static {
    const TABLE: &'static str;
    /// Columns in the order `from_row` reads them.
    const COLUMNS: &'static [&'static str];

    type New: IntoColumns + Send + 'static;
    type Patch: IntoColumns + Send + 'static;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// An entity with an owning profile column.
pub trait Owned: Entity {
    const OWNER_COLUMN: &'static str;
}

#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// All rows that are not soft deleted.
    async fn find_all(&self) -> RepoResult<Vec<E>>;

    /// The row with `id`, unless it is missing or soft deleted.
    async fn find_by_id(&self, id: &str) -> RepoResult<Option<E>>;

    /// Insert a row whose id the caller already generated.
    async fn create(&self, new: E::New) -> RepoResult<E>;

    /// Apply a partial update and stamp `updated_at`. Soft deleted rows are left untouched.
    async fn update(&self, id: &str, patch: E::Patch) -> RepoResult<Option<E>>;

    /// Stamp `deleted_at`. Calling it again re-stamps the timestamp.
    async fn delete(&self, id: &str) -> RepoResult<Option<E>>;
}

#[async_trait]
pub trait OwnedRepository<E: Owned>: Repository<E> {
    async fn find_all_by_owner(&self, owner_id: &str) -> RepoResult<Vec<E>>;
}

/// SQLite implementation, instantiated once per entity type.
pub struct SqliteRepository<E> {
    pool: DbPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> SqliteRepository<E> {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for SqliteRepository<E> {
    async fn find_all(&self) -> RepoResult<Vec<E>> {
        let conn = self.pool.get()?;
        let sql = format!("{} ORDER BY id", select_visible::<E>(None));
        query_all(&conn, &sql, params![])
    }

    async fn find_by_id(&self, id: &str) -> RepoResult<Option<E>> {
        let conn = self.pool.get()?;
        let sql = select_visible::<E>(Some("id = ?1"));
        let row = conn.query_row(&sql, params![id], E::from_row).optional()?;
        Ok(row)
    }

    async fn create(&self, new: E::New) -> RepoResult<E> {
        let conn = self.pool.get()?;
        let columns = new.into_columns();

        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            E::TABLE,
            names.join(", "),
            placeholders.join(", "),
            E::COLUMNS.join(", "),
        );

        let row = conn.query_row(
            &sql,
            params_from_iter(columns.iter().map(|(_, value)| value)),
            E::from_row,
        )?;
        Ok(row)
    }

    async fn update(&self, id: &str, patch: E::Patch) -> RepoResult<Option<E>> {
        let conn = self.pool.get()?;
        let columns = patch.into_columns();

        let mut assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{} = ?{}", name, i + 1))
            .collect();
        assignments.push(format!("updated_at = {}", NOW));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{} AND deleted_at IS NULL RETURNING {}",
            E::TABLE,
            assignments.join(", "),
            columns.len() + 1,
            E::COLUMNS.join(", "),
        );

        let mut values: Vec<Value> = columns.into_iter().map(|(_, value)| value).collect();
        values.push(Value::Text(id.to_string()));

        let row = conn
            .query_row(&sql, params_from_iter(values.iter()), E::from_row)
            .optional()?;
        Ok(row)
    }

    async fn delete(&self, id: &str) -> RepoResult<Option<E>> {
        let conn = self.pool.get()?;
        let sql = format!(
            "UPDATE {} SET deleted_at = {} WHERE id = ?1 RETURNING {}",
            E::TABLE,
            NOW,
            E::COLUMNS.join(", "),
        );
        let row = conn.query_row(&sql, params![id], E::from_row).optional()?;
        Ok(row)
    }
}

#[async_trait]
impl<E: Owned> OwnedRepository<E> for SqliteRepository<E> {
    async fn find_all_by_owner(&self, owner_id: &str) -> RepoResult<Vec<E>> {
        let conn = self.pool.get()?;
        let filter = format!("{} = ?1", E::OWNER_COLUMN);
        let sql = format!("{} ORDER BY id", select_visible::<E>(Some(&filter)));
        query_all(&conn, &sql, params![owner_id])
    }
}

/// `SELECT` over the rows of `E` that are not soft deleted, with an optional extra predicate.
fn select_visible<E: Entity>(filter: Option<&str>) -> String {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE deleted_at IS NULL",
        E::COLUMNS.join(", "),
        E::TABLE
    );
    if let Some(filter) = filter {
        sql.push_str(" AND ");
        sql.push_str(filter);
    }
    sql
}

/// `E`'s columns qualified with a table alias, for joined queries.
fn qualified_columns<E: Entity>(alias: &str) -> String {
    E::COLUMNS
        .iter()
        .map(|column| format!("{}.{}", alias, column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn query_all<E: Entity, P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> RepoResult<Vec<E>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, E::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
