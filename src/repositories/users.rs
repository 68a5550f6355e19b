use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension, Row};

use super::{select_visible, Entity, IntoColumns, RepoResult, SqliteRepository};
use crate::db::models::{NewUser, User, UserPatch};
use crate::pagination::{Cursor, Page};

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "github_handle",
        "created_at",
        "updated_at",
        "deleted_at",
    ];

    type New = NewUser;
    type Patch = UserPatch;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            github_handle: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            deleted_at: row.get(5)?,
        })
    }
}

impl IntoColumns for NewUser {
    fn into_columns(self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("name", self.name.into()),
            ("github_handle", self.github_handle.into()),
        ]
    }
}

impl IntoColumns for UserPatch {
    fn into_columns(self) -> Vec<(&'static str, Value)> {
        let mut columns = Vec::new();
        if let Some(name) = self.name {
            columns.push(("name", name.into()));
        }
        if let Some(handle) = self.github_handle {
            columns.push(("github_handle", handle.into()));
        }
        columns
    }
}

impl SqliteRepository<User> {
    /// Look a user up by GitHub login.
    pub async fn find_by_handle(&self, handle: &str) -> RepoResult<Option<User>> {
        let conn = self.pool.get()?;
        let sql = select_visible::<User>(Some("github_handle = ?1"));
        let user = conn.query_row(&sql, params![handle], User::from_row).optional()?;
        Ok(user)
    }

    /// One page of users in id order. The cursor is the id of the last user
    /// on the previous page.
    pub async fn find_page(&self, cursor: &Cursor) -> RepoResult<Page<User>> {
        let conn = self.pool.get()?;
        let sql = format!(
            "{} ORDER BY id LIMIT ?2",
            select_visible::<User>(Some("(?1 = '' OR id > ?1)"))
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![cursor.value, cursor.fetch_limit()], User::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::from_overfetch(rows, cursor, |user| user.id.clone()))
    }
}
