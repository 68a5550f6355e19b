use rusqlite::params;

use crate::config::AuthConfig;
use crate::db::new_id;
use crate::repositories::RepositoryError;
use crate::state::DbPool;

/// A login session as stored in the `sessions` table.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub expires_at: String,
}

/// Opens a session for `user_id` lasting `auth.session_hours`.
pub fn create_session(
    pool: &DbPool,
    user_id: &str,
    auth: &AuthConfig,
) -> Result<Session, RepositoryError> {
    let conn = pool.get()?;
    let session = conn.query_row(
        "INSERT INTO sessions (id, user_id, token, expires_at)
         VALUES (?1, ?2, ?3, datetime('now', ?4))
         RETURNING token, expires_at",
        params![
            new_id(),
            user_id,
            generate_token(),
            format!("+{} hours", auth.session_hours)
        ],
        |row| {
            Ok(Session {
                token: row.get(0)?,
                expires_at: row.get(1)?,
            })
        },
    )?;
    Ok(session)
}

pub fn delete_session(pool: &DbPool, token: &str) -> Result<(), RepositoryError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drops sessions past their expiry. Returns how many were removed.
pub fn purge_expired(pool: &DbPool) -> Result<usize, RepositoryError> {
    let conn = pool.get()?;
    let removed = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )?;
    Ok(removed)
}

fn generate_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}
