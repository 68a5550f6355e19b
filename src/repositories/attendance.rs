use rusqlite::types::Value;
use rusqlite::{params, Row};

use super::{query_all, select_visible, Entity, IntoColumns, Owned, RepoResult, SqliteRepository};
use crate::db::models::{EventAttendance, EventAttendancePatch, NewEventAttendance};

impl Entity for EventAttendance {
    const TABLE: &'static str = "event_attendance";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "kind",
        "event_id",
        "profile_id",
        "created_at",
        "updated_at",
        "deleted_at",
    ];

    type New = NewEventAttendance;
    type Patch = EventAttendancePatch;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(EventAttendance {
            id: row.get(0)?,
            kind: row.get(1)?,
            event_id: row.get(2)?,
            profile_id: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            deleted_at: row.get(6)?,
        })
    }
}

impl Owned for EventAttendance {
    const OWNER_COLUMN: &'static str = "profile_id";
}

impl IntoColumns for NewEventAttendance {
    fn into_columns(self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("kind", self.kind.as_str().to_string().into()),
            ("event_id", self.event_id.into()),
            ("profile_id", self.profile_id.into()),
        ]
    }
}

impl IntoColumns for EventAttendancePatch {
    fn into_columns(self) -> Vec<(&'static str, Value)> {
        self.kind
            .map(|kind| ("kind", Value::from(kind.as_str().to_string())))
            .into_iter()
            .collect()
    }
}

impl SqliteRepository<EventAttendance> {
    pub async fn find_all_by_event(&self, event_id: &str) -> RepoResult<Vec<EventAttendance>> {
        let conn = self.pool.get()?;
        let sql = format!(
            "{} ORDER BY created_at",
            select_visible::<EventAttendance>(Some("event_id = ?1"))
        );
        query_all(&conn, &sql, params![event_id])
    }
}
