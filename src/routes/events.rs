use axum::extract::{Path, State};
use axum::response::Redirect;
use axum::routing::post;
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::models::{AttendanceKind, NewEventAttendance};
use crate::db::new_id;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::repositories::Repository;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AttendanceForm {
    pub kind: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events/{event_id}/attendances", post(create_attendance))
}

/// A profile holds at most one role per event; a second create fails on the
/// table's unique constraint and surfaces as a server error.
async fn create_attendance(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(event_id): Path<String>,
    Form(form): Form<AttendanceForm>,
) -> AppResult<Redirect> {
    let kind: AttendanceKind = form
        .kind
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid attendance kind: {}", form.kind)))?;

    let attendance = state
        .attendances
        .create(NewEventAttendance {
            id: new_id(),
            kind,
            event_id: event_id.clone(),
            profile_id: user.id,
        })
        .await?;

    tracing::info!(
        "Attendance {} ({}) recorded for event {}",
        attendance.id,
        attendance.kind,
        event_id
    );
    Ok(Redirect::to(&format!("/api/events/{}/attendances", event_id)))
}
