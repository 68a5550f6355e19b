use axum::extract::{Path, State};
use axum::http::Uri;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::{
    EventAttendance, NewQuestionVote, QuestionVote, StoryKind, StoryWithAuthor, User,
};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::kv::KvEntry;
use crate::pagination::{Cursor, Page};
use crate::repositories::Repository;
use crate::routes::questions::{QuestionIndexEntry, QUESTIONS_BY_USER};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct VoteBody {
    pub score: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/stories", get(list_stories))
        .route("/api/users", get(list_users))
        .route("/api/users/{login}/items", get(list_user_items))
        .route("/api/questions/{id}/votes", post(vote))
        .route("/api/events/{event_id}/attendances", get(list_attendances))
}

fn cursor(state: &AppState, uri: &Uri) -> Cursor {
    Cursor::from_uri(uri, state.config.pagination.page_size)
}

async fn list_stories(
    State(state): State<AppState>,
    uri: Uri,
) -> AppResult<Json<Page<StoryWithAuthor>>> {
    let page = state
        .stories
        .find_published_page(StoryKind::News, &cursor(&state, &uri))
        .await?;
    Ok(Json(page))
}

async fn list_users(State(state): State<AppState>, uri: Uri) -> AppResult<Json<Page<User>>> {
    let page = state.users.find_page(&cursor(&state, &uri)).await?;
    Ok(Json(page))
}

async fn list_user_items(
    State(state): State<AppState>,
    Path(login): Path<String>,
    uri: Uri,
) -> AppResult<Json<Page<KvEntry<QuestionIndexEntry>>>> {
    state
        .users
        .find_by_handle(&login)
        .await?
        .ok_or(AppError::NotFound)?;

    let page = state
        .kv
        .list(&[QUESTIONS_BY_USER, login.as_str()], &cursor(&state, &uri))?;
    Ok(Json(page))
}

async fn vote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<VoteBody>,
) -> AppResult<Json<QuestionVote>> {
    state
        .stories
        .find_by_id(&id)
        .await?
        .filter(|story| story.kind == StoryKind::Question)
        .ok_or(AppError::NotFound)?;

    let vote = state
        .stories
        .upsert_vote(NewQuestionVote {
            question_id: id,
            user_id: user.id,
            score: body.score,
        })
        .await?;
    Ok(Json(vote))
}

async fn list_attendances(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> AppResult<Json<Vec<EventAttendance>>> {
    let attendances = state.attendances.find_all_by_event(&event_id).await?;
    Ok(Json(attendances))
}
