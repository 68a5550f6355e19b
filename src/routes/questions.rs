use askama::Template;
use axum::extract::{Path, State};
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::{NewStory, StoryKind, StoryWithScores};
use crate::db::new_id;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::repositories::Repository;
use crate::routes::home::Html;
use crate::state::AppState;

/// Key-value namespace indexing each user's non-anonymous questions by handle.
pub const QUESTIONS_BY_USER: &str = "questions_by_user";

const MAX_QUESTION_LEN: usize = 2000;

#[derive(Template)]
#[template(path = "pages/questions.html")]
pub struct QuestionsTemplate {
    pub questions: Vec<StoryWithScores>,
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateQuestionForm {
    pub content: String,
    /// Checkbox: present (usually "on") when ticked.
    pub is_anonymous: Option<String>,
}

/// Value stored under `[QUESTIONS_BY_USER, handle, question_id]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionIndexEntry {
    pub id: String,
    pub content: String,
    pub created_at: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/questions", get(questions_page).post(create_question))
        .route("/questions/{id}/delete", post(delete_question))
}

async fn questions_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> AppResult<Html<QuestionsTemplate>> {
    let viewer = user.as_ref().map(|u| u.id.as_str());
    let questions = state
        .stories
        .find_all_with_scores(viewer)
        .await?
        .into_iter()
        .filter(|story| story.kind == StoryKind::Question)
        .collect();

    Ok(Html(QuestionsTemplate {
        questions,
        username: user.map(|u| u.github_handle),
    }))
}

async fn create_question(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<CreateQuestionForm>,
) -> AppResult<Redirect> {
    let content = form.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Question cannot be empty".into()));
    }
    if content.len() > MAX_QUESTION_LEN {
        return Err(AppError::BadRequest(
            "Question must be 2000 characters or less".into(),
        ));
    }
    let is_anonymous = form.is_anonymous.is_some_and(|v| v != "false");

    let question = state
        .stories
        .create(NewStory::question(new_id(), &user.id, content, is_anonymous))
        .await?;

    if !is_anonymous {
        let entry = QuestionIndexEntry {
            id: question.id.clone(),
            content: question.content.clone(),
            created_at: question.created_at.clone(),
        };
        // The question row is committed; an index failure is logged, not returned.
        if let Err(e) = state.kv.set(
            &[QUESTIONS_BY_USER, user.github_handle.as_str(), question.id.as_str()],
            &entry,
        ) {
            tracing::error!("Failed to index question {}: {}", question.id, e);
        }
    }

    tracing::info!("Question {} created by {}", question.id, user.github_handle);
    Ok(Redirect::to("/questions"))
}

async fn delete_question(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Redirect> {
    let question = state
        .stories
        .find_by_id(&id)
        .await?
        .filter(|story| story.kind == StoryKind::Question)
        .ok_or(AppError::NotFound)?;

    if question.author_profile_id.as_deref() != Some(user.id.as_str()) {
        return Err(AppError::Unauthorized);
    }

    state.stories.delete(&id).await?;
    state
        .kv
        .delete(&[QUESTIONS_BY_USER, user.github_handle.as_str(), id.as_str()])?;

    tracing::info!("Question {} deleted by {}", id, user.github_handle);
    Ok(Redirect::to("/questions"))
}
