use askama::Template;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;

use crate::db::models::{StoryWithScores, User};
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::routes::home::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/user.html")]
pub struct UserTemplate {
    pub profile: User,
    pub questions: Vec<StoryWithScores>,
    pub username: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/users/{login}", get(profile_page))
}

async fn profile_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(login): Path<String>,
) -> AppResult<Html<UserTemplate>> {
    let profile = state
        .users
        .find_by_handle(&login)
        .await?
        .ok_or(AppError::NotFound)?;

    let viewer = user.as_ref().map(|u| u.id.as_str());
    let questions = state
        .stories
        .find_all_by_owner_with_scores(&profile.id, viewer)
        .await?;

    Ok(Html(UserTemplate {
        profile,
        questions,
        username: user.map(|u| u.github_handle),
    }))
}
