use askama::Template;
use axum::extract::State;
use axum::http::Uri;
use axum::response::Redirect;
use axum::routing::get;
use axum::{Form, Router};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;

use crate::db::models::{slugify, NewStory, StoryKind, StoryStatus, StoryWithAuthor};
use crate::db::new_id;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::pagination::Cursor;
use crate::repositories::Repository;
use crate::routes::home::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/news.html")]
pub struct NewsTemplate {
    pub stories: Vec<StoryWithAuthor>,
    pub next_cursor: String,
    pub username: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/news_create.html")]
pub struct NewsCreateTemplate {
    pub username: Option<String>,
    pub statuses: &'static [StoryStatus],
}

#[derive(Deserialize)]
pub struct CreateNewsForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    pub story_picture_uri: Option<String>,
    pub is_featured: Option<String>,
    pub status: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/news", get(news_page))
        .route("/news/create", get(create_page).post(create_news))
}

async fn news_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    uri: Uri,
) -> AppResult<Html<NewsTemplate>> {
    let cursor = Cursor::from_uri(&uri, state.config.pagination.page_size);
    let page = state
        .stories
        .find_published_page(StoryKind::News, &cursor)
        .await?;

    Ok(Html(NewsTemplate {
        stories: page.items,
        next_cursor: page.cursor,
        username: user.map(|u| u.github_handle),
    }))
}

async fn create_page(user: CurrentUser) -> Html<NewsCreateTemplate> {
    Html(NewsCreateTemplate {
        username: Some(user.github_handle),
        statuses: StoryStatus::ALL,
    })
}

async fn create_news(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<CreateNewsForm>,
) -> AppResult<Redirect> {
    let title = form.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title cannot be empty".into()));
    }
    let status: StoryStatus = form
        .status
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid status: {}", form.status)))?;

    let description = form.description.trim().to_string();
    let published_at = (status == StoryStatus::Published)
        .then(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
    let story_picture_uri = form
        .story_picture_uri
        .map(|uri| uri.trim().to_string())
        .filter(|uri| !uri.is_empty());

    let story = state
        .stories
        .create(NewStory {
            id: new_id(),
            kind: StoryKind::News,
            status,
            author_profile_id: Some(user.id.clone()),
            slug: slugify(title),
            title: title.to_string(),
            summary: description.clone(),
            description,
            content: form.content,
            story_picture_uri,
            is_featured: form.is_featured.is_some_and(|v| v != "false"),
            is_hidden: false,
            is_anonymous: false,
            published_at,
        })
        .await?;

    tracing::info!("News story {} created by {}", story.slug, user.github_handle);
    Ok(Redirect::to("/news"))
}
