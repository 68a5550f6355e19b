use askama::Template;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::kv::KvError;
use crate::repositories::RepositoryError;
use crate::routes::home::Html;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Key-value store error: {0}")]
    Kv(#[from] KvError),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Template)]
#[template(path = "pages/error.html")]
pub struct ErrorTemplate {
    pub status: u16,
    pub message: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Kv(KvError::InvalidCursor(_)) => StatusCode::BAD_REQUEST,
            AppError::Repository(_)
            | AppError::Kv(_)
            | AppError::Pool(_)
            | AppError::Internal(_)
            | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("{}", self);
            let page = ErrorTemplate {
                status: status.as_u16(),
                message: "Internal server error".to_string(),
            };
            let mut response = Html(page).into_response();
            *response.status_mut() = status;
            return response;
        }

        let message = match self {
            AppError::NotFound => "Not found".to_string(),
            AppError::Unauthorized => "Unauthorized".to_string(),
            AppError::BadRequest(msg) => msg,
            other => other.to_string(),
        };
        (status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn response_status(err: AppError) -> StatusCode {
        let response = err.into_response();
        response.status()
    }

    #[test]
    fn not_found_returns_404() {
        assert_eq!(response_status(AppError::NotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_returns_401() {
        assert_eq!(
            response_status(AppError::Unauthorized),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn bad_request_returns_400() {
        assert_eq!(
            response_status(AppError::BadRequest("oops".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn invalid_cursor_returns_400() {
        assert_eq!(
            response_status(AppError::Kv(KvError::InvalidCursor("zz".into()))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_returns_500_error_page() {
        let response = AppError::Internal("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()["content-type"],
            "text/html; charset=utf-8"
        );
    }

    #[test]
    fn storage_failure_returns_500() {
        let err = RepositoryError::Sql(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(
            response_status(AppError::Repository(err)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
