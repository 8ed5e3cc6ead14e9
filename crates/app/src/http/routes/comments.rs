use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::http::middleware::auth::{AuthError, Viewer};
use crate::state::AppState;
use codeforum_core::domain::comments::{CommentPage, DecoratedComment};
use codeforum_core::service::{CreateComment, AUTHOR_PAGE_SIZE, SOLUTION_PAGE_SIZE};
use codeforum_core::types::{CommentId, PageRequest, SolutionId};
use codeforum_core::CoreError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentBody {
    pub solution_id: Option<String>,
    pub content: Option<String>,
    pub parent_comment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentBody {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteBody {
    pub vote_type: Option<String>,
}

/// Raw paging parameters; anything unparsable falls back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageParams {
    fn resolve(&self, default_limit: u32, max_limit: u32) -> PageRequest {
        let parse = |raw: &Option<String>| -> Option<i64> {
            raw.as_deref().and_then(|value| value.trim().parse().ok())
        };
        PageRequest::resolve(parse(&self.page), parse(&self.limit), default_limit, max_limit)
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
}

#[derive(Debug, Error)]
pub enum CommentsApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<JsonRejection> for CommentsApiError {
    fn from(rejection: JsonRejection) -> Self {
        CommentsApiError::InvalidBody(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    body: Result<Json<CreateCommentBody>, JsonRejection>,
) -> Result<(StatusCode, Json<DecoratedComment>), CommentsApiError> {
    let caller = viewer.require()?;
    let Json(body) = body?;
    let solution_id = SolutionId::try_from(body.solution_id.as_deref().unwrap_or_default())?;
    let parent_id = body
        .parent_comment_id
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(CommentId::try_from)
        .transpose()?;
    let request = CreateComment {
        solution_id,
        content: body.content.unwrap_or_default(),
        parent_id,
    };
    let comment = state.comments.create(caller, request).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_solution_comments(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(solution_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<CommentPage>, CommentsApiError> {
    let solution_id = SolutionId::try_from(solution_id.as_str())?;
    let page = params.resolve(SOLUTION_PAGE_SIZE, state.config.max_page_size);
    let comments = state
        .comments
        .list_for_solution(solution_id, page, viewer.user_id())
        .await?;
    Ok(Json(comments))
}

pub async fn get_comment(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<DecoratedComment>, CommentsApiError> {
    let id = CommentId::try_from(id.as_str())?;
    Ok(Json(state.comments.get(id, viewer.user_id()).await?))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    body: Result<Json<UpdateCommentBody>, JsonRejection>,
) -> Result<Json<DecoratedComment>, CommentsApiError> {
    let caller = viewer.require()?;
    let id = CommentId::try_from(id.as_str())?;
    let Json(body) = body?;
    let content = body.content.unwrap_or_default();
    Ok(Json(state.comments.update(id, caller, &content).await?))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, CommentsApiError> {
    let caller = viewer.require()?;
    let id = CommentId::try_from(id.as_str())?;
    state.comments.delete(id, caller).await?;
    Ok(Json(DeletedResponse {
        message: "Comment deleted successfully",
    }))
}

pub async fn vote_comment(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    body: Result<Json<VoteBody>, JsonRejection>,
) -> Result<Json<DecoratedComment>, CommentsApiError> {
    let caller = viewer.require()?;
    let id = CommentId::try_from(id.as_str())?;
    let Json(body) = body?;
    let vote_type = body.vote_type.unwrap_or_default();
    Ok(Json(state.comments.vote(id, caller, &vote_type).await?))
}

pub async fn list_my_comments(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(params): Query<PageParams>,
) -> Result<Json<CommentPage>, CommentsApiError> {
    let caller = viewer.require()?;
    let page = params.resolve(AUTHOR_PAGE_SIZE, state.config.max_page_size);
    Ok(Json(state.comments.list_mine(caller, page).await?))
}

impl IntoResponse for CommentsApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            CommentsApiError::Auth(err) => return err.clone().into_response(),
            CommentsApiError::InvalidBody(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            CommentsApiError::Core(err) => match err {
                CoreError::Validation(_) | CoreError::InvalidState(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                CoreError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                CoreError::Forbidden(_) => (StatusCode::FORBIDDEN, err.to_string()),
                CoreError::Unavailable(_) => {
                    error!(error = %err, "comments request failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_string(),
                    )
                }
            },
        };
        if status.is_client_error() {
            warn!(status = status.as_u16(), error = %message, "comments request rejected");
        }
        let body = Json(ErrorBody { error: message });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::PageParams;

    fn params(page: Option<&str>, limit: Option<&str>) -> PageParams {
        PageParams {
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn page_params_fall_back_on_garbage() {
        let page = params(Some("abc"), Some("-5")).resolve(20, 100);
        assert_eq!((page.page(), page.limit()), (1, 20));
    }

    #[test]
    fn page_params_cap_limit() {
        let page = params(Some("3"), Some("500")).resolve(20, 100);
        assert_eq!((page.page(), page.limit()), (3, 100));
        assert_eq!(page.offset(), 200);
    }
}
