use axum::body::Body;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::state::AppState;
use codeforum_core::domain::identity::UserIdentity;
use codeforum_core::types::UserId;

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("user not found")]
    UnknownUser,
    #[error("account is inactive")]
    InactiveUser,
    #[error("identity lookup failed")]
    Unavailable,
}

/// Who is making the request, attached to every `/api` request as an extension.
#[derive(Debug, Clone)]
pub enum Viewer {
    Anonymous,
    Authenticated(UserIdentity),
    Rejected(AuthError),
}

impl Viewer {
    /// Anyone whose credentials did not check out reads as anonymous.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Viewer::Authenticated(identity) => Some(identity.id),
            Viewer::Anonymous | Viewer::Rejected(_) => None,
        }
    }

    pub fn require(&self) -> Result<&UserIdentity, AuthError> {
        match self {
            Viewer::Authenticated(identity) => Ok(identity),
            Viewer::Anonymous => Err(AuthError::MissingToken),
            Viewer::Rejected(err) => Err(err.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn resolve_viewer(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let viewer = match extract_bearer_token(&request) {
        None => Viewer::Anonymous,
        Some(token) => authenticate(&state, &token).await,
    };
    request.extensions_mut().insert(viewer);
    next.run(request).await
}

async fn authenticate(state: &AppState, token: &str) -> Viewer {
    let user_id = match state.tokens.verify(token) {
        Ok(user_id) => user_id,
        Err(err) => {
            debug!(error = %err, "bearer token rejected");
            return Viewer::Rejected(AuthError::InvalidToken);
        }
    };
    match state.identities.resolve_identity(user_id).await {
        Ok(Some(identity)) if identity.is_active => Viewer::Authenticated(identity),
        Ok(Some(_)) => Viewer::Rejected(AuthError::InactiveUser),
        Ok(None) => Viewer::Rejected(AuthError::UnknownUser),
        Err(err) => {
            warn!(error = %err, user_id = %user_id, "identity lookup failed");
            Viewer::Rejected(AuthError::Unavailable)
        }
    }
}

fn extract_bearer_token<B>(request: &Request<B>) -> Option<String> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let value = header.trim().strip_prefix("Bearer ")?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::Unavailable => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header::AUTHORIZATION;
    use axum::http::Request;

    use super::{extract_bearer_token, AuthError, Viewer};
    use codeforum_core::domain::identity::UserIdentity;
    use codeforum_core::types::UserId;

    fn request(header: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri("/api/comments");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn bearer_token_extraction() {
        assert_eq!(
            extract_bearer_token(&request(Some("Bearer abc.def"))),
            Some("abc.def".to_string())
        );
        assert_eq!(extract_bearer_token(&request(Some("Bearer   "))), None);
        assert_eq!(extract_bearer_token(&request(Some("Basic abc"))), None);
        assert_eq!(extract_bearer_token(&request(None)), None);
    }

    #[test]
    fn rejected_viewers_are_anonymous_but_not_authorized() {
        let viewer = Viewer::Rejected(AuthError::InactiveUser);
        assert_eq!(viewer.user_id(), None);
        assert!(matches!(viewer.require(), Err(AuthError::InactiveUser)));
        assert!(matches!(
            Viewer::Anonymous.require(),
            Err(AuthError::MissingToken)
        ));

        let identity = UserIdentity {
            id: UserId::new(),
            display_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            is_active: true,
        };
        let viewer = Viewer::Authenticated(identity.clone());
        assert_eq!(viewer.user_id(), Some(identity.id));
    }
}
