use serde::Serialize;

use crate::types::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub is_active: bool,
}

/// Public author fields attached to rendered comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl From<&UserIdentity> for AuthorView {
    fn from(identity: &UserIdentity) -> Self {
        AuthorView {
            id: identity.id,
            name: identity.display_name.clone(),
            email: identity.email.clone(),
        }
    }
}
